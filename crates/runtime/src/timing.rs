use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::event_loop::{LoopHandle, TimerId};

type Action = Box<dyn FnOnce()>;

/// Runs an action once calls have stopped arriving for `wait_ms`.
///
/// Every call restarts the wait; the action of the latest call wins.
#[derive(Clone)]
pub struct Debouncer {
    handle: LoopHandle,
    wait_ms: u64,
    timer: Rc<Cell<Option<TimerId>>>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("wait_ms", &self.wait_ms)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl Debouncer {
    pub fn new(handle: LoopHandle, wait_ms: u64) -> Self {
        Self {
            handle,
            wait_ms,
            timer: Rc::new(Cell::new(None)),
        }
    }

    pub fn call(&self, f: impl FnOnce() + 'static) {
        self.cancel();
        let timer = Rc::clone(&self.timer);
        let id = self.handle.set_timeout(self.wait_ms, move || {
            timer.set(None);
            f();
        });
        self.timer.set(Some(id));
    }

    pub fn cancel(&self) {
        if let Some(id) = self.timer.take() {
            self.handle.clear_timeout(id);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.timer.get().is_some()
    }
}

/// Trailing-edge throttle: the first call of a window arms a timer, calls
/// made while it is armed only replace the action, and the latest action
/// runs when the window closes.
#[derive(Clone)]
pub struct Throttle {
    handle: LoopHandle,
    wait_ms: u64,
    action: Rc<RefCell<Option<Action>>>,
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("wait_ms", &self.wait_ms)
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl Throttle {
    pub fn new(handle: LoopHandle, wait_ms: u64) -> Self {
        Self {
            handle,
            wait_ms,
            action: Rc::new(RefCell::new(None)),
        }
    }

    pub fn call(&self, f: impl FnOnce() + 'static) {
        let armed = self.action.borrow_mut().replace(Box::new(f)).is_some();
        if armed {
            return;
        }
        let action = Rc::clone(&self.action);
        self.handle.set_timeout(self.wait_ms, move || {
            let pending = action.borrow_mut().take();
            if let Some(f) = pending {
                f();
            }
        });
    }

    pub fn is_armed(&self) -> bool {
        self.action.borrow().is_some()
    }
}
