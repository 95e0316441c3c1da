use std::cell::RefCell;
use std::rc::Rc;

use crate::event_loop::LoopHandle;

type Pending = Box<dyn FnOnce()>;

/// Runs only the most recent of a burst of synchronous requests.
///
/// The first request of a burst schedules a flush for the next tick; later
/// requests made before that tick replace the pending one. Only the request
/// present when the tick runs is executed.
#[derive(Clone, Default)]
pub struct Coalescer {
    slot: Rc<RefCell<Option<Pending>>>,
}

impl std::fmt::Debug for Coalescer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coalescer")
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `f` replaced a request that had not run yet.
    pub fn schedule(&self, handle: &LoopHandle, f: impl FnOnce() + 'static) -> bool {
        let replaced = self.slot.borrow_mut().replace(Box::new(f)).is_some();
        if !replaced {
            let slot = Rc::clone(&self.slot);
            handle.defer(move || {
                let pending = slot.borrow_mut().take();
                if let Some(f) = pending {
                    f();
                }
            });
        }
        replaced
    }

    pub fn is_pending(&self) -> bool {
        self.slot.borrow().is_some()
    }
}
