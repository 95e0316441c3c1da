//! Deterministic single-threaded event loop with a virtual clock.
//!
//! Three kinds of work are interleaved:
//! - futures spawned onto a `LocalPool` (agent tasks, frame loops),
//! - deferred callbacks that run on the next tick, in FIFO order,
//! - timers keyed by virtual due time, fired in `(due, id)` order.
//!
//! Time only moves when the owner calls [`EventLoop::advance`] or
//! [`EventLoop::run_until_idle`], so every interleaving is replayable.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use tracing::warn;

type Callback = Box<dyn FnOnce()>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

struct Shared {
    now_ms: Cell<u64>,
    next_timer: Cell<u64>,
    ticks: RefCell<VecDeque<Callback>>,
    timers: RefCell<BTreeMap<(u64, TimerId), Callback>>,
    spawner: LocalSpawner,
}

/// Cloneable access to the loop from callbacks and tasks.
#[derive(Clone)]
pub struct LoopHandle {
    shared: Rc<Shared>,
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("now_ms", &self.shared.now_ms.get())
            .field("pending_ticks", &self.shared.ticks.borrow().len())
            .field("pending_timers", &self.shared.timers.borrow().len())
            .finish()
    }
}

impl LoopHandle {
    pub fn now_ms(&self) -> u64 {
        self.shared.now_ms.get()
    }

    /// Runs `f` on the next tick, after everything already queued.
    pub fn defer(&self, f: impl FnOnce() + 'static) {
        self.shared.ticks.borrow_mut().push_back(Box::new(f));
    }

    pub fn set_timeout(&self, delay_ms: u64, f: impl FnOnce() + 'static) -> TimerId {
        let id = TimerId(self.shared.next_timer.get());
        self.shared.next_timer.set(id.0.wrapping_add(1));
        let due = self.now_ms().saturating_add(delay_ms);
        self.shared
            .timers
            .borrow_mut()
            .insert((due, id), Box::new(f));
        id
    }

    /// Returns `true` if the timer was still pending.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut timers = self.shared.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|(_, tid), _| *tid != id);
        timers.len() != before
    }

    pub fn spawn(&self, fut: impl Future<Output = ()> + 'static) {
        if let Err(err) = self.shared.spawner.spawn_local(fut) {
            warn!("event loop is gone, dropping spawned task: {err}");
        }
    }

    /// Completes once the virtual clock has advanced by `ms`. Always
    /// suspends at least once; `sleep(0)` resumes on the next tick, after
    /// callbacks already queued.
    pub fn sleep(&self, ms: u64) -> Sleep {
        Sleep {
            handle: self.clone(),
            due_ms: self.now_ms().saturating_add(ms),
            state: None,
        }
    }
}

#[derive(Default)]
struct SleepState {
    fired: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

/// Future returned by [`LoopHandle::sleep`].
pub struct Sleep {
    handle: LoopHandle,
    due_ms: u64,
    state: Option<Rc<SleepState>>,
}

impl std::fmt::Debug for Sleep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sleep").field("due_ms", &self.due_ms).finish()
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(state) = &self.state {
            if state.fired.get() {
                return Poll::Ready(());
            }
            *state.waker.borrow_mut() = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let state = Rc::new(SleepState::default());
        *state.waker.borrow_mut() = Some(cx.waker().clone());
        let timer_state = Rc::clone(&state);
        let wake = move || {
            timer_state.fired.set(true);
            let waker = timer_state.waker.borrow_mut().take();
            if let Some(waker) = waker {
                waker.wake();
            }
        };
        let now = self.handle.now_ms();
        if now >= self.due_ms {
            self.handle.defer(wake);
        } else {
            self.handle.set_timeout(self.due_ms - now, wake);
        }
        self.state = Some(state);
        Poll::Pending
    }
}

pub struct EventLoop {
    pool: LocalPool,
    handle: LoopHandle,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let shared = Rc::new(Shared {
            now_ms: Cell::new(0),
            next_timer: Cell::new(0),
            ticks: RefCell::new(VecDeque::new()),
            timers: RefCell::new(BTreeMap::new()),
            spawner: pool.spawner(),
        });
        Self {
            pool,
            handle: LoopHandle { shared },
        }
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    pub fn now_ms(&self) -> u64 {
        self.handle.now_ms()
    }

    pub fn pending_timers(&self) -> usize {
        self.handle.shared.timers.borrow().len()
    }

    /// Runs everything runnable at the current virtual time.
    pub fn run_until_stalled(&mut self) {
        loop {
            self.pool.run_until_stalled();
            if self.run_next_tick() {
                continue;
            }
            if self.fire_next_due_timer() {
                continue;
            }
            break;
        }
    }

    /// Moves the clock forward by `ms`, firing timers in due order.
    pub fn advance(&mut self, ms: u64) {
        let deadline = self.now_ms().saturating_add(ms);
        self.run_until(deadline);
        let shared = &self.handle.shared;
        shared.now_ms.set(shared.now_ms.get().max(deadline));
    }

    /// Runs until no work and no timers remain. Never returns while a
    /// periodic task keeps rescheduling itself; use [`EventLoop::advance`]
    /// for those.
    pub fn run_until_idle(&mut self) {
        self.run_until(u64::MAX);
    }

    fn run_until(&mut self, deadline: u64) {
        loop {
            self.run_until_stalled();
            let next_due = self
                .handle
                .shared
                .timers
                .borrow()
                .keys()
                .next()
                .map(|(due, _)| *due);
            match next_due {
                Some(due) if due <= deadline => {
                    let shared = &self.handle.shared;
                    shared.now_ms.set(shared.now_ms.get().max(due));
                }
                _ => break,
            }
        }
    }

    fn run_next_tick(&self) -> bool {
        let next = self.handle.shared.ticks.borrow_mut().pop_front();
        match next {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }

    fn fire_next_due_timer(&self) -> bool {
        let now = self.now_ms();
        let due = {
            let mut timers = self.handle.shared.timers.borrow_mut();
            let key = timers.keys().next().copied();
            match key {
                Some(key) if key.0 <= now => timers.remove(&key),
                _ => None,
            }
        };
        match due {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }
}
