use std::cell::Cell;
use std::rc::Rc;

/// Cooperative cancellation flag shared between an agent and its running task.
///
/// Cancellation is never preemptive: work observes it only by polling
/// [`CancelToken::is_cancelled`] between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    requested: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.requested.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.get()
    }

    /// True when both handles observe the same flag.
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Rc::ptr_eq(&self.requested, &other.requested)
    }
}
