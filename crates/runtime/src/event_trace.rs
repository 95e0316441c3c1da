use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Submit,
    Update,
    Reject,
    Fail,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Submit => "submit",
            EventKind::Update => "update",
            EventKind::Reject => "reject",
            EventKind::Fail => "fail",
        }
    }
}

/// One recorded agent lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub at_ms: u64,
    pub source: &'static str,
    pub kind: EventKind,
}

/// Shared, append-only log of agent events for inspection and tests.
#[derive(Debug, Default, Clone)]
pub struct EventTrace {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, at_ms: u64, source: &'static str, kind: EventKind) {
        self.events.borrow_mut().push(Event {
            at_ms,
            source,
            kind,
        });
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn kinds_for(&self, source: &str) -> Vec<EventKind> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.source == source)
            .map(|e| e.kind)
            .collect()
    }

    pub fn count(&self, source: &str, kind: EventKind) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.source == source && e.kind == kind)
            .count()
    }

    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}
