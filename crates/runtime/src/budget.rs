use std::time::{Duration, Instant};

/// How much work one cooperative slice may do before yielding.
///
/// `WallClock` is what interactive callers use; `Units` keeps slicing
/// deterministic, which tests rely on. Slice boundaries never change what
/// the sliced work computes, only when it yields.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlicePolicy {
    WallClock(Duration),
    Units(u32),
    Unlimited,
}

impl SlicePolicy {
    /// Starts the budget for a fresh slice.
    pub fn start(&self) -> SliceBudget {
        match *self {
            SlicePolicy::WallClock(limit) => SliceBudget {
                started: Instant::now(),
                limit: Some(limit),
                remaining_units: u32::MAX,
            },
            SlicePolicy::Units(units) => SliceBudget {
                started: Instant::now(),
                limit: None,
                remaining_units: units.max(1),
            },
            SlicePolicy::Unlimited => SliceBudget {
                started: Instant::now(),
                limit: None,
                remaining_units: u32::MAX,
            },
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct SliceBudget {
    started: Instant,
    limit: Option<Duration>,
    remaining_units: u32,
}

impl SliceBudget {
    pub fn remaining_units(&self) -> u32 {
        self.remaining_units
    }

    pub fn consume(&mut self, units: u32) {
        if self.remaining_units != u32::MAX {
            self.remaining_units = self.remaining_units.saturating_sub(units);
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_units == 0 || self.limit.is_some_and(|limit| self.elapsed() > limit)
    }
}
