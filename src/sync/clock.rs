//! Clock
//!
//! Injected time source. All core logic takes timestamps from here, never
//! from the system directly, so the whole session can run under simulated
//! time.

use std::cell::Cell;
use std::rc::Rc;

use chrono::Utc;

/// Millisecond wall-clock source.
pub trait Clock {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Real time via `chrono`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock for deterministic runs and tests.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    /// A clock starting at the given instant.
    pub fn starting_at(now_ms: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(now_ms)),
        }
    }

    /// Move time forward.
    pub fn advance(&self, delta_ms: i64) {
        self.now.set(self.now.get() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}
