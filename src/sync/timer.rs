//! Scoped Timers
//!
//! Deadline fields polled by the session pump. Each logical purpose owns
//! exactly one timer value; re-arming replaces the previous schedule, so
//! two live schedules for the same purpose cannot exist. Teardown is a
//! plain `stop`/`cancel`.

/// Repeating timer. Fires every `period_ms` once started.
#[derive(Clone, Copy, Debug)]
pub struct IntervalTimer {
    period_ms: i64,
    next_due: Option<i64>,
}

impl IntervalTimer {
    /// A stopped timer with the given period.
    pub fn new(period_ms: i64) -> Self {
        Self {
            period_ms,
            next_due: None,
        }
    }

    /// (Re)start the schedule; the first fire is one period from `now_ms`.
    pub fn start(&mut self, now_ms: i64) {
        self.next_due = Some(now_ms + self.period_ms);
    }

    /// Drop the schedule.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Whether a schedule is live.
    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Number of periods elapsed up to `now_ms`; advances the schedule.
    ///
    /// Large clock jumps report every missed fire so per-second counters
    /// stay exact under simulated time.
    pub fn poll(&mut self, now_ms: i64) -> u32 {
        let Some(mut due) = self.next_due else {
            return 0;
        };
        let mut fires = 0;
        while due <= now_ms {
            fires += 1;
            due += self.period_ms;
        }
        self.next_due = Some(due);
        fires
    }
}

/// Single-fire timer. Disarms itself when it fires.
#[derive(Clone, Copy, Debug, Default)]
pub struct OneShotTimer {
    deadline: Option<i64>,
}

impl OneShotTimer {
    /// A disarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)arm to fire `delay_ms` from `now_ms`.
    pub fn arm(&mut self, now_ms: i64, delay_ms: i64) {
        self.deadline = Some(now_ms + delay_ms);
    }

    /// Disarm without firing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether armed.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// True exactly once, when the deadline has passed.
    pub fn poll(&mut self, now_ms: i64) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now_ms => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_fires_per_period() {
        let mut timer = IntervalTimer::new(1000);
        assert_eq!(timer.poll(5_000), 0); // not started

        timer.start(0);
        assert_eq!(timer.poll(999), 0);
        assert_eq!(timer.poll(1_000), 1);
        assert_eq!(timer.poll(1_001), 0);
        assert_eq!(timer.poll(4_500), 3);
    }

    #[test]
    fn test_interval_restart_replaces_schedule() {
        let mut timer = IntervalTimer::new(1000);
        timer.start(0);
        timer.start(500);
        assert_eq!(timer.poll(1_200), 0);
        assert_eq!(timer.poll(1_500), 1);

        timer.stop();
        assert!(!timer.is_running());
        assert_eq!(timer.poll(10_000), 0);
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut timer = OneShotTimer::new();
        timer.arm(0, 2_000);
        assert!(!timer.poll(1_999));
        assert!(timer.poll(2_000));
        assert!(!timer.poll(5_000));
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_one_shot_rearm_and_cancel() {
        let mut timer = OneShotTimer::new();
        timer.arm(0, 1_000);
        timer.arm(0, 3_000); // replaces the earlier deadline
        assert!(!timer.poll(1_500));

        timer.cancel();
        assert!(!timer.poll(10_000));
    }
}
