//! Heartbeat Monitor
//!
//! Liveness over a single shared heartbeat slot. Each peer rewrites the
//! slot on an interval and polls it on another; a foreign mark in the slot
//! means the opponent is alive. Absence is only trusted after a timeout
//! plus a grace re-check, so tab suspends and coalesced writes do not flap
//! into a false disconnect.

use tracing::debug;

use crate::game::board::Mark;
use crate::sync::protocol::HeartbeatMessage;
use crate::sync::timer::{IntervalTimer, OneShotTimer};

/// Default beacon write/poll interval.
pub const HEARTBEAT_INTERVAL_MS: i64 = 3_000;

/// Silence longer than this starts the grace window.
pub const HEARTBEAT_TIMEOUT_MS: i64 = 9_000;

/// Extra window granted before declaring the opponent gone.
pub const HEARTBEAT_GRACE_MS: i64 = 2_000;

/// What a pump observed about the opponent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Fresh foreign beacon in the slot.
    OpponentAlive,
    /// Silent past timeout and grace; treat as disconnected.
    OpponentLost,
}

/// Actions and observations from one monitor pump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpOutcome {
    /// The local beacon is due; the caller should publish one.
    pub beacon_due: bool,
    /// Liveness observation, if a check ran this pump.
    pub verdict: Option<Verdict>,
}

/// Per-session liveness state machine.
///
/// The monitor only observes and reports; the orchestrator owns the single
/// status-guarded disconnect transition, which keeps the declaration
/// idempotent no matter how many checks report `OpponentLost`.
pub struct HeartbeatMonitor {
    local_mark: Mark,
    timeout_ms: i64,
    grace_ms: i64,
    send_timer: IntervalTimer,
    check_timer: IntervalTimer,
    grace_recheck: OneShotTimer,
    last_seen: i64,
    grace_started: bool,
    running: bool,
}

impl HeartbeatMonitor {
    /// Monitor beating as `local_mark` with default windows.
    pub fn new(local_mark: Mark) -> Self {
        Self::with_windows(
            local_mark,
            HEARTBEAT_INTERVAL_MS,
            HEARTBEAT_TIMEOUT_MS,
            HEARTBEAT_GRACE_MS,
        )
    }

    /// Monitor with custom intervals.
    pub fn with_windows(local_mark: Mark, interval_ms: i64, timeout_ms: i64, grace_ms: i64) -> Self {
        Self {
            local_mark,
            timeout_ms,
            grace_ms,
            send_timer: IntervalTimer::new(interval_ms),
            check_timer: IntervalTimer::new(interval_ms),
            grace_recheck: OneShotTimer::new(),
            last_seen: 0,
            grace_started: false,
            running: false,
        }
    }

    /// Begin beating and checking. The opponent is presumed alive as of
    /// `now_ms`, so the timeout measures from session start.
    pub fn start(&mut self, now_ms: i64) {
        self.send_timer.start(now_ms);
        self.check_timer.start(now_ms);
        self.grace_recheck.cancel();
        self.last_seen = now_ms;
        self.grace_started = false;
        self.running = true;
    }

    /// Stop all schedules.
    pub fn stop(&mut self) {
        self.send_timer.stop();
        self.check_timer.stop();
        self.grace_recheck.cancel();
        self.running = false;
    }

    /// Whether the monitor is live.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Feed a beacon seen through the notification feed.
    ///
    /// Returns true when it was the opponent's. Only ever refreshes
    /// liveness; a beacon can never declare a disconnect.
    pub fn note_beacon(&mut self, beacon: &HeartbeatMessage, now_ms: i64) -> bool {
        if !self.running || beacon.mark == self.local_mark {
            return false;
        }
        self.refresh(now_ms);
        true
    }

    /// Advance the monitor to `now_ms`.
    ///
    /// `read_slot` is consulted only when a check or grace re-check is due.
    pub fn on_pump(
        &mut self,
        now_ms: i64,
        read_slot: impl FnOnce() -> Option<HeartbeatMessage>,
    ) -> PumpOutcome {
        if !self.running {
            return PumpOutcome::default();
        }

        let mut outcome = PumpOutcome {
            beacon_due: self.send_timer.poll(now_ms) > 0,
            verdict: None,
        };

        let check_due = self.check_timer.poll(now_ms) > 0;
        let grace_due = self.grace_recheck.poll(now_ms);
        if !check_due && !grace_due {
            return outcome;
        }

        if let Some(beacon) = read_slot() {
            if beacon.mark != self.local_mark {
                self.refresh(now_ms);
                outcome.verdict = Some(Verdict::OpponentAlive);
                return outcome;
            }
        }

        let silence = now_ms - self.last_seen;
        if silence > self.timeout_ms {
            if !self.grace_started {
                self.grace_started = true;
                self.grace_recheck.arm(now_ms, self.grace_ms);
                debug!(silence_ms = silence, "heartbeat stale, grace period started");
            } else if silence > self.timeout_ms + self.grace_ms {
                outcome.verdict = Some(Verdict::OpponentLost);
            }
        }
        outcome
    }

    fn refresh(&mut self, now_ms: i64) {
        self.last_seen = now_ms;
        self.grace_started = false;
        self.grace_recheck.cancel();
    }
}
