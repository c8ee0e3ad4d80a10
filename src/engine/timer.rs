use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Once cancelled it stays cancelled; a restarted
/// timer hands out a fresh token.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Repeating timer driven by caller-supplied timestamps (milliseconds).
///
/// The timer owns no thread; the frame loop polls it with the current time.
/// A poll fires at most once. If the caller fell more than a full interval
/// behind, missed beats are dropped rather than replayed in a burst.
#[derive(Debug)]
pub struct RepeatingTimer {
    interval_ms: f64,
    next_due: Option<f64>,
    token: CancellationToken,
}

impl RepeatingTimer {
    pub fn new(interval_ms: f64) -> Self {
        let token = CancellationToken::new();
        token.cancel();
        Self {
            interval_ms,
            next_due: None,
            token,
        }
    }

    /// Arms the timer so the first fire lands one interval after `now`.
    /// Already-armed timers are left alone.
    pub fn start(&mut self, now: f64) -> CancellationToken {
        if !self.is_armed() {
            self.token = CancellationToken::new();
            self.next_due = Some(now + self.interval_ms);
        }
        self.token.clone()
    }

    pub fn cancel(&mut self) {
        self.token.cancel();
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some() && !self.token.is_cancelled()
    }

    /// Applies from the next reschedule; an already-pending fire keeps its time.
    pub fn set_interval(&mut self, interval_ms: f64) {
        self.interval_ms = interval_ms;
    }

    pub fn interval(&self) -> f64 {
        self.interval_ms
    }

    pub fn next_due(&self) -> Option<f64> {
        self.next_due.filter(|_| !self.token.is_cancelled())
    }

    /// Returns the scheduled fire time if one elapsed by `now`.
    pub fn poll(&mut self, now: f64) -> Option<f64> {
        if self.token.is_cancelled() {
            return None;
        }
        let due = self.next_due?;
        if now < due {
            return None;
        }

        let mut next = due + self.interval_ms;
        if next <= now {
            next = now + self.interval_ms;
        }
        self.next_due = Some(next);
        Some(due)
    }
}
