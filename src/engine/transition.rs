use futures_intrusive::sync::ManualResetEvent;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::config::TransitionConfig;

/// Resting offset of object `index` at idle clock `time`.
pub fn idle_offset(index: usize, time: f32, amplitude: f32) -> f32 {
    ((index as f32 + time) * 0.3).sin() * amplitude
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Idle,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Enter,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Geometry reached its rest (Enter) or departure (Exit) configuration
    Completed,
    /// Superseded by a jump to idle or by teardown
    Cancelled,
}

struct Signal {
    outcome: OnceLock<TransitionOutcome>,
    settled: AtomicBool,
    event: ManualResetEvent,
}

/// One-shot, cloneable completion signal for a transition.
///
/// Clones share the same signal. It settles exactly once; later attempts are
/// ignored. Await it with [`Completion::wait`] or poll [`Completion::outcome`].
#[derive(Clone)]
pub struct Completion {
    kind: TransitionKind,
    inner: Arc<Signal>,
}

impl Completion {
    fn new(kind: TransitionKind) -> Self {
        Self {
            kind,
            inner: Arc::new(Signal {
                outcome: OnceLock::new(),
                settled: AtomicBool::new(false),
                event: ManualResetEvent::new(false),
            }),
        }
    }

    /// Returns true only for the call that actually settled the signal.
    fn settle(&self, outcome: TransitionOutcome) -> bool {
        if self.inner.settled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let _ = self.inner.outcome.set(outcome);
        self.inner.event.set();
        true
    }

    pub fn kind(&self) -> TransitionKind {
        self.kind
    }

    pub fn outcome(&self) -> Option<TransitionOutcome> {
        self.inner.outcome.get().copied()
    }

    pub fn is_settled(&self) -> bool {
        self.outcome().is_some()
    }

    pub fn same_signal(&self, other: &Completion) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub async fn wait(&self) -> TransitionOutcome {
        self.inner.event.wait().await;
        self.outcome().unwrap_or(TransitionOutcome::Cancelled)
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("kind", &self.kind)
            .field("outcome", &self.outcome())
            .finish()
    }
}

/// Enter / Idle / Exit state machine over the pool's offsets.
pub struct TransitionSequencer {
    config: TransitionConfig,
    amplitude: f32,
    time_step: f32,
    phase: Phase,
    time: f32,
    enter_acceleration: f32,
    exit_acceleration: f32,
    animating: bool,
    pending: Option<Completion>,
}

impl TransitionSequencer {
    pub fn new(config: TransitionConfig, amplitude: f32, time_step: f32) -> Self {
        Self {
            phase: Phase::Enter,
            time: 0.0,
            enter_acceleration: config.enter_acceleration,
            exit_acceleration: config.exit_acceleration,
            animating: false,
            pending: None,
            config,
            amplitude,
            time_step,
        }
    }

    pub fn request_enter(&mut self) -> Completion {
        self.request(TransitionKind::Enter)
    }

    pub fn request_exit(&mut self) -> Completion {
        self.request(TransitionKind::Exit)
    }

    /// While a transition is animating every request gets its signal back,
    /// whatever kind was asked for.
    fn request(&mut self, kind: TransitionKind) -> Completion {
        if self.animating {
            if let Some(pending) = &self.pending {
                debug!("{:?} requested mid-transition; reusing in-flight signal", kind);
                return pending.clone();
            }
        }

        match kind {
            TransitionKind::Enter => {
                self.phase = Phase::Enter;
                self.enter_acceleration = self.config.enter_acceleration;
            }
            TransitionKind::Exit => {
                self.phase = Phase::Exit;
                self.exit_acceleration = self.config.exit_acceleration;
            }
        }
        self.animating = true;
        let completion = Completion::new(kind);
        self.pending = Some(completion.clone());
        info!("Transition {:?} started", kind);
        completion
    }

    /// Jumps straight to idle, cancelling any transition in flight.
    pub fn start_idle(&mut self) {
        self.cancel_pending();
        self.animating = false;
        self.phase = Phase::Idle;
    }

    /// Back to the construction state; pending signals settle as cancelled.
    pub fn reset(&mut self) {
        self.cancel_pending();
        self.phase = Phase::Enter;
        self.time = 0.0;
        self.enter_acceleration = self.config.enter_acceleration;
        self.exit_acceleration = self.config.exit_acceleration;
        self.animating = false;
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            if pending.settle(TransitionOutcome::Cancelled) {
                debug!("Transition {:?} cancelled", pending.kind());
            }
        }
    }

    fn finish(&mut self) -> Option<TransitionKind> {
        self.animating = false;
        let pending = self.pending.take()?;
        pending.settle(TransitionOutcome::Completed).then(|| {
            info!("Transition {:?} complete", pending.kind());
            pending.kind()
        })
    }

    /// Advances the current phase by one frame. Returns the transition that
    /// completed during this frame, if any.
    pub fn step(&mut self, offsets: &mut [f32]) -> Option<TransitionKind> {
        match self.phase {
            Phase::Idle => {
                self.step_idle(offsets);
                None
            }
            Phase::Enter => {
                if self.step_enter(offsets) {
                    self.phase = Phase::Idle;
                    return self.finish();
                }
                None
            }
            Phase::Exit => {
                if self.step_exit(offsets) && self.animating {
                    return self.finish();
                }
                None
            }
        }
    }

    fn step_idle(&mut self, offsets: &mut [f32]) {
        for (i, offset) in offsets.iter_mut().enumerate() {
            *offset = idle_offset(i, self.time, self.amplitude);
        }
        self.time += self.time_step;
    }

    /// Drops every offset toward its idle target; true once all have landed.
    fn step_enter(&mut self, offsets: &mut [f32]) -> bool {
        let mut landed = true;
        for (i, offset) in offsets.iter_mut().enumerate() {
            let target = idle_offset(i, self.time, self.amplitude);
            if *offset > target {
                let fall = ((i as f32).sin() + 3.5) * 0.2 * self.enter_acceleration;
                *offset = (*offset - fall).max(target);
                landed &= *offset <= target;
            } else {
                *offset = target;
            }
        }
        self.enter_acceleration =
            (self.enter_acceleration - self.config.enter_decay).max(self.config.enter_floor);
        self.time += self.time_step;
        landed
    }

    /// Lifts every offset with growing speed; true once all cleared the threshold.
    fn step_exit(&mut self, offsets: &mut [f32]) -> bool {
        let mut departed = true;
        for (i, offset) in offsets.iter_mut().enumerate() {
            *offset += ((i as f32).sin() + 1.5) * 0.1 * self.exit_acceleration;
            departed &= *offset > self.config.departure_threshold;
        }
        self.exit_acceleration += self.config.exit_growth;
        departed
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn enter_acceleration(&self) -> f32 {
        self.enter_acceleration
    }

    pub fn exit_acceleration(&self) -> f32 {
        self.exit_acceleration
    }

    pub fn entry_offset(&self) -> f32 {
        self.config.entry_offset
    }

    pub fn pending(&self) -> Option<&Completion> {
        self.pending.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequencer() -> TransitionSequencer {
        TransitionSequencer::new(TransitionConfig::default(), 50.0, 0.05)
    }

    #[test]
    fn idle_offset_is_deterministic() {
        assert_eq!(idle_offset(0, 0.0, 50.0), 0.0);
        assert!((idle_offset(3, 2.0, 50.0) - (1.5f32).sin() * 50.0).abs() < 1e-5);
    }

    #[test]
    fn repeated_enter_requests_share_one_signal() {
        let mut seq = sequencer();
        let first = seq.request_enter();
        let second = seq.request_enter();
        assert!(first.same_signal(&second));

        let mut offsets = vec![600.0; 10];
        seq.step(&mut offsets);
        assert!((seq.enter_acceleration() - (8.0 - 0.004)).abs() < 1e-6);
    }

    #[test]
    fn exit_requested_mid_enter_gets_enter_signal() {
        let mut seq = sequencer();
        let enter = seq.request_enter();
        let exit = seq.request_exit();
        assert!(enter.same_signal(&exit));
        assert_eq!(seq.phase(), Phase::Enter);
    }

    #[test]
    fn enter_lands_on_idle_and_resolves() {
        let mut seq = sequencer();
        let done = seq.request_enter();
        let mut offsets = vec![600.0; 40];

        let mut frames = 0;
        while seq.phase() == Phase::Enter {
            seq.step(&mut offsets);
            frames += 1;
            assert!(frames < 10_000, "enter never finished");
        }

        assert_eq!(done.outcome(), Some(TransitionOutcome::Completed));
        assert!(!seq.is_animating());
        // Everyone sits on the idle curve of the last enter frame.
        let t = seq.time() - 0.05;
        for (i, o) in offsets.iter().enumerate() {
            assert!((o - idle_offset(i, t, 50.0)).abs() < 1e-3);
        }
    }

    #[test]
    fn enter_acceleration_never_drops_below_floor() {
        let mut seq = TransitionSequencer::new(TransitionConfig::default(), 50.0, 0.05);
        seq.request_enter();
        let mut offsets = vec![1.0e9; 4];
        for _ in 0..5000 {
            seq.step(&mut offsets);
        }
        assert_eq!(seq.enter_acceleration(), 0.5);
    }

    #[test]
    fn exit_resolves_exactly_once() {
        let config = TransitionConfig {
            exit_acceleration: 2.0,
            exit_growth: 0.35,
            departure_threshold: 700.0,
            ..TransitionConfig::default()
        };
        let mut seq = TransitionSequencer::new(config, 50.0, 0.05);
        seq.start_idle();
        let done = seq.request_exit();
        let mut offsets = vec![0.0; 100];

        let mut completions = 0;
        for _ in 0..2000 {
            if seq.step(&mut offsets) == Some(TransitionKind::Exit) {
                completions += 1;
            }
        }

        assert_eq!(completions, 1);
        assert_eq!(done.outcome(), Some(TransitionOutcome::Completed));
        assert!(offsets.iter().all(|&o| o > 700.0));
        assert_eq!(pollster::block_on(done.wait()), TransitionOutcome::Completed);
    }

    #[test]
    fn idle_jump_cancels_pending() {
        let mut seq = sequencer();
        let done = seq.request_exit();
        seq.start_idle();
        assert_eq!(done.outcome(), Some(TransitionOutcome::Cancelled));
        assert_eq!(seq.phase(), Phase::Idle);

        // A fresh request after the jump starts a new signal.
        let next = seq.request_exit();
        assert!(!next.same_signal(&done));
    }

    #[test]
    fn reset_restores_defaults() {
        let mut seq = sequencer();
        let done = seq.request_exit();
        let mut offsets = vec![0.0; 8];
        for _ in 0..10 {
            seq.step(&mut offsets);
        }
        seq.reset();

        assert_eq!(done.outcome(), Some(TransitionOutcome::Cancelled));
        assert_eq!(seq.phase(), Phase::Enter);
        assert_eq!(seq.time(), 0.0);
        assert_eq!(seq.exit_acceleration(), 2.0);
        assert!(seq.pending().is_none());
        assert!(!seq.is_animating());
    }

    #[test]
    fn idle_follows_the_sine_curve() {
        let mut seq = sequencer();
        seq.start_idle();
        let mut offsets = vec![0.0; 5];
        seq.step(&mut offsets);
        seq.step(&mut offsets);
        for (i, o) in offsets.iter().enumerate() {
            assert!((o - idle_offset(i, 0.05, 50.0)).abs() < 1e-5);
        }
    }
}
