use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use super::color::Hsl;
use super::pool::SceneObjectPool;
use super::timer::RepeatingTimer;
use crate::config::BeatConfig;
use crate::error::EngineError;

/// One object's in-flight colour pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatAnimation {
    pub target: usize,
    /// Colour the pulse starts from and settles back to
    pub base_color: Hsl,
    pub beat_color: Hsl,
    pub start_ms: f64,
    pub duration_ms: f64,
}

impl BeatAnimation {
    pub fn progress(&self, now: f64) -> f32 {
        ((now - self.start_ms) / self.duration_ms).clamp(0.0, 1.0) as f32
    }
}

/// Light-up / fade-out envelope: a linear ramp to full strength over the first
/// `light_up` of the animation, then a slower linear decay back to zero.
pub fn envelope(progress: f32, light_up: f32) -> f32 {
    if progress < light_up {
        progress / light_up
    } else {
        1.0 - (progress - light_up) / (1.0 - light_up)
    }
}

/// Blend with exact endpoints so the envelope's corners land on the
/// configured colours bit-for-bit.
pub fn blend_color(base: Hsl, beat: Hsl, blend: f32) -> Hsl {
    if blend <= 0.0 {
        base
    } else if blend >= 1.0 {
        beat
    } else {
        base.lerp(beat, blend)
    }
}

/// Schedules tempo-locked colour pulses across the fracture pool.
///
/// Holds indices into the pool only; it never adds or removes pool members.
pub struct BeatAnimator {
    config: BeatConfig,
    beat_interval_ms: f64,
    beat_colors: Vec<Hsl>,
    timer: RepeatingTimer,
    running: bool,
    active: BTreeMap<usize, BeatAnimation>,
    rng: StdRng,
}

impl BeatAnimator {
    pub fn new(config: BeatConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    pub fn with_seed(config: BeatConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: BeatConfig, rng: StdRng) -> Self {
        let beat_interval_ms = config.default_interval_ms;
        let beat_colors = Self::derive_colors(&config);
        Self {
            timer: RepeatingTimer::new(beat_interval_ms),
            config,
            beat_interval_ms,
            beat_colors,
            running: false,
            active: BTreeMap::new(),
            rng,
        }
    }

    fn derive_colors(config: &BeatConfig) -> Vec<Hsl> {
        config
            .hues
            .iter()
            .map(|&h| Hsl::new(h, config.saturation, config.lightness))
            .collect()
    }

    /// Sets the pulse interval from a tempo estimate. The pending pulse keeps
    /// its time; every pulse after it uses the new interval.
    pub fn configure(&mut self, tempo_bpm: f64) -> Result<(), EngineError> {
        if !tempo_bpm.is_finite() || tempo_bpm <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "tempo must be a positive number of beats per minute, got {}",
                tempo_bpm
            )));
        }

        self.beat_interval_ms = 60_000.0 / tempo_bpm;
        self.beat_colors = Self::derive_colors(&self.config);
        self.timer.set_interval(self.beat_interval_ms);
        info!(
            "Beat animator configured: {:.1} bpm -> {:.1} ms interval",
            tempo_bpm, self.beat_interval_ms
        );
        Ok(())
    }

    pub fn start(&mut self, now: f64) {
        if self.running {
            return;
        }
        self.running = true;
        self.timer.start(now);
        debug!("Beat pulses started at {:.1} ms", now);
    }

    /// Stops pulsing and clears every in-flight animation, restoring base colours.
    pub fn stop(&mut self, pool: &mut SceneObjectPool) {
        self.running = false;
        self.timer.cancel();
        self.clear(pool);
    }

    /// Drops all animation records and puts their objects back on the base colour.
    pub fn clear(&mut self, pool: &mut SceneObjectPool) {
        for (index, animation) in std::mem::take(&mut self.active) {
            pool.set_color(index, animation.base_color);
        }
    }

    /// Fires a due pulse, then advances every active animation. A late pulse
    /// starts its envelope at `now`, not at the time it was scheduled for.
    pub fn tick(&mut self, now: f64, pool: &mut SceneObjectPool) {
        if let Some(due) = self.timer.poll(now) {
            if now > due {
                debug!("Pulse due at {:.1} ms fired {:.1} ms late", due, now - due);
            }
            self.pulse(now, pool);
        }
        self.update(now, pool);
    }

    /// Lights up to `max_per_pulse` idle objects. Returns how many were picked.
    pub fn pulse(&mut self, now: f64, pool: &SceneObjectPool) -> usize {
        if !self.running {
            return 0;
        }

        let available: Vec<usize> = (0..pool.len())
            .filter(|i| !self.active.contains_key(i))
            .collect();
        let count = self.config.max_per_pulse.min(available.len());
        if count == 0 {
            debug!("Pulse skipped: every object is mid-animation");
            return 0;
        }

        let duration_ms = self
            .config
            .min_duration_ms
            .max(self.beat_interval_ms * self.config.duration_beats);
        let base_color = pool.base_color();

        for pick in index::sample(&mut self.rng, available.len(), count).into_iter() {
            let target = available[pick];
            let beat_color = self.beat_colors[self.rng.random_range(0..self.beat_colors.len())];
            self.active.insert(
                target,
                BeatAnimation {
                    target,
                    base_color,
                    beat_color,
                    start_ms: now,
                    duration_ms,
                },
            );
        }

        debug!("Pulse at {:.1} ms lit {} objects", now, count);
        count
    }

    /// Writes the current envelope colour into the pool and retires finished
    /// animations at their exact base colour.
    pub fn update(&mut self, now: f64, pool: &mut SceneObjectPool) {
        let light_up = self.config.light_up;
        self.active.retain(|&index, animation| {
            let progress = animation.progress(now);
            if progress >= 1.0 {
                pool.set_color(index, animation.base_color);
                return false;
            }
            let blend = envelope(progress, light_up);
            pool.set_color(index, blend_color(animation.base_color, animation.beat_color, blend));
            true
        });
    }

    /// Retargets in-flight animations after a theme change.
    pub fn set_base_color(&mut self, color: Hsl) {
        for animation in self.active.values_mut() {
            animation.base_color = color;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_animating(&self, index: usize) -> bool {
        self.active.contains_key(&index)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active(&self) -> impl Iterator<Item = &BeatAnimation> {
        self.active.values()
    }

    pub fn beat_interval_ms(&self) -> f64 {
        self.beat_interval_ms
    }

    pub fn beat_colors(&self) -> &[Hsl] {
        &self.beat_colors
    }

    pub fn next_pulse_ms(&self) -> Option<f64> {
        self.timer.next_due()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> SceneObjectPool {
        SceneObjectPool::uniform(n, Hsl::BLACK).unwrap()
    }

    fn running(seed: u64) -> BeatAnimator {
        let mut animator = BeatAnimator::with_seed(BeatConfig::default(), seed);
        animator.start(0.0);
        animator
    }

    #[test]
    fn envelope_corners() {
        assert_eq!(envelope(0.0, 0.2), 0.0);
        assert_eq!(envelope(0.2, 0.2), 1.0);
        assert!((envelope(1.0, 0.2)).abs() < 1e-6);
        assert!((envelope(0.1, 0.2) - 0.5).abs() < 1e-6);
        assert!((envelope(0.6, 0.2) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn blended_colour_hits_base_beat_base() {
        let base = Hsl::new(0.0, 0.0, 0.2);
        let beat = Hsl::new(0.83, 1.0, 0.5);
        assert_eq!(blend_color(base, beat, envelope(0.0, 0.2)), base);
        assert_eq!(blend_color(base, beat, envelope(0.2, 0.2)), beat);
        assert_eq!(blend_color(base, beat, envelope(1.0, 0.2).max(0.0)), base);
    }

    #[test]
    fn configure_sets_interval_and_colours() {
        let mut animator = BeatAnimator::with_seed(BeatConfig::default(), 1);
        animator.configure(120.0).unwrap();
        assert_eq!(animator.beat_interval_ms(), 500.0);
        assert_eq!(animator.beat_colors().len(), 3);
        assert!(animator.beat_colors().iter().all(|c| c.s == 1.0 && c.l == 0.5));

        assert!(animator.configure(0.0).is_err());
        assert!(animator.configure(f64::NAN).is_err());
        assert_eq!(animator.beat_interval_ms(), 500.0);
    }

    #[test]
    fn pulse_count_is_capped_by_pool_size() {
        let pool = pool(3);
        let mut animator = running(3);
        assert_eq!(animator.pulse(0.0, &pool), 3);
        assert_eq!(animator.active_count(), 3);
        // Nothing left to light.
        assert_eq!(animator.pulse(10.0, &pool), 0);
    }

    #[test]
    fn pulses_only_pick_idle_objects() {
        let pool = pool(20);
        let mut animator = running(11);

        for step in 0..4 {
            let busy: Vec<usize> = animator.active().map(|a| a.target).collect();
            let before: Vec<BeatAnimation> = animator.active().copied().collect();
            let picked = animator.pulse(step as f64 * 10.0, &pool);
            assert_eq!(picked, 6.min(20 - busy.len()));

            // Old records untouched, new records only on previously idle objects.
            for old in &before {
                assert_eq!(animator.active().find(|a| a.target == old.target), Some(old));
            }
            let fresh: Vec<usize> = animator
                .active()
                .filter(|a| a.start_ms == step as f64 * 10.0)
                .map(|a| a.target)
                .collect();
            assert!(fresh.iter().all(|t| !busy.contains(t)));
        }
        assert_eq!(animator.active_count(), 20);
    }

    #[test]
    fn pulse_after_stop_is_a_no_op() {
        let mut pool = pool(10);
        let mut animator = running(5);
        animator.stop(&mut pool);
        assert_eq!(animator.pulse(100.0, &pool), 0);
        animator.tick(10_000.0, &mut pool);
        assert_eq!(animator.active_count(), 0);
    }

    #[test]
    fn stop_clears_and_restores_base() {
        let mut pool = pool(10);
        let mut animator = running(9);
        animator.pulse(0.0, &pool);
        animator.update(100.0, &mut pool);
        assert!((0..10).any(|i| pool.color(i) != Hsl::BLACK));

        animator.stop(&mut pool);
        assert_eq!(animator.active_count(), 0);
        assert!((0..10).all(|i| pool.color(i) == Hsl::BLACK));
    }

    #[test]
    fn start_is_idempotent() {
        let mut animator = running(2);
        let due = animator.next_pulse_ms();
        animator.start(250.0);
        assert_eq!(animator.next_pulse_ms(), due);
    }

    #[test]
    fn theme_change_retargets_fade() {
        let mut pool = pool(6);
        let mut animator = running(4);
        animator.pulse(0.0, &pool);

        let white = Hsl::new(0.0, 0.0, 1.0);
        pool.set_base_color(white);
        animator.set_base_color(white);
        animator.update(5_000.0, &mut pool);
        assert!((0..6).all(|i| pool.color(i) == white));
    }

    #[test]
    fn tempo_120_end_to_end() {
        let mut pool = pool(10);
        let mut animator = BeatAnimator::with_seed(BeatConfig::default(), 120);
        animator.configure(120.0).unwrap();
        assert_eq!(animator.beat_interval_ms(), 500.0);
        animator.start(0.0);

        animator.tick(499.0, &mut pool);
        assert_eq!(animator.active_count(), 0);

        animator.tick(500.0, &mut pool);
        assert_eq!(animator.active_count(), 6);
        let lit: Vec<BeatAnimation> = animator.active().copied().collect();
        assert!(lit.iter().all(|a| a.duration_ms == 1000.0 && a.start_ms == 500.0));

        // Peak of the envelope: the object wears its beat colour.
        animator.update(700.0, &mut pool);
        for a in &lit {
            assert_eq!(pool.color(a.target), a.beat_color);
        }

        animator.update(1500.0, &mut pool);
        for a in &lit {
            assert!(!animator.is_animating(a.target));
            assert_eq!(pool.color(a.target), Hsl::BLACK);
        }
    }

    #[test]
    fn late_pulse_starts_its_envelope_when_it_fires() {
        let mut pool = pool(10);
        let mut animator = BeatAnimator::with_seed(BeatConfig::default(), 7);
        animator.configure(120.0).unwrap();
        animator.start(0.0);

        // First pulse was due at 500 ms; the frame arrives well after the
        // whole envelope would have run out.
        animator.tick(1600.0, &mut pool);
        assert_eq!(animator.active_count(), 6);
        let lit: Vec<BeatAnimation> = animator.active().copied().collect();
        assert!(lit.iter().all(|a| a.start_ms == 1600.0));
        assert!(lit.iter().all(|a| pool.color(a.target) == Hsl::BLACK));

        animator.update(1800.0, &mut pool);
        for a in &lit {
            assert_eq!(pool.color(a.target), a.beat_color);
        }
    }
}
