use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::EngineError;

/// Full engine configuration. Every section and field is optional in JSON;
/// missing values fall back to the defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub orbit: OrbitConfig,
    pub fracture: FractureConfig,
    pub bands: BandConfig,
    pub beat: BeatConfig,
    pub transition: TransitionConfig,
    pub camera: CameraConfig,
    pub shells: ShellConfig,
}

/// Ring layout for the two particle orbits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub radius: f32,
    /// Azimuthal divisions
    pub lines: usize,
    /// Radial layers per division
    pub dots: usize,
    pub spread: f32,
    pub tilt: f32,
    /// Gap between the high-band ring and the low-band ring
    pub inner_gap: f32,
    /// Per-frame easing toward the driving note (0.0 to 1.0)
    pub smoothing: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            radius: 800.0,
            lines: 300,
            dots: 4,
            spread: 25.0,
            tilt: 1.0,
            inner_gap: 80.0,
            smoothing: 0.7,
        }
    }
}

impl OrbitConfig {
    pub fn low_band_radius(&self) -> f32 {
        self.radius - self.dots as f32 * self.spread - self.inner_gap
    }
}

/// Delaunay fracture floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FractureConfig {
    pub points: usize,
    pub width: f32,
    pub height: f32,
    pub depth: f32,
    /// Tilt in degrees; 90 lays the fracture flat under the orbits
    pub angle: f32,
    pub idle_amplitude: f32,
    /// Idle clock increment per frame
    pub time_step: f32,
    /// Seed for the point cloud; random when absent
    pub seed: Option<u64>,
}

impl Default for FractureConfig {
    fn default() -> Self {
        Self {
            points: 100,
            width: 6000.0,
            height: 6000.0,
            depth: -1700.0,
            angle: 90.0,
            idle_amplitude: 50.0,
            time_step: 0.05,
            seed: None,
        }
    }
}

/// Fixed-bin band energy extraction: `(frame[bin] - offset) * gain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    pub high_bin: usize,
    pub low_bin: usize,
    pub offset: f32,
    pub gain: f32,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            high_bin: 1,
            low_bin: 140,
            offset: 144.0,
            gain: 6.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    /// Upper bound on objects lit per pulse
    pub max_per_pulse: usize,
    /// Pulse interval before any tempo is configured (ms)
    pub default_interval_ms: f64,
    /// Floor for a single animation's length (ms)
    pub min_duration_ms: f64,
    /// Animation length as a multiple of the beat interval
    pub duration_beats: f64,
    /// Fraction of the animation spent lighting up
    pub light_up: f32,
    /// Hues of the beat colours
    pub hues: Vec<f32>,
    pub saturation: f32,
    pub lightness: f32,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            max_per_pulse: 6,
            default_interval_ms: 500.0,
            min_duration_ms: 1000.0,
            duration_beats: 1.5,
            light_up: 0.2,
            hues: vec![0.83, 0.55, 0.12],
            saturation: 1.0,
            lightness: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub enter_acceleration: f32,
    pub enter_decay: f32,
    pub enter_floor: f32,
    /// Offset every object starts the Enter transition from
    pub entry_offset: f32,
    pub exit_acceleration: f32,
    pub exit_growth: f32,
    pub departure_threshold: f32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            enter_acceleration: 8.0,
            enter_decay: 0.004,
            enter_floor: 0.5,
            entry_offset: 600.0,
            exit_acceleration: 2.0,
            exit_growth: 0.35,
            departure_threshold: 700.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub start: [f32; 3],
    /// Per-frame easing toward the pointer target
    pub easing: f32,
    /// Vertical shift applied to the pointer before it becomes a target
    pub pointer_bias_y: f32,
    pub scroll_factor: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 1.0,
            far: 15000.0,
            start: [0.0, 200.0, 1000.0],
            easing: 0.01,
            pointer_bias_y: 300.0,
            scroll_factor: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub outer_radius_factor: f32,
    pub outer_detail: u32,
    pub outer_spin: f32,
    pub inner_radius_factor: f32,
    pub inner_detail: u32,
    pub inner_spin: f32,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            outer_radius_factor: 6.0,
            outer_detail: 1,
            outer_spin: 0.0005,
            inner_radius_factor: 1.0 / 3.0,
            inner_detail: 2,
            inner_spin: -0.002,
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let text = fs::read_to_string(&path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        info!("Loaded engine config from {:?}", path.as_ref());
        Ok(config)
    }

    /// Rejects values that would leave the scene empty or the clocks stuck.
    pub fn validate(&self) -> Result<(), EngineError> {
        let fail = |msg: &str| Err(EngineError::InvalidConfig(msg.to_string()));

        if self.orbit.lines == 0 || self.orbit.dots == 0 {
            return fail("orbit lines and dots must be positive");
        }
        if !(0.0..=1.0).contains(&self.orbit.smoothing) {
            return fail("orbit smoothing must be within 0.0..=1.0");
        }
        if self.fracture.points < 3 {
            return fail("fracture needs at least 3 points");
        }
        if self.fracture.width < 1.0 || self.fracture.height < 1.0 {
            return fail("fracture extent must be at least 1 unit");
        }
        if self.beat.hues.is_empty() {
            return fail("at least one beat hue is required");
        }
        if !(self.beat.light_up > 0.0 && self.beat.light_up < 1.0) {
            return fail("beat light_up must be strictly between 0 and 1");
        }
        if self.beat.default_interval_ms <= 0.0 {
            return fail("default beat interval must be positive");
        }
        if self.transition.exit_growth < 0.0 || self.transition.enter_decay < 0.0 {
            return fail("transition steps must be non-negative");
        }
        if self.transition.enter_floor <= 0.0 {
            return fail("enter acceleration floor must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "orbit": { "lines": 64 }, "beat": { "max_per_pulse": 3 } }"#)
                .unwrap();
        assert_eq!(config.orbit.lines, 64);
        assert_eq!(config.orbit.dots, 4);
        assert_eq!(config.beat.max_per_pulse, 3);
        assert_eq!(config.bands.low_bin, 140);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_ring() {
        let mut config = EngineConfig::default();
        config.orbit.dots = 0;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn low_band_ring_sits_inside() {
        let orbit = OrbitConfig::default();
        assert_eq!(orbit.low_band_radius(), 800.0 - 4.0 * 25.0 - 80.0);
    }
}
