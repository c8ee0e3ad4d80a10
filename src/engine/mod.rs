//! Audio-reactive scene engine: orbit fields, fracture pool, beat colouring and
//! Enter / Idle / Exit sequencing, driven one frame at a time.

pub mod beat;
pub mod camera;
pub mod color;
pub mod delaunay;
pub mod field;
pub mod pool;
pub mod render_loop;
pub mod shell;
pub mod timer;
pub mod transition;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{BandConfig, EngineConfig};
use crate::error::{EngineError, RenderError};
use crate::theme::ThemePalette;
use beat::BeatAnimator;
use camera::CameraRig;
use field::GeometryField;
use pool::SceneObjectPool;
use render_loop::{FrameSurface, RenderLoop, SceneFrame};
use shell::ShellPair;
use transition::{Completion, TransitionSequencer};

/// Scalar drive values for the two orbit fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandEnergies {
    pub high: f32,
    pub low: f32,
}

impl BandEnergies {
    /// Samples the configured bins of a byte frequency frame. `None` when the
    /// frame is too short to contain them.
    pub fn from_frame(frame: &[u8], bands: &BandConfig) -> Option<Self> {
        let sample = |bin: usize| {
            frame
                .get(bin)
                .map(|&v| (v as f32 - bands.offset) * bands.gain)
        };
        Some(Self {
            high: sample(bands.high_bin)?,
            low: sample(bands.low_bin)?,
        })
    }
}

/// Geometry that lives between `initialize` and `teardown`.
struct Scene {
    high: GeometryField,
    low: GeometryField,
    pool: SceneObjectPool,
    shells: ShellPair,
    camera: CameraRig,
}

/// Owns the whole visualization: scene, animators, camera and the drawing
/// surface. Nothing here blocks; the host calls [`Engine::tick`] once per frame.
pub struct Engine<S: FrameSurface> {
    config: EngineConfig,
    palette: ThemePalette,
    scene: Option<Scene>,
    surface: Option<S>,
    beat: BeatAnimator,
    transition: TransitionSequencer,
    render_loop: RenderLoop,
    energies: BandEnergies,
}

impl<S: FrameSurface> Engine<S> {
    pub fn new(config: EngineConfig, palette: ThemePalette) -> Self {
        let beat = match config.fracture.seed {
            Some(seed) => BeatAnimator::with_seed(config.beat.clone(), seed.wrapping_add(1)),
            None => BeatAnimator::new(config.beat.clone()),
        };
        let transition = TransitionSequencer::new(
            config.transition.clone(),
            config.fracture.idle_amplitude,
            config.fracture.time_step,
        );
        Self {
            config,
            palette,
            scene: None,
            surface: None,
            beat,
            transition,
            render_loop: RenderLoop::new(),
            energies: BandEnergies::default(),
        }
    }

    /// Builds the scene against `surface` and starts the Enter transition.
    /// An already-initialized engine is torn down first.
    pub fn initialize(&mut self, mut surface: S) -> Result<Completion, EngineError> {
        if self.scene.is_some() {
            self.teardown();
        }

        self.config.validate()?;
        let (width, height) = surface.size();
        if width == 0 || height == 0 {
            return Err(EngineError::MissingSurface);
        }

        let orbit = &self.config.orbit;
        let high = GeometryField::orbit(orbit.radius, orbit)?;
        let low = GeometryField::orbit(orbit.low_band_radius(), orbit)?;

        let mut rng = match self.config.fracture.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut pool = SceneObjectPool::fracture(
            &self.config.fracture,
            self.palette.triangle_base(),
            self.palette.wireframe,
            &mut rng,
        )?;
        let entry = self.config.transition.entry_offset;
        pool.offsets_mut().iter_mut().for_each(|o| *o = entry);

        let shells = ShellPair::new(
            orbit,
            &self.config.shells,
            self.palette.accent,
            self.palette.secondary,
        );
        let camera = CameraRig::new(self.config.camera.clone(), width, height);

        surface.resize(width, height);
        self.surface = Some(surface);
        self.scene = Some(Scene {
            high,
            low,
            pool,
            shells,
            camera,
        });
        self.energies = BandEnergies::default();

        info!(
            "Engine initialized: {}x{} surface, {} orbit points per field, {} fracture objects",
            width,
            height,
            self.config.orbit.lines * self.config.orbit.dots,
            self.scene.as_ref().map_or(0, |s| s.pool.len())
        );

        self.transition.reset();
        let entered = self.transition.request_enter();
        self.render_loop.begin();
        Ok(entered)
    }

    /// Stops frames, cancels pulses and pending transitions, and frees the
    /// scene. Safe to call any number of times.
    pub fn teardown(&mut self) {
        self.render_loop.halt();
        if let Some(scene) = self.scene.as_mut() {
            self.beat.stop(&mut scene.pool);
        }
        if let Some(mut surface) = self.surface.take() {
            surface.release();
        }
        if self.scene.take().is_some() {
            info!("Engine torn down");
        }
        self.transition.reset();
        self.energies = BandEnergies::default();
    }

    pub fn configure_tempo(&mut self, bpm: f64) -> Result<(), EngineError> {
        self.beat.configure(bpm)
    }

    /// Starts beat pulses; the first lands one interval after `now_ms`.
    pub fn start_beats(&mut self, now_ms: f64) {
        if self.scene.is_some() {
            self.beat.start(now_ms);
        }
    }

    /// Stops pulses and snaps every lit object back to the base colour.
    pub fn stop_beats(&mut self) {
        if let Some(scene) = self.scene.as_mut() {
            self.beat.stop(&mut scene.pool);
        }
    }

    /// Re-derives every live material from `palette`.
    pub fn set_palette(&mut self, palette: ThemePalette) {
        if let Some(scene) = self.scene.as_mut() {
            let base = palette.triangle_base();
            scene.pool.set_base_color(base);
            scene.pool.set_wireframe_color(palette.wireframe);
            scene.shells.set_colors(palette.accent, palette.secondary);
            self.beat.set_base_color(base);
        }
        self.palette = palette;
        debug!("Palette applied");
    }

    pub fn start_idle_animation(&mut self) {
        self.transition.start_idle();
    }

    pub fn request_enter(&mut self) -> Completion {
        self.transition.request_enter()
    }

    pub fn request_exit(&mut self) -> Completion {
        self.transition.request_exit()
    }

    /// Window-space cursor position.
    pub fn set_pointer(&mut self, x: f32, y: f32) {
        if let Some(scene) = self.scene.as_mut() {
            scene.camera.set_pointer(x, y);
        }
    }

    pub fn set_scroll(&mut self, scroll: f32) {
        if let Some(scene) = self.scene.as_mut() {
            scene.camera.set_scroll(scroll);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(scene) = self.scene.as_mut() {
            scene.camera.resize(width, height);
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.resize(width, height);
        }
    }

    /// Runs one frame: camera, orbit fields, shells, beat colours, transition,
    /// then a single draw. `frame` is this tick's byte frequency snapshot;
    /// without one the previous band energies are held.
    pub fn tick(&mut self, now_ms: f64, frame: Option<&[u8]>) -> Result<(), RenderError> {
        if !self.render_loop.is_running() {
            return Ok(());
        }
        let (Some(scene), Some(surface)) = (self.scene.as_mut(), self.surface.as_mut()) else {
            return Ok(());
        };

        match frame.map(|f| BandEnergies::from_frame(f, &self.config.bands)) {
            Some(Some(energies)) => self.energies = energies,
            Some(None) => debug!("Frequency frame too short; holding band energies"),
            None => {}
        }

        scene.camera.ease();
        let smoothing = self.config.orbit.smoothing;
        scene.high.wave(self.energies.high, smoothing);
        scene.low.wave(self.energies.low, smoothing);
        scene.shells.spin();
        self.beat.tick(now_ms, &mut scene.pool);
        self.transition.step(scene.pool.offsets_mut());

        let frame = SceneFrame {
            view: scene.camera.view_matrix(),
            projection: scene.camera.projection_matrix(),
            camera: scene.camera.position(),
            background: self.palette.background,
            high_field: &scene.high,
            high_color: self.palette.high_particles(),
            low_field: &scene.low,
            low_color: self.palette.low_particles(),
            pool: &scene.pool,
            shells: &scene.shells,
        };
        self.render_loop.present(surface, &frame)?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.scene.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.render_loop.is_running()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn palette(&self) -> &ThemePalette {
        &self.palette
    }

    pub fn energies(&self) -> BandEnergies {
        self.energies
    }

    pub fn beat(&self) -> &BeatAnimator {
        &self.beat
    }

    pub fn transition(&self) -> &TransitionSequencer {
        &self.transition
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render_loop
    }

    pub fn pool(&self) -> Option<&SceneObjectPool> {
        self.scene.as_ref().map(|s| &s.pool)
    }

    pub fn fields(&self) -> Option<(&GeometryField, &GeometryField)> {
        self.scene.as_ref().map(|s| (&s.high, &s.low))
    }

    pub fn camera(&self) -> Option<&CameraRig> {
        self.scene.as_ref().map(|s| &s.camera)
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }
}

impl<S: FrameSurface> Drop for Engine<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::color::Hsl;
    use crate::engine::transition::{Phase, TransitionOutcome};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Stats {
        draws: usize,
        releases: usize,
        resizes: Vec<(u32, u32)>,
        failures: Vec<RenderError>,
    }

    struct StubSurface {
        size: (u32, u32),
        stats: Rc<RefCell<Stats>>,
    }

    impl StubSurface {
        fn new(width: u32, height: u32) -> (Self, Rc<RefCell<Stats>>) {
            let stats = Rc::new(RefCell::new(Stats::default()));
            (
                Self {
                    size: (width, height),
                    stats: stats.clone(),
                },
                stats,
            )
        }
    }

    impl FrameSurface for StubSurface {
        fn size(&self) -> (u32, u32) {
            self.size
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.stats.borrow_mut().resizes.push((width, height));
        }

        fn draw(&mut self, frame: &SceneFrame<'_>) -> Result<(), RenderError> {
            let mut stats = self.stats.borrow_mut();
            if let Some(err) = stats.failures.pop() {
                return Err(err);
            }
            assert!(!frame.pool.is_empty());
            stats.draws += 1;
            Ok(())
        }

        fn release(&mut self) {
            self.stats.borrow_mut().releases += 1;
        }
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.fracture.seed = Some(11);
        config
    }

    fn frame_with(high: u8, low: u8) -> Vec<u8> {
        let mut frame = vec![0u8; 256];
        frame[1] = high;
        frame[140] = low;
        frame
    }

    #[test]
    fn band_energies_sample_fixed_bins() {
        let bands = BandConfig::default();
        let e = BandEnergies::from_frame(&frame_with(200, 144), &bands).unwrap();
        assert_eq!(e.high, 336.0);
        assert_eq!(e.low, 0.0);

        let silent = BandEnergies::from_frame(&[0u8; 256], &bands).unwrap();
        assert_eq!(silent.high, -864.0);
        assert!(BandEnergies::from_frame(&[0u8; 100], &bands).is_none());
    }

    #[test]
    fn zero_sized_surface_is_rejected() {
        let mut engine = Engine::new(config(), ThemePalette::dark());
        let (surface, _) = StubSurface::new(0, 600);
        assert!(matches!(
            engine.initialize(surface),
            Err(EngineError::MissingSurface)
        ));
        assert!(!engine.is_initialized());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut bad = config();
        bad.orbit.lines = 0;
        let mut engine = Engine::new(bad, ThemePalette::dark());
        let (surface, _) = StubSurface::new(800, 600);
        assert!(matches!(
            engine.initialize(surface),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn initialize_enters_and_settles_into_idle() {
        let mut engine = Engine::new(config(), ThemePalette::dark());
        let (surface, stats) = StubSurface::new(800, 600);
        let entered = engine.initialize(surface).unwrap();

        assert!(engine.pool().unwrap().offsets().iter().all(|&o| o == 600.0));
        assert_eq!(engine.transition().phase(), Phase::Enter);

        let mut now = 0.0;
        while engine.transition().phase() == Phase::Enter {
            now += 16.0;
            engine.tick(now, None).unwrap();
            assert!(now < 1_000_000.0);
        }

        assert_eq!(entered.outcome(), Some(TransitionOutcome::Completed));
        assert_eq!(stats.borrow().draws as u64, engine.render_loop().frames());
        assert_eq!(stats.borrow().resizes, vec![(800, 600)]);
    }

    #[test]
    fn frame_drives_the_fields_and_is_held_when_missing() {
        let mut engine = Engine::new(config(), ThemePalette::dark());
        let (surface, _) = StubSurface::new(800, 600);
        engine.initialize(surface).unwrap();

        let before = engine.fields().unwrap().0.point(0)[1];
        engine.tick(16.0, Some(frame_with(200, 150).as_slice())).unwrap();
        let after = engine.fields().unwrap().0.point(0)[1];
        assert!((after - (before + (336.0 - before) * 0.7)).abs() < 1e-3);

        engine.tick(32.0, None).unwrap();
        assert_eq!(engine.energies(), BandEnergies { high: 336.0, low: 36.0 });

        engine.tick(48.0, Some(&[1u8, 2, 3][..])).unwrap();
        assert_eq!(engine.energies().high, 336.0);
    }

    #[test]
    fn transient_surface_errors_skip_the_frame() {
        let mut engine = Engine::new(config(), ThemePalette::dark());
        let (surface, stats) = StubSurface::new(800, 600);
        engine.initialize(surface).unwrap();

        stats
            .borrow_mut()
            .failures
            .push(RenderError::SurfaceUnavailable("outdated".into()));
        engine.tick(16.0, None).unwrap();
        engine.tick(32.0, None).unwrap();

        assert_eq!(engine.render_loop().skipped(), 1);
        assert_eq!(stats.borrow().draws, 1);

        stats
            .borrow_mut()
            .failures
            .push(RenderError::Fatal("device lost".into()));
        assert!(engine.tick(48.0, None).is_err());
    }

    #[test]
    fn tempo_drives_pulses_through_the_engine() {
        let mut engine = Engine::new(config(), ThemePalette::dark());
        let (surface, _) = StubSurface::new(800, 600);
        engine.initialize(surface).unwrap();

        engine.configure_tempo(120.0).unwrap();
        assert!(engine.configure_tempo(0.0).is_err());
        assert_eq!(engine.beat().beat_interval_ms(), 500.0);

        engine.start_beats(0.0);
        engine.tick(499.0, None).unwrap();
        assert_eq!(engine.beat().active_count(), 0);
        engine.tick(500.0, None).unwrap();
        assert_eq!(engine.beat().active_count(), 6);

        engine.stop_beats();
        assert_eq!(engine.beat().active_count(), 0);
        let pool = engine.pool().unwrap();
        assert!((0..pool.len()).all(|i| pool.color(i) == Hsl::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn palette_change_retargets_everything() {
        let mut engine = Engine::new(config(), ThemePalette::dark());
        let (surface, _) = StubSurface::new(800, 600);
        engine.initialize(surface).unwrap();
        engine.start_beats(0.0);
        engine.tick(500.0, None).unwrap();

        let light = ThemePalette::light();
        engine.set_palette(light.clone());
        assert!(engine.beat().active().all(|a| a.base_color == light.triangle_base()));

        // Long after every animation ends, all objects sit on the new base.
        engine.stop_beats();
        let pool = engine.pool().unwrap();
        assert!((0..pool.len()).all(|i| pool.color(i) == light.triangle_base()));
        assert!(pool.objects().iter().all(|o| o.wireframe.color == light.wireframe));
    }

    #[test]
    fn teardown_is_idempotent_and_cancels_pending() {
        let mut engine = Engine::new(config(), ThemePalette::dark());
        let (surface, stats) = StubSurface::new(800, 600);
        let entered = engine.initialize(surface).unwrap();
        engine.start_beats(0.0);

        engine.teardown();
        engine.teardown();

        assert_eq!(entered.outcome(), Some(TransitionOutcome::Cancelled));
        assert_eq!(
            pollster::block_on(entered.wait()),
            TransitionOutcome::Cancelled
        );
        assert_eq!(stats.borrow().releases, 1);
        assert!(!engine.is_running());
        assert!(!engine.beat().is_running());
        assert!(engine.tick(16.0, None).is_ok());
        assert_eq!(stats.borrow().draws, 0);
    }

    #[test]
    fn reinitialize_starts_clean() {
        let mut engine = Engine::new(config(), ThemePalette::dark());
        let (first, first_stats) = StubSurface::new(800, 600);
        engine.initialize(first).unwrap();
        engine.start_idle_animation();
        for i in 0..10 {
            engine.tick(i as f64 * 16.0, None).unwrap();
        }

        let (second, _) = StubSurface::new(1024, 768);
        let entered = engine.initialize(second).unwrap();

        assert_eq!(first_stats.borrow().releases, 1);
        assert_eq!(engine.transition().phase(), Phase::Enter);
        assert_eq!(engine.transition().time(), 0.0);
        assert!(!entered.is_settled());
        assert!(engine.pool().unwrap().offsets().iter().all(|&o| o == 600.0));
    }

    #[test]
    fn exit_then_enter_round_trip() {
        let mut engine = Engine::new(config(), ThemePalette::dark());
        let (surface, _) = StubSurface::new(800, 600);
        engine.initialize(surface).unwrap();
        engine.start_idle_animation();

        let exit = engine.request_exit();
        let mut now = 0.0;
        while !exit.is_settled() {
            now += 16.0;
            engine.tick(now, None).unwrap();
        }
        assert_eq!(exit.outcome(), Some(TransitionOutcome::Completed));
        assert!(engine.pool().unwrap().offsets().iter().all(|&o| o > 700.0));

        let enter = engine.request_enter();
        while !enter.is_settled() {
            now += 16.0;
            engine.tick(now, None).unwrap();
        }
        assert_eq!(engine.transition().phase(), Phase::Idle);
    }
}
