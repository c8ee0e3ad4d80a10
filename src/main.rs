use anyhow::Result;
use clap::Parser;
use crossbeam_channel::Receiver;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    event::{ElementState, Event, MouseScrollDelta, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use beatfield::audio::{AudioCapture, AudioPlayback, FrequencySource, TempoEstimator};
use beatfield::engine::transition::{Completion, TransitionKind, TransitionOutcome};
use beatfield::graphics::GraphicsEngine;
use beatfield::theme::{cover_colors, fallback_colors};
use beatfield::{Engine, EngineConfig, ThemeMode, ThemePalette};

#[derive(Parser)]
#[command(name = "beatfield")]
#[command(about = "Audio-reactive 3D music visualizer")]
struct Args {
    /// Audio file to play (MP3, WAV, FLAC, OGG, etc.)
    #[arg()]
    file: Option<PathBuf>,

    /// Visualize the default input device instead of a file
    #[arg(long)]
    input_device: bool,

    /// Tempo in beats per minute; skips estimation
    #[arg(long)]
    bpm: Option<f64>,

    #[arg(long, value_enum, default_value_t = ThemeMode::Dark)]
    theme: ThemeMode,

    /// Album cover used by the colour theme
    #[arg(long)]
    cover: Option<PathBuf>,

    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 0.1)]
    volume: f32,
}

/// Where frequency frames come from.
enum Input {
    File(AudioPlayback),
    Capture(AudioCapture),
    Silent,
}

impl Input {
    fn frequency_frame(&mut self) -> Option<&[u8]> {
        match self {
            Input::File(playback) => playback.frequency_frame(),
            Input::Capture(capture) => capture.frequency_frame(),
            Input::Silent => None,
        }
    }

    fn set_paused(&mut self, paused: bool) {
        if let Input::File(playback) = self {
            if paused {
                playback.pause();
            } else {
                playback.play();
            }
        }
    }
}

/// Keeps an Exit request's signal so the host can re-enter once it lands.
/// While another transition is still animating the request hands back that
/// transition's signal instead, and there is nothing to track.
fn departure(signal: Completion) -> Option<Completion> {
    if signal.kind() == TransitionKind::Exit {
        Some(signal)
    } else {
        info!("Transition still animating; exit request ignored");
        None
    }
}

/// Estimates the tempo of the loaded track off the UI thread.
fn spawn_tempo_estimation(playback: &AudioPlayback) -> Receiver<f64> {
    let (sender, receiver) = crossbeam_channel::bounded(1);
    let samples = playback.samples();
    let sample_rate = playback.sample_rate();

    std::thread::spawn(move || match TempoEstimator::new(sample_rate).estimate(&samples) {
        Some(estimate) => {
            info!(
                "Estimated tempo: {:.1} bpm ({} onsets)",
                estimate.bpm, estimate.onsets
            );
            let _ = sender.send(estimate.bpm);
        }
        None => warn!("Could not estimate tempo; keeping the default pulse"),
    });

    receiver
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    info!("Starting Beatfield");

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let cover = args
        .cover
        .as_ref()
        .map(cover_colors)
        .unwrap_or_else(fallback_colors);
    let mut theme = args.theme;

    let mut tempo_updates: Option<Receiver<f64>> = None;
    let mut input = if args.input_device {
        Input::Capture(AudioCapture::new()?)
    } else if let Some(path) = &args.file {
        let mut playback = AudioPlayback::new()?;
        playback.load_file(path)?;
        playback.set_volume(args.volume);
        if args.bpm.is_none() {
            tempo_updates = Some(spawn_tempo_estimation(&playback));
        }
        playback.play();
        Input::File(playback)
    } else {
        info!("No audio input given; running the scene silently");
        Input::Silent
    };

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Beatfield")
            .with_inner_size(winit::dpi::LogicalSize::new(1200, 800))
            .build(&event_loop)?,
    );

    let renderer = pollster::block_on(GraphicsEngine::new(Arc::clone(&window)))?;
    let mut engine = Engine::new(config, ThemePalette::for_mode(theme, &cover));
    engine.initialize(renderer)?;

    if let Some(bpm) = args.bpm {
        engine.configure_tempo(bpm)?;
    }

    let clock = Instant::now();
    let now_ms = move || clock.elapsed().as_secs_f64() * 1000.0;
    if !matches!(input, Input::Silent) {
        engine.start_beats(now_ms());
    }

    info!("Visualizer initialized successfully");

    let mut paused = false;
    let mut scroll = 0.0f32;
    let mut leaving: Option<Completion> = None;

    let window_clone = Arc::clone(&window);
    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                elwt.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Escape) => {
                        info!("Escape pressed");
                        elwt.exit();
                    }
                    PhysicalKey::Code(KeyCode::Space) => {
                        if let Some(signal) = departure(engine.request_exit()) {
                            leaving = Some(signal);
                        }
                    }
                    PhysicalKey::Code(KeyCode::KeyP) => {
                        paused = !paused;
                        input.set_paused(paused);
                        if paused {
                            engine.stop_beats();
                        } else {
                            engine.start_beats(now_ms());
                        }
                    }
                    PhysicalKey::Code(KeyCode::KeyT) => {
                        theme = theme.next();
                        info!("Theme: {:?}", theme);
                        engine.set_palette(ThemePalette::for_mode(theme, &cover));
                    }
                    PhysicalKey::Code(KeyCode::KeyI) => {
                        leaving = None;
                        engine.start_idle_animation();
                    }
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                engine.set_pointer(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let dy = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y * 40.0,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32,
                };
                scroll = (scroll - dy).max(0.0);
                engine.set_scroll(scroll);
            }
            WindowEvent::Resized(physical_size) => {
                engine.resize(physical_size.width, physical_size.height);
            }
            WindowEvent::RedrawRequested => {
                if let Some(bpm) = tempo_updates.as_ref().and_then(|rx| rx.try_recv().ok()) {
                    if let Err(e) = engine.configure_tempo(bpm) {
                        warn!("Ignoring tempo estimate: {}", e);
                    }
                }

                // Space leaves and comes straight back, standing in for navigation.
                if let Some(outcome) = leaving.as_ref().and_then(|c| c.outcome()) {
                    leaving = None;
                    if outcome == TransitionOutcome::Completed {
                        engine.request_enter();
                    }
                }

                let frame = input.frequency_frame();
                if let Err(e) = engine.tick(now_ms(), frame) {
                    log::error!("Render error: {}", e);
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            window_clone.request_redraw();
        }
        Event::LoopExiting => {
            engine.teardown();
        }
        _ => {}
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatfield::config::TransitionConfig;
    use beatfield::engine::transition::TransitionSequencer;

    #[test]
    fn exit_during_entry_is_not_tracked() {
        let mut seq = TransitionSequencer::new(TransitionConfig::default(), 50.0, 0.05);
        let _entering = seq.request_enter();
        assert!(departure(seq.request_exit()).is_none());

        seq.start_idle();
        let leaving = departure(seq.request_exit()).unwrap();
        assert_eq!(leaving.kind(), TransitionKind::Exit);
    }
}
