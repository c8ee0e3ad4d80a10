use glam::{Mat4, Vec3};
use log::{debug, info, warn};

use super::color::Rgb;
use super::field::GeometryField;
use super::pool::SceneObjectPool;
use super::shell::ShellPair;
use crate::error::RenderError;

/// Everything a surface needs to draw one frame.
pub struct SceneFrame<'a> {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera: Vec3,
    pub background: Rgb,
    pub high_field: &'a GeometryField,
    pub high_color: Rgb,
    pub low_field: &'a GeometryField,
    pub low_color: Rgb,
    pub pool: &'a SceneObjectPool,
    pub shells: &'a ShellPair,
}

/// Drawing target for the engine. The wgpu renderer implements it for the
/// window; tests use an in-memory stand-in.
pub trait FrameSurface {
    /// Drawable size in pixels; zero in either dimension means no canvas.
    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Issues the frame's single draw submission.
    fn draw(&mut self, frame: &SceneFrame<'_>) -> Result<(), RenderError>;

    /// Frees GPU-side buffers. Must be safe to call more than once.
    fn release(&mut self);
}

/// Frame bookkeeping: whether frames are still being scheduled and how many
/// were drawn or skipped.
#[derive(Debug, Default)]
pub struct RenderLoop {
    running: bool,
    frames: u64,
    skipped: u64,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        if !self.running {
            info!("Render loop started");
        }
        self.running = true;
    }

    pub fn halt(&mut self) {
        if self.running {
            info!(
                "Render loop stopped after {} frames ({} skipped)",
                self.frames, self.skipped
            );
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Hands the frame to the surface. Transient failures skip the frame;
    /// fatal ones are passed up.
    pub fn present(
        &mut self,
        surface: &mut dyn FrameSurface,
        frame: &SceneFrame<'_>,
    ) -> Result<bool, RenderError> {
        match surface.draw(frame) {
            Ok(()) => {
                self.frames += 1;
                Ok(true)
            }
            Err(e) if e.is_transient() => {
                self.skipped += 1;
                debug!("Frame skipped: {}", e);
                Ok(false)
            }
            Err(e) => {
                warn!("Render failure: {}", e);
                Err(e)
            }
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
