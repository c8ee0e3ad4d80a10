//! Error types for the visualization engine
use thiserror::Error;

/// Setup-time failures. Anything in here is fatal: the engine refuses to
/// start rather than run with a corrupt scene.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Geometry buffer does not match the declared ring layout
    #[error("buffer size mismatch for {what}: expected {expected}, got {actual}")]
    BufferSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Fracture triangulation produced no triangles
    #[error("scene object pool is empty")]
    EmptyPool,

    /// No drawing surface was handed to `initialize`
    #[error("no rendering surface available")]
    MissingSurface,

    /// Out-of-range configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unparseable colour string
    #[error("invalid colour: {0}")]
    InvalidColor(String),

    /// Config file I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-frame drawing failures.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Surface lost or outdated; the frame is skipped and the surface reconfigured
    #[error("surface unavailable this frame: {0}")]
    SurfaceUnavailable(String),

    /// Out of GPU memory or another unrecoverable device failure
    #[error("fatal render failure: {0}")]
    Fatal(String),
}

impl RenderError {
    /// Transient failures are recovered by skipping the frame.
    pub fn is_transient(&self) -> bool {
        matches!(self, RenderError::SurfaceUnavailable(_))
    }
}
