//! Beatfield: an audio-reactive 3D music visualizer.
//!
//! The [`engine`] module holds the frame-driven scene logic and is free of
//! windowing and audio I/O. [`audio`] and [`graphics`] are the collaborators
//! the `beatfield` binary plugs into it.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod graphics;
pub mod theme;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, RenderError};
pub use theme::{ThemeMode, ThemePalette};
