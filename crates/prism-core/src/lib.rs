//! Core types, diagnostics, and collaborator traits for the Prism engine.
//!
//! This crate provides the foundational pieces shared by every other crate:
//! - Vertex and draw-item types fed to the renderer
//! - The presentation surface collaborator trait
//! - The diagnostic sink built on `tracing`
//! - Frame timing and error types

pub mod error;
pub mod logging;
pub mod timer;
pub mod types;
pub mod window;

pub use error::{Error, Result};
pub use logging::{DiagnosticSink, LogConfig};
pub use timer::FrameTimer;
pub use types::{DrawItem, Vertex};
pub use window::{wait_for_nonzero_size, SurfaceProvider};

/// Engine-wide constants
pub mod constants {
    /// Default window width in pixels
    pub const DEFAULT_WIDTH: u32 = 1280;
    /// Default window height in pixels
    pub const DEFAULT_HEIGHT: u32 = 720;
    /// Engine name reported to the Vulkan instance
    pub const ENGINE_NAME: &str = "Prism";
}
