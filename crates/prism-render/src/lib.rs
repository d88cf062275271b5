//! Frame orchestration for the Prism engine.
//!
//! [`FrameOrchestrator`] drives one frame at a time through wait, acquire,
//! record, submit and present against any [`FrameBackend`]. [`Renderer`] is
//! the Vulkan backend; tests drive the orchestrator with a scripted one.

pub mod cursor;
pub mod frame;
pub mod mesh;
pub mod renderer;
pub mod scene;

pub use cursor::FrameCursor;
pub use frame::{FrameBackend, FrameOrchestrator, FrameOutcome, FrameStage, FrameStats};
pub use mesh::{TriangleMesh, TRIANGLE_VERTICES};
pub use renderer::{Renderer, RendererConfig};
pub use scene::Scene;
