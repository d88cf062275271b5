//! Vulkan layer for the Prism engine.
//!
//! This crate provides:
//! - Instance creation with an optional validation messenger
//! - Adapter selection and queue-family discovery
//! - The device context shared by every other GPU object
//! - Swapchain management with per-image frame slots
//! - The fixed render pass and graphics pipeline
//! - Buffer memory via gpu-allocator

pub mod capabilities;
pub mod command;
pub mod context;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod queue;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use command::CommandPool;
pub use context::{GpuContext, GpuContextBuilder};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer};
pub use pipeline::{GraphicsPipelineConfig, PipelineState};
pub use queue::QueueFamilyIndices;
pub use surface::{SurfaceContext, SurfaceSupport};
pub use swapchain::{AcquireOutcome, FrameSlot, PresentOutcome, Swapchain};
