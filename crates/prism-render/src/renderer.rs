//! Vulkan frame backend.

use crate::frame::FrameBackend;
use crate::mesh::TriangleMesh;
use ash::vk;
use prism_core::DrawItem;
use prism_gpu::command::{begin_command_buffer, end_command_buffer, submit_command_buffers};
use prism_gpu::swapchain::SwapchainConfig;
use prism_gpu::sync::{reset_fence, wait_for_fence};
use prism_gpu::{
    AcquireOutcome, CommandPool, FrameSlot, GpuContext, GpuError, GraphicsPipelineConfig,
    PipelineState, PresentOutcome, Result, Swapchain,
};
use std::sync::Arc;

/// Renderer settings.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Shader binaries for the graphics pipeline.
    pub pipeline: GraphicsPipelineConfig,
    /// Color the frame is cleared to.
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            pipeline: GraphicsPipelineConfig::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Owns the swapchain, pipeline and mesh, and executes frame steps on the GPU.
pub struct Renderer {
    gpu: Arc<GpuContext>,
    config: RendererConfig,
    pool: CommandPool,
    pipeline: PipelineState,
    swapchain: Swapchain,
    mesh: TriangleMesh,
}

impl Renderer {
    /// Create the renderer for a drawable of the given size.
    pub fn new(gpu: Arc<GpuContext>, config: RendererConfig, width: u32, height: u32) -> Result<Self> {
        let device = gpu.device();

        let support = gpu.surface().query_support(gpu.physical_device())?;
        let swapchain_config = SwapchainConfig::choose(&support, width, height)?;

        let pool = unsafe { CommandPool::new(device, gpu.queue_families().graphics)? };

        let pipeline = match unsafe {
            PipelineState::new(device, &config.pipeline, swapchain_config.format.format)
        } {
            Ok(pipeline) => pipeline,
            Err(e) => {
                unsafe { pool.destroy(device) };
                return Err(e);
            }
        };

        let swapchain = match unsafe {
            Swapchain::new(&gpu, &swapchain_config, pipeline.render_pass, &pool)
        } {
            Ok(swapchain) => swapchain,
            Err(e) => {
                unsafe {
                    pipeline.destroy(device);
                    pool.destroy(device);
                }
                return Err(e);
            }
        };

        let mesh = match TriangleMesh::triangle(&gpu) {
            Ok(mesh) => mesh,
            Err(e) => {
                let mut swapchain = swapchain;
                unsafe {
                    swapchain.destroy(&gpu, &pool);
                    pipeline.destroy(device);
                    pool.destroy(device);
                }
                return Err(e);
            }
        };

        Ok(Self {
            gpu,
            config,
            pool,
            pipeline,
            swapchain,
            mesh,
        })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    fn slot(&self, index: usize) -> Result<FrameSlot> {
        self.swapchain
            .slots
            .get(index)
            .copied()
            .ok_or_else(|| GpuError::InvalidState(format!("no frame slot {index}")))
    }

    fn image_slot(&self, image: u32) -> Result<FrameSlot> {
        self.slot(image as usize)
    }

    fn full_viewport(&self) -> (vk::Viewport, vk::Rect2D) {
        let extent = self.swapchain.extent;
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        (viewport, scissor)
    }
}

impl FrameBackend for Renderer {
    fn slot_count(&self) -> usize {
        self.swapchain.slot_count()
    }

    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        let fence = self.slot(slot)?.in_flight;
        unsafe { wait_for_fence(self.gpu.device(), fence, u64::MAX) }
    }

    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let semaphore = self.slot(slot)?.image_available;
        unsafe { self.swapchain.acquire_next_image(&self.gpu, semaphore) }
    }

    fn reset_slot_fence(&mut self, slot: usize) -> Result<()> {
        let fence = self.slot(slot)?.in_flight;
        unsafe { reset_fence(self.gpu.device(), fence) }
    }

    fn record(&mut self, image: u32, draws: &[DrawItem]) -> Result<()> {
        let slot = self.image_slot(image)?;
        let cmd = slot.command_buffer;
        let device = self.gpu.device();
        let (viewport, scissor) = self.full_viewport();

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.config.clear_color,
            },
        }];
        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.pipeline.render_pass)
            .framebuffer(slot.framebuffer)
            .render_area(scissor)
            .clear_values(&clear_values);

        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            begin_command_buffer(device, cmd)?;

            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[scissor]);
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.mesh.buffer.buffer], &[0]);

            for draw in draws {
                device.cmd_push_constants(
                    cmd,
                    self.pipeline.layout,
                    vk::ShaderStageFlags::VERTEX,
                    0,
                    draw.push_constant_bytes(),
                );
                device.cmd_draw(cmd, self.mesh.vertex_count, 1, 0, 0);
            }

            device.cmd_end_render_pass(cmd);
            end_command_buffer(device, cmd)?;
        }

        Ok(())
    }

    fn submit(&mut self, slot: usize, image: u32) -> Result<()> {
        let cursor_slot = self.slot(slot)?;
        let image_slot = self.image_slot(image)?;

        unsafe {
            submit_command_buffers(
                self.gpu.device(),
                self.gpu.graphics_queue(),
                &[image_slot.command_buffer],
                &[cursor_slot.image_available],
                &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
                &[image_slot.render_complete],
                cursor_slot.in_flight,
            )
        }
    }

    fn present(&mut self, image: u32) -> Result<PresentOutcome> {
        let wait = self.image_slot(image)?.render_complete;
        unsafe { self.swapchain.present(&self.gpu, image, wait) }
    }

    fn rebuild(&mut self, width: u32, height: u32) -> Result<()> {
        self.gpu.wait_idle()?;

        unsafe { self.swapchain.destroy(&self.gpu, &self.pool) };

        let support = self
            .gpu
            .surface()
            .query_support(self.gpu.physical_device())?;
        let swapchain_config = SwapchainConfig::choose(&support, width, height)?;

        // The render pass is tied to the attachment format
        let format = swapchain_config.format.format;
        if format != self.pipeline.format {
            tracing::info!(
                "Surface format changed from {:?} to {format:?}, rebuilding pipeline",
                self.pipeline.format
            );
            let device = self.gpu.device();
            let pipeline = unsafe { PipelineState::new(device, &self.config.pipeline, format)? };
            let old = std::mem::replace(&mut self.pipeline, pipeline);
            unsafe { old.destroy(device) };
        }

        self.swapchain = unsafe {
            Swapchain::new(
                &self.gpu,
                &swapchain_config,
                self.pipeline.render_pass,
                &self.pool,
            )?
        };

        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.gpu.wait_idle()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.gpu.wait_idle() {
            tracing::error!("Failed to wait for device idle during renderer teardown: {e}");
        }

        unsafe {
            self.swapchain.destroy(&self.gpu, &self.pool);
            self.pipeline.destroy(self.gpu.device());
        }
        if let Err(e) = self.mesh.destroy(&self.gpu) {
            tracing::error!("Failed to free vertex buffer: {e}");
        }
        unsafe { self.pool.destroy(self.gpu.device()) };
    }
}
