//! Swapchain management.
//!
//! A [`Swapchain`] owns one [`FrameSlot`] per presentable image. Slots are
//! indexed by the image index the presentation engine hands out. A rebuild
//! is always a full [`Swapchain::destroy`] followed by [`Swapchain::new`]
//! while the device is idle; nothing is patched in place.

use crate::command::CommandPool;
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceSupport;
use crate::sync::{create_fence, create_semaphore};
use ash::vk;

/// Surface format used whenever the surface offers it.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Pick the preferred format if listed, else the first one.
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .copied()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format
                && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| available.first().copied())
}

/// Mailbox when available, otherwise FIFO (always supported).
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent, or the requested size clamped to the
/// supported range when the surface leaves it up to the swapchain.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: width.clamp(min.width, max.width.max(min.width)),
        height: height.clamp(min.height, max.height.max(min.height)),
    }
}

/// One image above the minimum, capped by the maximum. A maximum of zero
/// means the surface sets no cap.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count.saturating_add(1);
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

fn choose_composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::INHERIT,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    ]
    .into_iter()
    .find(|mode| supported.contains(*mode))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// Every parameter of a swapchain, chosen from what the surface supports.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
}

impl SwapchainConfig {
    /// Choose swapchain parameters for a desired drawable size.
    pub fn choose(support: &SurfaceSupport, width: u32, height: u32) -> Result<Self> {
        let format = choose_surface_format(&support.formats).ok_or_else(|| {
            GpuError::SwapchainCreation("surface reports no formats".to_string())
        })?;

        Ok(Self {
            format,
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(&support.capabilities, width, height),
            image_count: choose_image_count(&support.capabilities),
            transform: support.capabilities.current_transform,
            composite_alpha: choose_composite_alpha(
                support.capabilities.supported_composite_alpha,
            ),
        })
    }
}

/// Per-image resources. Handles are null until created, and destroying a
/// null handle is a no-op, so a partially built slot can be torn down.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSlot {
    /// Owned by the presentation engine, never destroyed here.
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
    pub command_buffer: vk::CommandBuffer,
    pub image_available: vk::Semaphore,
    pub render_complete: vk::Semaphore,
    pub in_flight: vk::Fence,
}

impl FrameSlot {
    /// Destroy view, framebuffer, command buffer, semaphores and fence, in
    /// that order.
    ///
    /// # Safety
    /// None of the slot's resources may be in use by the GPU.
    pub unsafe fn destroy(&mut self, device: &ash::Device, pool: &CommandPool) {
        unsafe {
            device.destroy_image_view(self.view, None);
            device.destroy_framebuffer(self.framebuffer, None);
            pool.free_command_buffer(device, self.command_buffer);
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_complete, None);
            device.destroy_fence(self.in_flight, None);
        }
        *self = Self {
            image: self.image,
            ..Self::default()
        };
    }

    unsafe fn create_resources(
        &mut self,
        device: &ash::Device,
        format: vk::Format,
        extent: vk::Extent2D,
        render_pass: vk::RenderPass,
        pool: &CommandPool,
    ) -> Result<()> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        self.view = unsafe { device.create_image_view(&view_info, None)? };

        let attachments = [self.view];
        let framebuffer_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        self.framebuffer = unsafe { device.create_framebuffer(&framebuffer_info, None)? };

        unsafe {
            self.command_buffer = pool.allocate_command_buffer(device)?;
            self.image_available = create_semaphore(device)?;
            self.render_complete = create_semaphore(device)?;
            self.in_flight = create_fence(device, true)?;
        }
        Ok(())
    }
}

/// Result of asking for the next presentable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired. `suboptimal` images must still be rendered
    /// and presented; the swapchain should be rebuilt afterwards.
    Image { index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface and must be rebuilt.
    Stale,
}

/// Result of queueing an image for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Out of date or suboptimal; the swapchain must be rebuilt.
    Stale,
}

/// Swapchain wrapper.
pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub slots: Vec<FrameSlot>,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Create the swapchain and a fully populated slot for each image.
    ///
    /// # Safety
    /// `render_pass` must be compatible with `config.format` and `pool` must
    /// belong to the graphics queue family.
    pub unsafe fn new(
        gpu: &GpuContext,
        config: &SwapchainConfig,
        render_pass: vk::RenderPass,
        pool: &CommandPool,
    ) -> Result<Self> {
        let (sharing_mode, family_indices) = gpu.queue_families().image_sharing();

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(gpu.surface().surface)
            .min_image_count(config.image_count)
            .image_format(config.format.format)
            .image_color_space(config.format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(config.transform)
            .composite_alpha(config.composite_alpha)
            .present_mode(config.present_mode)
            .clipped(true);

        let loader = gpu.swapchain_loader();
        let handle = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        let images = match unsafe { loader.get_swapchain_images(handle) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(handle, None) };
                return Err(GpuError::SwapchainCreation(e.to_string()));
            }
        };

        let mut swapchain = Self {
            handle,
            slots: images
                .into_iter()
                .map(|image| FrameSlot {
                    image,
                    ..FrameSlot::default()
                })
                .collect(),
            format: config.format,
            extent: config.extent,
            present_mode: config.present_mode,
        };

        let device = gpu.device();
        for index in 0..swapchain.slots.len() {
            let created = unsafe {
                swapchain.slots[index].create_resources(
                    device,
                    config.format.format,
                    config.extent,
                    render_pass,
                    pool,
                )
            };
            if let Err(e) = created {
                unsafe { swapchain.destroy(gpu, pool) };
                return Err(e);
            }
        }

        tracing::info!(
            "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            config.extent.width,
            config.extent.height,
            swapchain.slots.len(),
            config.format.format,
            config.present_mode,
        );

        Ok(swapchain)
    }

    /// Number of frame slots, equal to the number of presentable images.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Acquire the next image, signaling `semaphore` when it is ready.
    ///
    /// # Safety
    /// The semaphore must be unsignaled with no pending signal operation.
    #[cfg_attr(
        feature = "instrument",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub unsafe fn acquire_next_image(
        &self,
        gpu: &GpuContext,
        semaphore: vk::Semaphore,
    ) -> Result<AcquireOutcome> {
        let result = unsafe {
            gpu.swapchain_loader().acquire_next_image(
                self.handle,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, suboptimal)) => Ok(AcquireOutcome::Image { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::Stale),
            Err(e) => Err(GpuError::Vulkan(e)),
        }
    }

    /// Queue an image for presentation once `wait_semaphore` is signaled.
    ///
    /// # Safety
    /// The image must have been acquired and rendered.
    #[cfg_attr(
        feature = "instrument",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub unsafe fn present(
        &self,
        gpu: &GpuContext,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<PresentOutcome> {
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            gpu.swapchain_loader()
                .queue_present(gpu.present_queue(), &present_info)
        };

        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
            Err(e) => Err(GpuError::Vulkan(e)),
        }
    }

    /// Destroy every slot's resources, then the swapchain itself.
    ///
    /// # Safety
    /// The device must be idle with respect to this swapchain.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext, pool: &CommandPool) {
        let device = gpu.device();
        for slot in &mut self.slots {
            unsafe { slot.destroy(device, pool) };
        }
        self.slots.clear();

        unsafe { gpu.swapchain_loader().destroy_swapchain(self.handle, None) };
        self.handle = vk::SwapchainKHR::null();
        tracing::debug!("Swapchain destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn pair(format: Option<vk::SurfaceFormatKHR>) -> Option<(vk::Format, vk::ColorSpaceKHR)> {
        format.map(|f| (f.format, f.color_space))
    }

    const PREFERRED: (vk::Format, vk::ColorSpaceKHR) = (
        PREFERRED_SURFACE_FORMAT.format,
        PREFERRED_SURFACE_FORMAT.color_space,
    );

    fn caps(min: (u32, u32), max: (u32, u32), current: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn preferred_format_wins_wherever_listed() {
        let formats = [
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            PREFERRED_SURFACE_FORMAT,
        ];
        assert_eq!(pair(choose_surface_format(&formats)), Some(PREFERRED));
    }

    #[test]
    fn first_format_is_fallback() {
        let first = format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        let formats = [
            first,
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(
            pair(choose_surface_format(&formats)),
            Some((vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR))
        );
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn mailbox_preferred_else_fifo() {
        use vk::PresentModeKHR as Mode;
        assert_eq!(
            choose_present_mode(&[Mode::FIFO, Mode::IMMEDIATE, Mode::MAILBOX]),
            Mode::MAILBOX
        );
        assert_eq!(choose_present_mode(&[Mode::IMMEDIATE, Mode::FIFO]), Mode::FIFO);
        assert_eq!(choose_present_mode(&[Mode::IMMEDIATE]), Mode::FIFO);
        assert_eq!(choose_present_mode(&[]), Mode::FIFO);
    }

    #[test]
    fn current_extent_is_used_when_defined() {
        let caps = caps((1, 1), (4096, 4096), (800, 600));
        let extent = choose_extent(&caps, 1280, 720);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn requested_extent_is_clamped_when_unconstrained() {
        let caps = caps((100, 200), (1000, 500), (u32::MAX, u32::MAX));
        for (w, h) in [(0, 0), (50, 900), (1280, 720), (640, 300), (u32::MAX - 1, 1)] {
            let extent = choose_extent(&caps, w, h);
            assert!((100..=1000).contains(&extent.width), "{w}x{h} -> {extent:?}");
            assert!((200..=500).contains(&extent.height), "{w}x{h} -> {extent:?}");
        }
        let extent = choose_extent(&caps, 640, 300);
        assert_eq!((extent.width, extent.height), (640, 300));
    }

    #[test]
    fn image_count_is_min_plus_one_capped() {
        let mut caps = caps((1, 1), (1, 1), (1, 1));
        caps.min_image_count = 2;
        caps.max_image_count = 8;
        assert_eq!(choose_image_count(&caps), 3);

        caps.max_image_count = 2;
        assert_eq!(choose_image_count(&caps), 2);

        caps.max_image_count = 0;
        caps.min_image_count = 5;
        assert_eq!(choose_image_count(&caps), 6);
    }

    #[test]
    fn composite_alpha_prefers_opaque() {
        use vk::CompositeAlphaFlagsKHR as Alpha;
        assert_eq!(choose_composite_alpha(Alpha::OPAQUE | Alpha::INHERIT), Alpha::OPAQUE);
        assert_eq!(choose_composite_alpha(Alpha::INHERIT), Alpha::INHERIT);
        assert_eq!(choose_composite_alpha(Alpha::empty()), Alpha::OPAQUE);
    }

    #[test]
    fn config_combines_all_choices() {
        let mut capabilities = caps((1, 1), (2000, 2000), (u32::MAX, u32::MAX));
        capabilities.current_transform = vk::SurfaceTransformFlagsKHR::IDENTITY;
        capabilities.supported_composite_alpha = vk::CompositeAlphaFlagsKHR::OPAQUE;
        let support = SurfaceSupport {
            capabilities,
            formats: vec![PREFERRED_SURFACE_FORMAT],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };

        let config = SwapchainConfig::choose(&support, 1280, 720).unwrap();
        assert_eq!(pair(Some(config.format)), Some(PREFERRED));
        assert_eq!(config.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!((config.extent.width, config.extent.height), (1280, 720));
        assert_eq!(config.image_count, 3);
        assert_eq!(config.transform, vk::SurfaceTransformFlagsKHR::IDENTITY);
    }

    #[test]
    fn config_requires_a_format() {
        let support = SurfaceSupport::default();
        assert!(matches!(
            SwapchainConfig::choose(&support, 1, 1),
            Err(GpuError::SwapchainCreation(_))
        ));
    }

    #[test]
    fn default_slot_has_only_null_handles() {
        let slot = FrameSlot::default();
        assert_eq!(slot.image, vk::Image::null());
        assert_eq!(slot.view, vk::ImageView::null());
        assert_eq!(slot.framebuffer, vk::Framebuffer::null());
        assert_eq!(slot.command_buffer, vk::CommandBuffer::null());
        assert_eq!(slot.image_available, vk::Semaphore::null());
        assert_eq!(slot.render_complete, vk::Semaphore::null());
        assert_eq!(slot.in_flight, vk::Fence::null());
    }
}
