//! GPU context management.

use crate::capabilities::{device_type_label, GpuCapabilities};
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, DebugMessenger};
use crate::memory::GpuAllocator;
use crate::queue::QueueFamilyIndices;
use crate::surface::{SurfaceContext, SurfaceSupport};
use ash::vk;
use parking_lot::Mutex;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CStr};
use std::sync::Arc;

/// Device extensions every adapter must expose.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Main GPU context holding the Vulkan instance, surface and device.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) debug_messenger: Option<DebugMessenger>,
    pub(crate) surface: SurfaceContext,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,
    pub(crate) capabilities: GpuCapabilities,
    pub(crate) allocator: Mutex<GpuAllocator>,

    pub(crate) queue_families: QueueFamilyIndices,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
}

impl GpuContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the window surface.
    pub fn surface(&self) -> &SurfaceContext {
        &self.surface
    }

    /// Get the swapchain extension loader.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Get GPU capabilities.
    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Get the graphics and present queue families.
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Whether validation messages are being forwarded.
    pub fn validation_enabled(&self) -> bool {
        self.debug_messenger.is_some()
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Wait for device to be idle.
    #[cfg_attr(
        feature = "instrument",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Allocator memory must go before the device
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.surface.destroy();
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        tracing::debug!("GPU context destroyed");
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: prism_core::constants::ENGINE_NAME.to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the GPU context for a window.
    ///
    /// The window must outlive the returned context.
    pub fn build<W>(self, window: &W) -> Result<GpuContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?
            .as_raw();

        let (instance, validation) =
            unsafe { create_instance(&entry, &self.app_name, display, self.enable_validation) }?;

        let debug_messenger = if validation {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    tracing::warn!("Failed to register debug messenger: {e}");
                    None
                }
            }
        } else {
            None
        };

        let destroy_instance = |messenger: Option<DebugMessenger>| unsafe {
            if let Some(messenger) = messenger {
                messenger.destroy();
            }
            instance.destroy_instance(None);
        };

        let surface = match unsafe { SurfaceContext::new(&entry, &instance, window) } {
            Ok(surface) => surface,
            Err(e) => {
                destroy_instance(debug_messenger);
                return Err(e);
            }
        };

        let selected = unsafe { select_physical_device(&instance, &surface) };
        let (physical_device, capabilities, queue_families) = match selected {
            Ok(selected) => selected,
            Err(e) => {
                unsafe { surface.destroy() };
                destroy_instance(debug_messenger);
                return Err(e);
            }
        };

        tracing::info!(
            "Using adapter {} ({})",
            capabilities.device_name,
            device_type_label(capabilities.device_type)
        );
        tracing::debug!("Adapter details: {}", capabilities.summary());

        let device = match unsafe { create_device(&instance, physical_device, queue_families) } {
            Ok(device) => Arc::new(device),
            Err(e) => {
                unsafe { surface.destroy() };
                destroy_instance(debug_messenger);
                return Err(e);
            }
        };

        let allocator = match unsafe { GpuAllocator::new(&instance, device.clone(), physical_device) }
        {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe {
                    device.destroy_device(None);
                    surface.destroy();
                }
                destroy_instance(debug_messenger);
                return Err(e);
            }
        };

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };
        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        Ok(GpuContext {
            entry,
            instance,
            debug_messenger,
            surface,
            physical_device,
            device,
            swapchain_loader,
            capabilities,
            allocator: Mutex::new(allocator),
            queue_families,
            graphics_queue,
            present_queue,
        })
    }
}

/// Pick the first adapter that exposes the required extensions, has graphics
/// and present queues, and can build a swapchain for the surface.
///
/// # Safety
/// The instance and surface must be valid.
unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface: &SurfaceContext,
) -> Result<(vk::PhysicalDevice, GpuCapabilities, QueueFamilyIndices)> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    if devices.is_empty() {
        return Err(GpuError::NoSuitableDevice);
    }
    tracing::debug!("Found {} physical device(s)", devices.len());

    let required = required_device_extensions();

    for device in devices {
        let capabilities = unsafe { GpuCapabilities::query(instance, device) };

        let missing = capabilities.missing_extensions(&required);
        if !missing.is_empty() {
            tracing::debug!(
                "Skipping {}: missing extensions {missing:?}",
                capabilities.device_name
            );
            continue;
        }

        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let Some(queue_families) =
            QueueFamilyIndices::find(&families, |index| surface.supports_present(device, index))
        else {
            tracing::debug!(
                "Skipping {}: no graphics/present queue families",
                capabilities.device_name
            );
            continue;
        };

        if usable_surface_support(&capabilities.device_name, surface.query_support(device))
            .is_none()
        {
            continue;
        }

        return Ok((device, capabilities, queue_families));
    }

    Err(GpuError::NoSuitableDevice)
}

/// Surface support for an adapter, or `None` if the adapter should be skipped.
fn usable_surface_support(
    device_name: &str,
    support: Result<SurfaceSupport>,
) -> Option<SurfaceSupport> {
    let support = match support {
        Ok(support) => support,
        Err(e) => {
            tracing::debug!("Skipping {device_name}: surface query failed: {e}");
            return None;
        }
    };

    support.log_details();
    if !support.is_adequate() {
        tracing::debug!("Skipping {device_name}: surface has no formats or present modes");
        return None;
    }
    Some(support)
}

/// Create the logical device with one queue per distinct family.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilyIndices,
) -> Result<ash::Device> {
    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    #[allow(unused_mut)]
    let mut extension_names: Vec<*const c_char> = required_device_extensions()
        .iter()
        .map(|ext| ext.as_ptr())
        .collect();

    #[cfg(target_os = "macos")]
    extension_names.push(ash::khr::portability_subset::NAME.as_ptr());

    let features = vk::PhysicalDeviceFeatures::default();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(physical_device, &device_create_info, None) }
        .map_err(GpuError::from)?;
    tracing::debug!("Logical device created");

    Ok(device)
}
