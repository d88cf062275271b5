//! Vulkan instance creation and the validation message bridge.

use crate::error::{GpuError, Result};
use ash::vk;
use prism_core::constants::ENGINE_NAME;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, c_void, CStr, CString};

/// Validation layers enabled when the debug flag is set.
pub fn validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// Instance extensions needed to present to `display`, plus debug utils
/// when validation is requested.
///
/// # Safety
/// The display handle must be valid.
pub unsafe fn required_instance_extensions(
    display: RawDisplayHandle,
    enable_validation: bool,
) -> Result<Vec<*const c_char>> {
    let mut extensions = ash_window::enumerate_required_extensions(display)?.to_vec();

    if enable_validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    #[cfg(target_os = "macos")]
    extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());

    Ok(extensions)
}

/// Create a Vulkan instance able to present to `display`.
///
/// Returns the instance and whether validation ended up enabled: a missing
/// validation layer is not fatal, it only disables validation.
///
/// # Safety
/// The entry must be a valid Vulkan entry point and the display handle valid.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    display: RawDisplayHandle,
    enable_validation: bool,
) -> Result<(ash::Instance, bool)> {
    let app_name = CString::new(app_name)
        .map_err(|_| GpuError::InvalidState("application name contains a NUL byte".into()))?;
    let engine_name = CString::new(ENGINE_NAME)
        .map_err(|_| GpuError::InvalidState("engine name contains a NUL byte".into()))?;

    if let Ok(Some(version)) = unsafe { entry.try_enumerate_instance_version() } {
        tracing::debug!(
            "System supports up to Vulkan {}.{}.{}",
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        );
    }

    // Render passes and push constants are all core 1.0
    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(&engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_0);

    let layers = validation_layers();
    let enable_validation = enable_validation && unsafe { check_layer_support(entry, &layers)? };

    let extension_names = unsafe { required_instance_extensions(display, enable_validation)? };
    unsafe { check_extension_support(entry, &extension_names)? };

    let layer_names: Vec<*const c_char> = if enable_validation {
        layers.iter().map(|l| l.as_ptr()).collect()
    } else {
        Vec::new()
    };

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    // Chained so instance creation itself is covered by the messenger
    let mut messenger_info = messenger_create_info();

    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    if enable_validation {
        create_info = create_info.push_next(&mut messenger_info);
    }

    let instance = unsafe { entry.create_instance(&create_info, None)? };
    tracing::info!("Vulkan instance created (validation: {enable_validation})");

    Ok((instance, enable_validation))
}

/// Check that every requested instance extension is available.
unsafe fn check_extension_support(entry: &ash::Entry, requested: &[*const c_char]) -> Result<()> {
    let available = unsafe { entry.enumerate_instance_extension_properties(None)? };
    let available: Vec<&CStr> = available
        .iter()
        .map(|props| unsafe { CStr::from_ptr(props.extension_name.as_ptr()) })
        .collect();

    tracing::debug!("Available instance extensions:");
    for name in &available {
        tracing::debug!("\t{}", name.to_string_lossy());
    }

    for &ptr in requested {
        let name = unsafe { CStr::from_ptr(ptr) };
        if !available.contains(&name) {
            tracing::error!("Requested extension {:?} not supported", name);
            return Err(GpuError::ExtensionNotSupported(
                name.to_string_lossy().into_owned(),
            ));
        }
        tracing::debug!("Requested extension {:?} is supported", name);
    }

    Ok(())
}

/// Returns `true` if every requested layer is available.
unsafe fn check_layer_support(entry: &ash::Entry, requested: &[&CStr]) -> Result<bool> {
    let available = unsafe { entry.enumerate_instance_layer_properties()? };

    tracing::debug!("Available instance layers:");
    for props in &available {
        let name = unsafe { CStr::from_ptr(props.layer_name.as_ptr()) };
        tracing::debug!("\t{}", name.to_string_lossy());
    }

    for layer in requested {
        let found = available
            .iter()
            .any(|props| unsafe { CStr::from_ptr(props.layer_name.as_ptr()) } == *layer);
        if !found {
            tracing::warn!(
                "Validation layer {} not available, continuing without validation",
                layer.to_string_lossy()
            );
            return Ok(false);
        }
    }

    Ok(true)
}

/// Create info shared by the instance chain and the standalone messenger.
pub fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

/// Log level a validation message is reported at.
pub fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> tracing::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::Level::WARN
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        tracing::Level::INFO
    } else {
        tracing::Level::TRACE
    }
}

/// Short label for a validation message type.
pub fn message_type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "VALIDATION"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "PERFORMANCE"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL) {
        "GENERAL"
    } else {
        "UNKNOWN"
    }
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: Vulkan hands us either null or valid callback data for the
    // duration of the call
    let message = unsafe {
        p_callback_data
            .as_ref()
            .filter(|data| !data.p_message.is_null())
            .map(|data| CStr::from_ptr(data.p_message).to_string_lossy())
    };
    let Some(message) = message else {
        return vk::FALSE;
    };
    let kind = message_type_label(message_type);

    match severity_level(message_severity) {
        tracing::Level::ERROR => tracing::error!(target: "prism::validation", "[{kind}] {message}"),
        tracing::Level::WARN => tracing::warn!(target: "prism::validation", "[{kind}] {message}"),
        tracing::Level::INFO => tracing::info!(target: "prism::validation", "[{kind}] {message}"),
        _ => tracing::trace!(target: "prism::validation", "[{kind}] {message}"),
    }

    vk::FALSE
}

/// A registered debug-utils messenger.
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// Register the messenger on `instance`.
    ///
    /// # Safety
    /// The instance must have been created with the debug-utils extension.
    pub unsafe fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let messenger =
            unsafe { loader.create_debug_utils_messenger(&messenger_create_info(), None)? };
        tracing::debug!("Debug messenger registered");
        Ok(Self { loader, messenger })
    }

    /// Unregister the messenger.
    ///
    /// # Safety
    /// Must be called before the owning instance is destroyed.
    pub unsafe fn destroy(&self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_map_to_matching_levels() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Sev;
        assert_eq!(severity_level(Sev::VERBOSE), tracing::Level::TRACE);
        assert_eq!(severity_level(Sev::INFO), tracing::Level::INFO);
        assert_eq!(severity_level(Sev::WARNING), tracing::Level::WARN);
        assert_eq!(severity_level(Sev::ERROR), tracing::Level::ERROR);
    }

    #[test]
    fn message_types_are_labelled() {
        use vk::DebugUtilsMessageTypeFlagsEXT as Ty;
        assert_eq!(message_type_label(Ty::GENERAL), "GENERAL");
        assert_eq!(message_type_label(Ty::VALIDATION), "VALIDATION");
        assert_eq!(message_type_label(Ty::PERFORMANCE), "PERFORMANCE");
        assert_eq!(message_type_label(Ty::empty()), "UNKNOWN");
    }

    #[test]
    fn validation_layer_is_khronos() {
        assert_eq!(validation_layers(), vec![c"VK_LAYER_KHRONOS_validation"]);
    }
}
