//! Application configuration.

use prism_core::constants::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use prism_core::LogConfig;
use prism_gpu::pipeline::COMPILED_SHADER_DIR;
use prism_gpu::GraphicsPipelineConfig;
use prism_platform::PlatformConfig;
use prism_render::RendererConfig;
use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Directory holding the compiled shaders.
    pub shader_dir: PathBuf,
    /// Color each frame is cleared to.
    pub clear_color: [f32; 4],
    /// Show the frame rate in the window title.
    pub show_fps_in_title: bool,
    /// Diagnostic sink settings.
    pub log: LogConfig,
    /// Problems found while reading the environment, logged at startup.
    pub(crate) warnings: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: prism_core::constants::ENGINE_NAME.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            validation: cfg!(debug_assertions),
            shader_dir: PathBuf::from(COMPILED_SHADER_DIR),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            show_fps_in_title: true,
            log: LogConfig::default(),
            warnings: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `PRISM_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup. Unparseable values are
    /// skipped and reported once logging is up.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(width) = self.parse_var(&lookup, "PRISM_WIDTH", parse_dimension) {
            self.width = width;
        }
        if let Some(height) = self.parse_var(&lookup, "PRISM_HEIGHT", parse_dimension) {
            self.height = height;
        }
        if let Some(validation) = self.parse_var(&lookup, "PRISM_VALIDATION", parse_flag) {
            self.validation = validation;
        }
        if let Some(dir) = lookup("PRISM_SHADER_DIR").filter(|v| !v.is_empty()) {
            self.shader_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup("PRISM_LOG_FILE").filter(|v| !v.is_empty()) {
            self.log = self.log.with_file(file);
        }
        self
    }

    fn parse_var<T>(
        &mut self,
        lookup: &impl Fn(&str) -> Option<String>,
        key: &str,
        parse: fn(&str) -> Option<T>,
    ) -> Option<T> {
        let raw = lookup(key)?;
        let parsed = parse(raw.trim());
        if parsed.is_none() {
            self.warnings
                .push(format!("Ignoring {key}={raw:?}: not a valid value"));
        }
        parsed
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Load shaders from another directory.
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    /// Set the clear color.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Show or hide the frame rate in the title.
    pub fn with_fps_in_title(mut self, show: bool) -> Self {
        self.show_fps_in_title = show;
        self
    }

    /// Replace the logging configuration.
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Environment problems collected by [`with_overrides`](Self::with_overrides).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn platform_config(&self) -> PlatformConfig {
        PlatformConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            resizable: true,
        }
    }

    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            pipeline: GraphicsPipelineConfig::from_dir(&self.shader_dir),
            clear_color: self.clear_color,
        }
    }
}

fn parse_dimension(value: &str) -> Option<u32> {
    value.parse().ok().filter(|&v| v > 0)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
