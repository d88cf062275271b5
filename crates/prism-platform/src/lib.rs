//! Platform layer for the Prism engine.
//!
//! Provides a winit window that implements [`SurfaceProvider`]. Events are
//! pumped without blocking, once per frame, so the render loop stays the
//! process's only driver.

use prism_core::constants::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use prism_core::SurfaceProvider;
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

impl From<PlatformError> for prism_core::Error {
    fn from(err: PlatformError) -> Self {
        Self::Platform(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Event pumps allowed before giving up on window creation.
const MAX_STARTUP_PUMPS: u32 = 100;

/// Platform configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: prism_core::constants::ENGINE_NAME.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            resizable: true,
        }
    }
}

impl PlatformConfig {
    /// Window attributes for this configuration.
    pub fn window_attributes(&self) -> WindowAttributes {
        Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(LogicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
    }
}

/// Window state driven by the event loop.
#[derive(Debug, Default)]
struct WindowState {
    attributes: WindowAttributes,
    window: Option<Arc<Window>>,
    close_requested: bool,
    resized: bool,
    error: Option<PlatformError>,
}

impl WindowState {
    fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::debug!("Window close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                tracing::trace!("Window resized to {}x{}", size.width, size.height);
                self.resized = true;
            }
            WindowEvent::ScaleFactorChanged { .. } => self.resized = true,
            _ => {}
        }
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => {
                self.error = Some(PlatformError::WindowCreation(e.to_string()));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.handle_event(&event);
    }
}

/// A desktop window the engine renders into.
pub struct WinitSurface {
    event_loop: EventLoop<()>,
    state: WindowState,
    window: Arc<Window>,
}

impl WinitSurface {
    /// Create the event loop and open the window.
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        let mut event_loop =
            EventLoop::new().map_err(|e| PlatformError::EventLoop(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut state = WindowState {
            attributes: config.window_attributes(),
            ..WindowState::default()
        };

        for _ in 0..MAX_STARTUP_PUMPS {
            let status = event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut state);
            if let Some(err) = state.error.take() {
                return Err(err);
            }
            if let PumpStatus::Exit(code) = status {
                return Err(PlatformError::EventLoop(format!(
                    "event loop exited with code {code} before the window opened"
                )));
            }
            if let Some(window) = state.window.clone() {
                let size = window.inner_size();
                tracing::info!(
                    "Window '{}' created ({}x{} physical)",
                    config.title,
                    size.width,
                    size.height
                );
                return Ok(Self {
                    event_loop,
                    state,
                    window,
                });
            }
        }

        Err(PlatformError::WindowCreation(
            "event loop never resumed".to_string(),
        ))
    }

    /// The underlying winit window.
    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl SurfaceProvider for WinitSurface {
    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn poll_events(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            tracing::debug!("Event loop exited with code {code}");
            self.state.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.state.resized)
    }
}

impl HasDisplayHandle for WinitSurface {
    fn display_handle(&self) -> std::result::Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

impl HasWindowHandle for WinitSurface {
    fn window_handle(&self) -> std::result::Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::{PhysicalSize, Size};

    #[test]
    fn default_config_uses_engine_defaults() {
        let config = PlatformConfig::default();
        assert_eq!(config.title, "Prism");
        assert_eq!((config.width, config.height), (1280, 720));
        assert!(config.resizable);
    }

    #[test]
    fn attributes_follow_config() {
        let config = PlatformConfig {
            title: "Viewer".to_string(),
            width: 640,
            height: 480,
            resizable: false,
        };
        let attributes = config.window_attributes();
        assert_eq!(attributes.title, "Viewer");
        assert!(!attributes.resizable);
        assert_eq!(
            attributes.inner_size,
            Some(Size::Logical(LogicalSize::new(640.0, 480.0)))
        );
    }

    #[test]
    fn close_and_resize_events_are_latched() {
        let mut state = WindowState::default();

        state.handle_event(&WindowEvent::Resized(PhysicalSize::new(800, 600)));
        assert!(state.resized);
        assert!(!state.close_requested);

        state.handle_event(&WindowEvent::CloseRequested);
        assert!(state.close_requested);
    }

    #[test]
    fn platform_errors_convert_to_core_errors() {
        let err: prism_core::Error = PlatformError::EventLoop("gone".to_string()).into();
        assert!(matches!(err, prism_core::Error::Platform(ref msg) if msg.contains("gone")));
    }
}
