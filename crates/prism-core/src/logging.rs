//! Diagnostic sink built on `tracing`.
//!
//! Library crates only ever emit events through the `tracing` macros. The
//! sink that receives them is an ordinary value: the application builds one
//! from a [`LogConfig`] and installs it for the whole process, while tests
//! build their own and run code inside [`DiagnosticSink::scope`].

use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Dispatch;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Diagnostic sink configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directives, e.g. `"info"` or `"info,prism_gpu=debug"`.
    pub filter: String,
    /// Let `RUST_LOG` replace `filter` when it is set.
    pub env_override: bool,
    /// Colorize terminal output.
    pub ansi: bool,
    /// Also append every event to this file.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            env_override: true,
            ansi: true,
            file: None,
        }
    }
}

impl LogConfig {
    /// Set the filter directives.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Mirror all output into a log file.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        if self.env_override {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return Ok(filter);
            }
        }
        EnvFilter::try_new(&self.filter)
            .map_err(|e| Error::Logging(format!("invalid filter {:?}: {e}", self.filter)))
    }
}

/// An explicitly constructed destination for engine diagnostics.
#[derive(Clone)]
pub struct DiagnosticSink {
    dispatch: Dispatch,
}

impl DiagnosticSink {
    /// Build a sink that writes to stdout (and the configured file, if any).
    pub fn new(config: &LogConfig) -> Result<Self> {
        Self::with_writer(config, std::io::stdout)
    }

    /// Build a sink that writes terminal output to `writer`.
    pub fn with_writer<W>(config: &LogConfig, writer: W) -> Result<Self>
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let filter = config.env_filter()?;

        let terminal = fmt::layer()
            .with_ansi(config.ansi)
            .with_target(true)
            .with_writer(writer);

        let file = match &config.file {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            }
            None => None,
        };

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(terminal)
            .with(file);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
        })
    }

    /// Make this sink the process-wide default.
    ///
    /// Can only succeed once per process.
    pub fn install(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| Error::Logging(e.to_string()))
    }

    /// Run `f` with this sink receiving all events emitted on this thread.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// The underlying dispatcher.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
}

impl std::fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'w> MakeWriter<'w> for Capture {
        type Writer = Self;

        fn make_writer(&'w self) -> Self::Writer {
            self.clone()
        }
    }

    fn quiet_config(filter: &str) -> LogConfig {
        LogConfig {
            filter: filter.to_string(),
            env_override: false,
            ansi: false,
            file: None,
        }
    }

    #[test]
    fn scoped_sink_captures_events() {
        let capture = Capture::default();
        let sink = DiagnosticSink::with_writer(&quiet_config("info"), capture.clone()).unwrap();

        sink.scope(|| {
            tracing::info!("swapchain created with {} images", 3);
            tracing::debug!("filtered out");
        });

        let out = capture.contents();
        assert!(out.contains("swapchain created with 3 images"));
        assert!(out.contains("INFO"));
        assert!(!out.contains("filtered out"));
    }

    #[test]
    fn file_output_receives_events() {
        let path = std::env::temp_dir().join(format!("prism-log-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let config = quiet_config("warn").with_file(&path);
        let sink = DiagnosticSink::with_writer(&config, Capture::default()).unwrap();
        sink.scope(|| tracing::warn!("present failed"));

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("present failed"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn invalid_filter_is_rejected() {
        let result = DiagnosticSink::with_writer(&quiet_config("prism=loud"), Capture::default());
        assert!(matches!(result, Err(Error::Logging(_))));
    }
}
