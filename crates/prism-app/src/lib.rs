//! Application runner for the Prism engine.
//!
//! Wires the window, GPU context, renderer and frame orchestrator together
//! and drives them until the window closes.
//!
//! # Example
//!
//! ```no_run
//! use prism_app::{run_app, AppConfig};
//! use prism_render::Scene;
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app(AppConfig::from_env(), &Scene::demo())
//! }
//! ```

mod config;
mod runner;

pub use config::AppConfig;
pub use runner::{fps_title, run_app};
