//! Prism demo viewer.
//!
//! Draws a grid of colored triangles covering the window.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p prism-viewer
//! ```
//!
//! The shaders are compiled to SPIR-V when `prism-gpu` builds.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)
//! - `PRISM_WIDTH`, `PRISM_HEIGHT`: Initial window size
//! - `PRISM_VALIDATION`: Enable Vulkan validation (`1`/`0`)
//! - `PRISM_SHADER_DIR`: Directory holding the compiled shaders
//! - `PRISM_LOG_FILE`: Also write logs to this file

use prism_app::{run_app, AppConfig};
use prism_render::Scene;

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    let config = AppConfig::from_env();
    run_app(config, &Scene::demo())
}

fn print_help() {
    eprintln!(
        "Prism demo viewer

USAGE:
    cargo run -p prism-viewer

Shaders are compiled to SPIR-V at build time and loaded by path from the
build output. PRISM_SHADER_DIR points at another directory holding
triangle.vert.spv and triangle.frag.spv.

OPTIONS:
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)
    PRISM_WIDTH             Initial window width (default: 1280)
    PRISM_HEIGHT            Initial window height (default: 720)
    PRISM_VALIDATION        Enable Vulkan validation layers (1/0, default: debug builds)
    PRISM_SHADER_DIR        Directory holding the compiled shaders (default: build output)
    PRISM_LOG_FILE          Also append logs to this file"
    );
}
