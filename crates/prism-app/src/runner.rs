//! Application runner.

use std::sync::Arc;
use std::time::Instant;

use prism_core::{wait_for_nonzero_size, DiagnosticSink, FrameTimer, SurfaceProvider};
use prism_gpu::GpuContextBuilder;
use prism_platform::WinitSurface;
use prism_render::{FrameBackend, FrameOrchestrator, FrameOutcome, Renderer, Scene};
use tracing::{info, warn};

use crate::config::AppConfig;

/// Window title carrying the current frame rate.
pub fn fps_title(title: &str, fps: f64) -> String {
    format!("{title} ({fps:.0} fps)")
}

/// Run the engine with the given configuration until the window closes.
///
/// Installs the diagnostic sink for the process, opens the window, creates
/// the GPU context and renderer, and renders `scene` every frame.
pub fn run_app(config: AppConfig, scene: &Scene) -> anyhow::Result<()> {
    let sink = DiagnosticSink::new(&config.log)?;
    sink.install()?;
    for warning in config.warnings() {
        warn!("{warning}");
    }

    info!("{} starting...", config.title);

    let mut platform = WinitSurface::new(&config.platform_config())?;

    let gpu = Arc::new(
        GpuContextBuilder::new()
            .app_name(&config.title)
            .validation(config.validation)
            .build(platform.window())?,
    );
    info!("GPU: {}", gpu.capabilities().summary());

    let Some((width, height)) = wait_for_nonzero_size(&mut platform) else {
        info!("Window closed before the first frame");
        return Ok(());
    };

    let mut renderer = Renderer::new(Arc::clone(&gpu), config.renderer_config(), width, height)?;
    let mut frames = FrameOrchestrator::new(renderer.slot_count());

    let started = Instant::now();
    let mut timer = FrameTimer::new();

    let result = run_loop(
        &config,
        scene,
        &mut platform,
        &mut renderer,
        &mut frames,
        &mut timer,
    );
    if let Err(e) = &result {
        tracing::error!("Render loop failed: {e}");
    }

    frames.shutdown(&mut renderer)?;

    let elapsed = started.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        info!(
            "Presented {} frames in {elapsed:.1}s (avg {:.1} fps)",
            timer.total_frames(),
            timer.total_frames() as f64 / elapsed
        );
    }

    // GPU objects go before the window they present to
    drop(renderer);
    drop(gpu);
    drop(platform);

    info!("Shutdown complete");
    result
}

/// Feed a frame to the timer if it reached the screen.
fn tick_presented(timer: &mut FrameTimer, outcome: FrameOutcome, now: Instant) -> Option<f64> {
    if outcome.presented() {
        timer.tick_at(now)
    } else {
        None
    }
}

fn run_loop(
    config: &AppConfig,
    scene: &Scene,
    platform: &mut WinitSurface,
    renderer: &mut Renderer,
    frames: &mut FrameOrchestrator,
    timer: &mut FrameTimer,
) -> anyhow::Result<()> {
    while !platform.should_close() {
        platform.poll_events();
        if platform.should_close() {
            break;
        }

        if platform.take_resized() {
            frames.request_rebuild();
        }

        let outcome = frames.render_frame(renderer, platform, scene.draw_items())?;
        if outcome == FrameOutcome::Closed {
            break;
        }
        if let Some(fps) = tick_presented(timer, outcome, Instant::now()) {
            tracing::debug!("{fps:.1} fps");
            if config.show_fps_in_title {
                platform.set_title(&fps_title(&config.title, fps));
            }
        }
    }

    Ok(())
}
