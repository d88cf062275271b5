//! The per-frame state machine.
//!
//! Each call to [`FrameOrchestrator::render_frame`] walks
//! `Idle -> AcquireImage -> RecordCommands -> Submit -> Present -> Idle`,
//! detouring through `Rebuild` whenever the swapchain goes stale.
//!
//! Two indices are tracked separately. The cursor slot owns the fence and
//! the image-available semaphore that guard the next acquire; the acquired
//! image index selects the framebuffer, command buffer and render-complete
//! semaphore. They coincide only by accident.

use crate::cursor::FrameCursor;
use prism_core::{wait_for_nonzero_size, DrawItem, SurfaceProvider};
use prism_gpu::{AcquireOutcome, PresentOutcome, Result};

/// GPU operations the orchestrator sequences.
///
/// `slot` arguments are frame-cursor indices; `image` arguments are image
/// indices returned by [`FrameBackend::acquire_image`].
pub trait FrameBackend {
    /// Number of frame slots, which is also the number of frames in flight.
    fn slot_count(&self) -> usize;

    /// Block until the slot's previous submission has retired.
    fn wait_for_slot(&mut self, slot: usize) -> Result<()>;

    /// Acquire the next image, signaling the slot's image-available semaphore.
    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome>;

    /// Return the slot's fence to the unsignaled state.
    fn reset_slot_fence(&mut self, slot: usize) -> Result<()>;

    /// Re-record the image's command buffer with one draw per item.
    fn record(&mut self, image: u32, draws: &[DrawItem]) -> Result<()>;

    /// Submit the image's command buffer, waiting on the slot's
    /// image-available semaphore and signaling the slot's fence.
    fn submit(&mut self, slot: usize, image: u32) -> Result<()>;

    /// Present the image once its rendering is complete.
    fn present(&mut self, image: u32) -> Result<PresentOutcome>;

    /// Drain the device and recreate the swapchain and all slots for a
    /// drawable of the given size.
    fn rebuild(&mut self, width: u32, height: u32) -> Result<()>;

    /// Block until the device has finished all submitted work.
    fn wait_idle(&mut self) -> Result<()>;
}

/// Where the orchestrator is within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameStage {
    #[default]
    Idle,
    AcquireImage,
    RecordCommands,
    Submit,
    Present,
    Rebuild,
}

/// How a frame ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The image was queued for presentation.
    Presented,
    /// The swapchain was rebuilt. If an image was presented first,
    /// `presented` is set.
    Rebuilt { presented: bool },
    /// Submission or presentation failed; the frame was not retried.
    Dropped,
    /// The window was closed while waiting for a drawable surface.
    Closed,
}

impl FrameOutcome {
    /// Whether an image reached the presentation engine this frame.
    pub const fn presented(self) -> bool {
        matches!(self, Self::Presented | Self::Rebuilt { presented: true })
    }
}

/// Running counters, logged at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub presented: u64,
    pub dropped: u64,
    pub rebuilds: u64,
}

/// Drives frames through a [`FrameBackend`].
#[derive(Debug)]
pub struct FrameOrchestrator {
    cursor: FrameCursor,
    stage: FrameStage,
    rebuild_pending: bool,
    stats: FrameStats,
}

impl FrameOrchestrator {
    /// Create an orchestrator for a backend with `slot_count` frame slots.
    pub fn new(slot_count: usize) -> Self {
        Self {
            cursor: FrameCursor::new(slot_count),
            stage: FrameStage::Idle,
            rebuild_pending: false,
            stats: FrameStats::default(),
        }
    }

    pub fn cursor(&self) -> FrameCursor {
        self.cursor
    }

    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Whether a rebuild will run at the start of the next frame.
    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// Rebuild the swapchain before the next frame, e.g. after a resize.
    pub fn request_rebuild(&mut self) {
        self.rebuild_pending = true;
    }

    /// Render one frame.
    ///
    /// Stale swapchains are rebuilt and submit or present failures drop
    /// the frame. Errors returned here are fatal; the stage is back at
    /// [`FrameStage::Idle`] when one is returned.
    #[cfg_attr(feature = "instrument", tracing::instrument(level = "trace", skip_all))]
    pub fn render_frame<B, S>(
        &mut self,
        backend: &mut B,
        surface: &mut S,
        draws: &[DrawItem],
    ) -> Result<FrameOutcome>
    where
        B: FrameBackend + ?Sized,
        S: SurfaceProvider + ?Sized,
    {
        let result = self.run_frame(backend, surface, draws);
        if let Err(e) = &result {
            tracing::debug!("Frame failed during {:?}: {e}", self.stage);
            self.stage = FrameStage::Idle;
        }
        result
    }

    fn run_frame<B, S>(
        &mut self,
        backend: &mut B,
        surface: &mut S,
        draws: &[DrawItem],
    ) -> Result<FrameOutcome>
    where
        B: FrameBackend + ?Sized,
        S: SurfaceProvider + ?Sized,
    {
        if self.rebuild_pending {
            return self.rebuild(backend, surface, false);
        }

        let slot = self.cursor.current();
        backend.wait_for_slot(slot)?;

        self.stage = FrameStage::AcquireImage;
        let image = match backend.acquire_image(slot)? {
            AcquireOutcome::Image { index, suboptimal } => {
                if suboptimal {
                    tracing::debug!("Acquired suboptimal image {index}, rebuilding after present");
                    self.rebuild_pending = true;
                }
                index
            }
            AcquireOutcome::Stale => {
                // Nothing was submitted, so the fence stays signaled
                tracing::debug!("Swapchain out of date on acquire");
                return self.rebuild(backend, surface, false);
            }
        };

        backend.reset_slot_fence(slot)?;

        self.stage = FrameStage::RecordCommands;
        backend.record(image, draws)?;

        self.stage = FrameStage::Submit;
        if let Err(e) = backend.submit(slot, image) {
            // The slot's fence was reset and will never be signaled; only a
            // full rebuild gives it back a signaled fence.
            tracing::error!("Failed to submit frame: {e}");
            self.stats.dropped += 1;
            self.cursor.advance();
            return match self.rebuild(backend, surface, false)? {
                FrameOutcome::Closed => Ok(FrameOutcome::Closed),
                _ => Ok(FrameOutcome::Dropped),
            };
        }

        self.stage = FrameStage::Present;
        let presented = match backend.present(image) {
            Ok(PresentOutcome::Presented) => true,
            Ok(PresentOutcome::Stale) => {
                tracing::debug!("Swapchain out of date on present");
                self.rebuild_pending = true;
                true
            }
            Err(e) => {
                tracing::error!("Failed to present frame: {e}");
                self.stats.dropped += 1;
                false
            }
        };
        if presented {
            self.stats.presented += 1;
        }

        self.cursor.advance();

        if self.rebuild_pending {
            return self.rebuild(backend, surface, presented);
        }

        self.stage = FrameStage::Idle;
        Ok(if presented {
            FrameOutcome::Presented
        } else {
            FrameOutcome::Dropped
        })
    }

    /// Wait for the drawable to have a nonzero size, then rebuild.
    fn rebuild<B, S>(
        &mut self,
        backend: &mut B,
        surface: &mut S,
        presented: bool,
    ) -> Result<FrameOutcome>
    where
        B: FrameBackend + ?Sized,
        S: SurfaceProvider + ?Sized,
    {
        self.stage = FrameStage::Rebuild;
        self.rebuild_pending = true;

        let Some((width, height)) = wait_for_nonzero_size(surface) else {
            self.stage = FrameStage::Idle;
            return Ok(FrameOutcome::Closed);
        };

        backend.rebuild(width, height)?;

        self.cursor.resize(backend.slot_count());
        self.rebuild_pending = false;
        self.stats.rebuilds += 1;
        self.stage = FrameStage::Idle;
        tracing::debug!(
            "Rebuilt swapchain at {width}x{height} with {} slots",
            self.cursor.frames_in_flight()
        );

        Ok(FrameOutcome::Rebuilt { presented })
    }

    /// Drain the device before teardown.
    pub fn shutdown<B: FrameBackend + ?Sized>(&mut self, backend: &mut B) -> Result<()> {
        self.stage = FrameStage::Idle;
        backend.wait_idle()?;
        tracing::info!(
            "Frames presented: {}, dropped: {}, swapchain rebuilds: {}",
            self.stats.presented,
            self.stats.dropped,
            self.stats.rebuilds
        );
        Ok(())
    }
}
