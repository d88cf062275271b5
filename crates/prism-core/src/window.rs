//! Presentation surface collaborator.
//!
//! The renderer never talks to a windowing library directly. Anything that
//! can report a drawable size, pump its events, and tell us when the user
//! wants to quit can drive the frame loop.

/// A window (or other drawable) the engine presents into.
pub trait SurfaceProvider {
    /// Current drawable size in physical pixels.
    ///
    /// A minimized window reports `(0, 0)`.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Process pending window-system events without blocking.
    fn poll_events(&mut self);

    /// Whether the user asked to close the window.
    fn should_close(&self) -> bool;

    /// Replace the window title.
    fn set_title(&mut self, title: &str);

    /// Returns `true` once after the drawable was resized.
    fn take_resized(&mut self) -> bool {
        false
    }
}

/// Returns `true` if either dimension is zero.
#[inline]
pub const fn is_zero_area(size: (u32, u32)) -> bool {
    size.0 == 0 || size.1 == 0
}

/// Poll the surface until it reports a drawable with nonzero area.
///
/// This busy-waits on purpose: a minimized window has nothing to present
/// into, so the swapchain cannot be rebuilt until it is restored. Returns
/// `None` if a close was requested while waiting.
pub fn wait_for_nonzero_size<S>(surface: &mut S) -> Option<(u32, u32)>
where
    S: SurfaceProvider + ?Sized,
{
    let mut size = surface.framebuffer_size();
    if !is_zero_area(size) {
        return Some(size);
    }

    tracing::debug!("Surface has zero area, waiting until it is restored");
    let mut polls: u64 = 0;
    while is_zero_area(size) {
        surface.poll_events();
        if surface.should_close() {
            tracing::debug!("Close requested while waiting for a drawable surface");
            return None;
        }
        size = surface.framebuffer_size();
        polls += 1;
        std::thread::yield_now();
    }

    tracing::debug!("Surface restored to {}x{} after {polls} polls", size.0, size.1);
    Some(size)
}
