//! Frame-rate measurement.

use std::time::{Duration, Instant};

/// Counts frames and reports the average rate once per interval.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    interval: Duration,
    window_start: Instant,
    frames_in_window: u32,
    total_frames: u64,
    last_fps: Option<f64>,
}

impl FrameTimer {
    /// Timer reporting once per second, starting now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now(), Duration::from_secs(1))
    }

    /// Timer with an explicit start time and reporting interval.
    pub fn starting_at(start: Instant, interval: Duration) -> Self {
        Self {
            interval,
            window_start: start,
            frames_in_window: 0,
            total_frames: 0,
            last_fps: None,
        }
    }

    /// Record a completed frame.
    ///
    /// Returns the average frame rate over the window that just closed, if
    /// at least one interval has elapsed since the window opened.
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    /// Same as [`tick`](Self::tick) with an explicit timestamp.
    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        self.frames_in_window += 1;
        self.total_frames += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }

        let fps = f64::from(self.frames_in_window) / elapsed.as_secs_f64();
        self.window_start = now;
        self.frames_in_window = 0;
        self.last_fps = Some(fps);
        Some(fps)
    }

    /// Most recently reported frame rate.
    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }

    /// Frames recorded since the timer was created.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reports_once_per_interval() {
        let start = Instant::now();
        let mut timer = FrameTimer::starting_at(start, Duration::from_secs(1));

        for i in 1..60 {
            assert_eq!(timer.tick_at(start + Duration::from_millis(i * 16)), None);
        }
        let fps = timer.tick_at(start + Duration::from_secs(1)).unwrap();
        assert_relative_eq!(fps, 60.0, epsilon = 1e-9);
        assert_eq!(timer.total_frames(), 60);
    }

    #[test]
    fn window_resets_after_report() {
        let start = Instant::now();
        let mut timer = FrameTimer::starting_at(start, Duration::from_millis(500));

        timer.tick_at(start + Duration::from_millis(500));
        assert_eq!(timer.tick_at(start + Duration::from_millis(600)), None);
        let fps = timer.tick_at(start + Duration::from_millis(1000)).unwrap();
        assert_relative_eq!(fps, 4.0, epsilon = 1e-9);
        assert_eq!(timer.last_fps(), Some(fps));
    }
}
