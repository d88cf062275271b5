//! Frame cursor.

/// Which frame slot guards the next acquire.
///
/// Advances once per completed frame, modulo the number of frames in
/// flight. It is independent of the image index returned by acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    current: usize,
    frames_in_flight: usize,
}

impl FrameCursor {
    /// Start at slot 0. A count of zero is treated as one.
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            current: 0,
            frames_in_flight: frames_in_flight.max(1),
        }
    }

    /// Current slot index.
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Maximum frames in flight.
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Move to the next slot.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.frames_in_flight;
    }

    /// Adopt a new slot count after a rebuild, keeping the current slot
    /// unless it is now out of range.
    pub fn resize(&mut self, frames_in_flight: usize) {
        self.frames_in_flight = frames_in_flight.max(1);
        self.current %= self.frames_in_flight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_through_every_slot_once_per_lap() {
        for n in 1..=5 {
            let mut cursor = FrameCursor::new(n);
            let mut seen = Vec::new();
            for _ in 0..n * 3 {
                seen.push(cursor.current());
                cursor.advance();
            }
            let expected: Vec<usize> = (0..n * 3).map(|i| i % n).collect();
            assert_eq!(seen, expected, "n = {n}");
        }
    }

    #[test]
    fn zero_slots_behaves_as_one() {
        let mut cursor = FrameCursor::new(0);
        assert_eq!(cursor.frames_in_flight(), 1);
        cursor.advance();
        assert_eq!(cursor.current(), 0);
    }

    #[test]
    fn resize_keeps_in_range_index() {
        let mut cursor = FrameCursor::new(3);
        cursor.advance();
        cursor.resize(4);
        assert_eq!(cursor.current(), 1);
        assert_eq!(cursor.frames_in_flight(), 4);
    }

    #[test]
    fn resize_wraps_out_of_range_index() {
        let mut cursor = FrameCursor::new(4);
        for _ in 0..3 {
            cursor.advance();
        }
        cursor.resize(2);
        assert_eq!(cursor.current(), 1);
        cursor.advance();
        assert_eq!(cursor.current(), 0);
    }
}
