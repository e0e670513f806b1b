//! Fixed-stride sliding window over a caller-owned buffer.
//!
//! The window never copies: every `next()` is a borrowed view into the
//! original slice, so the caller keeps the memory alive for the window's
//! lifetime. All pacing is pull-based through `has_next()`/`next()`.

/// A fixed-size, fixed-stride window iterator over a slice.
#[derive(Debug, Clone)]
pub struct SlidingWindow<'a, T> {
    data: &'a [T],
    size: usize,
    stride: usize,
    count: usize,
}

impl<'a, T> SlidingWindow<'a, T> {
    /// `size` and `stride` are in elements; both must be non-zero.
    #[must_use]
    pub fn new(data: &'a [T], size: usize, stride: usize) -> Self {
        debug_assert!(size > 0 && stride > 0);
        Self {
            data,
            size,
            stride,
            count: 0,
        }
    }

    /// Total number of windows this iterator will yield:
    /// `1 + floor((len - size) / stride)`, or 0 when the data is shorter
    /// than one window.
    #[must_use]
    pub fn total_strides(&self) -> usize {
        if self.data.len() < self.size {
            0
        } else {
            1 + (self.data.len() - self.size) / self.stride
        }
    }

    /// Start index of the window `next()` would return.
    #[must_use]
    pub fn next_window_start(&self) -> usize {
        self.count * self.stride
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.count < self.total_strides()
    }

    /// Advance by one stride and return the window.
    pub fn next(&mut self) -> Option<&'a [T]> {
        if !self.has_next() {
            return None;
        }
        let start = self.next_window_start();
        self.count += 1;
        Some(&self.data[start..start + self.size])
    }

    /// Reposition to window index `n` without reading anything.
    pub fn fast_forward(&mut self, n: usize) {
        self.count = n;
    }

    /// Elements between the next window start and the end of the data.
    /// Useful for deciding whether the final frame needs padding.
    #[must_use]
    pub fn remaining_data(&self) -> usize {
        self.data.len().saturating_sub(self.next_window_start())
    }
}

#[cfg(test)]
mod tests {
    use super::SlidingWindow;

    #[test]
    fn yields_exact_stride_count() {
        let data: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let mut w = SlidingWindow::new(&data, 4, 2);

        // 1 + floor((10-4)/2) = 4 windows.
        assert_eq!(w.total_strides(), 4);

        let mut seen = 0;
        while w.has_next() {
            let win = w.next().expect("has_next was true");
            assert_eq!(win.len(), 4);
            seen += 1;
        }
        assert_eq!(seen, 4);
        assert!(w.next().is_none());
    }

    #[test]
    fn window_larger_than_data_yields_nothing() {
        let data = [0.0f32; 3];
        let mut w = SlidingWindow::new(&data, 8, 2);
        assert_eq!(w.total_strides(), 0);
        assert!(!w.has_next());
        assert!(w.next().is_none());
    }

    #[test]
    fn windows_are_views_at_stride_offsets() {
        let data: Vec<i32> = (0..8).collect();
        let mut w = SlidingWindow::new(&data, 3, 3);
        assert_eq!(w.next().unwrap(), &[0, 1, 2]);
        assert_eq!(w.next().unwrap(), &[3, 4, 5]);
        assert!(w.next().is_none());
    }

    #[test]
    fn fast_forward_and_remaining() {
        let data = [0u8; 100];
        let mut w = SlidingWindow::new(&data, 10, 5);
        assert_eq!(w.remaining_data(), 100);

        w.fast_forward(3);
        assert_eq!(w.next_window_start(), 15);
        assert_eq!(w.remaining_data(), 85);

        // Past the end: no windows left, nothing remaining.
        w.fast_forward(1000);
        assert!(!w.has_next());
        assert_eq!(w.remaining_data(), 0);
    }
}
