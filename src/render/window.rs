//! Window manager - visible horizontal and vertical extents
//!
//! The horizontal window is a sample count, the vertical window an amplitude
//! span centred on zero. Both are changed only through the resize policy
//! below; requests outside the allowed ranges are ignored.
//!
//! ## Latency compensation
//!
//! The capture thread appends whole chunks. Between two chunks the newest
//! samples have already happened but are not in the buffer yet, so the
//! trailing edge is placed `chunk` samples back and moved forward by the
//! time elapsed since the last write:
//!
//! ```text
//! x_end   = min(len, len - chunk + round(rate_khz * ms_since_write))
//! x_begin = max(0, min(len - window, x_end - window))
//! ```

use std::time::Duration;

/// Largest displayable PCM amplitude (1.5 x i16::MAX)
pub const PCM_MAXIMUM_VALUE: i32 = i16::MAX as i32 * 3 / 2;

/// Smallest horizontal window, in samples
pub const MIN_HORIZONTAL_WINDOW: usize = 16;

/// Smallest vertical window, in amplitude units
pub const MIN_VERTICAL_WINDOW: i32 = 800;

/// Largest vertical window, in amplitude units
pub const MAX_VERTICAL_WINDOW: i32 = PCM_MAXIMUM_VALUE * 2;

pub const DEFAULT_HORIZONTAL_WINDOW: usize = 4000;
pub const DEFAULT_VERTICAL_WINDOW: i32 = 10_000;

/// Visible extents of the plot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeWindow {
    horizontal: usize,
    vertical: i32,
}

impl Default for ScopeWindow {
    fn default() -> Self {
        Self {
            horizontal: DEFAULT_HORIZONTAL_WINDOW,
            vertical: DEFAULT_VERTICAL_WINDOW,
        }
    }
}

impl ScopeWindow {
    /// Create a window, falling back to defaults for out-of-range sizes
    pub fn new(horizontal: usize, vertical: i32) -> Self {
        let mut window = Self::default();
        window.set_horizontal(horizontal, 0);
        window.set_vertical(vertical);
        window
    }

    pub fn horizontal(&self) -> usize {
        self.horizontal
    }

    pub fn vertical(&self) -> i32 {
        self.vertical
    }

    /// Request a new horizontal size
    ///
    /// Rejected if below `MIN_HORIZONTAL_WINDOW`, or above `buffer_len` once
    /// any samples have been seen (`buffer_len > 0`).
    ///
    /// # Returns
    /// `true` if the size was applied
    pub fn set_horizontal(&mut self, size: usize, buffer_len: usize) -> bool {
        if size < MIN_HORIZONTAL_WINDOW || (buffer_len > 0 && size > buffer_len) {
            return false;
        }
        self.horizontal = size;
        true
    }

    /// Request a new vertical size
    ///
    /// Rejected outside `[MIN_VERTICAL_WINDOW, MAX_VERTICAL_WINDOW]`.
    pub fn set_vertical(&mut self, size: i32) -> bool {
        if !(MIN_VERTICAL_WINDOW..=MAX_VERTICAL_WINDOW).contains(&size) {
            return false;
        }
        self.vertical = size;
        true
    }

    /// Shrink the horizontal window to a buffer shorter than it
    pub fn fit_to_buffer(&mut self, buffer_len: usize) {
        if buffer_len < self.horizontal {
            self.set_horizontal(buffer_len, buffer_len);
        }
    }

    /// Horizontal size usable against a buffer of `buffer_len` samples
    pub fn effective_horizontal(&self, buffer_len: usize) -> usize {
        self.horizontal.min(buffer_len)
    }

    /// Vertical extent as (bottom, top)
    pub fn vertical_bounds(&self) -> (f32, f32) {
        let half = (self.vertical / 2) as f32;
        (-half, half)
    }
}

/// Visible horizontal range in buffer indices
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HorizontalRange {
    pub begin: i64,
    pub end: i64,
}

impl HorizontalRange {
    pub fn width(&self) -> i64 {
        self.end - self.begin
    }
}

/// Samples that have happened since the last write, at `sample_rate_hz`
pub fn samples_elapsed(sample_rate_hz: u32, since_write: Duration) -> i64 {
    let rate_khz = sample_rate_hz as f64 / 1000.0;
    let ms = since_write.as_secs_f64() * 1000.0;
    (rate_khz * ms).round() as i64
}

/// Compute the trailing visible range of a growing buffer
///
/// `window` is clamped to `buffer_len` first.
pub fn trailing_range(
    buffer_len: usize,
    window: usize,
    micro_chunk: usize,
    since_write: Duration,
    sample_rate_hz: u32,
) -> HorizontalRange {
    let len = buffer_len as i64;
    let window = window.min(buffer_len) as i64;
    let compensation = samples_elapsed(sample_rate_hz, since_write);

    let end = len.min(len - micro_chunk as i64 + compensation).max(0);
    let begin = (len - window).min(end - window).max(0);
    HorizontalRange { begin, end }
}

/// Range centred on the middle of a buffer, used for the trigger view
pub fn centered_range(buffer_len: usize, window: usize) -> HorizontalRange {
    let center = (buffer_len / 2) as i64;
    let half = (window / 2) as i64;
    HorizontalRange {
        begin: center - half,
        end: center + half,
    }
}

/// Orthographic projection for one frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub x_begin: f32,
    pub x_end: f32,
    pub y_begin: f32,
    pub y_end: f32,
}

impl Projection {
    pub fn new(range: HorizontalRange, window: &ScopeWindow) -> Self {
        let (y_begin, y_end) = window.vertical_bounds();
        Self {
            x_begin: range.begin as f32,
            x_end: range.end as f32,
            y_begin,
            y_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_maximum() {
        assert_eq!(PCM_MAXIMUM_VALUE, 49_150);
        assert_eq!(MAX_VERTICAL_WINDOW, 98_300);
    }

    #[test]
    fn test_trailing_range_with_chunk_latency() {
        let range = trailing_range(5000, 4000, 100, Duration::ZERO, 44_100);
        assert_eq!(range.end, 4900);
        assert_eq!(range.begin, 900);
    }

    #[test]
    fn test_elapsed_time_moves_trailing_edge() {
        // 1 ms at 44.1 kHz is 44 samples
        let range = trailing_range(5000, 4000, 100, Duration::from_millis(1), 44_100);
        assert_eq!(range.end, 4944);
        assert_eq!(range.begin, 944);

        // never past the newest sample
        let range = trailing_range(5000, 4000, 100, Duration::from_millis(50), 44_100);
        assert_eq!(range.end, 5000);
        assert_eq!(range.begin, 1000);
    }

    #[test]
    fn test_trailing_range_properties() {
        for &len in &[16usize, 17, 100, 999, 5000, 44_100] {
            for &window in &[16usize, 17, 64, 500, 4000, 44_100] {
                if window > len {
                    continue;
                }
                let range = trailing_range(len, window, 0, Duration::ZERO, 44_100);
                assert!(range.begin >= 0);
                assert!(range.end <= len as i64);
                assert_eq!(range.width(), window as i64);
            }
        }
    }

    #[test]
    fn test_full_window_starts_at_zero() {
        let range = trailing_range(2048, 2048, 0, Duration::ZERO, 44_100);
        assert_eq!(range.begin, 0);
        assert_eq!(range.end, 2048);
    }

    #[test]
    fn test_window_clamped_to_buffer() {
        let range = trailing_range(100, 4000, 10, Duration::ZERO, 44_100);
        assert_eq!(range.begin, 0);
        assert_eq!(range.end, 90);
    }

    #[test]
    fn test_horizontal_resize_rejections() {
        let mut window = ScopeWindow::default();
        assert!(!window.set_horizontal(15, 10_000));
        assert_eq!(window.horizontal(), 4000);
        assert!(!window.set_horizontal(10_001, 10_000));
        assert_eq!(window.horizontal(), 4000);
        // repeated rejection leaves the same value
        assert!(!window.set_horizontal(15, 10_000));
        assert_eq!(window.horizontal(), 4000);

        assert!(window.set_horizontal(16, 10_000));
        assert_eq!(window.horizontal(), 16);
        assert!(window.set_horizontal(10_000, 10_000));
        assert_eq!(window.horizontal(), 10_000);
    }

    #[test]
    fn test_horizontal_resize_before_data() {
        let mut window = ScopeWindow::default();
        assert!(window.set_horizontal(100_000, 0));
        assert_eq!(window.horizontal(), 100_000);
    }

    #[test]
    fn test_vertical_resize_rejections() {
        let mut window = ScopeWindow::default();
        assert!(!window.set_vertical(500));
        assert_eq!(window.vertical(), 10_000);
        assert!(!window.set_vertical(MAX_VERTICAL_WINDOW + 1));
        assert_eq!(window.vertical(), 10_000);

        assert!(window.set_vertical(800));
        assert!(window.set_vertical(MAX_VERTICAL_WINDOW));
        assert_eq!(window.vertical(), MAX_VERTICAL_WINDOW);
    }

    #[test]
    fn test_fit_to_buffer() {
        let mut window = ScopeWindow::default();
        window.fit_to_buffer(1000);
        assert_eq!(window.horizontal(), 1000);

        // too short to be a valid window: keep the size, clamp per frame
        window.fit_to_buffer(10);
        assert_eq!(window.horizontal(), 1000);
        assert_eq!(window.effective_horizontal(10), 10);
    }

    #[test]
    fn test_centered_range() {
        let range = centered_range(4410, 4000);
        assert_eq!(range.begin, 205);
        assert_eq!(range.end, 4205);
    }

    #[test]
    fn test_projection_vertical_bounds() {
        let window = ScopeWindow::new(4000, 12_000);
        let range = HorizontalRange { begin: 0, end: 4000 };
        let projection = Projection::new(range, &window);
        assert_eq!(projection.y_begin, -6000.0);
        assert_eq!(projection.y_end, 6000.0);
    }
}
