//! Waveform vertex building
//!
//! Turns raw samples into interleaved `x, y` floats ready for a line draw.

use crate::audio::BufferSnapshot;

/// Interleaved `x, y` vertex data for one draw call
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexSet {
    data: Vec<f32>,
}

impl VertexSet {
    pub fn with_capacity(points: usize) -> Self {
        Self {
            data: Vec::with_capacity(points * 2),
        }
    }

    pub fn from_points(points: &[(f32, f32)]) -> Self {
        let mut set = Self::with_capacity(points.len());
        for &(x, y) in points {
            set.push(x, y);
        }
        set
    }

    pub fn push(&mut self, x: f32, y: f32) {
        self.data.push(x);
        self.data.push(y);
    }

    /// Interleaved floats, two per point
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn float_count(&self) -> usize {
        self.data.len()
    }

    pub fn point_count(&self) -> usize {
        self.data.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.data.chunks_exact(2).map(|p| (p[0], p[1]))
    }
}

/// Flat line drawn when there is nothing to show
pub fn placeholder() -> VertexSet {
    VertexSet::from_points(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)])
}

/// Builds vertex sets from sample data
#[derive(Clone, Copy, Debug)]
pub struct WaveformBufferBuilder {
    /// Y multiplier used when fitting a whole slice to a span
    pub y_scale: f32,
}

impl Default for WaveformBufferBuilder {
    fn default() -> Self {
        Self { y_scale: 1.0 }
    }
}

impl WaveformBufferBuilder {
    pub fn new(y_scale: f32) -> Self {
        Self { y_scale }
    }

    /// Vertices for the newest `window + micro_chunk` samples of a snapshot
    ///
    /// Each sample maps to `(buffer index, amplitude)`. If the snapshot holds
    /// fewer samples than requested, only the available ones are emitted.
    pub fn trailing(&self, snapshot: &BufferSnapshot, window: usize, micro_chunk: usize) -> VertexSet {
        if snapshot.is_empty() {
            log::warn!("Drawing placeholder line with no sample data");
            return placeholder();
        }

        let len = snapshot.len as i64;
        let wanted = (window + micro_chunk) as i64;
        let mut first = len - wanted;
        if first < snapshot.offset as i64 {
            log::warn!(
                "Sample window out of sync: wanted {} samples, {} available",
                wanted,
                snapshot.samples.len()
            );
            first = snapshot.offset as i64;
        }

        let skip = (first - snapshot.offset as i64) as usize;
        let mut vertices = VertexSet::with_capacity(snapshot.samples.len() - skip);
        for (i, &sample) in snapshot.samples.iter().enumerate().skip(skip) {
            vertices.push((snapshot.offset + i) as f32, sample as f32);
        }
        vertices
    }

    /// Vertices stretching a whole slice across `span` horizontal units
    ///
    /// Sample `i` maps to `(i * span / len, amplitude * y_scale)`.
    pub fn fitted(&self, samples: &[i16], span: f32) -> VertexSet {
        if samples.is_empty() {
            log::warn!("Drawing placeholder line with no sample data");
            return placeholder();
        }

        let interval = span / samples.len() as f32;
        let mut vertices = VertexSet::with_capacity(samples.len());
        for (i, &sample) in samples.iter().enumerate() {
            vertices.push(i as f32 * interval, sample as f32 * self.y_scale);
        }
        vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(len: usize, tail: usize) -> BufferSnapshot {
        let offset = len.saturating_sub(tail);
        BufferSnapshot {
            samples: (offset..len).map(|i| i as i16).collect(),
            offset,
            len,
            last_write: None,
            micro_chunk: 0,
        }
    }

    #[test]
    fn test_empty_input_gives_placeholder() {
        let builder = WaveformBufferBuilder::default();
        let vertices = builder.trailing(&BufferSnapshot::default(), 4000, 100);
        assert_eq!(vertices.point_count(), 3);
        assert!(vertices.points().all(|(_, y)| y == 0.0));

        let vertices = builder.fitted(&[], 100.0);
        assert!(!vertices.is_empty());
    }

    #[test]
    fn test_trailing_uses_buffer_indices() {
        let builder = WaveformBufferBuilder::default();
        let vertices = builder.trailing(&snapshot(1000, 200), 150, 50);

        assert_eq!(vertices.point_count(), 200);
        assert_eq!(vertices.float_count(), 400);
        let first = vertices.points().next().unwrap();
        assert_eq!(first, (800.0, 800.0));
        let last = vertices.points().last().unwrap();
        assert_eq!(last, (999.0, 999.0));
    }

    #[test]
    fn test_trailing_truncates_short_slice() {
        let builder = WaveformBufferBuilder::default();
        // 60 samples in the buffer, 150 + 50 requested
        let vertices = builder.trailing(&snapshot(60, 200), 150, 50);

        assert_eq!(vertices.point_count(), 60);
        assert_eq!(vertices.points().next().unwrap().0, 0.0);
        assert_eq!(vertices.points().last().unwrap().0, 59.0);
    }

    #[test]
    fn test_fitted_spreads_over_span() {
        let builder = WaveformBufferBuilder::new(0.5);
        let vertices = builder.fitted(&[100, 200, 300, 400], 8.0);

        let points: Vec<_> = vertices.points().collect();
        assert_eq!(points, vec![(0.0, 50.0), (2.0, 100.0), (4.0, 150.0), (6.0, 200.0)]);
    }
}
