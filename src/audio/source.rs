//! Sample source contract consumed by the render core
//!
//! The render loop only ever talks to a `SampleSource`. `LiveSource` is the
//! concrete source used by the viewer: a growing `SampleBuffer` fed by the
//! capture thread plus a `TriggerAverager` producing the trigger buffer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::buffer::{BufferSnapshot, SampleBuffer};
use super::trigger::{AveragerConfig, TriggerAverager};
use crate::error::ScopeError;

/// A continuously filling source of mono 16-bit samples
///
/// Every read is a short snapshot taken under the source's own lock; no
/// method blocks for longer than that copy.
pub trait SampleSource: Send + Sync {
    /// Whether any samples have been written yet
    fn is_ready(&self) -> bool;

    /// Snapshot of the newest `window` samples of the main buffer plus one
    /// micro-chunk, with the chunk size taken in the same read
    fn current_buffer(&self, window: usize) -> BufferSnapshot;

    /// Copy of the pre-averaged trigger sweep (may be empty)
    fn trigger_buffer(&self) -> Vec<i16>;

    fn sample_rate_hz(&self) -> u32;

    /// Hand a new averaging threshold to the averaging stage
    ///
    /// Fire-and-forget: returns immediately.
    fn push_trigger_threshold(&self, amplitude: f32);

    /// Register a render session with the source
    fn bind(&self) -> Result<(), ScopeError> {
        Ok(())
    }

    /// Release a binding made by `bind()`
    fn unbind(&self) -> Result<(), ScopeError> {
        Ok(())
    }
}

/// Shared pointer to a sample source
pub type SharedSource = Arc<dyn SampleSource>;

/// Sample source backed by a live `SampleBuffer`
pub struct LiveSource {
    buffer: SampleBuffer,
    averager: TriggerAverager,
    sample_rate: u32,
    /// Chunk size to report before the first chunk arrives
    nominal_chunk: usize,
    bindings: AtomicUsize,
}

impl LiveSource {
    /// Create a source over `buffer` and start its averaging stage
    pub fn new(
        buffer: SampleBuffer,
        sample_rate: u32,
        nominal_chunk: usize,
        averager: AveragerConfig,
    ) -> Result<Self, ScopeError> {
        let averager = TriggerAverager::spawn(buffer.clone_ref(), averager)?;
        Ok(Self {
            buffer,
            averager,
            sample_rate,
            nominal_chunk,
            bindings: AtomicUsize::new(0),
        })
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Number of render sessions currently bound
    pub fn binding_count(&self) -> usize {
        self.bindings.load(Ordering::Relaxed)
    }
}

impl SampleSource for LiveSource {
    fn is_ready(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn current_buffer(&self, window: usize) -> BufferSnapshot {
        self.buffer.snapshot(window, self.nominal_chunk)
    }

    fn trigger_buffer(&self) -> Vec<i16> {
        self.averager.trigger_buffer()
    }

    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate
    }

    fn push_trigger_threshold(&self, amplitude: f32) {
        self.averager.push_threshold(amplitude);
    }

    fn bind(&self) -> Result<(), ScopeError> {
        let count = self.bindings.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!("Sample source bound ({} sessions)", count);
        Ok(())
    }

    fn unbind(&self) -> Result<(), ScopeError> {
        self.bindings
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .map(|previous| log::debug!("Sample source unbound ({} sessions)", previous - 1))
            .map_err(|_| ScopeError::NotBound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> LiveSource {
        LiveSource::new(SampleBuffer::new(1000), 44_100, 64, AveragerConfig::default()).unwrap()
    }

    #[test]
    fn test_ready_after_first_chunk() {
        let source = source();
        assert!(!source.is_ready());
        source.buffer().push_slice(&[1, 2, 3]);
        assert!(source.is_ready());
    }

    #[test]
    fn test_micro_chunk_falls_back_to_nominal() {
        let source = source();
        assert_eq!(source.current_buffer(10).micro_chunk, 64);
        source.buffer().push_slice(&[0; 100]);

        let snap = source.current_buffer(10);
        assert_eq!(snap.micro_chunk, 100);
        assert_eq!(snap.samples.len(), 100);
    }

    #[test]
    fn test_unbind_without_bind_fails() {
        let source = source();
        assert!(matches!(source.unbind(), Err(ScopeError::NotBound)));

        source.bind().unwrap();
        assert_eq!(source.binding_count(), 1);
        source.unbind().unwrap();
        assert_eq!(source.binding_count(), 0);
    }
}
