//! Sample buffer for sharing captured audio between threads
//!
//! The capture thread appends mono 16-bit chunks; the render thread and the
//! trigger averager read copies of the newest samples.
//!
//! ## Design Notes
//!
//! The buffer only grows while a session is active. A retention cap keeps
//! memory bounded: once the cap is reached, every append discards the same
//! number of the oldest samples, so the length stays constant and never
//! shrinks. Every read copies what it needs while the lock is held and
//! returns, so no caller ever renders while holding the lock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// A consistent copy of the newest part of the buffer
///
/// `len` and `last_write` were read under the same lock as `samples`, so
/// window computations built on one snapshot never mix two writes.
#[derive(Clone, Debug, Default)]
pub struct BufferSnapshot {
    /// Copied tail of the buffer, oldest first
    pub samples: Vec<i16>,
    /// Index of `samples[0]` within the whole buffer
    pub offset: usize,
    /// Length of the whole buffer at snapshot time
    pub len: usize,
    /// When the producer last appended
    pub last_write: Option<Instant>,
    /// Size of the newest chunk at snapshot time
    pub micro_chunk: usize,
}

impl BufferSnapshot {
    /// Snapshot that carries only samples, with no buffer history around them
    pub fn from_samples(samples: Vec<i16>) -> Self {
        let len = samples.len();
        Self {
            samples,
            offset: 0,
            len,
            last_write: None,
            micro_chunk: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0 || self.samples.is_empty()
    }
}

/// Thread-safe growing buffer of mono PCM samples
///
/// - Producer (capture thread): calls `push_slice()` once per chunk
/// - Consumers (render thread, averager): call `snapshot()` / `read_since()`
pub struct SampleBuffer {
    inner: Arc<Mutex<BufferInner>>,
}

struct BufferInner {
    samples: VecDeque<i16>,
    /// Maximum number of samples kept
    retention: usize,
    /// Samples appended since creation, including discarded ones
    total_written: u64,
    /// Size of the most recent chunk
    last_chunk: usize,
    last_write: Option<Instant>,
}

impl SampleBuffer {
    /// Create a buffer that keeps at most `retention` samples
    pub fn new(retention: usize) -> Self {
        let retention = retention.max(1);
        Self {
            inner: Arc::new(Mutex::new(BufferInner {
                samples: VecDeque::with_capacity(retention.min(1 << 20)),
                retention,
                total_written: 0,
                last_chunk: 0,
                last_write: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a chunk of samples
    ///
    /// Called from the capture thread. Uses `try_lock()` so the audio
    /// callback never waits on a reader; a contended chunk is dropped.
    ///
    /// # Returns
    /// `true` if the chunk was appended
    pub fn push_slice(&self, chunk: &[i16]) -> bool {
        self.push_slice_at(chunk, Instant::now())
    }

    /// Append a chunk with an explicit write time
    pub fn push_slice_at(&self, chunk: &[i16], at: Instant) -> bool {
        let mut inner = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(std::sync::TryLockError::WouldBlock) => return false,
        };

        inner.samples.extend(chunk.iter().copied());
        let excess = inner.samples.len().saturating_sub(inner.retention);
        if excess > 0 {
            inner.samples.drain(..excess);
        }
        inner.total_written += chunk.len() as u64;
        inner.last_chunk = chunk.len();
        inner.last_write = Some(at);
        true
    }

    /// Copy the newest `window` samples plus one micro-chunk
    ///
    /// Length, last write time and chunk size are read under the same lock
    /// as the samples. `fallback_chunk` stands in for the chunk size until
    /// the first chunk arrives.
    pub fn snapshot(&self, window: usize, fallback_chunk: usize) -> BufferSnapshot {
        let inner = self.lock();
        let micro_chunk = match inner.last_chunk {
            0 => fallback_chunk,
            n => n,
        };
        let len = inner.samples.len();
        let offset = len.saturating_sub(window + micro_chunk);
        BufferSnapshot {
            samples: inner.samples.range(offset..).copied().collect(),
            offset,
            len,
            last_write: inner.last_write,
            micro_chunk,
        }
    }

    /// Keep at most `retention` samples from now on
    ///
    /// A smaller cap discards the oldest samples right away.
    pub fn set_retention(&self, retention: usize) {
        let mut inner = self.lock();
        inner.retention = retention.max(1);
        let excess = inner.samples.len().saturating_sub(inner.retention);
        if excess > 0 {
            inner.samples.drain(..excess);
        }
    }

    /// Copy every sample written at or after the absolute position `from`
    ///
    /// Positions count every sample ever appended. If some of the requested
    /// samples were already discarded, the copy starts at the oldest kept one.
    ///
    /// # Returns
    /// The absolute position of the first returned sample, and the samples
    pub fn read_since(&self, from: u64) -> (u64, Vec<i16>) {
        let inner = self.lock();
        let oldest = inner.total_written - inner.samples.len() as u64;
        let start = from.clamp(oldest, inner.total_written);
        let skip = (start - oldest) as usize;
        (start, inner.samples.range(skip..).copied().collect())
    }

    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().samples.is_empty()
    }

    /// Total number of samples appended since creation
    pub fn total_written(&self) -> u64 {
        self.lock().total_written
    }

    /// Clone the Arc to share with another thread
    pub fn clone_ref(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Clone for SampleBuffer {
    fn clone(&self) -> Self {
        self.clone_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_snapshot() {
        let buffer = SampleBuffer::new(100);
        assert!(buffer.push_slice(&[1, 2, 3]));
        assert!(buffer.push_slice(&[4, 5]));

        // one sample of window plus the last chunk of two
        let snap = buffer.snapshot(1, 0);
        assert_eq!(snap.len, 5);
        assert_eq!(snap.offset, 2);
        assert_eq!(snap.samples, vec![3, 4, 5]);
        assert_eq!(snap.micro_chunk, 2);
        assert!(snap.last_write.is_some());
    }

    #[test]
    fn test_snapshot_larger_than_buffer() {
        let buffer = SampleBuffer::new(100);
        buffer.push_slice(&[7, 8]);

        let snap = buffer.snapshot(50, 0);
        assert_eq!(snap.offset, 0);
        assert_eq!(snap.samples, vec![7, 8]);
    }

    #[test]
    fn test_retention_keeps_length_constant() {
        let buffer = SampleBuffer::new(4);
        buffer.push_slice(&[1, 2, 3]);
        buffer.push_slice(&[4, 5, 6]);
        assert_eq!(buffer.len(), 4);

        buffer.push_slice(&[7]);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.snapshot(3, 0).samples, vec![4, 5, 6, 7]);
        assert_eq!(buffer.total_written(), 7);
    }

    #[test]
    fn test_read_since_skips_discarded() {
        let buffer = SampleBuffer::new(4);
        buffer.push_slice(&[1, 2, 3, 4, 5, 6]);

        let (start, samples) = buffer.read_since(0);
        assert_eq!(start, 2);
        assert_eq!(samples, vec![3, 4, 5, 6]);

        let (start, samples) = buffer.read_since(5);
        assert_eq!(start, 5);
        assert_eq!(samples, vec![6]);

        let (start, samples) = buffer.read_since(6);
        assert_eq!(start, 6);
        assert!(samples.is_empty());
    }

    #[test]
    fn test_empty_snapshot() {
        let buffer = SampleBuffer::new(16);
        let snap = buffer.snapshot(8, 64);
        assert!(snap.is_empty());
        assert!(snap.last_write.is_none());
        assert_eq!(snap.micro_chunk, 64);
    }

    #[test]
    fn test_shrinking_retention_discards_oldest() {
        let buffer = SampleBuffer::new(100);
        buffer.push_slice(&[1, 2, 3, 4, 5, 6]);
        buffer.set_retention(4);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.snapshot(0, 4).samples, vec![3, 4, 5, 6]);

        buffer.push_slice(&[7]);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.total_written(), 7);
    }
}
