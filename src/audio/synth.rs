//! Synthetic input - a test signal for running without a microphone
//!
//! Produces a slow sine baseline with a short spike every `spike_period`,
//! delivered in fixed chunks at real-time pace.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::buffer::SampleBuffer;
use crate::error::ScopeError;

/// Test signal parameters
#[derive(Clone, Debug)]
pub struct SignalShape {
    pub sample_rate: u32,
    pub chunk: usize,
    pub baseline_hz: f32,
    pub baseline_amplitude: f32,
    pub spike_period: Duration,
    pub spike_amplitude: f32,
}

impl Default for SignalShape {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            chunk: 441,
            baseline_hz: 3.0,
            baseline_amplitude: 600.0,
            spike_period: Duration::from_millis(250),
            spike_amplitude: 6000.0,
        }
    }
}

/// Sample generator for the synthetic signal
pub struct SignalGenerator {
    shape: SignalShape,
    position: u64,
}

impl SignalGenerator {
    pub fn new(shape: SignalShape) -> Self {
        Self { shape, position: 0 }
    }

    fn value_at(&self, n: u64) -> f32 {
        let rate = self.shape.sample_rate as f32;
        let t = n as f32 / rate;
        let baseline = self.shape.baseline_amplitude * (TAU * self.shape.baseline_hz * t).sin();

        let period = (self.shape.spike_period.as_secs_f32() * rate).max(1.0) as u64;
        // Biphasic spike about 2 ms long
        let since = (n % period) as f32 / rate * 1000.0;
        let spike = if since < 2.0 {
            self.shape.spike_amplitude * (since * std::f32::consts::PI).sin()
        } else {
            0.0
        };
        baseline + spike
    }

    /// Produce the next chunk
    pub fn next_chunk(&mut self) -> Vec<i16> {
        let chunk = (0..self.shape.chunk as u64)
            .map(|i| {
                let v = self.value_at(self.position + i);
                v.clamp(i16::MIN as f32, i16::MAX as f32) as i16
            })
            .collect();
        self.position += self.shape.chunk as u64;
        chunk
    }
}

/// Background thread writing the synthetic signal into a buffer
pub struct SyntheticInput {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    sample_rate: u32,
    chunk: usize,
}

impl SyntheticInput {
    pub fn start(buffer: SampleBuffer, shape: SignalShape) -> Result<Self, ScopeError> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let sample_rate = shape.sample_rate;
        let chunk = shape.chunk;
        let chunk_duration = Duration::from_secs_f64(chunk as f64 / sample_rate.max(1) as f64);

        let handle = thread::Builder::new()
            .name("synthetic-input".to_string())
            .spawn(move || {
                let mut generator = SignalGenerator::new(shape);
                let mut next = Instant::now();
                while !thread_stop.load(Ordering::Relaxed) {
                    buffer.push_slice(&generator.next_chunk());
                    next += chunk_duration;
                    if let Some(wait) = next.checked_duration_since(Instant::now()) {
                        thread::sleep(wait);
                    }
                }
            })?;

        log::info!("Synthetic input started at {} Hz", sample_rate);
        Ok(Self {
            stop,
            handle: Some(handle),
            sample_rate,
            chunk,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }
}

impl Drop for SyntheticInput {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_are_contiguous() {
        let mut generator = SignalGenerator::new(SignalShape::default());
        let first = generator.next_chunk();
        let second = generator.next_chunk();
        assert_eq!(first.len(), 441);
        assert_eq!(second.len(), 441);
        assert_eq!(generator.position, 882);
    }

    #[test]
    fn test_spike_exceeds_baseline() {
        let mut generator = SignalGenerator::new(SignalShape::default());
        let chunk = generator.next_chunk();
        let max = chunk.iter().copied().max().unwrap();
        assert!(max > 3000);
        // Past the spike only the baseline remains
        assert!(chunk[200..].iter().all(|s| s.abs() <= 600));
    }
}
