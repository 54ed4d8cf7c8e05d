//! Trigger averaging stage
//!
//! Runs on its own thread next to the capture thread. It scans newly
//! captured samples for crossings of the current threshold, cuts a fixed
//! window centred on every crossing, and publishes the element-wise average
//! of the most recent sweeps as the trigger buffer.
//!
//! Threshold updates arrive from the render thread through a small bounded
//! queue. The render thread never waits for the averager: a full queue
//! overwrites its oldest entry, since only the newest threshold matters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;

use ringbuf::traits::{Consumer, RingBuffer};
use ringbuf::HeapRb;

use super::buffer::SampleBuffer;
use crate::error::ScopeError;

/// Averaging stage configuration
#[derive(Clone, Debug)]
pub struct AveragerConfig {
    /// Samples per sweep, centred on the crossing
    pub window: usize,
    /// Number of most recent sweeps that are averaged
    pub max_sweeps: usize,
    /// Capacity of the threshold queue
    pub queue_capacity: usize,
    /// How long the worker sleeps when nothing wakes it
    pub poll_interval: Duration,
}

impl Default for AveragerConfig {
    fn default() -> Self {
        Self {
            window: 4410, // 100 ms at 44.1 kHz
            max_sweeps: 30,
            queue_capacity: 8,
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Detects threshold crossings and averages the sweeps around them
///
/// This is the pure part of the averaging stage. It is fed with consecutive
/// runs of samples tagged with their absolute stream position.
pub struct SweepAverager {
    window: usize,
    max_sweeps: usize,
    threshold: Option<f32>,

    /// Recent samples, `history[0]` sits at `history_start`
    history: VecDeque<i16>,
    history_start: u64,
    previous: Option<i16>,

    /// Crossing positions still waiting for their post-trigger samples
    pending: VecDeque<u64>,
    last_trigger: Option<u64>,

    sweeps: VecDeque<Vec<i16>>,
    sums: Vec<i64>,
}

impl SweepAverager {
    pub fn new(window: usize, max_sweeps: usize) -> Self {
        let window = window.max(2);
        Self {
            window,
            max_sweeps: max_sweeps.max(1),
            threshold: None,
            history: VecDeque::with_capacity(window * 2),
            history_start: 0,
            previous: None,
            pending: VecDeque::new(),
            last_trigger: None,
            sweeps: VecDeque::new(),
            sums: vec![0; window],
        }
    }

    pub fn threshold(&self) -> Option<f32> {
        self.threshold
    }

    /// Change the threshold
    ///
    /// # Returns
    /// `true` if the value changed and the accumulated sweeps were dropped
    pub fn set_threshold(&mut self, threshold: f32) -> bool {
        if let Some(current) = self.threshold {
            if (current - threshold).abs() < f32::EPSILON {
                return false;
            }
        }
        log::debug!("Trigger threshold set to {:.1}", threshold);
        self.threshold = Some(threshold);
        self.clear_sweeps();
        true
    }

    fn clear_sweeps(&mut self) {
        self.pending.clear();
        self.last_trigger = None;
        self.sweeps.clear();
        self.sums.iter_mut().for_each(|s| *s = 0);
    }

    fn history_end(&self) -> u64 {
        self.history_start + self.history.len() as u64
    }

    fn is_crossing(&self, previous: i16, current: i16) -> bool {
        match self.threshold {
            Some(t) if t >= 0.0 => (previous as f32) < t && (current as f32) >= t,
            Some(t) => (previous as f32) > t && (current as f32) <= t,
            None => false,
        }
    }

    /// Feed samples starting at absolute position `start`
    ///
    /// # Returns
    /// `true` if at least one new sweep was completed
    pub fn feed(&mut self, start: u64, samples: &[i16]) -> bool {
        if samples.is_empty() {
            return false;
        }
        if start != self.history_end() {
            // Samples were lost between reads; crossings can't span the gap
            self.history.clear();
            self.history_start = start;
            self.previous = None;
            self.pending.clear();
        }

        let half = (self.window / 2) as u64;
        let mut completed = false;

        for (i, &sample) in samples.iter().enumerate() {
            let position = start + i as u64;
            self.history.push_back(sample);

            if let Some(previous) = self.previous {
                let held_off = self
                    .last_trigger
                    .is_some_and(|last| position < last + half);
                if !held_off && self.is_crossing(previous, sample) {
                    self.last_trigger = Some(position);
                    if position >= self.history_start + half {
                        self.pending.push_back(position);
                    }
                }
            }
            self.previous = Some(sample);

            while let Some(&crossing) = self.pending.front() {
                let begin = crossing - half;
                if self.history_end() < begin + self.window as u64 {
                    break;
                }
                self.pending.pop_front();
                self.collect_sweep(begin);
                completed = true;
            }
        }

        let keep = self.window * 2;
        let excess = self.history.len().saturating_sub(keep);
        if excess > 0 {
            self.history.drain(..excess);
            self.history_start += excess as u64;
        }
        completed
    }

    fn collect_sweep(&mut self, begin: u64) {
        let skip = (begin - self.history_start) as usize;
        let sweep: Vec<i16> = self.history.range(skip..skip + self.window).copied().collect();

        for (sum, &s) in self.sums.iter_mut().zip(&sweep) {
            *sum += s as i64;
        }
        self.sweeps.push_back(sweep);

        if self.sweeps.len() > self.max_sweeps {
            if let Some(oldest) = self.sweeps.pop_front() {
                for (sum, &s) in self.sums.iter_mut().zip(&oldest) {
                    *sum -= s as i64;
                }
            }
        }
    }

    pub fn sweep_count(&self) -> usize {
        self.sweeps.len()
    }

    /// Element-wise average of the collected sweeps (empty if none)
    pub fn average(&self) -> Vec<i16> {
        let count = self.sweeps.len() as i64;
        if count == 0 {
            return Vec::new();
        }
        self.sums.iter().map(|&sum| (sum / count) as i16).collect()
    }
}

/// Bounded threshold queue shared between the render thread and the worker
struct ThresholdQueue {
    ring: Mutex<HeapRb<f32>>,
}

impl ThresholdQueue {
    fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(HeapRb::new(capacity.max(1))),
        }
    }

    /// Push a value, overwriting the oldest one when full
    fn push(&self, value: f32) {
        let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dropped) = ring.push_overwrite(value) {
            log::trace!("Threshold queue full, dropped {:.1}", dropped);
        }
    }

    /// Drain the queue and return the newest value
    fn latest(&self) -> Option<f32> {
        let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        ring.pop_iter().last()
    }
}

/// Handle to the averaging stage worker thread
///
/// Dropping the handle stops and joins the worker.
pub struct TriggerAverager {
    output: Arc<Mutex<Vec<i16>>>,
    queue: Arc<ThresholdQueue>,
    worker: Thread,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TriggerAverager {
    /// Spawn the worker reading from `buffer`
    ///
    /// Only samples written after this call are scanned.
    pub fn spawn(buffer: SampleBuffer, config: AveragerConfig) -> Result<Self, ScopeError> {
        let output = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::new(ThresholdQueue::new(config.queue_capacity));
        let stop = Arc::new(AtomicBool::new(false));

        let worker_output = Arc::clone(&output);
        let worker_queue = Arc::clone(&queue);
        let worker_stop = Arc::clone(&stop);
        let start = buffer.total_written();

        let handle = thread::Builder::new()
            .name("trigger-averager".to_string())
            .spawn(move || {
                run_worker(buffer, start, config, worker_output, worker_queue, worker_stop);
            })?;

        Ok(Self {
            output,
            queue,
            worker: handle.thread().clone(),
            stop,
            handle: Some(handle),
        })
    }

    /// Hand a new threshold to the worker without waiting for it
    pub fn push_threshold(&self, threshold: f32) {
        self.queue.push(threshold);
        self.worker.unpark();
    }

    /// Copy of the current averaged sweep
    pub fn trigger_buffer(&self) -> Vec<i16> {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop the worker and wait for it to exit
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.worker.unpark();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Trigger averager thread panicked");
            }
        }
    }
}

impl Drop for TriggerAverager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    buffer: SampleBuffer,
    start: u64,
    config: AveragerConfig,
    output: Arc<Mutex<Vec<i16>>>,
    queue: Arc<ThresholdQueue>,
    stop: Arc<AtomicBool>,
) {
    log::debug!(
        "Trigger averager started (window {}, {} sweeps)",
        config.window,
        config.max_sweeps
    );
    let mut averager = SweepAverager::new(config.window, config.max_sweeps);
    let mut next = start;

    while !stop.load(Ordering::Relaxed) {
        let mut changed = false;
        if let Some(threshold) = queue.latest() {
            changed = averager.set_threshold(threshold);
        }

        let (start, samples) = buffer.read_since(next);
        next = start + samples.len() as u64;
        let completed = averager.feed(start, &samples);

        if changed || completed {
            let average = averager.average();
            *output.lock().unwrap_or_else(PoisonError::into_inner) = average;
        }

        thread::park_timeout(config.poll_interval);
    }
    log::debug!("Trigger averager stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A pulse train: zeros with a short spike every `period` samples
    fn pulses(count: usize, period: usize, height: i16) -> Vec<i16> {
        (0..count)
            .map(|i| match i % period {
                0 => height / 2,
                1 => height,
                2 => height / 2,
                _ => 0,
            })
            .collect()
    }

    #[test]
    fn test_no_threshold_no_sweeps() {
        let mut averager = SweepAverager::new(8, 4);
        assert!(!averager.feed(0, &pulses(100, 20, 1000)));
        assert!(averager.average().is_empty());
    }

    #[test]
    fn test_rising_crossings_are_averaged() {
        let mut averager = SweepAverager::new(8, 4);
        averager.set_threshold(800.0);

        assert!(averager.feed(0, &pulses(100, 20, 1000)));
        assert_eq!(averager.sweep_count(), 4);

        let average = averager.average();
        assert_eq!(average.len(), 8);
        // crossing sits at the centre of the window
        assert_eq!(average[4], 1000);
        assert_eq!(average[3], 500);
    }

    #[test]
    fn test_negative_threshold_uses_falling_edge() {
        let mut averager = SweepAverager::new(8, 10);
        averager.set_threshold(-800.0);
        assert!(averager.feed(0, &pulses(100, 20, -1000)));
        assert_eq!(averager.average()[4], -1000);
    }

    #[test]
    fn test_feed_across_calls() {
        let mut averager = SweepAverager::new(8, 10);
        averager.set_threshold(800.0);
        let signal = pulses(60, 20, 1000);

        // second crossing at 21 needs samples up to 25
        averager.feed(0, &signal[..23]);
        let before = averager.sweep_count();
        averager.feed(23, &signal[23..]);
        assert!(averager.sweep_count() > before);
    }

    #[test]
    fn test_threshold_change_resets() {
        let mut averager = SweepAverager::new(8, 10);
        averager.set_threshold(800.0);
        averager.feed(0, &pulses(100, 20, 1000));
        assert!(averager.sweep_count() > 0);

        assert!(!averager.set_threshold(800.0));
        assert!(averager.sweep_count() > 0);

        assert!(averager.set_threshold(200.0));
        assert_eq!(averager.sweep_count(), 0);
        assert!(averager.average().is_empty());
    }

    #[test]
    fn test_gap_drops_partial_state() {
        let mut averager = SweepAverager::new(8, 10);
        averager.set_threshold(800.0);
        averager.feed(0, &pulses(23, 20, 1000));
        let count = averager.sweep_count();

        // jump ahead: the pending crossing at 21 can't complete
        averager.feed(1000, &[0, 0, 0, 0, 0, 0]);
        assert_eq!(averager.sweep_count(), count);
    }

    #[test]
    fn test_max_sweeps_bounds_average() {
        let mut averager = SweepAverager::new(8, 2);
        averager.set_threshold(800.0);
        averager.feed(0, &pulses(200, 20, 1000));
        assert_eq!(averager.sweep_count(), 2);
    }

    #[test]
    fn test_queue_overwrites_oldest() {
        let queue = ThresholdQueue::new(2);
        queue.push(1.0);
        queue.push(2.0);
        queue.push(3.0);
        assert_eq!(queue.latest(), Some(3.0));
        assert_eq!(queue.latest(), None);
    }

    #[test]
    fn test_worker_publishes_average() {
        let buffer = SampleBuffer::new(10_000);
        let config = AveragerConfig {
            window: 8,
            max_sweeps: 4,
            queue_capacity: 4,
            poll_interval: Duration::from_millis(1),
        };
        let mut averager = TriggerAverager::spawn(buffer.clone_ref(), config).unwrap();
        averager.push_threshold(800.0);
        std::thread::sleep(Duration::from_millis(20));

        buffer.push_slice(&pulses(100, 20, 1000));

        let mut result = Vec::new();
        for _ in 0..200 {
            averager.push_threshold(800.0);
            result = averager.trigger_buffer();
            if !result.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        averager.shutdown();
        assert_eq!(result.len(), 8);
    }
}
