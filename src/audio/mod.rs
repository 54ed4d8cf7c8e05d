//! Audio module - sample capture, buffering and trigger averaging
//!
//! This module provides:
//! - Growing sample buffer shared between the capture and render threads
//! - The `SampleSource` contract and its live implementation
//! - Trigger averaging stage fed by the render thread's threshold
//! - cpal input capture and a synthetic test signal

mod buffer;
mod capture;
mod source;
mod synth;
mod trigger;

pub use buffer::{BufferSnapshot, SampleBuffer};
pub use capture::Capture;
pub use source::{LiveSource, SampleSource, SharedSource};
pub use synth::{SignalGenerator, SignalShape, SyntheticInput};
pub use trigger::{AveragerConfig, SweepAverager, TriggerAverager};
