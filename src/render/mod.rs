//! Render module - everything between the sample source and the screen
//!
//! This module provides:
//! - Window manager (visible extents and resize policy)
//! - One-shot vertical auto-scaling
//! - Waveform vertex building
//! - Trigger threshold control
//! - Draw surface abstraction and frame recording
//! - The render loop and its two modes
//! - The egui scope widget painting recorded frames

mod autoscale;
mod modes;
mod oscilloscope;
mod render_loop;
mod surface;
mod trigger;
mod vertices;
mod window;

pub use autoscale::{AutoScaler, DEFAULT_MINIMUM_DETECTED_PCM, DEFAULT_SETTLE_TIME};
pub use modes::{Cadence, FrameContext, FreeRunning, RenderMode, RenderModeKind, Triggered};
pub use oscilloscope::{Oscilloscope, OscilloscopeSettings};
pub use render_loop::{FrameOutcome, LoopConfig, LoopState, RenderHandle, RenderLoop, DEFAULT_FRAME_INTERVAL};
pub use surface::{DrawSurface, Frame, FrameRecorder, FrameSlot, LineStyle, Primitive, PrimitiveKind};
pub use trigger::{
    amplitude_to_pixel, pixel_to_amplitude, threshold_line, TriggerController, TriggerPhase,
    AVERAGER_THRESHOLD_GAIN,
};
pub use vertices::{placeholder, VertexSet, WaveformBufferBuilder};
pub use window::{
    centered_range, trailing_range, HorizontalRange, Projection, ScopeWindow, DEFAULT_HORIZONTAL_WINDOW,
    DEFAULT_VERTICAL_WINDOW, MAX_VERTICAL_WINDOW, MIN_HORIZONTAL_WINDOW, MIN_VERTICAL_WINDOW,
    PCM_MAXIMUM_VALUE,
};
