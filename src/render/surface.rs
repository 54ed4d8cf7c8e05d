//! Draw surface abstraction
//!
//! The render loop only needs to clear, set up an orthographic projection,
//! draw line strips and line pairs, and present. `FrameRecorder` implements
//! this by recording every call into a `Frame` and publishing the frame on
//! `present()`, where the UI thread picks it up.

use std::sync::{Arc, Mutex, PoisonError};

use super::vertices::VertexSet;
use super::window::Projection;
use crate::error::ScopeError;

/// Line colour (RGBA, 0..1) and width in pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineStyle {
    pub color: [f32; 4],
    pub width: f32,
}

impl LineStyle {
    pub const WAVEFORM: LineStyle = LineStyle {
        color: [0.0, 1.0, 0.0, 1.0],
        width: 1.0,
    };

    pub const THRESHOLD: LineStyle = LineStyle {
        color: [1.0, 0.0, 0.0, 1.0],
        width: 1.0,
    };
}

impl Default for LineStyle {
    fn default() -> Self {
        Self::WAVEFORM
    }
}

/// Something the render loop can draw on
pub trait DrawSurface: Send {
    /// Take ownership of the underlying surface for a session
    fn acquire(&mut self) -> Result<(), ScopeError> {
        Ok(())
    }

    /// Give the surface back at the end of a session
    fn release(&mut self) {}

    fn clear(&mut self);
    fn set_viewport(&mut self, width: f32, height: f32);
    fn set_orthographic_projection(&mut self, projection: Projection);
    fn set_line_style(&mut self, style: LineStyle);
    fn draw_line_strip(&mut self, vertices: &VertexSet);
    fn draw_lines(&mut self, vertices: &VertexSet);
    fn present(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// Consecutive points joined
    LineStrip,
    /// Independent segments, two points each
    Lines,
}

/// One recorded draw call
#[derive(Clone, Debug)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub style: LineStyle,
    pub vertices: VertexSet,
}

/// Everything drawn between a `clear()` and a `present()`
#[derive(Clone, Debug, Default)]
pub struct Frame {
    pub viewport: (f32, f32),
    pub projection: Option<Projection>,
    pub primitives: Vec<Primitive>,
}

impl Frame {
    pub fn vertex_floats(&self) -> usize {
        self.primitives.iter().map(|p| p.vertices.float_count()).sum()
    }
}

/// Latest presented frame, shared with the consumer of the frames
#[derive(Clone, Default)]
pub struct FrameSlot {
    inner: Arc<Mutex<Option<Frame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, frame: Frame) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }

    /// Copy of the newest frame, if any was presented
    pub fn latest(&self) -> Option<Frame> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Surface that records draw calls into frames
pub struct FrameRecorder {
    slot: FrameSlot,
    current: Frame,
    style: LineStyle,
    presented: u64,
    on_present: Option<Box<dyn Fn() + Send>>,
}

impl FrameRecorder {
    pub fn new(slot: FrameSlot) -> Self {
        Self {
            slot,
            current: Frame::default(),
            style: LineStyle::default(),
            presented: 0,
            on_present: None,
        }
    }

    /// Run `callback` after every presented frame (e.g. to request a repaint)
    pub fn with_present_callback(mut self, callback: impl Fn() + Send + 'static) -> Self {
        self.on_present = Some(Box::new(callback));
        self
    }

    /// Number of frames presented so far
    pub fn presented(&self) -> u64 {
        self.presented
    }

    fn record(&mut self, kind: PrimitiveKind, vertices: &VertexSet) {
        self.current.primitives.push(Primitive {
            kind,
            style: self.style,
            vertices: vertices.clone(),
        });
    }
}

impl DrawSurface for FrameRecorder {
    fn clear(&mut self) {
        self.current.primitives.clear();
    }

    fn set_viewport(&mut self, width: f32, height: f32) {
        self.current.viewport = (width, height);
    }

    fn set_orthographic_projection(&mut self, projection: Projection) {
        self.current.projection = Some(projection);
    }

    fn set_line_style(&mut self, style: LineStyle) {
        self.style = style;
    }

    fn draw_line_strip(&mut self, vertices: &VertexSet) {
        self.record(PrimitiveKind::LineStrip, vertices);
    }

    fn draw_lines(&mut self, vertices: &VertexSet) {
        self.record(PrimitiveKind::Lines, vertices);
    }

    fn present(&mut self) {
        self.slot.publish(std::mem::take(&mut self.current));
        self.presented += 1;
        if let Some(callback) = &self.on_present {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_publishes_on_present() {
        let slot = FrameSlot::new();
        let mut recorder = FrameRecorder::new(slot.clone());
        assert!(slot.latest().is_none());

        recorder.clear();
        recorder.set_viewport(400.0, 300.0);
        recorder.set_line_style(LineStyle::THRESHOLD);
        recorder.draw_lines(&VertexSet::from_points(&[(0.0, 1.0), (5.0, 1.0)]));
        recorder.present();

        let frame = slot.latest().unwrap();
        assert_eq!(frame.viewport, (400.0, 300.0));
        assert_eq!(frame.primitives.len(), 1);
        assert_eq!(frame.primitives[0].kind, PrimitiveKind::Lines);
        assert_eq!(frame.primitives[0].style, LineStyle::THRESHOLD);
        assert_eq!(frame.vertex_floats(), 4);
        assert_eq!(recorder.presented(), 1);
    }

    #[test]
    fn test_clear_discards_unpresented_calls() {
        let slot = FrameSlot::new();
        let mut recorder = FrameRecorder::new(slot.clone());
        recorder.draw_line_strip(&VertexSet::from_points(&[(0.0, 0.0), (1.0, 1.0)]));
        recorder.clear();
        recorder.present();
        assert!(slot.latest().unwrap().primitives.is_empty());
    }
}
