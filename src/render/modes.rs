//! Render modes - what differs between the free-running and trigger views
//!
//! The render loop owns the shared skeleton (lifecycle, cadence, surface
//! calls). A `RenderMode` decides which buffer is read, where the window
//! sits, how vertices are laid out and what is drawn on top.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::surface::{DrawSurface, LineStyle};
use super::trigger::{threshold_line, AVERAGER_THRESHOLD_GAIN};
use super::vertices::{VertexSet, WaveformBufferBuilder};
use super::window::{centered_range, trailing_range, HorizontalRange};
use crate::audio::{BufferSnapshot, SampleSource};
use crate::error::ScopeError;
use crate::events::{EventBus, ListenerId, ScopeEvent};
use crate::session::{FrameState, Session};

/// Frame pacing of a mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cadence {
    /// Each iteration fills up to this budget, then sleeps the rest
    Budget(Duration),
    /// Sleep this long after every presented frame
    Yield(Duration),
}

/// Everything a mode sees while drawing one frame
pub struct FrameContext<'a> {
    pub state: &'a FrameState,
    pub snapshot: &'a BufferSnapshot,
    /// Horizontal window clamped to the snapshot
    pub window: usize,
    /// Chunk size read together with the snapshot
    pub micro_chunk: usize,
    pub sample_rate: u32,
    pub now: Instant,
}

/// Mode-specific parts of the render loop
pub trait RenderMode: Send {
    fn name(&self) -> &'static str;

    fn cadence(&self, frame_interval: Duration) -> Cadence;

    /// Called once before the first frame
    fn start(&mut self, _session: &Session, _events: &EventBus) -> Result<(), ScopeError> {
        Ok(())
    }

    /// Called once after the last frame, also after a failed start
    fn stop(&mut self, _session: &Session, _events: &EventBus) -> Result<(), ScopeError> {
        Ok(())
    }

    /// Take this frame's samples from the source for a `window` wide view
    fn read_samples(&self, source: &dyn SampleSource, window: usize) -> BufferSnapshot;

    /// Visible horizontal range for a non-empty frame
    fn compute_window(&self, ctx: &FrameContext) -> HorizontalRange;

    fn build_vertices(&self, ctx: &FrameContext, builder: &WaveformBufferBuilder) -> VertexSet;

    /// Whether an empty frame shows the flat placeholder line
    fn draws_placeholder(&self) -> bool {
        true
    }

    /// Amplitude the millivolt label describes
    fn label_amplitude(&self, state: &FrameState) -> f32 {
        state.window.vertical() as f32
    }

    /// Where the millivolt label belongs, in view pixels from the top
    fn label_position(&self, _state: &FrameState) -> Option<f32> {
        None
    }

    /// Draw on top of the waveform; `ctx` is `None` for an empty frame
    fn draw_overlay(
        &mut self,
        _state: &FrameState,
        _ctx: Option<&FrameContext>,
        _surface: &mut dyn DrawSurface,
        _source: &dyn SampleSource,
    ) {
    }
}

/// Which mode a session runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderModeKind {
    #[default]
    FreeRunning,
    Trigger,
}

impl RenderModeKind {
    pub fn name(&self) -> &'static str {
        match self {
            RenderModeKind::FreeRunning => "Free running",
            RenderModeKind::Trigger => "Trigger",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            RenderModeKind::FreeRunning => RenderModeKind::Trigger,
            RenderModeKind::Trigger => RenderModeKind::FreeRunning,
        }
    }

    pub fn build(&self, threshold_style: LineStyle) -> Box<dyn RenderMode> {
        match self {
            RenderModeKind::FreeRunning => Box::new(FreeRunning),
            RenderModeKind::Trigger => Box::new(Triggered::new(threshold_style)),
        }
    }
}

/// Scrolling view of the newest samples
#[derive(Clone, Copy, Debug, Default)]
pub struct FreeRunning;

impl RenderMode for FreeRunning {
    fn name(&self) -> &'static str {
        "free-running"
    }

    fn cadence(&self, frame_interval: Duration) -> Cadence {
        Cadence::Budget(frame_interval)
    }

    fn read_samples(&self, source: &dyn SampleSource, window: usize) -> BufferSnapshot {
        source.current_buffer(window)
    }

    fn compute_window(&self, ctx: &FrameContext) -> HorizontalRange {
        let since_write = ctx
            .snapshot
            .last_write
            .map(|at| ctx.now.saturating_duration_since(at))
            .unwrap_or(Duration::ZERO);
        trailing_range(
            ctx.snapshot.len,
            ctx.window,
            ctx.micro_chunk,
            since_write,
            ctx.sample_rate,
        )
    }

    fn build_vertices(&self, ctx: &FrameContext, builder: &WaveformBufferBuilder) -> VertexSet {
        builder.trailing(ctx.snapshot, ctx.window, ctx.micro_chunk)
    }
}

/// Averaged sweeps around threshold crossings, with a draggable threshold
pub struct Triggered {
    style: LineStyle,
    listener: Option<ListenerId>,
}

impl Triggered {
    pub fn new(style: LineStyle) -> Self {
        Self {
            style,
            listener: None,
        }
    }
}

impl RenderMode for Triggered {
    fn name(&self) -> &'static str {
        "trigger"
    }

    fn cadence(&self, frame_interval: Duration) -> Cadence {
        Cadence::Yield(frame_interval)
    }

    fn start(&mut self, session: &Session, events: &EventBus) -> Result<(), ScopeError> {
        self.listener = Some(events.register_threshold_listener(session.clone()));
        events.emit(ScopeEvent::TriggerMode(true));
        session.activate_trigger();
        Ok(())
    }

    fn stop(&mut self, session: &Session, events: &EventBus) -> Result<(), ScopeError> {
        session.deactivate_trigger();
        let id = self.listener.take().ok_or(ScopeError::ListenerNotRegistered)?;
        events.emit(ScopeEvent::TriggerMode(false));
        events.unregister_threshold_listener(id)
    }

    fn read_samples(&self, source: &dyn SampleSource, _window: usize) -> BufferSnapshot {
        BufferSnapshot::from_samples(source.trigger_buffer())
    }

    fn compute_window(&self, ctx: &FrameContext) -> HorizontalRange {
        centered_range(ctx.snapshot.len, ctx.window)
    }

    fn build_vertices(&self, ctx: &FrameContext, builder: &WaveformBufferBuilder) -> VertexSet {
        builder.fitted(&ctx.snapshot.samples, ctx.snapshot.samples.len() as f32)
    }

    fn draws_placeholder(&self) -> bool {
        false
    }

    fn label_amplitude(&self, state: &FrameState) -> f32 {
        state.trigger.amplitude(&state.window, state.view.1)
    }

    fn label_position(&self, state: &FrameState) -> Option<f32> {
        Some(state.trigger.view_y(state.view.1))
    }

    fn draw_overlay(
        &mut self,
        state: &FrameState,
        ctx: Option<&FrameContext>,
        surface: &mut dyn DrawSurface,
        source: &dyn SampleSource,
    ) {
        let amplitude = state.trigger.amplitude(&state.window, state.view.1);
        let length = match ctx {
            Some(ctx) => ctx.snapshot.samples.len(),
            None => state.window.horizontal(),
        };

        surface.set_line_style(self.style);
        surface.draw_lines(&threshold_line(amplitude, length as f32));
        source.push_trigger_threshold(amplitude * AVERAGER_THRESHOLD_GAIN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ScopeWindow;

    #[test]
    fn test_mode_kind_toggle() {
        assert_eq!(RenderModeKind::default(), RenderModeKind::FreeRunning);
        assert_eq!(RenderModeKind::FreeRunning.toggled(), RenderModeKind::Trigger);
        assert_eq!(RenderModeKind::Trigger.toggled(), RenderModeKind::FreeRunning);
        assert_eq!(RenderModeKind::Trigger.build(LineStyle::THRESHOLD).name(), "trigger");
    }

    #[test]
    fn test_cadence_per_mode() {
        let interval = Duration::from_millis(20);
        assert_eq!(FreeRunning.cadence(interval), Cadence::Budget(interval));
        let triggered = Triggered::new(LineStyle::THRESHOLD);
        assert_eq!(triggered.cadence(interval), Cadence::Yield(interval));
    }

    #[test]
    fn test_trigger_stop_without_start() {
        let session = Session::new(ScopeWindow::default());
        let events = EventBus::new();
        let rx = events.subscribe();

        let mut mode = Triggered::new(LineStyle::THRESHOLD);
        assert!(matches!(
            mode.stop(&session, &events),
            Err(ScopeError::ListenerNotRegistered)
        ));
        // nothing was announced, so nothing is retracted
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_trigger_start_stop() {
        let session = Session::new(ScopeWindow::default());
        session.set_view_size(800.0, 400.0);
        let events = EventBus::new();
        let rx = events.subscribe();

        let mut mode = Triggered::new(LineStyle::THRESHOLD);
        mode.start(&session, &events).unwrap();
        assert_eq!(events.listener_count(), 1);
        assert_eq!(rx.try_recv().unwrap(), ScopeEvent::TriggerMode(true));

        mode.stop(&session, &events).unwrap();
        assert_eq!(events.listener_count(), 0);
        assert_eq!(rx.try_recv().unwrap(), ScopeEvent::TriggerMode(false));
    }
}
