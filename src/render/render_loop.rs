//! Render loop - one thread per active view
//!
//! `RenderLoop` runs the shared skeleton (start, paced frames, teardown) and
//! delegates everything mode-specific to its `RenderMode`.
//!
//! Lifecycle: `Starting -> Running -> Stopping -> Stopped`. Teardown runs
//! every step once a start was attempted, whichever way the loop exits; a
//! failing step is logged and the remaining steps still run. `Drop` runs it
//! too, so a panic on the render thread still releases the source and the
//! listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::autoscale::{AutoScaler, DEFAULT_MINIMUM_DETECTED_PCM, DEFAULT_SETTLE_TIME};
use super::modes::{Cadence, FrameContext, RenderMode};
use super::surface::{DrawSurface, LineStyle};
use super::vertices::{placeholder, WaveformBufferBuilder};
use super::window::{HorizontalRange, Projection, ScopeWindow};
use crate::audio::SharedSource;
use crate::error::ScopeError;
use crate::events::{millivolts_label, milliseconds_label, EventBus, ScopeEvent};
use crate::session::Session;

/// Default time budget of one frame
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(20);

/// Pause before polling a source that has no samples yet
const NOT_READY_BACKOFF: Duration = Duration::from_millis(1);

/// Tunables of a render loop
#[derive(Clone, Copy, Debug)]
pub struct LoopConfig {
    pub frame_interval: Duration,
    /// Visible window each new loop's session starts from
    pub window: ScopeWindow,
    pub minimum_detected_pcm: f32,
    pub autoscale_settle: Duration,
    /// Y multiplier for the trigger view waveform
    pub trigger_y_scale: f32,
    pub waveform_style: LineStyle,
    pub threshold_style: LineStyle,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
            window: ScopeWindow::default(),
            minimum_detected_pcm: DEFAULT_MINIMUM_DETECTED_PCM,
            autoscale_settle: DEFAULT_SETTLE_TIME,
            trigger_y_scale: 1.0,
            waveform_style: LineStyle::WAVEFORM,
            threshold_style: LineStyle::THRESHOLD,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// What one iteration did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Source has no samples yet, nothing presented
    NotReady,
    /// No samples to draw, an empty frame was presented
    Empty,
    Drawn,
}

/// Render loop for one view
///
/// Each loop owns a fresh `Session`; nothing a previous loop changed
/// carries over.
pub struct RenderLoop {
    source: SharedSource,
    surface: Box<dyn DrawSurface>,
    mode: Box<dyn RenderMode>,
    session: Session,
    events: Arc<EventBus>,
    config: LoopConfig,
    stop: Arc<AtomicBool>,
    state: LoopState,
    start_attempted: bool,
    surface_acquired: bool,
    source_bound: bool,
    scaler: AutoScaler,
    builder: WaveformBufferBuilder,
    last_labels: Option<(String, String)>,
    last_label_position: Option<f32>,
}

impl RenderLoop {
    pub fn new(
        source: SharedSource,
        surface: Box<dyn DrawSurface>,
        mode: Box<dyn RenderMode>,
        events: Arc<EventBus>,
        config: LoopConfig,
    ) -> Self {
        Self {
            source,
            surface,
            mode,
            session: Session::new(config.window),
            events,
            config,
            stop: Arc::new(AtomicBool::new(false)),
            state: LoopState::Starting,
            start_attempted: false,
            surface_acquired: false,
            source_bound: false,
            scaler: AutoScaler::new(config.minimum_detected_pcm, config.autoscale_settle),
            builder: WaveformBufferBuilder::new(config.trigger_y_scale),
            last_labels: None,
            last_label_position: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Flag that ends `run()` at the top of its next iteration
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Acquire the surface, bind the source and enter the mode
    ///
    /// On error the loop stays in `Starting`; `teardown()` (or drop) undoes
    /// whatever part succeeded.
    pub fn start(&mut self) -> Result<(), ScopeError> {
        self.start_attempted = true;

        self.surface.acquire()?;
        self.surface_acquired = true;

        self.source.bind()?;
        self.source_bound = true;

        self.mode.start(&self.session, &self.events)?;

        self.state = LoopState::Running;
        log::info!("Render loop running ({})", self.mode.name());
        Ok(())
    }

    /// Draw and present one frame
    pub fn run_frame(&mut self) -> FrameOutcome {
        self.run_frame_at(Instant::now())
    }

    /// Draw and present one frame as seen at `now`
    pub fn run_frame_at(&mut self, now: Instant) -> FrameOutcome {
        if !self.source.is_ready() {
            log::trace!("Sample source not ready, skipping frame");
            return FrameOutcome::NotReady;
        }

        // one state copy and one snapshot per frame; everything below
        // derives from these two
        let mut state = self.session.begin_frame();
        let snapshot = self
            .mode
            .read_samples(self.source.as_ref(), state.window.horizontal());
        self.session.record_buffer_len(snapshot.len);
        state.window.fit_to_buffer(snapshot.len);
        let (width, height) = state.view;

        self.surface.clear();
        self.surface.set_viewport(width, height);

        if snapshot.is_empty() {
            let range = HorizontalRange {
                begin: 0,
                end: state.window.horizontal() as i64,
            };
            self.surface
                .set_orthographic_projection(Projection::new(range, &state.window));
            if self.mode.draws_placeholder() {
                self.surface.set_line_style(self.config.waveform_style);
                self.surface.draw_line_strip(&placeholder());
            }
            self.mode
                .draw_overlay(&state, None, self.surface.as_mut(), self.source.as_ref());
            self.surface.present();
            return FrameOutcome::Empty;
        }

        let ctx = FrameContext {
            state: &state,
            snapshot: &snapshot,
            window: state.window.effective_horizontal(snapshot.len),
            micro_chunk: snapshot.micro_chunk,
            sample_rate: self.source.sample_rate_hz(),
            now,
        };

        self.publish_labels(&ctx);

        if let Some(size) = self.scaler.observe(&snapshot.samples, now) {
            if !self.session.resize_vertical(size) {
                log::debug!("Auto-scale size {} out of range, keeping window", size);
            }
        }

        let range = self.mode.compute_window(&ctx);
        self.surface
            .set_orthographic_projection(Projection::new(range, &state.window));

        let vertices = self.mode.build_vertices(&ctx, &self.builder);
        self.surface.set_line_style(self.config.waveform_style);
        self.surface.draw_line_strip(&vertices);

        self.mode
            .draw_overlay(&state, Some(&ctx), self.surface.as_mut(), self.source.as_ref());
        self.surface.present();
        FrameOutcome::Drawn
    }

    fn publish_labels(&mut self, ctx: &FrameContext) {
        let labels = (
            milliseconds_label(ctx.window),
            millivolts_label(self.mode.label_amplitude(ctx.state)),
        );
        if self.last_labels.as_ref() != Some(&labels) {
            self.events.emit(ScopeEvent::Labels {
                milliseconds: labels.0.clone(),
                millivolts: labels.1.clone(),
            });
            self.last_labels = Some(labels);
        }

        let position = self.mode.label_position(ctx.state);
        if position.is_some() && position != self.last_label_position {
            if let Some(y) = position {
                self.events.emit(ScopeEvent::MillivoltLabelPosition(y));
            }
            self.last_label_position = position;
        }
    }

    /// Start, draw frames until the stop flag is set, then tear down
    pub fn run(mut self) {
        if let Err(e) = self.start() {
            log::error!("Render loop failed to start: {}", e);
            self.teardown();
            return;
        }

        let cadence = self.mode.cadence(self.config.frame_interval);
        while !self.stop.load(Ordering::Acquire) {
            let began = Instant::now();
            match (self.run_frame_at(began), cadence) {
                (FrameOutcome::NotReady, _) => thread::sleep(NOT_READY_BACKOFF),
                (_, Cadence::Budget(budget)) => {
                    let remaining = budget.saturating_sub(began.elapsed());
                    if !remaining.is_zero() {
                        thread::sleep(remaining);
                    }
                }
                (_, Cadence::Yield(pause)) => thread::sleep(pause),
            }
        }

        self.teardown();
    }

    /// Leave the mode, unbind the source and release the surface
    ///
    /// Every step runs even if an earlier one fails. Calling this again
    /// after it completed does nothing.
    pub fn teardown(&mut self) {
        if !self.start_attempted || self.state == LoopState::Stopped {
            return;
        }
        self.state = LoopState::Stopping;
        log::debug!("Render loop stopping ({})", self.mode.name());

        if let Err(e) = self.mode.stop(&self.session, &self.events) {
            log::warn!("Teardown: leaving {} mode: {}", self.mode.name(), e);
        }

        if self.source_bound {
            self.source_bound = false;
            if let Err(e) = self.source.unbind() {
                log::warn!("Teardown: unbinding sample source: {}", e);
            }
        }

        if self.surface_acquired {
            self.surface_acquired = false;
            self.surface.release();
        }

        self.state = LoopState::Stopped;
        log::info!("Render loop stopped ({})", self.mode.name());
    }

    /// Run the loop on its own thread
    pub fn spawn(self) -> Result<RenderHandle, ScopeError> {
        let stop = self.stop_flag();
        let session = self.session.clone();
        let name = format!("render-{}", self.mode.name());
        let thread = thread::Builder::new().name(name).spawn(move || self.run())?;

        Ok(RenderHandle {
            stop,
            session,
            thread: Some(thread),
        })
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Owner side of a spawned render loop
pub struct RenderHandle {
    stop: Arc<AtomicBool>,
    session: Session,
    thread: Option<JoinHandle<()>>,
}

impl RenderHandle {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Ask the loop to stop after its current iteration
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stop the loop and wait for its teardown
    ///
    /// # Returns
    /// `false` if the render thread panicked
    pub fn join(&mut self) -> bool {
        self.request_stop();
        match self.thread.take() {
            Some(thread) => match thread.join() {
                Ok(()) => true,
                Err(_) => {
                    log::error!("Render thread panicked");
                    false
                }
            },
            None => true,
        }
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        self.join();
    }
}
