//! Shared per-session view state
//!
//! Window sizes, the trigger threshold and the view size are read by the
//! render thread and changed by the UI thread (zoom, drag, resize). All of
//! it lives in one `SessionState` behind one mutex, and every access goes
//! through `Session`. The render thread copies what it needs once per frame
//! in `begin_frame()` and renders from that copy; changes made while a frame
//! is in flight show up in the next one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::render::{ScopeWindow, TriggerController};

/// Everything a frame needs from the shared state
#[derive(Clone, Copy, Debug)]
pub struct FrameState {
    pub window: ScopeWindow,
    pub trigger: TriggerController,
    pub view: (f32, f32),
}

#[derive(Debug, Default)]
struct SessionState {
    window: ScopeWindow,
    trigger: TriggerController,
    view: (f32, f32),
    /// Buffer length seen by the last frame, bounds horizontal resizes
    known_buffer_len: usize,
}

/// Clonable handle to one session's guarded state
#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(window: ScopeWindow) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                window,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn window(&self) -> ScopeWindow {
        self.lock().window
    }

    pub fn trigger(&self) -> TriggerController {
        self.lock().trigger
    }

    pub fn view_size(&self) -> (f32, f32) {
        self.lock().view
    }

    pub fn set_view_size(&self, width: f32, height: f32) {
        self.lock().view = (width, height);
    }

    /// Request a horizontal window size; out-of-range requests are ignored
    pub fn resize_horizontal(&self, size: usize) -> bool {
        let mut state = self.lock();
        let len = state.known_buffer_len;
        state.window.set_horizontal(size, len)
    }

    /// Request a vertical window size; out-of-range requests are ignored
    pub fn resize_vertical(&self, size: i32) -> bool {
        self.lock().window.set_vertical(size)
    }

    /// Scale the horizontal window by `factor` (> 1 shows more samples)
    pub fn zoom_horizontal(&self, factor: f32) -> bool {
        let mut state = self.lock();
        let len = state.known_buffer_len;
        let size = (state.window.horizontal() as f32 * factor).round() as usize;
        state.window.set_horizontal(size, len)
    }

    /// Scale the vertical window by `factor` (> 1 shows a larger range)
    pub fn zoom_vertical(&self, factor: f32) -> bool {
        let mut state = self.lock();
        let size = (state.window.vertical() as f32 * factor).round() as i32;
        state.window.set_vertical(size)
    }

    /// Arm the trigger with its default threshold for the current view
    pub fn activate_trigger(&self) {
        let mut state = self.lock();
        let (window, height) = (state.window, state.view.1);
        state.trigger.activate(&window, height);
    }

    pub fn deactivate_trigger(&self) {
        self.lock().trigger.deactivate();
    }

    pub fn pointer_down(&self) {
        self.lock().trigger.pointer_down();
    }

    pub fn pointer_move(&self, pointer_y: f32) {
        let mut state = self.lock();
        let height = state.view.1;
        state.trigger.pointer_move(pointer_y, height);
    }

    pub fn pointer_up(&self) {
        self.lock().trigger.pointer_up();
    }

    /// Apply an out-of-band threshold event
    pub fn adjust_threshold(&self, delta_pixels: f32) {
        let mut state = self.lock();
        let height = state.view.1;
        state.trigger.adjust_threshold(delta_pixels, height);
    }

    /// Copy the state one frame renders from
    pub fn begin_frame(&self) -> FrameState {
        let state = self.lock();
        FrameState {
            window: state.window,
            trigger: state.trigger,
            view: state.view,
        }
    }

    /// Remember the buffer length a frame saw
    ///
    /// Bounds later horizontal resizes, and shrinks a horizontal window
    /// longer than the buffer.
    pub fn record_buffer_len(&self, buffer_len: usize) {
        let mut state = self.lock();
        state.known_buffer_len = buffer_len;
        state.window.fit_to_buffer(buffer_len);
    }
}
