//! Trigger threshold control
//!
//! The threshold is held in view pixels, measured upward from the vertical
//! centre of the view, and converted to amplitude units each frame so it
//! follows changes of the vertical window and of the view size.

use super::vertices::VertexSet;
use super::window::ScopeWindow;

/// Multiplier applied to the displayed threshold before it reaches the
/// averaging stage
pub const AVERAGER_THRESHOLD_GAIN: f32 = 2.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TriggerPhase {
    #[default]
    Idle,
    Armed,
    Dragging,
}

/// Threshold state and pointer handling for the trigger view
#[derive(Clone, Copy, Debug, Default)]
pub struct TriggerController {
    phase: TriggerPhase,
    pixel_height: f32,
}

/// Convert a pixel height to amplitude units
pub fn pixel_to_amplitude(pixel_height: f32, view_height: f32, vertical_window: i32) -> f32 {
    if view_height <= 0.0 {
        return 0.0;
    }
    pixel_height / view_height * vertical_window as f32
}

/// Convert an amplitude to a pixel height
pub fn amplitude_to_pixel(amplitude: f32, view_height: f32, vertical_window: i32) -> f32 {
    if vertical_window == 0 {
        return 0.0;
    }
    amplitude / vertical_window as f32 * view_height
}

impl TriggerController {
    pub fn phase(&self) -> TriggerPhase {
        self.phase
    }

    pub fn pixel_height(&self) -> f32 {
        self.pixel_height
    }

    /// Enter the trigger view with the threshold at a quarter of the
    /// vertical window
    pub fn activate(&mut self, window: &ScopeWindow, view_height: f32) {
        let default = (window.vertical() / 4) as f32;
        self.pixel_height = amplitude_to_pixel(default, view_height, window.vertical());
        self.phase = TriggerPhase::Armed;
        log::debug!("Trigger armed, threshold {:.1}px", self.pixel_height);
    }

    pub fn deactivate(&mut self) {
        self.phase = TriggerPhase::Idle;
    }

    pub fn pointer_down(&mut self) {
        if self.phase == TriggerPhase::Armed {
            self.phase = TriggerPhase::Dragging;
        }
    }

    /// Move the threshold to the pointer while dragging
    ///
    /// `pointer_y` is in view coordinates (0 at the top). The threshold is
    /// kept inside the view.
    pub fn pointer_move(&mut self, pointer_y: f32, view_height: f32) {
        if self.phase == TriggerPhase::Dragging {
            self.pixel_height = clamp_to_view(view_height / 2.0 - pointer_y, view_height);
        }
    }

    pub fn pointer_up(&mut self) {
        if self.phase == TriggerPhase::Dragging {
            self.phase = TriggerPhase::Armed;
        }
    }

    /// Apply an out-of-band threshold event
    ///
    /// The event carries a view y coordinate; the threshold moves there
    /// whether or not a drag is in progress.
    pub fn adjust_threshold(&mut self, delta_pixels: f32, view_height: f32) {
        if self.phase != TriggerPhase::Idle {
            self.pixel_height = clamp_to_view(view_height / 2.0 - delta_pixels, view_height);
        }
    }

    /// Threshold in amplitude units for the current window and view
    pub fn amplitude(&self, window: &ScopeWindow, view_height: f32) -> f32 {
        pixel_to_amplitude(self.pixel_height, view_height, window.vertical())
    }

    /// Threshold in view coordinates (0 at the top)
    pub fn view_y(&self, view_height: f32) -> f32 {
        view_height / 2.0 - self.pixel_height
    }
}

fn clamp_to_view(pixel_height: f32, view_height: f32) -> f32 {
    let half = (view_height / 2.0).max(0.0);
    pixel_height.clamp(-half, half)
}

/// Horizontal overlay line at `amplitude` from 0 to `length`
pub fn threshold_line(amplitude: f32, length: f32) -> VertexSet {
    VertexSet::from_points(&[(0.0, amplitude), (length, amplitude)])
}
