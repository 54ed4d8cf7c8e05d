//! Scope display widget
//!
//! Paints the last `Frame` presented by a render loop into an egui rect.
//!
//! ## Coordinate System
//!
//! Frame vertices are in sample/amplitude units. The frame's orthographic
//! projection maps them to the rect:
//! - X: `x_begin` = left edge, `x_end` = right edge
//! - Y: `y_begin` = bottom edge, `y_end` = top edge

use eframe::egui::{self, Color32, Pos2, Rect, Shape, Stroke, Vec2};

use super::surface::{Frame, LineStyle, PrimitiveKind};
use super::window::Projection;

/// Display settings for the scope widget
#[derive(Clone)]
pub struct OscilloscopeSettings {
    /// Background color
    pub background: Color32,

    /// Whether to show graticule (grid lines)
    pub show_graticule: bool,

    /// Vertical grid lines (time divisions)
    pub time_divisions: usize,

    /// Horizontal grid lines (amplitude divisions)
    pub amplitude_divisions: usize,
}

impl Default for OscilloscopeSettings {
    fn default() -> Self {
        Self {
            background: Color32::from_rgb(10, 20, 10),
            show_graticule: true,
            time_divisions: 3,
            amplitude_divisions: 4,
        }
    }
}

/// Scope widget
pub struct Oscilloscope {
    pub settings: OscilloscopeSettings,
}

impl Default for Oscilloscope {
    fn default() -> Self {
        Self::new()
    }
}

/// Egui color for a line style
pub fn style_color(style: &LineStyle) -> Color32 {
    let [r, g, b, a] = style.color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

/// Map a point in projection space to screen coordinates
///
/// Y is inverted (screen Y increases downward).
pub fn project_point(projection: &Projection, rect: Rect, x: f32, y: f32) -> Pos2 {
    let width = projection.x_end - projection.x_begin;
    let height = projection.y_end - projection.y_begin;
    let norm_x = if width != 0.0 { (x - projection.x_begin) / width } else { 0.0 };
    let norm_y = if height != 0.0 { (y - projection.y_begin) / height } else { 0.5 };

    Pos2::new(
        rect.left() + norm_x * rect.width(),
        rect.bottom() - norm_y * rect.height(),
    )
}

impl Oscilloscope {
    pub fn new() -> Self {
        Self {
            settings: OscilloscopeSettings::default(),
        }
    }

    pub fn with_settings(settings: OscilloscopeSettings) -> Self {
        Self { settings }
    }

    /// Draw the scope display
    ///
    /// # Arguments
    /// * `ui` - The egui UI context
    /// * `frame` - Last presented frame, if any
    /// * `size` - Desired widget size (or None for all available space)
    ///
    /// # Returns
    /// The response from the widget, sensing clicks and drags
    pub fn show(&mut self, ui: &mut egui::Ui, frame: Option<&Frame>, size: Option<Vec2>) -> egui::Response {
        let size = size.unwrap_or_else(|| ui.available_size());
        let (response, painter) = ui.allocate_painter(size, egui::Sense::click_and_drag());
        let rect = response.rect;

        painter.rect_filled(rect, 4.0, self.settings.background);

        if self.settings.show_graticule {
            self.draw_graticule(&painter, rect);
        }

        if let Some(frame) = frame {
            let clipped = painter.with_clip_rect(rect);
            draw_frame(&clipped, rect, frame);
        }

        response
    }

    fn draw_graticule(&self, painter: &egui::Painter, rect: Rect) {
        let grid_color = Color32::from_rgba_unmultiplied(60, 80, 60, 100);
        let axis_color = Color32::from_rgba_unmultiplied(80, 100, 80, 150);

        let stroke_grid = Stroke::new(0.5, grid_color);
        let stroke_axis = Stroke::new(1.0, axis_color);

        let columns = self.settings.time_divisions.max(1);
        for i in 0..=columns {
            let x = rect.left() + i as f32 / columns as f32 * rect.width();
            painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke_grid);
        }

        let rows = self.settings.amplitude_divisions.max(1);
        for i in 0..=rows {
            let y = rect.top() + i as f32 / rows as f32 * rect.height();
            let stroke = if i * 2 == rows { stroke_axis } else { stroke_grid };
            painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        }
    }
}

fn draw_frame(painter: &egui::Painter, rect: Rect, frame: &Frame) {
    let Some(projection) = frame.projection else {
        return;
    };

    for primitive in &frame.primitives {
        let stroke = Stroke::new(primitive.style.width, style_color(&primitive.style));
        let points: Vec<Pos2> = primitive
            .vertices
            .points()
            .map(|(x, y)| project_point(&projection, rect, x, y))
            .collect();

        match primitive.kind {
            PrimitiveKind::LineStrip if points.len() >= 2 => {
                painter.add(Shape::line(points, stroke));
            }
            PrimitiveKind::Lines => {
                for pair in points.chunks_exact(2) {
                    painter.line_segment([pair[0], pair[1]], stroke);
                }
            }
            _ => {}
        }
    }
}
