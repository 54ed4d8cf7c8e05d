//! tracescope - live audio oscilloscope
//!
//! Captures the default input device (or a synthetic test signal) and shows
//! it either as a scrolling trace or as an averaged trigger view.
//!
//! ## Controls
//! - Mode button switches between free-running and trigger view
//! - Scroll zooms the time axis, shift + scroll the amplitude axis
//! - In trigger view, drag (or click) to move the threshold

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use eframe::egui;

use tracescope::audio::{
    Capture, LiveSource, SampleBuffer, SharedSource, SignalShape, SyntheticInput,
};
use tracescope::render::{
    FrameRecorder, FrameSlot, Oscilloscope, OscilloscopeSettings, RenderHandle, RenderLoop, RenderModeKind,
    ScopeWindow,
};
use tracescope::settings::{AppSettings, InputSelection};
use tracescope::{EventBus, ScopeError, ScopeEvent, Session};

/// Zoom step per scroll notch
const ZOOM_STEP: f32 = 1.1;

fn main() -> eframe::Result<()> {
    env_logger::init();
    log::info!("Starting tracescope");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 600.0])
            .with_title("tracescope"),
        ..Default::default()
    };

    eframe::run_native(
        "tracescope",
        options,
        Box::new(|cc| Ok(Box::new(ScopeApp::new(cc)))),
    )
}

/// Whatever keeps samples flowing into the buffer
enum Input {
    Microphone(Capture),
    Synthetic(SyntheticInput),
}

impl Input {
    fn describe(&self) -> String {
        match self {
            Input::Microphone(capture) => {
                format!("{} @ {} Hz", capture.device_name(), capture.sample_rate())
            }
            Input::Synthetic(synth) => format!("Test signal @ {} Hz", synth.sample_rate()),
        }
    }
}

/// Open the configured input, falling back to the test signal
fn open_input(settings: &AppSettings) -> Result<(Input, SharedSource), ScopeError> {
    // sized for the test signal until the device reports its rate
    let buffer = SampleBuffer::new(settings.retention_samples(SignalShape::default().sample_rate));

    let input = match settings.input {
        InputSelection::Microphone => match Capture::start(buffer.clone_ref()) {
            Ok(capture) => Input::Microphone(capture),
            Err(e) => {
                log::warn!("Microphone unavailable ({}), using test signal", e);
                Input::Synthetic(SyntheticInput::start(buffer.clone_ref(), SignalShape::default())?)
            }
        },
        InputSelection::Synthetic => {
            Input::Synthetic(SyntheticInput::start(buffer.clone_ref(), SignalShape::default())?)
        }
    };

    let (sample_rate, nominal_chunk) = match &input {
        // cpal reports the real callback size with the first chunk
        Input::Microphone(capture) => (capture.sample_rate(), capture.sample_rate() as usize / 100),
        Input::Synthetic(synth) => (synth.sample_rate(), synth.chunk()),
    };
    buffer.set_retention(settings.retention_samples(sample_rate));

    let source: SharedSource = Arc::new(LiveSource::new(
        buffer,
        sample_rate,
        nominal_chunk,
        settings.averager_config(),
    )?);
    Ok((input, source))
}

/// Main application state
struct ScopeApp {
    settings: AppSettings,
    input: Option<(Input, SharedSource)>,
    events: Arc<EventBus>,
    event_rx: Receiver<ScopeEvent>,
    /// Last known scope rect size, handed to each new loop's session
    view: (f32, f32),
    /// Window the last loop ended with, persisted on exit
    last_window: ScopeWindow,
    slot: FrameSlot,
    render: Option<RenderHandle>,
    render_failed: bool,
    mode: RenderModeKind,
    oscilloscope: Oscilloscope,

    // Latest label events
    milliseconds: String,
    millivolts: String,
    millivolt_y: Option<f32>,
    trigger_active: bool,

    status: String,
}

impl ScopeApp {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();

        let (input, status) = match open_input(&settings) {
            Ok((input, source)) => {
                let status = input.describe();
                (Some((input, source)), status)
            }
            Err(e) => {
                log::error!("No sample source: {}", e);
                (None, format!("No input: {}", e))
            }
        };

        let events = Arc::new(EventBus::new());
        let event_rx = events.subscribe();
        let last_window = settings.loop_config().window;

        let oscilloscope = Oscilloscope::with_settings(OscilloscopeSettings {
            background: egui::Color32::from_rgb(
                settings.background_color[0],
                settings.background_color[1],
                settings.background_color[2],
            ),
            show_graticule: settings.show_graticule,
            ..Default::default()
        });

        Self {
            mode: settings.render_mode,
            settings,
            input,
            events,
            event_rx,
            view: (0.0, 0.0),
            last_window,
            slot: FrameSlot::new(),
            render: None,
            render_failed: false,
            oscilloscope,
            milliseconds: String::new(),
            millivolts: String::new(),
            millivolt_y: None,
            trigger_active: false,
            status,
        }
    }

    /// Spawn a render loop for the current mode
    fn start_render(&mut self, ctx: &egui::Context) {
        let Some((_, source)) = &self.input else {
            return;
        };

        let repaint = ctx.clone();
        let surface = FrameRecorder::new(self.slot.clone()).with_present_callback(move || repaint.request_repaint());
        let config = self.settings.loop_config();
        let render = RenderLoop::new(
            Arc::clone(source),
            Box::new(surface),
            self.mode.build(config.threshold_style),
            Arc::clone(&self.events),
            config,
        );
        render.session().set_view_size(self.view.0, self.view.1);

        match render.spawn() {
            Ok(handle) => {
                log::info!("{} view started", self.mode.name());
                self.render = Some(handle);
            }
            Err(e) => {
                log::error!("Failed to start render loop: {}", e);
                self.status = format!("Render loop failed: {}", e);
                self.render_failed = true;
            }
        }
    }

    fn stop_render(&mut self) {
        if let Some(mut handle) = self.render.take() {
            self.last_window = handle.session().window();
            handle.join();
        }
    }

    /// Session of the running loop, if any
    fn session(&self) -> Option<&Session> {
        self.render.as_ref().map(|handle| handle.session())
    }

    fn switch_mode(&mut self, ctx: &egui::Context) {
        self.stop_render();
        self.mode = self.mode.toggled();
        self.millivolt_y = None;
        self.start_render(ctx);
    }

    fn drain_events(&mut self) {
        for event in self.event_rx.try_iter() {
            match event {
                ScopeEvent::Labels { milliseconds, millivolts } => {
                    self.milliseconds = milliseconds;
                    self.millivolts = millivolts;
                }
                ScopeEvent::TriggerMode(active) => {
                    self.trigger_active = active;
                    if !active {
                        self.millivolt_y = None;
                    }
                }
                ScopeEvent::MillivoltLabelPosition(y) => self.millivolt_y = Some(y),
            }
        }
    }

    /// Pointer and scroll input over the scope rect
    fn handle_input(&self, ui: &egui::Ui, response: &egui::Response) {
        let rect = response.rect;
        let Some(session) = self.session() else {
            return;
        };

        if self.trigger_active {
            if response.drag_started() {
                session.pointer_down();
            }
            if response.dragged() {
                if let Some(pos) = response.interact_pointer_pos() {
                    session.pointer_move(pos.y - rect.top());
                }
            }
            if response.drag_stopped() {
                session.pointer_up();
            }
            if response.clicked() {
                if let Some(pos) = response.interact_pointer_pos() {
                    self.events.publish_threshold_delta(pos.y - rect.top());
                }
            }
        }

        if response.hovered() {
            let (scroll, shift) = ui.input(|i| (i.raw_scroll_delta.y, i.modifiers.shift));
            if scroll != 0.0 {
                let factor = if scroll > 0.0 { 1.0 / ZOOM_STEP } else { ZOOM_STEP };
                let applied = if shift {
                    session.zoom_vertical(factor)
                } else {
                    session.zoom_horizontal(factor)
                };
                if !applied {
                    log::trace!("Zoom request out of range");
                }
            }
        }
    }
}

impl eframe::App for ScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        // Top panel
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("tracescope");
                ui.separator();

                let button_text = match self.mode {
                    RenderModeKind::FreeRunning => "⏺ Trigger",
                    RenderModeKind::Trigger => "▶ Free running",
                };
                if ui.button(button_text).clicked() {
                    self.switch_mode(ctx);
                }

                ui.separator();
                ui.checkbox(&mut self.oscilloscope.settings.show_graticule, "Grid");
                ui.separator();
                ui.label(&self.milliseconds);
                ui.separator();
                ui.label(&self.millivolts);
                ui.separator();
                ui.label(&self.status);
            });
        });

        // Main scope display
        egui::CentralPanel::default().show(ctx, |ui| {
            let frame = self.slot.latest();
            let response = self.oscilloscope.show(ui, frame.as_ref(), None);
            let rect = response.rect;

            let view = (rect.width(), rect.height());
            if self.view != view {
                self.view = view;
                if let Some(session) = self.session() {
                    session.set_view_size(view.0, view.1);
                }
            }

            self.handle_input(ui, &response);

            if let Some(y) = self.millivolt_y {
                ui.painter_at(rect).text(
                    egui::pos2(rect.right() - 8.0, rect.top() + y),
                    egui::Align2::RIGHT_BOTTOM,
                    &self.millivolts,
                    egui::FontId::monospace(12.0),
                    egui::Color32::from_rgb(
                        self.settings.threshold_color[0],
                        self.settings.threshold_color[1],
                        self.settings.threshold_color[2],
                    ),
                );
            }
        });

        // first frame has the view size the trigger default depends on
        if self.render.is_none() && !self.render_failed {
            self.start_render(ctx);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.stop_render();

        let window = self.last_window;
        self.settings.render_mode = self.mode;
        self.settings.horizontal_window = window.horizontal();
        self.settings.vertical_window = window.vertical();
        self.settings.show_graticule = self.oscilloscope.settings.show_graticule;
        self.settings.save();
    }
}
