use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::AveragerConfig;
use crate::render::{
    LineStyle, LoopConfig, RenderModeKind, ScopeWindow, DEFAULT_FRAME_INTERVAL, DEFAULT_HORIZONTAL_WINDOW,
    DEFAULT_MINIMUM_DETECTED_PCM, DEFAULT_SETTLE_TIME, DEFAULT_VERTICAL_WINDOW,
};

/// Returns the path to the settings file: `~/.config/tracescope/settings.json`
fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("tracescope");
    path.push("settings.json");
    path
}

/// Where samples come from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputSelection {
    /// Default input device, falling back to the generator if there is none
    #[default]
    Microphone,
    Synthetic,
}

/// Persisted application settings.
///
/// Serialized as JSON to the platform config directory.
/// Fields use `#[serde(default)]` so that adding new settings
/// won't break existing config files.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    // Session
    pub render_mode: RenderModeKind,
    pub input: InputSelection,
    pub horizontal_window: usize,
    pub vertical_window: i32,

    // Render loop
    pub frame_interval_ms: u64,
    pub minimum_detected_pcm: f32,
    pub autoscale_settle_ms: u64,
    pub trigger_y_scale: f32,

    // Sample source
    pub retention_seconds: f32,
    pub trigger_window: usize,
    pub trigger_max_sweeps: usize,
    pub threshold_queue_capacity: usize,

    // Display
    pub show_graticule: bool,
    pub waveform_width: f32,
    pub threshold_width: f32,

    // Color (stored as u8 triples since Color32 isn't serde-friendly)
    pub waveform_color: [u8; 3],
    pub threshold_color: [u8; 3],
    pub background_color: [u8; 3],
}

impl Default for AppSettings {
    fn default() -> Self {
        let averager = AveragerConfig::default();
        Self {
            render_mode: RenderModeKind::FreeRunning,
            input: InputSelection::Microphone,
            horizontal_window: DEFAULT_HORIZONTAL_WINDOW,
            vertical_window: DEFAULT_VERTICAL_WINDOW,

            frame_interval_ms: DEFAULT_FRAME_INTERVAL.as_millis() as u64,
            minimum_detected_pcm: DEFAULT_MINIMUM_DETECTED_PCM,
            autoscale_settle_ms: DEFAULT_SETTLE_TIME.as_millis() as u64,
            trigger_y_scale: 1.0,

            retention_seconds: 10.0,
            trigger_window: averager.window,
            trigger_max_sweeps: averager.max_sweeps,
            threshold_queue_capacity: averager.queue_capacity,

            show_graticule: true,
            waveform_width: 1.0,
            threshold_width: 1.0,

            waveform_color: [0, 255, 0],
            threshold_color: [255, 0, 0],
            background_color: [10, 20, 10],
        }
    }
}

fn line_style(color: [u8; 3], width: f32) -> LineStyle {
    LineStyle {
        color: [
            color[0] as f32 / 255.0,
            color[1] as f32 / 255.0,
            color[2] as f32 / 255.0,
            1.0,
        ],
        width,
    }
}

impl AppSettings {
    /// Load settings from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        Self::load_from(&settings_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Failed to parse settings ({}), using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                log::info!("No settings file found ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Save settings to disk as pretty JSON.
    pub fn save(&self) {
        self.save_to(&settings_path());
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Failed to create config directory: {}", e);
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    log::warn!("Failed to write settings: {}", e);
                }
            }
            Err(e) => {
                log::warn!("Failed to serialize settings: {}", e);
            }
        }
    }

    /// Render loop configuration for these settings
    ///
    /// Out-of-range window sizes fall back to the defaults.
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            frame_interval: Duration::from_millis(self.frame_interval_ms.max(1)),
            window: ScopeWindow::new(self.horizontal_window, self.vertical_window),
            minimum_detected_pcm: self.minimum_detected_pcm,
            autoscale_settle: Duration::from_millis(self.autoscale_settle_ms),
            trigger_y_scale: self.trigger_y_scale,
            waveform_style: line_style(self.waveform_color, self.waveform_width),
            threshold_style: line_style(self.threshold_color, self.threshold_width),
        }
    }

    pub fn averager_config(&self) -> AveragerConfig {
        AveragerConfig {
            window: self.trigger_window.max(2),
            max_sweeps: self.trigger_max_sweeps.max(1),
            queue_capacity: self.threshold_queue_capacity.max(1),
            ..AveragerConfig::default()
        }
    }

    /// Sample buffer retention at `sample_rate`
    pub fn retention_samples(&self, sample_rate: u32) -> usize {
        (self.retention_seconds.max(0.1) * sample_rate as f32) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{ "render_mode": "Trigger", "vertical_window": 20000 }"#).unwrap();
        assert_eq!(settings.render_mode, RenderModeKind::Trigger);
        assert_eq!(settings.vertical_window, 20_000);
        assert_eq!(settings.horizontal_window, 4000);
        assert_eq!(settings.input, InputSelection::Microphone);
    }

    #[test]
    fn test_loop_config_defaults() {
        let config = AppSettings::default().loop_config();
        assert_eq!(config.frame_interval, Duration::from_millis(20));
        assert_eq!(config.autoscale_settle, Duration::from_millis(100));
        assert_eq!(config.window, ScopeWindow::new(4000, 10_000));
        assert_eq!(config.minimum_detected_pcm, -5_000_000.0);
        assert_eq!(config.waveform_style, LineStyle::WAVEFORM);
        assert_eq!(config.threshold_style, LineStyle::THRESHOLD);
    }

    #[test]
    fn test_invalid_window_falls_back() {
        let settings = AppSettings {
            vertical_window: 100,
            horizontal_window: 4,
            ..Default::default()
        };
        let window = settings.loop_config().window;
        assert_eq!(window.vertical(), 10_000);
        assert_eq!(window.horizontal(), 4000);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("tracescope-test-{}", std::process::id()));
        let path = dir.join("settings.json");

        let settings = AppSettings {
            render_mode: RenderModeKind::Trigger,
            input: InputSelection::Synthetic,
            waveform_color: [1, 2, 3],
            ..Default::default()
        };
        settings.save_to(&path);

        let loaded = AppSettings::load_from(&path);
        assert_eq!(loaded.render_mode, RenderModeKind::Trigger);
        assert_eq!(loaded.input, InputSelection::Synthetic);
        assert_eq!(loaded.waveform_color, [1, 2, 3]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unreadable_file_gives_defaults() {
        let dir = std::env::temp_dir().join(format!("tracescope-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        std::fs::write(&path, "not json").unwrap();

        let loaded = AppSettings::load_from(&path);
        assert_eq!(loaded.render_mode, RenderModeKind::FreeRunning);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
