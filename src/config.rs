use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::calibration::{compute_calibration, CalibrationRegion};
use crate::error::GazeError;
use crate::landmarks::EyeSide;
use crate::layout::{
    board_layout, default_home_controls, default_phrases, phrase_board, typing_layout, KeyLayout,
    KeyboardGeometry, PhraseEntry, Variant,
};
use crate::projection::Projector;
use crate::session::SessionSettings;
use crate::types::{Extent, Point};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub keyboard: KeyboardConfig,
    pub tracking: TrackingConfig,
    pub session: SessionConfig,
    pub calibration: CalibrationConfig,
    pub phrases: Vec<PhraseEntry>,
    pub home_controls: Vec<PhraseEntry>,
    pub voice: VoiceConfig,
    pub models: ModelConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    pub screen_width: i32,
    pub screen_height: i32,
    pub width: i32,
    pub height: i32,
    pub offset_x: i32,
    pub offset_y: i32,
    // Canvas for the phrase and home boards
    pub board_width: i32,
    pub board_height: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub blink_ratio: f64,
    pub eye: EyeSide,
    pub mirror: bool,
    pub detector_score: f32,
    pub calibration_samples: Vec<Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub variant: Variant,
    /// Overrides the per-variant default when set.
    pub cooldown_ms: Option<u64>,
    pub suggestion_min_len: usize,
    pub echo_keys: bool,
    pub initial_suggestions: Vec<String>,
    /// Newline-separated vocabulary; the built-in list is used when unset.
    pub word_list: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub face_detection: String,
    pub face_mesh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub font_size_pt: u32,
    pub font_family: String, // e.g. "DejaVu Sans Mono"
    pub bitmap_scale: u32,
    pub show_camera: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            keyboard: KeyboardConfig::default(),
            tracking: TrackingConfig::default(),
            session: SessionConfig::default(),
            calibration: CalibrationConfig::default(),
            phrases: default_phrases(),
            home_controls: default_home_controls(),
            voice: VoiceConfig::default(),
            models: ModelConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            screen_width: 1300,
            screen_height: 1000,
            width: 1000,
            height: 500,
            offset_x: 100,
            offset_y: 80,
            board_width: 900,
            board_height: 600,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            blink_ratio: crate::blink::DEFAULT_BLINK_RATIO,
            eye: EyeSide::Right,
            mirror: false,
            detector_score: 0.7,
            calibration_samples: vec![Point::new(229, 306), Point::new(360, 379), Point::new(373, 305)],
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            variant: Variant::Typing,
            cooldown_ms: None,
            suggestion_min_len: 3,
            echo_keys: false,
            initial_suggestions: ["hi", "water", "I'm", "help"].map(String::from).to_vec(),
            word_list: None,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { settle_ms: 900 }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "espeak".to_string(),
            args: Vec::new(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_detection: "face_detection.onnx".to_string(),
            face_mesh: "face_mesh.onnx".to_string(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            font_size_pt: 28,
            font_family: "Monospace".to_string(),
            bitmap_scale: 3,
            show_camera: true,
        }
    }
}

impl AppConfig {
    /// Read `path`, falling back to defaults when it is missing or unparsable,
    /// then write it back so new fields show up in the file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            // Missing fields fall back to Default via #[serde(default)]
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(c) => {
                    info!("Loaded configuration from {}", path.display());
                    c
                }
                Err(e) => {
                    warn!("Error parsing config: {}. Loading defaults.", e);
                    Self::default()
                }
            }
        } else {
            info!("Configuration file not found. Creating default at {}", path.display());
            Self::default()
        };

        config.save_to(path)?;
        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn keyboard_geometry(&self) -> KeyboardGeometry {
        KeyboardGeometry {
            width: self.keyboard.width,
            height: self.keyboard.height,
            offset: Point::new(self.keyboard.offset_x, self.keyboard.offset_y),
        }
    }

    /// Render surface the gaze is projected onto for `variant`.
    pub fn canvas(&self, variant: Variant) -> Extent {
        match variant {
            Variant::Typing => Extent::new(self.keyboard.screen_width, self.keyboard.screen_height),
            Variant::Phrases | Variant::HomeAutomation => {
                Extent::new(self.keyboard.board_width, self.keyboard.board_height)
            }
        }
    }

    pub fn layout(&self, variant: Variant) -> KeyLayout {
        let canvas = self.canvas(variant);
        match variant {
            Variant::Typing => typing_layout(&self.keyboard_geometry()),
            Variant::Phrases => phrase_board(&self.phrases, canvas),
            Variant::HomeAutomation => board_layout(&self.home_controls, canvas),
        }
    }

    pub fn cooldown(&self, variant: Variant) -> Duration {
        let default_ms = match variant {
            Variant::Typing => 100,
            Variant::Phrases | Variant::HomeAutomation => 300,
        };
        Duration::from_millis(self.session.cooldown_ms.unwrap_or(default_ms))
    }

    pub fn session_settings(&self, variant: Variant) -> SessionSettings {
        SessionSettings {
            cooldown: self.cooldown(variant),
            suggestion_min_len: self.session.suggestion_min_len,
            echo_keys: self.session.echo_keys,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.calibration.settle_ms)
    }

    /// Startup checks. Returns the calibrated region on success.
    pub fn validate(&self, variant: Variant) -> Result<CalibrationRegion, GazeError> {
        if !(self.tracking.blink_ratio > 0.0 && self.tracking.blink_ratio < 1.0) {
            return Err(GazeError::Config(format!(
                "tracking.blink_ratio {} must lie between 0 and 1",
                self.tracking.blink_ratio
            )));
        }
        let region = compute_calibration(&self.tracking.calibration_samples)?;
        Projector::new(region.extent(), self.canvas(variant))?;
        Ok(region)
    }
}
