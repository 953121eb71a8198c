//! Persisted widget settings — pen configuration and author label cached
//! across sessions as a small JSON file next to the session log.

use std::path::PathBuf;

use egui::Color32;
use serde::{Deserialize, Serialize};

use crate::canvas::PenState;
use crate::{log_info, log_warn, logger};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Pen color as sRGB bytes.
    pub pen_color: [u8; 3],
    pub pen_width: f32,
    pub author: String,
}

impl Default for Settings {
    fn default() -> Self {
        let pen = PenState::default();
        Self {
            pen_color: [pen.color.r(), pen.color.g(), pen.color.b()],
            pen_width: pen.width,
            author: String::new(),
        }
    }
}

impl Settings {
    fn file_path() -> PathBuf {
        logger::app_data_dir().join("settings.json")
    }

    /// Load from disk, falling back to defaults on any problem (a corrupt
    /// settings file must never block startup).
    pub fn load() -> Self {
        let path = Self::file_path();
        match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => settings,
                Err(e) => {
                    log_warn!("settings file unreadable, using defaults: {}", e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let path = Self::file_path();
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    log_warn!("settings save failed: {}", e);
                } else {
                    log_info!("settings saved to {}", path.display());
                }
            }
            Err(e) => log_warn!("settings serialize failed: {}", e),
        }
    }

    pub fn pen(&self) -> PenState {
        PenState {
            color: Color32::from_rgb(self.pen_color[0], self.pen_color[1], self.pen_color[2]),
            // Guard against a hand-edited file: width must stay positive
            width: if self.pen_width > 0.0 {
                self.pen_width
            } else {
                PenState::default().width
            },
        }
    }

    pub fn remember_pen(&mut self, pen: &PenState) {
        self.pen_color = [pen.color.r(), pen.color.g(), pen.color.b()];
        self.pen_width = pen.width;
    }
}
