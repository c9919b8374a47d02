use std::path::Path;

use serde::Deserialize;

use crate::color::Color;
use crate::error::LoadError;

// ── ViewerConfig ──────────────────────────────────────────────────────────────

/// Settings of the standalone viewer window.
///
/// Every field is optional in the JSON file; absent fields keep their default.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub title: String,
    /// Window size in physical pixels.
    pub width: u32,
    pub height: u32,
    /// Canvas clear colour behind the map.
    pub background: Color,
    /// Folder scanned recursively for `.png` sprite sheets.
    pub sprite_folder: Option<String>,
    /// Size of one frame inside a sprite sheet.
    pub frame_width: u32,
    pub frame_height: u32,
    /// Zoom factor applied per mouse-wheel notch.
    pub zoom_step: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "mapcanvas".into(),
            width: 1280,
            height: 720,
            background: Color::CANVAS,
            sprite_folder: None,
            frame_width: crate::DEFAULT_TILE_SIZE,
            frame_height: crate::DEFAULT_TILE_SIZE,
            zoom_step: 1.1,
            min_zoom: 0.125,
            max_zoom: 8.0,
        }
    }
}

impl ViewerConfig {
    /// Parse and validate; zoom settings must be finite and positive with
    /// `min_zoom <= max_zoom`.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), LoadError> {
        let positive = |name: &str, v: f32| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(LoadError::Invalid(format!("{name} must be finite and positive, got {v}")))
            }
        };
        positive("zoom_step", self.zoom_step)?;
        positive("min_zoom", self.min_zoom)?;
        positive("max_zoom", self.max_zoom)?;
        if self.min_zoom > self.max_zoom {
            return Err(LoadError::Invalid(format!(
                "min_zoom {} is greater than max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        Ok(())
    }

    /// Read `path`; a file that does not exist yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("[viewer] no config at {:?}; using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Clamp `scale` into `[min_zoom, max_zoom]`.
    ///
    /// Never panics, even on a hand-built config with crossed bounds; the
    /// upper bound wins then.
    pub fn clamp_zoom(&self, scale: f32) -> f32 {
        scale.max(self.min_zoom).min(self.max_zoom)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
