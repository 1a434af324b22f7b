//! Interaction tuning.

use crate::animation::{MOMENTUM_DECAY, MOMENTUM_THRESHOLD, SMOOTH_ZOOM_STEPS};
use crate::camera::{MAX_ZOOM, MIN_ZOOM};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Thresholds and step sizes used by zoom, pan and gesture handling.
///
/// Every field has a default, so a partial JSON document is enough to
/// override a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Zoom change of the zoom-in/zoom-out buttons and keys.
    pub button_zoom_step: f64,
    /// Zoom change of one wheel notch.
    pub wheel_zoom_step: f64,
    /// Pointer travel (px) that turns a press into a drag.
    pub drag_threshold: f64,
    /// Longest press (ms) that still counts as a click.
    pub click_threshold_ms: u64,
    /// Longest gap (ms) between two clicks of a double-click.
    pub double_click_ms: u64,
    /// Farthest apart (px) two clicks of a double-click may be.
    pub double_click_distance: f64,
    /// Distance (px) within which a crosshair line can be grabbed.
    pub crosshair_threshold: f64,
    /// Fraction of `crosshair_threshold` that counts as the intersection.
    pub intersection_ratio: f64,
    pub momentum_decay: f64,
    pub momentum_threshold: f64,
    /// Most recent pan velocities (px/ms) averaged into release momentum.
    pub momentum_samples: usize,
    pub smooth_zoom_steps: u32,
    /// Pan distance (px) of one arrow-key press.
    pub keyboard_pan_step: f64,
    /// Vertical drag (px) per slice in slice-scroll mode.
    pub slice_drag_step: f64,
    /// Margin applied when fitting the image to the canvas.
    pub fit_margin: f64,
    /// Margin applied when zooming to a canvas rectangle.
    pub zoom_rect_margin: f64,
    /// Keep pan within the zoomed image's overflow.
    pub clamp_pan: bool,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            button_zoom_step: 0.2,
            wheel_zoom_step: 0.1,
            drag_threshold: 5.0,
            click_threshold_ms: 300,
            double_click_ms: 300,
            double_click_distance: 5.0,
            crosshair_threshold: 15.0,
            intersection_ratio: 0.7,
            momentum_decay: MOMENTUM_DECAY,
            momentum_threshold: MOMENTUM_THRESHOLD,
            momentum_samples: 3,
            smooth_zoom_steps: SMOOTH_ZOOM_STEPS,
            keyboard_pan_step: 10.0,
            slice_drag_step: 20.0,
            fit_margin: 0.95,
            zoom_rect_margin: 0.9,
            clamp_pan: false,
        }
    }
}

impl InteractionConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values are usable together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }
        fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(invalid(field, format!("must be positive, got {value}")))
            }
        }

        positive("min_zoom", self.min_zoom)?;
        positive("max_zoom", self.max_zoom)?;
        if self.min_zoom >= self.max_zoom {
            return Err(invalid(
                "min_zoom",
                format!("must be below max_zoom ({} >= {})", self.min_zoom, self.max_zoom),
            ));
        }
        positive("button_zoom_step", self.button_zoom_step)?;
        positive("wheel_zoom_step", self.wheel_zoom_step)?;
        positive("drag_threshold", self.drag_threshold)?;
        positive("double_click_distance", self.double_click_distance)?;
        positive("crosshair_threshold", self.crosshair_threshold)?;
        positive("momentum_threshold", self.momentum_threshold)?;
        positive("keyboard_pan_step", self.keyboard_pan_step)?;
        positive("slice_drag_step", self.slice_drag_step)?;
        positive("fit_margin", self.fit_margin)?;
        positive("zoom_rect_margin", self.zoom_rect_margin)?;
        if !(self.intersection_ratio > 0.0 && self.intersection_ratio <= 1.0) {
            return Err(invalid("intersection_ratio", "must be in (0, 1]"));
        }
        if !(self.momentum_decay > 0.0 && self.momentum_decay < 1.0) {
            return Err(invalid("momentum_decay", "must be in (0, 1)"));
        }
        if self.momentum_samples == 0 {
            return Err(invalid("momentum_samples", "needs at least one sample"));
        }
        Ok(())
    }

    pub fn click_threshold(&self) -> Duration {
        Duration::from_millis(self.click_threshold_ms)
    }

    pub fn double_click_window(&self) -> Duration {
        Duration::from_millis(self.double_click_ms)
    }
}
