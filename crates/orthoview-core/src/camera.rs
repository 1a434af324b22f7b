//! Per-view zoom and pan.

use crate::animation::{Momentum, SmoothZoom};
use crate::projection::{ViewProjection, fitted_drawn_size};
use crate::transform::{self, TransformError};
use crate::volume::{Vec3, ViewKind, VolumeModel};
use kurbo::{Point, Rect, Size, Vec2};
use serde::Serialize;

/// Smallest zoom a view accepts.
pub const MIN_ZOOM: f64 = 0.1;
/// Largest zoom a view accepts.
pub const MAX_ZOOM: f64 = 10.0;
/// Canvas size assumed until the host reports the real one.
pub const DEFAULT_CANVAS_SIZE: Size = Size::new(500.0, 200.0);

/// Range of pan values that keeps the zoomed image covering the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl PanBounds {
    pub fn clamp(&self, pan: Vec2) -> Vec2 {
        Vec2::new(
            pan.x.clamp(self.min.x, self.max.x),
            pan.y.clamp(self.min.y, self.max.y),
        )
    }
}

/// Zoom state formatted for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoomInfo {
    pub zoom: f64,
    pub percentage: u32,
    pub label: String,
    pub can_zoom_in: bool,
    pub can_zoom_out: bool,
}

/// Zoom, pan and canvas geometry of one view.
///
/// The view's [`ViewProjection`] is rebuilt from this state on every
/// conversion, so a resize or zoom change is visible to the very next call.
#[derive(Debug, Clone)]
pub struct ViewInteractionState {
    view: ViewKind,
    canvas_size: Size,
    /// Drawn image size reported by the renderer; fitted to the canvas if unset.
    drawn_size: Option<Size>,
    zoom: f64,
    pan: Vec2,
    /// Minimum allowed zoom level
    pub min_zoom: f64,
    /// Maximum allowed zoom level
    pub max_zoom: f64,
    momentum: Option<Momentum>,
    smooth_zoom: Option<SmoothZoom>,
}

impl ViewInteractionState {
    /// Create the state for a view at zoom 1 with no pan.
    pub fn new(view: ViewKind) -> Self {
        Self::with_zoom_limits(view, MIN_ZOOM, MAX_ZOOM)
    }

    pub fn with_zoom_limits(view: ViewKind, min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            view,
            canvas_size: DEFAULT_CANVAS_SIZE,
            drawn_size: None,
            zoom: 1.0,
            pan: Vec2::ZERO,
            min_zoom,
            max_zoom,
            momentum: None,
            smooth_zoom: None,
        }
    }

    pub fn view(&self) -> ViewKind {
        self.view
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    /// Record the canvas size reported by the host's resize observer.
    ///
    /// Negative or non-finite dimensions are treated as zero.
    pub fn set_canvas_size(&mut self, size: Size) {
        let sanitize = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        let sanitized = Size::new(sanitize(size.width), sanitize(size.height));
        if sanitized != size {
            log::debug!("{} canvas size {:?} sanitized to {:?}", self.view, size, sanitized);
        }
        self.canvas_size = sanitized;
    }

    /// Override the size at which the renderer draws the slice image.
    pub fn set_drawn_size(&mut self, size: Option<Size>) {
        self.drawn_size = size;
    }

    /// Size of the slice image before zoom.
    pub fn drawn_size(&self, volume: &VolumeModel) -> Size {
        self.drawn_size
            .unwrap_or_else(|| fitted_drawn_size(self.view, volume, self.canvas_size))
    }

    pub fn canvas_center(&self) -> Point {
        Point::new(self.canvas_size.width / 2.0, self.canvas_size.height / 2.0)
    }

    /// Build the view's projection from the current canvas and volume.
    pub fn projection(&self, volume: &VolumeModel) -> Result<ViewProjection, TransformError> {
        ViewProjection::new(self.view, volume, self.drawn_size(volume), self.canvas_size)
    }

    /// Convert a world point to canvas coordinates under the current zoom and pan.
    pub fn world_to_canvas(&self, world: Vec3, volume: &VolumeModel) -> Result<Point, TransformError> {
        let projection = self.projection(volume)?;
        Ok(transform::world_to_canvas(world, &projection, self.zoom, self.pan))
    }

    /// Convert a canvas point to world coordinates, taking the slice-axis
    /// component from `depth`.
    pub fn canvas_to_world(
        &self,
        point: Point,
        depth: f64,
        volume: &VolumeModel,
    ) -> Result<Vec3, TransformError> {
        let projection = self.projection(volume)?;
        transform::canvas_to_world(point, &projection, self.zoom, self.pan, depth)
    }

    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// Change zoom by `delta`, keeping the pixel under `focus` stationary.
    ///
    /// Returns whether the zoom changed.
    pub fn zoom_by(
        &mut self,
        volume: &VolumeModel,
        delta: f64,
        focus: Option<Point>,
    ) -> Result<bool, TransformError> {
        self.zoom_with_focus(volume, self.zoom + delta, focus)
    }

    /// Zoom to `zoom`, keeping the pixel under `focus` (default: canvas
    /// centre) stationary.
    ///
    /// On error nothing is changed.
    pub fn zoom_with_focus(
        &mut self,
        volume: &VolumeModel,
        zoom: f64,
        focus: Option<Point>,
    ) -> Result<bool, TransformError> {
        if !zoom.is_finite() {
            return Err(TransformError::InvalidZoom(zoom));
        }
        let new_zoom = self.clamp_zoom(zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return Ok(false);
        }

        let focus = focus.unwrap_or_else(|| self.canvas_center());
        let projection = self.projection(volume)?;

        // World point under the focus before the zoom
        let world = transform::canvas_to_world(focus, &projection, self.zoom, self.pan, 0.0)?;

        // Where it would land after the zoom with the old pan
        let landed = transform::world_to_canvas(world, &projection, new_zoom, self.pan);
        let correction = focus - landed;
        if !correction.is_finite() {
            return Err(TransformError::NonFinite("pan correction"));
        }

        self.zoom = new_zoom;
        self.pan += correction;
        Ok(true)
    }

    /// Pan the view by a delta in canvas pixels.
    pub fn pan_by(&mut self, delta: Vec2) {
        if delta.is_finite() {
            self.pan += delta;
        }
    }

    pub fn set_pan(&mut self, pan: Vec2) {
        if pan.is_finite() {
            self.pan = pan;
        }
    }

    /// Reset to zoom 1 with no pan, cancelling any running animation.
    pub fn reset(&mut self) {
        self.stop_animations();
        self.zoom = 1.0;
        self.pan = Vec2::ZERO;
    }

    /// Pan that puts the centre of the zoomed image at the canvas centre.
    ///
    /// Zoom scales about the image's top-left corner, so this is only zero
    /// at zoom 1.
    pub fn centred_pan(&self, volume: &VolumeModel) -> Vec2 {
        let drawn = self.drawn_size(volume);
        Vec2::new(drawn.width, drawn.height) * ((1.0 - self.zoom) / 2.0)
    }

    /// Pan range over which the zoomed image still covers the canvas.
    ///
    /// The range is centred on [`Self::centred_pan`] and collapses to it
    /// along any axis where the image is smaller than the canvas.
    pub fn pan_bounds(&self, volume: &VolumeModel) -> PanBounds {
        let drawn = self.drawn_size(volume);
        let centre = self.centred_pan(volume);
        let overflow = Vec2::new(
            ((drawn.width * self.zoom - self.canvas_size.width) / 2.0).max(0.0),
            ((drawn.height * self.zoom - self.canvas_size.height) / 2.0).max(0.0),
        );
        PanBounds {
            min: centre - overflow,
            max: centre + overflow,
        }
    }

    /// Clamp pan into [`Self::pan_bounds`]. Returns whether pan changed.
    pub fn apply_pan_bounds(&mut self, volume: &VolumeModel) -> bool {
        let clamped = self.pan_bounds(volume).clamp(self.pan);
        if clamped == self.pan {
            return false;
        }
        self.pan = clamped;
        true
    }

    pub fn zoom_info(&self) -> ZoomInfo {
        let percentage = (self.zoom * 100.0).round() as u32;
        let label = if (self.zoom - 1.0).abs() < f64::EPSILON {
            "1:1".to_string()
        } else {
            format!("{percentage}%")
        };
        ZoomInfo {
            zoom: self.zoom,
            percentage,
            label,
            can_zoom_in: self.zoom < self.max_zoom,
            can_zoom_out: self.zoom > self.min_zoom,
        }
    }

    /// Zoom at which the drawn image fills the canvas, scaled by `margin`.
    pub fn fit_zoom(&self, volume: &VolumeModel, margin: f64) -> Option<f64> {
        let drawn = self.drawn_size(volume);
        if drawn.width <= 0.0 || drawn.height <= 0.0 {
            return None;
        }
        let fit = (self.canvas_size.width / drawn.width).min(self.canvas_size.height / drawn.height);
        Some(self.clamp_zoom(fit * margin))
    }

    /// Zoom at which `rect` (canvas pixels at the current zoom) fills the
    /// canvas, scaled by `margin`.
    pub fn rect_zoom(&self, rect: Rect, margin: f64) -> Option<f64> {
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return None;
        }
        let fill = (self.canvas_size.width / rect.width()).min(self.canvas_size.height / rect.height());
        let zoom = self.zoom * fill * margin;
        zoom.is_finite().then(|| self.clamp_zoom(zoom))
    }

    /// Start inertial panning. Returns false if the velocity is negligible.
    pub fn start_momentum(&mut self, velocity: Vec2, decay: f64, threshold: f64) -> bool {
        self.momentum = Momentum::new(velocity, decay, threshold);
        self.momentum.is_some()
    }

    pub fn stop_momentum(&mut self) {
        self.momentum = None;
    }

    /// Velocity of running momentum, if any.
    pub fn momentum_velocity(&self) -> Option<Vec2> {
        self.momentum.as_ref().map(Momentum::velocity)
    }

    /// Spread a zoom change over `steps` ticks, each focus-preserving.
    pub fn start_smooth_zoom(&mut self, target: f64, focus: Option<Point>, steps: u32) -> bool {
        let target = self.clamp_zoom(target);
        if !target.is_finite() || (target - self.zoom).abs() < f64::EPSILON {
            self.smooth_zoom = None;
            return false;
        }
        self.smooth_zoom = Some(SmoothZoom::new(self.zoom, target, focus, steps));
        true
    }

    pub fn stop_smooth_zoom(&mut self) {
        self.smooth_zoom = None;
    }

    pub fn is_animating(&self) -> bool {
        self.momentum.is_some() || self.smooth_zoom.is_some()
    }

    pub fn stop_animations(&mut self) {
        self.momentum = None;
        self.smooth_zoom = None;
    }

    /// Advance running animations by one frame. Returns whether any is
    /// still running afterwards.
    pub fn tick(&mut self, volume: &VolumeModel) -> bool {
        if let Some(delta) = self.momentum.as_mut().and_then(Momentum::step) {
            self.pan += delta;
        }
        if self.momentum.as_ref().is_some_and(Momentum::is_exhausted) {
            log::trace!("{} momentum finished", self.view);
            self.momentum = None;
        }

        let step = self.smooth_zoom.as_mut().and_then(|zoom| {
            let focus = zoom.focus();
            zoom.step().map(|level| (level, focus))
        });
        if let Some((level, focus)) = step {
            if let Err(err) = self.zoom_with_focus(volume, level, focus) {
                log::warn!("Smooth zoom on {} stopped: {}", self.view, err);
                self.smooth_zoom = None;
            }
        }
        if self.smooth_zoom.as_ref().is_some_and(SmoothZoom::is_finished) {
            self.smooth_zoom = None;
        }

        self.is_animating()
    }
}
