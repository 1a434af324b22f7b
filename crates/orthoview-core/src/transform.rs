//! Conversions between world (mm), canvas (px) and slice-index coordinates.
//!
//! Every function here is pure. The forward chain for a view is:
//!
//! 1. pick the two world components spanned by the view,
//! 2. convert to voxel coordinates `(world - origin) / spacing`,
//! 3. apply the view's radiological flip `size - 1 - voxel`,
//! 4. scale to drawn-image pixels,
//! 5. apply zoom, centring offset and pan.
//!
//! [`canvas_to_world`] runs the same steps backwards.

use crate::projection::ViewProjection;
use crate::volume::{Axis, Vec3, ViewKind, VolumeModel};
use kurbo::{Point, Vec2};
use thiserror::Error;

/// A coordinate conversion that cannot produce a meaningful result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("Degenerate {view} projection (scale {scale_x} x {scale_y})")]
    DegenerateProjection {
        view: ViewKind,
        scale_x: f64,
        scale_y: f64,
    },
    #[error("Invalid zoom factor: {0}")]
    InvalidZoom(f64),
    #[error("Non-finite {0}")]
    NonFinite(&'static str),
}

#[inline]
fn flip(value: f64, size: f64, flipped: bool) -> f64 {
    if flipped { size - 1.0 - value } else { value }
}

/// Project a world point onto a view's canvas.
pub fn world_to_canvas(world: Vec3, projection: &ViewProjection, zoom: f64, pan: Vec2) -> Point {
    let (width_axis, height_axis) = projection.view.plane_axes();
    let (flip_w, flip_h) = projection.view.flips();

    let voxel_w = (world.get(width_axis) - projection.plane_origin.x) / projection.plane_spacing.x;
    let voxel_h = (world.get(height_axis) - projection.plane_origin.y) / projection.plane_spacing.y;

    let drawn_w = flip(voxel_w, projection.plane_size.width, flip_w) * projection.scale.x;
    let drawn_h = flip(voxel_h, projection.plane_size.height, flip_h) * projection.scale.y;

    Point::new(
        drawn_w * zoom + projection.offset.x + pan.x,
        drawn_h * zoom + projection.offset.y + pan.y,
    )
}

/// Map a canvas point back into the volume.
///
/// A canvas point only fixes the two in-plane components; `depth` supplies
/// the component along the view's slice axis.
pub fn canvas_to_world(
    canvas: Point,
    projection: &ViewProjection,
    zoom: f64,
    pan: Vec2,
    depth: f64,
) -> Result<Vec3, TransformError> {
    if !(zoom.is_finite() && zoom > 0.0) {
        return Err(TransformError::InvalidZoom(zoom));
    }
    if !(canvas.is_finite() && pan.is_finite()) {
        return Err(TransformError::NonFinite("canvas point"));
    }
    let scale = projection.scale;
    if !(scale.is_finite() && scale.x > 0.0 && scale.y > 0.0) {
        return Err(TransformError::DegenerateProjection {
            view: projection.view,
            scale_x: scale.x,
            scale_y: scale.y,
        });
    }

    let view = projection.view;
    let (width_axis, height_axis) = view.plane_axes();
    let (flip_w, flip_h) = view.flips();

    let drawn_w = (canvas.x - projection.offset.x - pan.x) / zoom;
    let drawn_h = (canvas.y - projection.offset.y - pan.y) / zoom;

    let voxel_w = flip(drawn_w / scale.x, projection.plane_size.width, flip_w);
    let voxel_h = flip(drawn_h / scale.y, projection.plane_size.height, flip_h);

    Ok(Vec3::ZERO
        .with(width_axis, voxel_w * projection.plane_spacing.x + projection.plane_origin.x)
        .with(height_axis, voxel_h * projection.plane_spacing.y + projection.plane_origin.y)
        .with(view.slice_axis(), depth))
}

/// Physical distance (mm) between two points on the same view's canvas.
pub fn canvas_distance_mm(
    from: Point,
    to: Point,
    projection: &ViewProjection,
    zoom: f64,
    pan: Vec2,
) -> Result<f64, TransformError> {
    let a = canvas_to_world(from, projection, zoom, pan, 0.0)?;
    let b = canvas_to_world(to, projection, zoom, pan, 0.0)?;
    Ok((b - a).length())
}

/// Slice a view shows for a world point, clamped to the view's slice range.
pub fn world_to_slice_index(world: Vec3, view: ViewKind, volume: &VolumeModel) -> usize {
    let axis = view.slice_axis();
    let raw = ((world.get(axis) - volume.origin().get(axis)) / volume.spacing().get(axis)).round();
    let last = volume.slice_count(view).saturating_sub(1) as f64;
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, last) as usize
}

/// Clamp a world point into the scanned volume.
///
/// NaN components collapse onto the volume origin for that axis.
pub fn validate_coordinates(world: Vec3, volume: &VolumeModel) -> Vec3 {
    let (min, max) = volume.bounds();
    let clamp = |axis: Axis| {
        let value = world.get(axis);
        if value.is_nan() {
            min.get(axis)
        } else {
            value.clamp(min.get(axis), max.get(axis))
        }
    };
    Vec3::new(clamp(Axis::X), clamp(Axis::Y), clamp(Axis::Z))
}
