//! Per-view mapping between a volume plane and the image drawn on a canvas.

use crate::transform::TransformError;
use crate::volume::{ViewKind, VolumeModel};
use kurbo::{Size, Vec2};

/// Geometry needed to move between a view's volume plane and canvas pixels.
///
/// Cheap to build and never cached: callers rebuild it whenever the canvas
/// size, drawn size or volume changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewProjection {
    pub view: ViewKind,
    /// Voxel counts along the plane's (width, height) axes.
    pub plane_size: Size,
    /// Millimetres per voxel along the plane's axes.
    pub plane_spacing: Vec2,
    /// Volume origin projected onto the plane's axes.
    pub plane_origin: Vec2,
    /// Size at which the slice image is drawn before zoom.
    pub drawn_size: Size,
    pub canvas_size: Size,
    /// Drawn-image pixels per voxel.
    pub scale: Vec2,
    /// Offset that centres the drawn image inside the canvas.
    pub offset: Vec2,
}

impl ViewProjection {
    /// Build the projection for an image drawn at `drawn_size` inside `canvas_size`.
    ///
    /// Fails when the image would have no extent, since nothing on the
    /// canvas could then be mapped back into the volume.
    pub fn new(
        view: ViewKind,
        volume: &VolumeModel,
        drawn_size: Size,
        canvas_size: Size,
    ) -> Result<Self, TransformError> {
        let (width_axis, height_axis) = view.plane_axes();
        let size = volume.size();
        let spacing = volume.spacing();
        let origin = volume.origin();

        let plane_size = Size::new(
            size.get(width_axis) as f64,
            size.get(height_axis) as f64,
        );
        let scale = Vec2::new(
            drawn_size.width / plane_size.width,
            drawn_size.height / plane_size.height,
        );
        if !(scale.is_finite() && scale.x > 0.0 && scale.y > 0.0) {
            return Err(TransformError::DegenerateProjection {
                view,
                scale_x: scale.x,
                scale_y: scale.y,
            });
        }

        Ok(Self {
            view,
            plane_size,
            plane_spacing: Vec2::new(spacing.get(width_axis), spacing.get(height_axis)),
            plane_origin: Vec2::new(origin.get(width_axis), origin.get(height_axis)),
            drawn_size,
            canvas_size,
            scale,
            offset: Vec2::new(
                (canvas_size.width - drawn_size.width) / 2.0,
                (canvas_size.height - drawn_size.height) / 2.0,
            ),
        })
    }

    /// Build the projection for an image fitted into the canvas.
    pub fn fitted(
        view: ViewKind,
        volume: &VolumeModel,
        canvas_size: Size,
    ) -> Result<Self, TransformError> {
        let drawn = fitted_drawn_size(view, volume, canvas_size);
        Self::new(view, volume, drawn, canvas_size)
    }
}

/// Largest aspect-preserving size of the view's plane that fits the canvas.
pub fn fitted_drawn_size(view: ViewKind, volume: &VolumeModel, canvas_size: Size) -> Size {
    let (width_axis, height_axis) = view.plane_axes();
    let plane_w = volume.size().get(width_axis) as f64;
    let plane_h = volume.size().get(height_axis) as f64;
    let scale = (canvas_size.width / plane_w).min(canvas_size.height / plane_h);
    if !scale.is_finite() || scale <= 0.0 {
        return Size::ZERO;
    }
    Size::new(plane_w * scale, plane_h * scale)
}

/// Width-over-height ratio of the view's plane, in voxels.
pub fn aspect_ratio(view: ViewKind, volume: &VolumeModel) -> f64 {
    let (width_axis, height_axis) = view.plane_axes();
    volume.size().get(width_axis) as f64 / volume.size().get(height_axis) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{DEFAULT_SPACING, Vec3, VoxelCounts};

    fn volume() -> VolumeModel {
        VolumeModel::new(Vec3::ZERO, DEFAULT_SPACING, VoxelCounts::new(200, 100, 50)).unwrap()
    }

    #[test]
    fn test_fitted_size_preserves_aspect() {
        let drawn = fitted_drawn_size(ViewKind::Axial, &volume(), Size::new(500.0, 200.0));
        // Plane is 200x100, height-limited: scale 2.
        assert!((drawn.width - 400.0).abs() < 1e-9);
        assert!((drawn.height - 200.0).abs() < 1e-9);

        let drawn = fitted_drawn_size(ViewKind::Sagittal, &volume(), Size::new(300.0, 300.0));
        // Plane is 100x50, width-limited: scale 3.
        assert!((drawn.width - 300.0).abs() < 1e-9);
        assert!((drawn.height - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_fitted_size_of_empty_canvas() {
        assert_eq!(fitted_drawn_size(ViewKind::Coronal, &volume(), Size::ZERO), Size::ZERO);
    }

    #[test]
    fn test_projection_scale_and_offset() {
        let p = ViewProjection::fitted(ViewKind::Axial, &volume(), Size::new(500.0, 200.0)).unwrap();
        assert!((p.scale.x - 2.0).abs() < 1e-9);
        assert!((p.scale.y - 2.0).abs() < 1e-9);
        assert!((p.offset.x - 50.0).abs() < 1e-9);
        assert!(p.offset.y.abs() < 1e-9);
        assert_eq!(p.plane_size, Size::new(200.0, 100.0));
        assert_eq!(p.plane_spacing, Vec2::new(0.5, 0.5));
    }

    #[test]
    fn test_coronal_uses_z_spacing() {
        let p = ViewProjection::fitted(ViewKind::Coronal, &volume(), Size::new(400.0, 100.0)).unwrap();
        assert_eq!(p.plane_size, Size::new(200.0, 50.0));
        assert_eq!(p.plane_spacing, Vec2::new(0.5, 0.7));
    }

    #[test]
    fn test_zero_canvas_is_degenerate() {
        let err = ViewProjection::fitted(ViewKind::Axial, &volume(), Size::ZERO).unwrap_err();
        assert!(matches!(err, TransformError::DegenerateProjection { view: ViewKind::Axial, .. }));
    }

    #[test]
    fn test_explicit_drawn_size() {
        let p = ViewProjection::new(
            ViewKind::Axial,
            &volume(),
            Size::new(100.0, 100.0),
            Size::new(300.0, 300.0),
        )
        .unwrap();
        assert!((p.scale.x - 0.5).abs() < 1e-9);
        assert!((p.scale.y - 1.0).abs() < 1e-9);
        assert!((p.offset.x - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_aspect_ratio() {
        assert!((aspect_ratio(ViewKind::Axial, &volume()) - 2.0).abs() < 1e-9);
        assert!((aspect_ratio(ViewKind::Coronal, &volume()) - 4.0).abs() < 1e-9);
    }
}
