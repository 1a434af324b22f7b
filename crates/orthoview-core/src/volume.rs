//! Scanned volume geometry and the view/axis vocabulary shared by every module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Index, IndexMut, Sub};
use thiserror::Error;

/// Voxel spacing used until real metadata arrives (mm per voxel).
pub const DEFAULT_SPACING: Vec3 = Vec3::new(0.5, 0.5, 0.7);

/// Voxel counts used until real slice counts arrive.
pub const DEFAULT_VOLUME_SIZE: VoxelCounts = VoxelCounts::new(604, 604, 604);

/// A point or displacement in volume (world) space, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Component along an axis.
    pub fn get(self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Set the component along an axis.
    pub fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
    }

    /// Copy of `self` with one component replaced.
    pub fn with(mut self, axis: Axis, value: f64) -> Self {
        self.set(axis, value);
        self
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y).hypot(self.z)
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Physical axis of the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

/// One of the three orthogonal projection planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Axial,
    Coronal,
    Sagittal,
}

impl ViewKind {
    pub const ALL: [ViewKind; 3] = [ViewKind::Axial, ViewKind::Coronal, ViewKind::Sagittal];

    /// Volume axes spanned by the rendered plane, as (width axis, height axis).
    pub fn plane_axes(self) -> (Axis, Axis) {
        match self {
            ViewKind::Axial => (Axis::X, Axis::Y),
            ViewKind::Coronal => (Axis::X, Axis::Z),
            ViewKind::Sagittal => (Axis::Y, Axis::Z),
        }
    }

    /// Axis the view slices along (the one its slice index moves on).
    pub fn slice_axis(self) -> Axis {
        match self {
            ViewKind::Axial => Axis::Z,
            ViewKind::Coronal => Axis::Y,
            ViewKind::Sagittal => Axis::X,
        }
    }

    /// Radiological flips applied to the (width, height) plane axes.
    pub fn flips(self) -> (bool, bool) {
        match self {
            ViewKind::Axial => (true, false),
            ViewKind::Coronal => (true, true),
            ViewKind::Sagittal => (false, true),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ViewKind::Axial => "axial",
            ViewKind::Coronal => "coronal",
            ViewKind::Sagittal => "sagittal",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per view.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerView<T> {
    pub axial: T,
    pub coronal: T,
    pub sagittal: T,
}

impl<T> PerView<T> {
    /// Build a value for every view.
    pub fn from_fn(mut f: impl FnMut(ViewKind) -> T) -> Self {
        Self {
            axial: f(ViewKind::Axial),
            coronal: f(ViewKind::Coronal),
            sagittal: f(ViewKind::Sagittal),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(ViewKind, T) -> U) -> PerView<U> {
        PerView {
            axial: f(ViewKind::Axial, self.axial),
            coronal: f(ViewKind::Coronal, self.coronal),
            sagittal: f(ViewKind::Sagittal, self.sagittal),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ViewKind, &T)> {
        [
            (ViewKind::Axial, &self.axial),
            (ViewKind::Coronal, &self.coronal),
            (ViewKind::Sagittal, &self.sagittal),
        ]
        .into_iter()
    }
}

impl<T> Index<ViewKind> for PerView<T> {
    type Output = T;

    fn index(&self, view: ViewKind) -> &T {
        match view {
            ViewKind::Axial => &self.axial,
            ViewKind::Coronal => &self.coronal,
            ViewKind::Sagittal => &self.sagittal,
        }
    }
}

impl<T> IndexMut<ViewKind> for PerView<T> {
    fn index_mut(&mut self, view: ViewKind) -> &mut T {
        match view {
            ViewKind::Axial => &mut self.axial,
            ViewKind::Coronal => &mut self.coronal,
            ViewKind::Sagittal => &mut self.sagittal,
        }
    }
}

/// Voxel counts along each physical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelCounts {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl VoxelCounts {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub fn get(self, axis: Axis) -> u32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// Invalid volume geometry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VolumeError {
    #[error("Spacing along {axis:?} must be positive and finite, got {value}")]
    InvalidSpacing { axis: Axis, value: f64 },
    #[error("Volume has no voxels along {0:?}")]
    EmptyAxis(Axis),
    #[error("Origin must be finite")]
    NonFiniteOrigin,
}

/// Slice counts reported by the imaging backend, keyed by view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceCounts {
    pub axial: Option<u32>,
    pub coronal: Option<u32>,
    pub sagittal: Option<u32>,
}

/// Voxel sizes reported by the imaging backend.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelSizes {
    pub x_spacing_mm: Option<f64>,
    pub y_spacing_mm: Option<f64>,
    pub z_spacing_mm: Option<f64>,
}

/// Volume metadata as delivered (possibly incomplete) by the host.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeMetadata {
    pub slice_counts: SliceCounts,
    pub voxel_sizes: VoxelSizes,
}

/// Geometry of the scanned volume.
///
/// Immutable once built; a new scan replaces the whole model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeModel {
    origin: Vec3,
    spacing: Vec3,
    size: VoxelCounts,
}

impl Default for VolumeModel {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            spacing: DEFAULT_SPACING,
            size: DEFAULT_VOLUME_SIZE,
        }
    }
}

impl VolumeModel {
    /// Build a validated volume.
    pub fn new(origin: Vec3, spacing: Vec3, size: VoxelCounts) -> Result<Self, VolumeError> {
        if !origin.is_finite() {
            return Err(VolumeError::NonFiniteOrigin);
        }
        for axis in Axis::ALL {
            let value = spacing.get(axis);
            if !(value.is_finite() && value > 0.0) {
                return Err(VolumeError::InvalidSpacing { axis, value });
            }
            if size.get(axis) == 0 {
                return Err(VolumeError::EmptyAxis(axis));
            }
        }
        Ok(Self {
            origin,
            spacing,
            size,
        })
    }

    /// Build a volume from backend metadata, substituting defaults for
    /// anything missing or unusable.
    pub fn from_metadata(metadata: &VolumeMetadata) -> Self {
        let counts = metadata.slice_counts;
        let (Some(axial), Some(coronal), Some(sagittal)) = (
            counts.axial.filter(|&n| n > 0),
            counts.coronal.filter(|&n| n > 0),
            counts.sagittal.filter(|&n| n > 0),
        ) else {
            log::debug!("Slice counts incomplete ({:?}), using default volume", counts);
            return Self::default();
        };

        let sizes = metadata.voxel_sizes;
        let pick = |value: Option<f64>, fallback: f64| match value {
            Some(v) if v.is_finite() && v > 0.0 => v,
            other => {
                if other.is_some() {
                    log::debug!("Ignoring unusable voxel spacing {:?}", other);
                }
                fallback
            }
        };

        Self {
            origin: Vec3::ZERO,
            spacing: Vec3::new(
                pick(sizes.x_spacing_mm, DEFAULT_SPACING.x),
                pick(sizes.y_spacing_mm, DEFAULT_SPACING.y),
                pick(sizes.z_spacing_mm, DEFAULT_SPACING.z),
            ),
            // Sagittal slices step along x, coronal along y, axial along z.
            size: VoxelCounts::new(sagittal, coronal, axial),
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn spacing(&self) -> Vec3 {
        self.spacing
    }

    pub fn size(&self) -> VoxelCounts {
        self.size
    }

    /// Number of slices a view can step through.
    pub fn slice_count(&self, view: ViewKind) -> u32 {
        self.size.get(view.slice_axis())
    }

    /// Lowest and highest voxel-centre positions, in mm.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let max = |axis: Axis| {
            self.origin.get(axis) + (self.size.get(axis) as f64 - 1.0) * self.spacing.get(axis)
        };
        (self.origin, Vec3::new(max(Axis::X), max(Axis::Y), max(Axis::Z)))
    }

    /// Geometric centre of the volume.
    pub fn center(&self) -> Vec3 {
        let mid = |axis: Axis| {
            self.origin.get(axis) + self.size.get(axis) as f64 * self.spacing.get(axis) / 2.0
        };
        Vec3::new(mid(Axis::X), mid(Axis::Y), mid(Axis::Z))
    }

    /// World coordinate of a slice along the view's slice axis.
    pub fn slice_position(&self, view: ViewKind, index: usize) -> f64 {
        let axis = view.slice_axis();
        self.origin.get(axis) + index as f64 * self.spacing.get(axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_volume() {
        let volume = VolumeModel::default();
        assert_eq!(volume.size(), VoxelCounts::new(604, 604, 604));
        assert_eq!(volume.spacing(), Vec3::new(0.5, 0.5, 0.7));
        assert_eq!(volume.origin(), Vec3::ZERO);
    }

    #[test]
    fn test_center_of_default_volume() {
        let center = VolumeModel::default().center();
        assert!((center.x - 151.0).abs() < 1e-9);
        assert!((center.y - 151.0).abs() < 1e-9);
        assert!((center.z - 211.4).abs() < 1e-9);
    }

    #[test]
    fn test_bounds() {
        let (min, max) = VolumeModel::default().bounds();
        assert_eq!(min, Vec3::ZERO);
        assert!((max.x - 301.5).abs() < 1e-9);
        assert!((max.z - 422.1).abs() < 1e-9);
    }

    #[test]
    fn test_new_rejects_bad_geometry() {
        let err = VolumeModel::new(Vec3::ZERO, Vec3::new(0.5, 0.0, 0.7), DEFAULT_VOLUME_SIZE);
        assert!(matches!(err, Err(VolumeError::InvalidSpacing { axis: Axis::Y, .. })));

        let err = VolumeModel::new(Vec3::ZERO, DEFAULT_SPACING, VoxelCounts::new(10, 10, 0));
        assert_eq!(err, Err(VolumeError::EmptyAxis(Axis::Z)));

        let err = VolumeModel::new(Vec3::new(f64::NAN, 0.0, 0.0), DEFAULT_SPACING, DEFAULT_VOLUME_SIZE);
        assert_eq!(err, Err(VolumeError::NonFiniteOrigin));
    }

    #[test]
    fn test_from_metadata_maps_counts_to_axes() {
        let metadata = VolumeMetadata {
            slice_counts: SliceCounts {
                axial: Some(200),
                coronal: Some(300),
                sagittal: Some(400),
            },
            voxel_sizes: VoxelSizes {
                x_spacing_mm: Some(0.3),
                y_spacing_mm: None,
                z_spacing_mm: Some(-1.0),
            },
        };
        let volume = VolumeModel::from_metadata(&metadata);
        assert_eq!(volume.size(), VoxelCounts::new(400, 300, 200));
        assert_eq!(volume.spacing(), Vec3::new(0.3, 0.5, 0.7));
        assert_eq!(volume.slice_count(ViewKind::Axial), 200);
        assert_eq!(volume.slice_count(ViewKind::Sagittal), 400);
    }

    #[test]
    fn test_from_metadata_missing_counts_uses_default() {
        let metadata = VolumeMetadata {
            slice_counts: SliceCounts {
                axial: Some(100),
                coronal: Some(0),
                sagittal: Some(100),
            },
            voxel_sizes: VoxelSizes {
                x_spacing_mm: Some(2.0),
                ..Default::default()
            },
        };
        assert_eq!(VolumeModel::from_metadata(&metadata), VolumeModel::default());
    }

    #[test]
    fn test_metadata_from_json() {
        let json = r#"{"slice_counts":{"axial":10,"coronal":20,"sagittal":30},"voxel_sizes":{"z_spacing_mm":1.25}}"#;
        let metadata: VolumeMetadata = serde_json::from_str(json).unwrap();
        let volume = VolumeModel::from_metadata(&metadata);
        assert_eq!(volume.size(), VoxelCounts::new(30, 20, 10));
        assert!((volume.spacing().z - 1.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_slice_position() {
        let volume = VolumeModel::default();
        assert!((volume.slice_position(ViewKind::Axial, 10) - 7.0).abs() < 1e-9);
        assert!((volume.slice_position(ViewKind::Sagittal, 10) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_view_axis_table() {
        assert_eq!(ViewKind::Axial.plane_axes(), (Axis::X, Axis::Y));
        assert_eq!(ViewKind::Coronal.plane_axes(), (Axis::X, Axis::Z));
        assert_eq!(ViewKind::Sagittal.plane_axes(), (Axis::Y, Axis::Z));
        for view in ViewKind::ALL {
            let (w, h) = view.plane_axes();
            let s = view.slice_axis();
            assert!(w != s && h != s && w != h);
        }
    }

    #[test]
    fn test_per_view_index() {
        let mut values = PerView::from_fn(|view| view.name().len());
        assert_eq!(values[ViewKind::Coronal], 7);
        values[ViewKind::Axial] = 1;
        assert_eq!(values.axial, 1);
        let names: Vec<_> = values.iter().map(|(view, _)| view.name()).collect();
        assert_eq!(names, ["axial", "coronal", "sagittal"]);
    }
}
