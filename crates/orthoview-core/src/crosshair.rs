//! The shared 3-D crosshair and the slice each view shows.
//!
//! The world position is the only stored state. Slice indices and canvas
//! positions are derived from it on demand, so the three views can never
//! disagree about where the crosshair is.

use crate::camera::ViewInteractionState;
use crate::transform::{validate_coordinates, world_to_slice_index};
use crate::volume::{PerView, Vec3, ViewKind, VolumeModel};
use kurbo::Point;
use serde::Serialize;

/// Where the crosshair lands on one view's canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CrosshairPosition {
    pub point: Point,
    /// Whether `point` lies inside the canvas.
    pub visible: bool,
}

/// Direction for slice stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceStep {
    Next,
    Previous,
}

#[derive(Debug, Clone)]
pub struct CrosshairCoordinator {
    volume: VolumeModel,
    world_position: Vec3,
    /// Last successfully computed canvas position per view, returned when
    /// a view's projection is unusable (e.g. before its first layout).
    last_known: PerView<CrosshairPosition>,
}

impl CrosshairCoordinator {
    /// Start with the crosshair at the volume centre.
    pub fn new(volume: VolumeModel) -> Self {
        Self {
            volume,
            world_position: validate_coordinates(volume.center(), &volume),
            last_known: PerView::default(),
        }
    }

    pub fn volume(&self) -> &VolumeModel {
        &self.volume
    }

    pub fn world_position(&self) -> Vec3 {
        self.world_position
    }

    /// Replace the volume and re-centre the crosshair in it.
    pub fn set_volume(&mut self, volume: VolumeModel) {
        log::debug!("Volume changed to {:?}, re-centring crosshair", volume.size());
        *self = Self::new(volume);
    }

    /// Move the crosshair, clamped into the volume.
    ///
    /// A candidate with a non-finite component is rejected and the current
    /// position kept. Returns the position now in effect.
    pub fn update_position(&mut self, candidate: Vec3) -> Vec3 {
        if !candidate.is_finite() {
            log::warn!("Rejected non-finite crosshair position {:?}", candidate);
            return self.world_position;
        }
        let clamped = validate_coordinates(candidate, &self.volume);
        if clamped != candidate {
            log::debug!("Crosshair position {:?} clamped to {:?}", candidate, clamped);
        }
        self.world_position = clamped;
        clamped
    }

    /// World component along the view's slice axis.
    pub fn depth(&self, view: ViewKind) -> f64 {
        self.world_position.get(view.slice_axis())
    }

    /// Slice the view currently shows.
    pub fn slice_index(&self, view: ViewKind) -> usize {
        world_to_slice_index(self.world_position, view, &self.volume)
    }

    pub fn slice_indices(&self) -> PerView<usize> {
        PerView::from_fn(|view| self.slice_index(view))
    }

    /// Move the view to a slice, keeping the other two world components.
    ///
    /// The index is clamped to the view's slice range. Returns the slice
    /// now shown.
    pub fn set_slice(&mut self, view: ViewKind, index: usize) -> usize {
        let last = self.volume.slice_count(view).saturating_sub(1) as usize;
        let index = index.min(last);
        let position = self
            .world_position
            .with(view.slice_axis(), self.volume.slice_position(view, index));
        self.update_position(position);
        self.slice_index(view)
    }

    /// Step one slice forward or back.
    pub fn step_slice(&mut self, view: ViewKind, step: SliceStep) -> usize {
        let current = self.slice_index(view);
        let target = match step {
            SliceStep::Next => current.saturating_add(1),
            SliceStep::Previous => current.saturating_sub(1),
        };
        self.set_slice(view, target)
    }

    /// Crosshair position on a view's canvas.
    ///
    /// Falls back to the last position computed for the view, marked
    /// invisible, if its projection cannot be built.
    pub fn crosshair_canvas_position(
        &mut self,
        view: ViewKind,
        state: &ViewInteractionState,
    ) -> CrosshairPosition {
        match state.world_to_canvas(self.world_position, &self.volume) {
            Ok(point) if point.is_finite() => {
                let canvas = state.canvas_size();
                let position = CrosshairPosition {
                    point,
                    visible: (0.0..=canvas.width).contains(&point.x)
                        && (0.0..=canvas.height).contains(&point.y),
                };
                self.last_known[view] = position;
                position
            }
            Ok(point) => {
                log::warn!("Crosshair projected to non-finite point {:?} on {}", point, view);
                self.hidden_fallback(view)
            }
            Err(err) => {
                log::debug!("Using last known crosshair position on {}: {}", view, err);
                self.hidden_fallback(view)
            }
        }
    }

    fn hidden_fallback(&self, view: ViewKind) -> CrosshairPosition {
        CrosshairPosition {
            visible: false,
            ..self.last_known[view]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Size;

    fn coordinator() -> CrosshairCoordinator {
        CrosshairCoordinator::new(VolumeModel::default())
    }

    #[test]
    fn test_starts_at_volume_centre() {
        let crosshair = coordinator();
        let p = crosshair.world_position();
        assert!((p.x - 151.0).abs() < 1e-9);
        assert!((p.y - 151.0).abs() < 1e-9);
        assert!((p.z - 211.4).abs() < 1e-9);
    }

    #[test]
    fn test_update_position_clamps() {
        let mut crosshair = coordinator();
        let p = crosshair.update_position(Vec3::new(-10.0, 1000.0, 5.0));
        assert_eq!(p.x, 0.0);
        assert!((p.y - 301.5).abs() < 1e-9);
        assert_eq!(p.z, 5.0);
    }

    #[test]
    fn test_non_finite_position_rejected() {
        let mut crosshair = coordinator();
        let before = crosshair.world_position();
        assert_eq!(crosshair.update_position(Vec3::new(f64::NAN, 1.0, 1.0)), before);
        assert_eq!(crosshair.update_position(Vec3::new(1.0, f64::INFINITY, 1.0)), before);
    }

    #[test]
    fn test_slice_indices_follow_position() {
        let mut crosshair = coordinator();
        let slices = crosshair.slice_indices();
        assert_eq!(slices[ViewKind::Sagittal], 302);
        assert_eq!(slices[ViewKind::Coronal], 302);
        assert_eq!(slices[ViewKind::Axial], 302);

        crosshair.update_position(Vec3::new(10.0, 20.0, 70.0));
        let slices = crosshair.slice_indices();
        assert_eq!(slices[ViewKind::Sagittal], 20);
        assert_eq!(slices[ViewKind::Coronal], 40);
        assert_eq!(slices[ViewKind::Axial], 100);
    }

    #[test]
    fn test_step_slice_stops_at_ends() {
        let mut crosshair = coordinator();
        assert_eq!(crosshair.set_slice(ViewKind::Axial, 10_000), 603);
        assert_eq!(crosshair.step_slice(ViewKind::Axial, SliceStep::Next), 603);
        assert_eq!(crosshair.step_slice(ViewKind::Axial, SliceStep::Previous), 602);

        crosshair.set_slice(ViewKind::Sagittal, 0);
        assert_eq!(crosshair.step_slice(ViewKind::Sagittal, SliceStep::Previous), 0);
        assert_eq!(crosshair.world_position().x, 0.0);
    }

    #[test]
    fn test_set_slice_keeps_in_plane_components() {
        let mut crosshair = coordinator();
        let before = crosshair.world_position();
        crosshair.set_slice(ViewKind::Coronal, 100);
        let after = crosshair.world_position();
        assert_eq!(after.x, before.x);
        assert_eq!(after.z, before.z);
        assert!((after.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_set_volume_recentres() {
        let mut crosshair = coordinator();
        crosshair.update_position(Vec3::ZERO);
        let volume = VolumeModel::new(
            Vec3::ZERO,
            Vec3::new(1.0, 1.0, 1.0),
            crate::volume::VoxelCounts::new(10, 20, 30),
        )
        .unwrap();
        crosshair.set_volume(volume);
        assert_eq!(crosshair.world_position(), Vec3::new(5.0, 10.0, 15.0));
    }

    #[test]
    fn test_canvas_position_and_visibility() {
        let mut crosshair = coordinator();
        let mut state = ViewInteractionState::new(ViewKind::Axial);
        let position = crosshair.crosshair_canvas_position(ViewKind::Axial, &state);
        assert!(position.visible);
        // Centre of a 200x200 image inside a 500x200 canvas, flipped in x.
        assert!((position.point.x - 249.66887).abs() < 1e-3);
        assert!((position.point.y - 100.0).abs() < 1e-9);

        state.pan_by(kurbo::Vec2::new(400.0, 0.0));
        assert!(!crosshair.crosshair_canvas_position(ViewKind::Axial, &state).visible);
    }

    #[test]
    fn test_degenerate_canvas_returns_last_known() {
        let mut crosshair = coordinator();
        let mut state = ViewInteractionState::new(ViewKind::Sagittal);
        let known = crosshair.crosshair_canvas_position(ViewKind::Sagittal, &state);

        assert!(known.visible);

        state.set_canvas_size(Size::ZERO);
        let fallback = crosshair.crosshair_canvas_position(ViewKind::Sagittal, &state);
        assert_eq!(fallback.point, known.point);
        assert!(!fallback.visible);

        // The stored position stays visible once the canvas is usable again.
        state.set_canvas_size(Size::new(500.0, 200.0));
        assert_eq!(crosshair.crosshair_canvas_position(ViewKind::Sagittal, &state), known);
    }
}
