//! The three-view viewer: shared crosshair, per-view zoom/pan, gestures.

use crate::camera::{ViewInteractionState, ZoomInfo};
use crate::config::{ConfigError, InteractionConfig};
use crate::crosshair::{CrosshairCoordinator, CrosshairPosition, SliceStep};
use crate::gesture::{CursorStyle, DragMode, Gesture, GestureRouter, GestureTarget};
use crate::input::{InputEvent, KeyEvent, PointerEvent, TouchEvent};
use crate::transform::{self, TransformError};
use crate::volume::{PerView, Vec3, ViewKind, VolumeMetadata, VolumeModel};
use kurbo::{Point, Rect, Size, Vec2};
use serde::Serialize;

/// State shared by the three views.
///
/// Every mutation goes through one method per field: [`Self::update_position`]
/// for the crosshair, [`Self::zoom_by`]/[`Self::zoom_with_focus`] for zoom and
/// [`Self::pan`] for pan. Failures are logged and leave the state unchanged.
#[derive(Debug, Clone)]
pub struct ViewerState {
    config: InteractionConfig,
    crosshair: CrosshairCoordinator,
    views: PerView<ViewInteractionState>,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new(InteractionConfig::default())
    }
}

impl ViewerState {
    pub fn new(config: InteractionConfig) -> Self {
        let views = PerView::from_fn(|view| {
            ViewInteractionState::with_zoom_limits(view, config.min_zoom, config.max_zoom)
        });
        Self {
            config,
            crosshair: CrosshairCoordinator::new(VolumeModel::default()),
            views,
        }
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    pub fn volume(&self) -> &VolumeModel {
        self.crosshair.volume()
    }

    pub fn world_position(&self) -> Vec3 {
        self.crosshair.world_position()
    }

    pub fn view(&self, view: ViewKind) -> &ViewInteractionState {
        &self.views[view]
    }

    /// Replace the volume; the crosshair moves to its centre.
    pub fn set_volume(&mut self, volume: VolumeModel) {
        self.crosshair.set_volume(volume);
        for view in ViewKind::ALL {
            self.enforce_pan_bounds(view);
        }
    }

    /// Apply volume metadata from the backend, degrading to defaults.
    pub fn set_volume_metadata(&mut self, metadata: &VolumeMetadata) {
        self.set_volume(VolumeModel::from_metadata(metadata));
    }

    pub fn set_canvas_size(&mut self, view: ViewKind, size: Size) {
        self.views[view].set_canvas_size(size);
        self.enforce_pan_bounds(view);
    }

    pub fn set_drawn_size(&mut self, view: ViewKind, size: Option<Size>) {
        self.views[view].set_drawn_size(size);
        self.enforce_pan_bounds(view);
    }

    /// Move the crosshair (clamped into the volume). All three views follow.
    pub fn update_position(&mut self, candidate: Vec3) -> Vec3 {
        self.crosshair.update_position(candidate)
    }

    pub fn crosshair_position(&mut self, view: ViewKind) -> CrosshairPosition {
        self.crosshair.crosshair_canvas_position(view, &self.views[view])
    }

    pub fn slice_index(&self, view: ViewKind) -> usize {
        self.crosshair.slice_index(view)
    }

    pub fn step_slice(&mut self, view: ViewKind, step: SliceStep) -> usize {
        self.crosshair.step_slice(view, step)
    }

    pub fn set_slice(&mut self, view: ViewKind, index: usize) -> usize {
        self.crosshair.set_slice(view, index)
    }

    /// Ruler length in mm between two canvas points of one view.
    ///
    /// `None` if the view's projection cannot be built.
    pub fn measure_distance(&self, view: ViewKind, from: Point, to: Point) -> Option<f64> {
        let state = &self.views[view];
        let measured = state
            .projection(self.crosshair.volume())
            .and_then(|projection| {
                transform::canvas_distance_mm(from, to, &projection, state.zoom(), state.pan())
            });
        match measured {
            Ok(distance) => Some(distance),
            Err(err) => {
                log::debug!("Cannot measure on {}: {}", view, err);
                None
            }
        }
    }

    /// Canvas point to world, at the crosshair's current depth in that view.
    pub fn canvas_to_world(&self, view: ViewKind, point: Point) -> Result<Vec3, TransformError> {
        self.views[view].canvas_to_world(point, self.crosshair.depth(view), self.crosshair.volume())
    }

    /// Focus-preserving relative zoom. Returns whether the zoom changed.
    pub fn zoom_by(&mut self, view: ViewKind, delta: f64, focus: Option<Point>) -> bool {
        let result = self.views[view].zoom_by(self.crosshair.volume(), delta, focus);
        self.finish_zoom(view, result)
    }

    /// Focus-preserving absolute zoom. Returns whether the zoom changed.
    pub fn zoom_with_focus(&mut self, view: ViewKind, zoom: f64, focus: Option<Point>) -> bool {
        let result = self.views[view].zoom_with_focus(self.crosshair.volume(), zoom, focus);
        self.finish_zoom(view, result)
    }

    fn finish_zoom(&mut self, view: ViewKind, result: Result<bool, TransformError>) -> bool {
        match result {
            Ok(changed) => {
                if changed {
                    self.enforce_pan_bounds(view);
                }
                changed
            }
            Err(err) => {
                log::warn!("Zoom on {} rejected: {}", view, err);
                false
            }
        }
    }

    /// Focus for button zoom: the crosshair when it is on screen.
    fn crosshair_focus(&mut self, view: ViewKind) -> Option<Point> {
        let position = self.crosshair_position(view);
        position.visible.then_some(position.point)
    }

    pub fn zoom_in(&mut self, view: ViewKind) -> bool {
        let focus = self.crosshair_focus(view);
        self.zoom_by(view, self.config.button_zoom_step, focus)
    }

    pub fn zoom_out(&mut self, view: ViewKind) -> bool {
        let focus = self.crosshair_focus(view);
        self.zoom_by(view, -self.config.button_zoom_step, focus)
    }

    /// Zoom to `target` over the configured number of frames.
    pub fn smooth_zoom_to(&mut self, view: ViewKind, target: f64, focus: Option<Point>) -> bool {
        self.views[view].start_smooth_zoom(target, focus, self.config.smooth_zoom_steps)
    }

    pub fn pan(&mut self, view: ViewKind, delta: Vec2) {
        self.views[view].pan_by(delta);
        self.enforce_pan_bounds(view);
    }

    /// Start inertial panning with a velocity in px per frame.
    pub fn apply_momentum(&mut self, view: ViewKind, velocity: Vec2) -> bool {
        let started = self.views[view].start_momentum(
            velocity,
            self.config.momentum_decay,
            self.config.momentum_threshold,
        );
        if started {
            log::debug!("Momentum on {} started at {:?}", view, velocity);
        }
        started
    }

    pub fn stop_momentum(&mut self, view: ViewKind) {
        self.views[view].stop_momentum();
    }

    /// Back to zoom 1 with no pan.
    pub fn reset_zoom(&mut self, view: ViewKind) {
        self.views[view].reset();
    }

    /// Centre the image and zoom it to fill the canvas.
    pub fn fit_to_view(&mut self, view: ViewKind) -> bool {
        let state = &mut self.views[view];
        let Some(target) = state.fit_zoom(self.crosshair.volume(), self.config.fit_margin) else {
            log::debug!("Nothing to fit on {}", view);
            return false;
        };
        state.stop_animations();
        state.set_pan(state.centred_pan(self.crosshair.volume()));
        state.start_smooth_zoom(target, None, self.config.smooth_zoom_steps);
        true
    }

    /// Zoom so that `rect` (canvas pixels) fills the canvas, centred.
    pub fn zoom_to_rect(&mut self, view: ViewKind, rect: Rect) -> bool {
        let state = &mut self.views[view];
        let Some(target) = state.rect_zoom(rect, self.config.zoom_rect_margin) else {
            log::debug!("Ignoring empty zoom rect {:?} on {}", rect, view);
            return false;
        };
        state.stop_animations();
        state.pan_by(state.canvas_center() - rect.center());
        state.start_smooth_zoom(target, None, self.config.smooth_zoom_steps);
        true
    }

    pub fn zoom_info(&self, view: ViewKind) -> ZoomInfo {
        self.views[view].zoom_info()
    }

    /// Advance every view's frame tasks. Returns whether any still runs.
    pub fn tick(&mut self) -> bool {
        let mut running = false;
        for view in ViewKind::ALL {
            running |= self.views[view].tick(self.crosshair.volume());
            self.enforce_pan_bounds(view);
        }
        log::trace!("Frame tick, animations running: {}", running);
        running
    }

    pub fn is_animating(&self) -> bool {
        self.views.iter().any(|(_, state)| state.is_animating())
    }

    /// Cancel every running frame task.
    pub fn stop_all(&mut self) {
        for view in ViewKind::ALL {
            self.views[view].stop_animations();
        }
    }

    fn enforce_pan_bounds(&mut self, view: ViewKind) {
        if self.config.clamp_pan {
            self.views[view].apply_pan_bounds(self.crosshair.volume());
        }
    }
}

impl GestureTarget for ViewerState {
    fn world_position(&self) -> Vec3 {
        self.crosshair.world_position()
    }

    fn spacing(&self) -> Vec3 {
        self.crosshair.volume().spacing()
    }

    fn zoom(&self, view: ViewKind) -> f64 {
        self.views[view].zoom()
    }

    fn crosshair_canvas_position(&mut self, view: ViewKind) -> CrosshairPosition {
        self.crosshair_position(view)
    }

    fn canvas_to_world(&self, view: ViewKind, point: Point) -> Result<Vec3, TransformError> {
        ViewerState::canvas_to_world(self, view, point)
    }

    fn update_position(&mut self, world: Vec3) -> Vec3 {
        ViewerState::update_position(self, world)
    }

    fn slice_index(&self, view: ViewKind) -> usize {
        ViewerState::slice_index(self, view)
    }

    fn set_slice(&mut self, view: ViewKind, index: usize) -> usize {
        ViewerState::set_slice(self, view, index)
    }

    fn pan(&mut self, view: ViewKind, delta: Vec2) {
        ViewerState::pan(self, view, delta);
    }

    fn zoom_by(&mut self, view: ViewKind, delta: f64, focus: Option<Point>) {
        ViewerState::zoom_by(self, view, delta, focus);
    }

    fn zoom_with_focus(&mut self, view: ViewKind, zoom: f64, focus: Option<Point>) {
        ViewerState::zoom_with_focus(self, view, zoom, focus);
    }

    fn start_momentum(&mut self, view: ViewKind, velocity: Vec2) -> bool {
        self.apply_momentum(view, velocity)
    }

    fn stop_animations(&mut self, view: ViewKind) {
        self.views[view].stop_animations();
    }

    fn reset_zoom(&mut self, view: ViewKind) {
        ViewerState::reset_zoom(self, view);
    }
}

/// What a renderer needs to draw one view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub crosshair_canvas_x: f64,
    pub crosshair_canvas_y: f64,
    pub crosshair_visible: bool,
    pub zoom: f64,
    pub pan: Vec2,
    pub current_slice_index: usize,
    pub slice_count: u32,
    pub cursor_style: CursorStyle,
}

/// What a renderer needs to draw all three views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewerSnapshot {
    pub world_position: Vec3,
    pub views: PerView<ViewSnapshot>,
}

/// Viewer state plus the gesture router feeding it.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    state: ViewerState,
    gestures: GestureRouter,
}

impl Viewer {
    /// Create a viewer after validating `config`.
    pub fn new(config: InteractionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: ViewerState::new(config.clone()),
            gestures: GestureRouter::new(config),
        })
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ViewerState {
        &mut self.state
    }

    pub fn gestures(&self) -> &GestureRouter {
        &self.gestures
    }

    /// Switch between navigation and slice scrolling for primary drags.
    pub fn set_drag_mode(&mut self, mode: DragMode) -> Option<Gesture> {
        self.gestures.set_mode(mode)
    }

    pub fn handle_pointer(&mut self, view: ViewKind, event: PointerEvent) -> Option<Gesture> {
        self.gestures.handle_pointer(&mut self.state, view, event)
    }

    pub fn handle_touch(&mut self, view: ViewKind, event: TouchEvent) -> Option<Gesture> {
        self.gestures.handle_touch(&mut self.state, view, event)
    }

    /// Apply a key press to the focused view. Returns whether it was used.
    pub fn handle_key(&mut self, view: ViewKind, event: &KeyEvent) -> bool {
        let KeyEvent::Pressed(key) = event else {
            return false;
        };
        let step = self.state.config.keyboard_pan_step;
        match key.as_str() {
            "+" | "=" => {
                self.state.zoom_in(view);
            }
            "-" => {
                self.state.zoom_out(view);
            }
            "0" => self.state.reset_zoom(view),
            "ArrowLeft" => self.state.pan(view, Vec2::new(-step, 0.0)),
            "ArrowRight" => self.state.pan(view, Vec2::new(step, 0.0)),
            "ArrowUp" => self.state.pan(view, Vec2::new(0.0, -step)),
            "ArrowDown" => self.state.pan(view, Vec2::new(0.0, step)),
            "PageUp" => {
                self.state.step_slice(view, SliceStep::Next);
            }
            "PageDown" => {
                self.state.step_slice(view, SliceStep::Previous);
            }
            _ => return false,
        }
        true
    }

    /// Route any input event to its handler.
    pub fn handle_input(&mut self, view: ViewKind, event: InputEvent) -> Option<Gesture> {
        match event {
            InputEvent::Pointer(event) => self.handle_pointer(view, event),
            InputEvent::Touch(event) => self.handle_touch(view, event),
            InputEvent::Key(event) => {
                self.handle_key(view, &event);
                None
            }
        }
    }

    pub fn tick(&mut self) -> bool {
        self.state.tick()
    }

    /// Stop all frame tasks and drop any gesture in progress.
    pub fn teardown(&mut self) {
        self.state.stop_all();
        self.gestures.cancel();
    }

    pub fn cursor_style(&mut self, view: ViewKind) -> CursorStyle {
        let crosshair = self.state.crosshair_position(view);
        self.gestures.cursor_style(view, crosshair.point)
    }

    pub fn snapshot(&mut self) -> ViewerSnapshot {
        let views = PerView::from_fn(|view| {
            let crosshair = self.state.crosshair_position(view);
            let state = &self.state.views[view];
            ViewSnapshot {
                crosshair_canvas_x: crosshair.point.x,
                crosshair_canvas_y: crosshair.point.y,
                crosshair_visible: crosshair.visible,
                zoom: state.zoom(),
                pan: state.pan(),
                current_slice_index: self.state.slice_index(view),
                slice_count: self.state.volume().slice_count(view),
                cursor_style: self.gestures.cursor_style(view, crosshair.point),
            }
        });
        ViewerSnapshot {
            world_position: self.state.world_position(),
            views,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{SliceCounts, VoxelSizes};

    #[test]
    fn test_metadata_recentres() {
        let mut state = ViewerState::default();
        state.set_volume_metadata(&VolumeMetadata {
            slice_counts: SliceCounts {
                axial: Some(100),
                coronal: Some(200),
                sagittal: Some(300),
            },
            voxel_sizes: VoxelSizes {
                x_spacing_mm: Some(1.0),
                y_spacing_mm: Some(1.0),
                z_spacing_mm: Some(2.0),
            },
        });
        assert_eq!(state.world_position(), Vec3::new(150.0, 100.0, 100.0));
        assert_eq!(state.volume().slice_count(ViewKind::Axial), 100);
    }

    #[test]
    fn test_zoom_in_uses_crosshair_focus() {
        let mut state = ViewerState::default();
        let before = state.crosshair_position(ViewKind::Axial);
        assert!(state.zoom_in(ViewKind::Axial));
        let after = state.crosshair_position(ViewKind::Axial);
        assert!((state.view(ViewKind::Axial).zoom() - 1.2).abs() < 1e-9);
        assert!((after.point.x - before.point.x).abs() < 1e-6);
        assert!((after.point.y - before.point.y).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_on_zero_canvas_is_noop() {
        let mut state = ViewerState::default();
        state.set_canvas_size(ViewKind::Coronal, Size::ZERO);
        assert!(!state.zoom_by(ViewKind::Coronal, 1.0, Some(Point::new(3.0, 3.0))));
        let view = state.view(ViewKind::Coronal);
        assert!((view.zoom() - 1.0).abs() < f64::EPSILON);
        assert!(view.pan().is_finite());
        assert_eq!(view.pan(), Vec2::ZERO);
    }

    #[test]
    fn test_clamp_pan_option() {
        let config = InteractionConfig {
            clamp_pan: true,
            ..Default::default()
        };
        let mut state = ViewerState::new(config);
        state.pan(ViewKind::Axial, Vec2::new(500.0, 0.0));
        assert!(state.view(ViewKind::Axial).pan().hypot() < 1e-9);

        // Zoom 4 about the centre leaves pan at (-300, -300); x may move
        // 150 px either way before the 800 px image uncovers the canvas.
        state.zoom_with_focus(ViewKind::Axial, 4.0, None);
        state.pan(ViewKind::Axial, Vec2::new(500.0, 0.0));
        assert!((state.view(ViewKind::Axial).pan().x + 150.0).abs() < 1e-9);
        state.pan(ViewKind::Axial, Vec2::new(-1000.0, 0.0));
        assert!((state.view(ViewKind::Axial).pan().x + 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_to_view_animates() {
        let mut state = ViewerState::default();
        let view = ViewKind::Sagittal;
        state.zoom_with_focus(view, 3.0, Some(Point::new(20.0, 30.0)));
        state.pan(view, Vec2::new(40.0, 40.0));
        assert!(state.fit_to_view(view));

        let mut frames = 0;
        while state.tick() {
            frames += 1;
        }
        assert_eq!(frames, 4);

        // Image centre sits on the canvas centre.
        let volume = *state.volume();
        let fitted = state.view(view);
        assert!((fitted.zoom() - 0.95).abs() < 1e-9);
        let projection = fitted.projection(&volume).unwrap();
        let drawn = projection.drawn_size;
        let centre = Point::new(
            projection.offset.x + drawn.width * fitted.zoom() / 2.0 + fitted.pan().x,
            projection.offset.y + drawn.height * fitted.zoom() / 2.0 + fitted.pan().y,
        );
        assert!(centre.distance(fitted.canvas_center()) < 1e-9);
    }

    #[test]
    fn test_zoom_to_rect_centres_rect() {
        let mut state = ViewerState::default();
        let rect = Rect::new(300.0, 20.0, 340.0, 60.0);
        let world = state.canvas_to_world(ViewKind::Axial, rect.center()).unwrap();

        assert!(state.zoom_to_rect(ViewKind::Axial, rect));
        while state.tick() {}

        let view = state.view(ViewKind::Axial);
        assert!((view.zoom() - 4.5).abs() < 1e-9);
        let landed = view.world_to_canvas(world, state.volume()).unwrap();
        assert!((landed.x - 250.0).abs() < 1e-6);
        assert!((landed.y - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_keyboard() {
        let mut viewer = Viewer::default();
        let view = ViewKind::Coronal;
        assert!(viewer.handle_key(view, &KeyEvent::Pressed("+".into())));
        assert!((viewer.state().view(view).zoom() - 1.2).abs() < 1e-9);

        let slice = viewer.state().slice_index(view);
        viewer.handle_key(view, &KeyEvent::Pressed("PageUp".into()));
        assert_eq!(viewer.state().slice_index(view), slice + 1);

        let pan = viewer.state().view(view).pan();
        viewer.handle_key(view, &KeyEvent::Pressed("ArrowDown".into()));
        assert_eq!(viewer.state().view(view).pan(), pan + Vec2::new(0.0, 10.0));

        viewer.handle_key(view, &KeyEvent::Pressed("0".into()));
        assert!((viewer.state().view(view).zoom() - 1.0).abs() < f64::EPSILON);
        assert_eq!(viewer.state().view(view).pan(), Vec2::ZERO);

        assert!(!viewer.handle_key(view, &KeyEvent::Pressed("q".into())));
        assert!(!viewer.handle_key(view, &KeyEvent::Released("+".into())));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = InteractionConfig {
            min_zoom: 0.0,
            ..Default::default()
        };
        assert!(Viewer::new(config).is_err());
    }

    #[test]
    fn test_measure_distance() {
        let mut state = ViewerState::default();
        let from = Point::new(150.0, 20.0);
        let to = Point::new(150.0, 120.0);
        let d = state.measure_distance(ViewKind::Coronal, from, to).unwrap();
        assert!((d - 211.4).abs() < 1e-9);

        // Zooming in shortens what the same pixels cover
        state.zoom_with_focus(ViewKind::Coronal, 2.0, None);
        let d = state.measure_distance(ViewKind::Coronal, from, to).unwrap();
        assert!((d - 105.7).abs() < 1e-9);

        state.set_canvas_size(ViewKind::Coronal, Size::ZERO);
        assert_eq!(state.measure_distance(ViewKind::Coronal, from, to), None);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut viewer = Viewer::default();
        let snapshot = viewer.snapshot();
        assert_eq!(snapshot.views[ViewKind::Axial].slice_count, 604);
        assert_eq!(snapshot.views[ViewKind::Axial].current_slice_index, 302);
        assert!(snapshot.views[ViewKind::Sagittal].crosshair_visible);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["views"]["coronal"]["cursor_style"], "crosshair");
        assert_eq!(json["views"]["axial"]["zoom"], 1.0);
        assert!(json["world_position"]["z"].is_number());
    }
}
