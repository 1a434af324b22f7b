//! Gesture recognition for the three views.
//!
//! One [`GestureRouter`] serves all views. It classifies raw pointer and
//! touch input into clicks, crosshair drags, pans and pinches, and applies
//! the result through a [`GestureTarget`].

use crate::config::InteractionConfig;
use crate::crosshair::CrosshairPosition;
use crate::input::{
    ClickTracker, Instant, MouseButton, PointerEvent, TouchEvent, TouchPoint, two_point_geometry,
};
use crate::transform::TransformError;
use crate::volume::{PerView, Vec3, ViewKind};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Which crosshair line, if any, a pointer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrosshairHit {
    #[default]
    None,
    /// The vertical line; dragging it moves the view's width axis.
    Vertical,
    /// The horizontal line; dragging it moves the view's height axis.
    Horizontal,
    /// Both lines at once.
    Intersection,
}

impl CrosshairHit {
    pub fn moves_width(self) -> bool {
        matches!(self, CrosshairHit::Vertical | CrosshairHit::Intersection)
    }

    pub fn moves_height(self) -> bool {
        matches!(self, CrosshairHit::Horizontal | CrosshairHit::Intersection)
    }
}

/// Classify a pointer against the crosshair lines through `crosshair`.
///
/// The intersection zone is the square where both line distances are within
/// `threshold * intersection_ratio`. Outside it, the nearer line within
/// `threshold` wins.
pub fn hit_test_crosshair(
    pointer: Point,
    crosshair: Point,
    threshold: f64,
    intersection_ratio: f64,
) -> CrosshairHit {
    if !(pointer.is_finite() && crosshair.is_finite()) {
        return CrosshairHit::None;
    }
    let to_vertical = (pointer.x - crosshair.x).abs();
    let to_horizontal = (pointer.y - crosshair.y).abs();
    let inner = threshold * intersection_ratio;

    if to_vertical <= inner && to_horizontal <= inner {
        return CrosshairHit::Intersection;
    }
    match (to_vertical <= threshold, to_horizontal <= threshold) {
        (true, true) if to_vertical <= to_horizontal => CrosshairHit::Vertical,
        (true, true) => CrosshairHit::Horizontal,
        (true, false) => CrosshairHit::Vertical,
        (false, true) => CrosshairHit::Horizontal,
        (false, false) => CrosshairHit::None,
    }
}

/// Cursor shown over a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CursorStyle {
    Crosshair,
    EwResize,
    NsResize,
    Move,
    Grabbing,
}

impl CursorStyle {
    /// CSS `cursor` value.
    pub fn as_css(self) -> &'static str {
        match self {
            CursorStyle::Crosshair => "crosshair",
            CursorStyle::EwResize => "ew-resize",
            CursorStyle::NsResize => "ns-resize",
            CursorStyle::Move => "move",
            CursorStyle::Grabbing => "grabbing",
        }
    }
}

impl From<CrosshairHit> for CursorStyle {
    fn from(hit: CrosshairHit) -> Self {
        match hit {
            CrosshairHit::None => CursorStyle::Crosshair,
            CrosshairHit::Vertical => CursorStyle::EwResize,
            CrosshairHit::Horizontal => CursorStyle::NsResize,
            CrosshairHit::Intersection => CursorStyle::Move,
        }
    }
}

/// World-space offset produced by dragging a crosshair line.
///
/// `pointer_delta` is the total pointer travel since the press. Each canvas
/// pixel moves the grabbed axis by `spacing / zoom` mm, negated on flipped
/// axes so the line follows the pointer.
pub fn crosshair_drag_delta(
    view: ViewKind,
    hit: CrosshairHit,
    pointer_delta: Vec2,
    zoom: f64,
    spacing: Vec3,
) -> Vec3 {
    let (width_axis, height_axis) = view.plane_axes();
    let (flip_w, flip_h) = view.flips();
    let sign = |flipped: bool| if flipped { -1.0 } else { 1.0 };

    let mut delta = Vec3::ZERO;
    if hit.moves_width() {
        delta.set(width_axis, sign(flip_w) * pointer_delta.x / zoom * spacing.get(width_axis));
    }
    if hit.moves_height() {
        delta.set(height_axis, sign(flip_h) * pointer_delta.y / zoom * spacing.get(height_axis));
    }
    delta
}

/// What a primary-button drag off the crosshair lines does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DragMode {
    /// Clicks recentre, line drags move the crosshair, other drags pan.
    #[default]
    Navigate,
    /// Vertical drags scroll through the view's slices. No clicks.
    SliceScroll,
}

/// Slice reached after dragging `dy` px from `start`, one slice per `step`
/// px. Dragging up moves to higher indices; the result never goes below 0.
pub fn slice_drag_index(start: usize, dy: f64, step: f64) -> usize {
    let offset = (dy / step).round();
    if !offset.is_finite() {
        return start;
    }
    (start as f64 - offset).max(0.0) as usize
}

/// What the router drives. Implemented by the viewer state; tests use mocks.
pub trait GestureTarget {
    fn world_position(&self) -> Vec3;
    fn spacing(&self) -> Vec3;
    fn zoom(&self, view: ViewKind) -> f64;
    fn crosshair_canvas_position(&mut self, view: ViewKind) -> CrosshairPosition;
    /// Canvas point to world, keeping the current depth along the view's slice axis.
    fn canvas_to_world(&self, view: ViewKind, point: Point) -> Result<Vec3, TransformError>;
    fn update_position(&mut self, world: Vec3) -> Vec3;
    fn slice_index(&self, view: ViewKind) -> usize;
    /// Show a slice, clamped to the view's range; returns the slice shown.
    fn set_slice(&mut self, view: ViewKind, index: usize) -> usize;
    fn pan(&mut self, view: ViewKind, delta: Vec2);
    fn zoom_by(&mut self, view: ViewKind, delta: f64, focus: Option<Point>);
    fn zoom_with_focus(&mut self, view: ViewKind, zoom: f64, focus: Option<Point>);
    /// Start inertial panning; returns whether it started.
    fn start_momentum(&mut self, view: ViewKind, velocity: Vec2) -> bool;
    fn stop_animations(&mut self, view: ViewKind);
    fn reset_zoom(&mut self, view: ViewKind);
}

/// Recognised gesture, reported after the router has applied it.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// Crosshair re-centred at the clicked point.
    Click { view: ViewKind, world: Vec3 },
    DoubleClick { view: ViewKind },
    CrosshairDragStarted { view: ViewKind, hit: CrosshairHit },
    CrosshairDragEnded { view: ViewKind },
    SliceDragStarted { view: ViewKind },
    SliceDragEnded { view: ViewKind, slice: usize },
    PanStarted { view: ViewKind },
    PanEnded { view: ViewKind, momentum: bool },
    PinchStarted { view: ViewKind },
    PinchEnded { view: ViewKind },
    /// The session ended without effect.
    Cancelled { view: ViewKind },
}

/// Coarse router state, for hosts and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    Pending,
    Dragging,
    Pinching,
}

#[derive(Debug, Clone)]
struct Press {
    view: ViewKind,
    button: MouseButton,
    origin: Point,
    last: Point,
    started: Instant,
    hit: CrosshairHit,
    /// World position at the press; crosshair drags offset from it.
    start_world: Vec3,
    /// Zoom at the press, so a mid-drag zoom does not rescale the offset.
    zoom: f64,
}

#[derive(Debug, Clone)]
enum DragKind {
    Crosshair,
    Pan {
        last_sample: (Instant, Point),
        /// Recent velocities in px/ms, newest last.
        velocities: VecDeque<Vec2>,
    },
    Slice { start: usize },
}

#[derive(Debug, Clone)]
struct Drag {
    press: Press,
    kind: DragKind,
}

#[derive(Debug, Clone, Copy)]
struct Pinch {
    view: ViewKind,
    initial_distance: f64,
    initial_zoom: f64,
}

#[derive(Debug, Clone, Default)]
enum GestureState {
    #[default]
    Idle,
    Pending(Press),
    Dragging(Drag),
    Pinching(Pinch),
}

/// Finite-state machine turning raw input into view mutations.
#[derive(Debug, Clone)]
pub struct GestureRouter {
    config: InteractionConfig,
    mode: DragMode,
    state: GestureState,
    /// Last pointer position over each view, for cursor feedback.
    hover: PerView<Option<Point>>,
    clicks: ClickTracker,
}

impl Default for GestureRouter {
    fn default() -> Self {
        Self::new(InteractionConfig::default())
    }
}

impl GestureRouter {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            mode: DragMode::Navigate,
            state: GestureState::Idle,
            hover: PerView::default(),
            clicks: ClickTracker::new(),
        }
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    pub fn mode(&self) -> DragMode {
        self.mode
    }

    /// Switch drag mode. Any session in progress is cancelled.
    pub fn set_mode(&mut self, mode: DragMode) -> Option<Gesture> {
        if mode == self.mode {
            return None;
        }
        log::debug!("Drag mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        self.cancel()
    }

    pub fn phase(&self) -> GesturePhase {
        match self.state {
            GestureState::Idle => GesturePhase::Idle,
            GestureState::Pending(_) => GesturePhase::Pending,
            GestureState::Dragging(_) => GesturePhase::Dragging,
            GestureState::Pinching(_) => GesturePhase::Pinching,
        }
    }

    /// View owning the current session, if any.
    pub fn active_view(&self) -> Option<ViewKind> {
        match &self.state {
            GestureState::Idle => None,
            GestureState::Pending(press) => Some(press.view),
            GestureState::Dragging(drag) => Some(drag.press.view),
            GestureState::Pinching(pinch) => Some(pinch.view),
        }
    }

    /// Abandon the current session without applying anything further.
    pub fn cancel(&mut self) -> Option<Gesture> {
        let view = self.active_view()?;
        log::debug!("Gesture on {} cancelled", view);
        self.state = GestureState::Idle;
        Some(Gesture::Cancelled { view })
    }

    /// Cursor for a view given its crosshair canvas position.
    pub fn cursor_style(&self, view: ViewKind, crosshair: Point) -> CursorStyle {
        match &self.state {
            GestureState::Dragging(Drag {
                press,
                kind: DragKind::Slice { .. },
            }) if press.view == view => return CursorStyle::NsResize,
            GestureState::Dragging(drag) if drag.press.view == view => return CursorStyle::Grabbing,
            GestureState::Pinching(pinch) if pinch.view == view => return CursorStyle::Grabbing,
            GestureState::Pending(press) if press.view == view && self.mode == DragMode::Navigate => {
                return press.hit.into();
            }
            _ => {}
        }
        if self.mode == DragMode::SliceScroll {
            return CursorStyle::NsResize;
        }
        self.hover[view]
            .map(|pointer| self.hit_test(pointer, crosshair))
            .unwrap_or_default()
            .into()
    }

    pub fn handle_pointer(
        &mut self,
        target: &mut impl GestureTarget,
        view: ViewKind,
        event: PointerEvent,
    ) -> Option<Gesture> {
        match event {
            PointerEvent::Down {
                position,
                button,
                time,
            } => {
                self.hover[view] = Some(position);
                self.press(target, view, position, button, time)
            }
            PointerEvent::Move { position, time } => {
                self.hover[view] = Some(position);
                self.move_to(target, view, position, time)
            }
            PointerEvent::Up { position, time } => self.release(target, position, time),
            PointerEvent::Leave { time } => {
                self.hover[view] = None;
                self.leave(target, view, time)
            }
            PointerEvent::Wheel { position, delta } => {
                self.hover[view] = Some(position);
                self.wheel(target, view, position, delta);
                None
            }
            PointerEvent::DoubleClick { .. } => {
                self.clicks.clear();
                self.double_click(target, view)
            }
        }
    }

    pub fn handle_touch(
        &mut self,
        target: &mut impl GestureTarget,
        view: ViewKind,
        event: TouchEvent,
    ) -> Option<Gesture> {
        match event {
            TouchEvent::Start { touches, time } => match touches.as_slice() {
                [] => None,
                [single] => self.press(target, view, single.position, MouseButton::Left, time),
                [..] => self.start_pinch(target, view, &touches),
            },
            TouchEvent::Move { touches, time } => match (&self.state, touches.as_slice()) {
                (GestureState::Pinching(pinch), [_, _, ..]) => {
                    let pinch = *pinch;
                    self.update_pinch(target, pinch, &touches);
                    None
                }
                (GestureState::Pinching(_), _) => None,
                // Second finger landed without a start event of its own
                (_, [_, _, ..]) => self.start_pinch(target, view, &touches),
                (_, [single]) => self.move_to(target, view, single.position, time),
                (_, []) => None,
            },
            TouchEvent::End { touches, time } => self.end_touch(target, &touches, time),
            TouchEvent::Cancel { .. } => self.cancel(),
        }
    }

    fn hit_test(&self, pointer: Point, crosshair: Point) -> CrosshairHit {
        hit_test_crosshair(
            pointer,
            crosshair,
            self.config.crosshair_threshold,
            self.config.intersection_ratio,
        )
    }

    fn press(
        &mut self,
        target: &mut impl GestureTarget,
        view: ViewKind,
        position: Point,
        button: MouseButton,
        time: Instant,
    ) -> Option<Gesture> {
        if !matches!(self.state, GestureState::Idle) {
            log::debug!("Ignoring {:?} press on {} during active gesture", button, view);
            return None;
        }
        target.stop_animations(view);

        let hit = if button == MouseButton::Left && self.mode == DragMode::Navigate {
            let crosshair = target.crosshair_canvas_position(view);
            self.hit_test(position, crosshair.point)
        } else {
            CrosshairHit::None
        };
        log::debug!("Press on {} at {:?} ({:?}, hit {:?})", view, position, button, hit);

        self.state = GestureState::Pending(Press {
            view,
            button,
            origin: position,
            last: position,
            started: time,
            hit,
            start_world: target.world_position(),
            zoom: target.zoom(view),
        });
        None
    }

    fn move_to(
        &mut self,
        target: &mut impl GestureTarget,
        view: ViewKind,
        position: Point,
        time: Instant,
    ) -> Option<Gesture> {
        match &mut self.state {
            GestureState::Pending(press) if press.view == view => {
                if position.distance(press.origin) <= self.config.drag_threshold {
                    return None;
                }
                let press = press.clone();
                let (kind, started) = if press.hit != CrosshairHit::None {
                    (
                        DragKind::Crosshair,
                        Gesture::CrosshairDragStarted {
                            view,
                            hit: press.hit,
                        },
                    )
                } else if self.mode == DragMode::SliceScroll && press.button == MouseButton::Left {
                    let start = target.slice_index(view);
                    (DragKind::Slice { start }, Gesture::SliceDragStarted { view })
                } else {
                    let kind = DragKind::Pan {
                        last_sample: (press.started, press.origin),
                        velocities: VecDeque::with_capacity(self.config.momentum_samples),
                    };
                    (kind, Gesture::PanStarted { view })
                };
                log::debug!("{:?} on {}", started, view);
                self.state = GestureState::Dragging(Drag { press, kind });
                self.drag_to(target, position, time);
                Some(started)
            }
            GestureState::Dragging(drag) if drag.press.view == view => {
                self.drag_to(target, position, time);
                None
            }
            _ => None,
        }
    }

    fn drag_to(&mut self, target: &mut impl GestureTarget, position: Point, time: Instant) {
        let samples = self.config.momentum_samples;
        let slice_step = self.config.slice_drag_step;
        let GestureState::Dragging(drag) = &mut self.state else {
            return;
        };
        let view = drag.press.view;
        match &mut drag.kind {
            DragKind::Crosshair => {
                let delta = crosshair_drag_delta(
                    view,
                    drag.press.hit,
                    position - drag.press.origin,
                    drag.press.zoom,
                    target.spacing(),
                );
                target.update_position(drag.press.start_world + delta);
            }
            DragKind::Pan {
                last_sample,
                velocities,
            } => {
                target.pan(view, position - drag.press.last);
                let (t0, p0) = *last_sample;
                let dt_ms = time.saturating_duration_since(t0).as_secs_f64() * 1000.0;
                if dt_ms > 0.0 {
                    velocities.push_back((position - p0) / dt_ms);
                    while velocities.len() > samples {
                        velocities.pop_front();
                    }
                }
                *last_sample = (time, position);
            }
            DragKind::Slice { start } => {
                let index = slice_drag_index(*start, position.y - drag.press.origin.y, slice_step);
                target.set_slice(view, index);
            }
        }
        drag.press.last = position;
    }

    fn release(
        &mut self,
        target: &mut impl GestureTarget,
        position: Point,
        time: Instant,
    ) -> Option<Gesture> {
        match std::mem::take(&mut self.state) {
            GestureState::Idle => None,
            GestureState::Pending(press) => self.finish_press(target, press, position, time),
            GestureState::Dragging(drag) => Some(self.finish_drag(target, drag)),
            state @ GestureState::Pinching(_) => {
                // Pinches end on touch events only
                self.state = state;
                None
            }
        }
    }

    fn leave(&mut self, target: &mut impl GestureTarget, view: ViewKind, time: Instant) -> Option<Gesture> {
        match &self.state {
            GestureState::Pending(press) if press.view == view => {
                log::debug!("Pointer left {} before drag, no click", view);
                self.cancel()
            }
            GestureState::Dragging(drag) if drag.press.view == view => {
                let last = drag.press.last;
                self.release(target, last, time)
            }
            _ => None,
        }
    }

    fn finish_press(
        &mut self,
        target: &mut impl GestureTarget,
        press: Press,
        position: Point,
        time: Instant,
    ) -> Option<Gesture> {
        let view = press.view;
        let held = time.saturating_duration_since(press.started);
        if self.mode == DragMode::SliceScroll {
            log::debug!("Press on {} released in slice mode, no click", view);
            return Some(Gesture::Cancelled { view });
        }
        if press.button != MouseButton::Left || held > self.config.click_threshold() {
            log::debug!("Press on {} released without click ({:?} held)", view, held);
            return Some(Gesture::Cancelled { view });
        }

        let world = match target.canvas_to_world(view, position) {
            Ok(world) => target.update_position(world),
            Err(err) => {
                log::warn!("Click on {} ignored: {}", view, err);
                return Some(Gesture::Cancelled { view });
            }
        };

        if self.clicks.register(
            position,
            time,
            self.config.double_click_window(),
            self.config.double_click_distance,
        ) {
            return self.double_click(target, view);
        }
        Some(Gesture::Click { view, world })
    }

    fn finish_drag(&mut self, target: &mut impl GestureTarget, drag: Drag) -> Gesture {
        let view = drag.press.view;
        self.clicks.clear();
        match drag.kind {
            DragKind::Crosshair => {
                log::debug!("Crosshair drag on {} ended", view);
                Gesture::CrosshairDragEnded { view }
            }
            DragKind::Pan { velocities, .. } => {
                let momentum = release_velocity(&velocities)
                    .is_some_and(|velocity| target.start_momentum(view, velocity));
                log::debug!("Pan on {} ended (momentum: {})", view, momentum);
                Gesture::PanEnded { view, momentum }
            }
            DragKind::Slice { .. } => {
                let slice = target.slice_index(view);
                log::debug!("Slice drag on {} ended at {}", view, slice);
                Gesture::SliceDragEnded { view, slice }
            }
        }
    }

    fn wheel(&mut self, target: &mut impl GestureTarget, view: ViewKind, position: Point, delta: Vec2) {
        if delta.y == 0.0 || !delta.y.is_finite() {
            return;
        }
        let step = if delta.y > 0.0 {
            -self.config.wheel_zoom_step
        } else {
            self.config.wheel_zoom_step
        };
        target.zoom_by(view, step, Some(position));
    }

    fn double_click(&mut self, target: &mut impl GestureTarget, view: ViewKind) -> Option<Gesture> {
        log::debug!("Double-click on {}, resetting zoom", view);
        target.reset_zoom(view);
        Some(Gesture::DoubleClick { view })
    }

    fn start_pinch(
        &mut self,
        target: &mut impl GestureTarget,
        view: ViewKind,
        touches: &[TouchPoint],
    ) -> Option<Gesture> {
        let pair = two_point_geometry(touches)?;
        if !(pair.distance.is_finite() && pair.distance > 0.0) {
            return None;
        }
        if let Some(previous) = self.active_view() {
            log::debug!("Pinch on {} replaces gesture on {}", view, previous);
        }
        target.stop_animations(view);
        self.clicks.clear();
        self.state = GestureState::Pinching(Pinch {
            view,
            initial_distance: pair.distance,
            initial_zoom: target.zoom(view),
        });
        Some(Gesture::PinchStarted { view })
    }

    fn update_pinch(&mut self, target: &mut impl GestureTarget, pinch: Pinch, touches: &[TouchPoint]) {
        let Some(pair) = two_point_geometry(touches) else {
            return;
        };
        let zoom = pinch.initial_zoom * (pair.distance / pinch.initial_distance);
        target.zoom_with_focus(pinch.view, zoom, Some(pair.midpoint));
    }

    fn end_touch(
        &mut self,
        target: &mut impl GestureTarget,
        remaining: &[TouchPoint],
        time: Instant,
    ) -> Option<Gesture> {
        match &self.state {
            GestureState::Pinching(pinch) if remaining.len() < 2 => {
                let view = pinch.view;
                log::debug!("Pinch on {} ended", view);
                self.state = GestureState::Idle;
                Some(Gesture::PinchEnded { view })
            }
            GestureState::Pending(press) if remaining.is_empty() => {
                let last = press.last;
                self.release(target, last, time)
            }
            GestureState::Dragging(drag) if remaining.is_empty() => {
                let last = drag.press.last;
                self.release(target, last, time)
            }
            _ => None,
        }
    }
}

/// Mean of the recent pan velocities. Momentum takes it as px per tick.
fn release_velocity(velocities: &VecDeque<Vec2>) -> Option<Vec2> {
    if velocities.is_empty() {
        return None;
    }
    let sum = velocities.iter().fold(Vec2::ZERO, |acc, v| acc + *v);
    Some(sum / velocities.len() as f64)
}
