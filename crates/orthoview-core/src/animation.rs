//! Frame tasks advanced once per host frame.
//!
//! A task lives in an `Option` owned by the view it animates; taking it out
//! of the option cancels it. Nothing here schedules itself.

use kurbo::{Point, Vec2};

/// Fraction of momentum velocity kept per tick.
pub const MOMENTUM_DECAY: f64 = 0.95;
/// Momentum stops once both velocity components fall below this (px/tick).
pub const MOMENTUM_THRESHOLD: f64 = 0.1;
/// Number of stepped zoom updates in a smooth zoom.
pub const SMOOTH_ZOOM_STEPS: u32 = 5;

/// Inertial panning that decays geometrically each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Momentum {
    velocity: Vec2,
    decay: f64,
    threshold: f64,
}

impl Momentum {
    /// Start momentum, or `None` if the velocity is already negligible.
    pub fn new(velocity: Vec2, decay: f64, threshold: f64) -> Option<Self> {
        let momentum = Self {
            velocity,
            decay,
            threshold,
        };
        if !velocity.is_finite() || momentum.is_exhausted() {
            return None;
        }
        Some(momentum)
    }

    /// Current velocity in px per tick.
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn is_exhausted(&self) -> bool {
        self.velocity.x.abs() < self.threshold && self.velocity.y.abs() < self.threshold
    }

    /// Pan delta for this tick, or `None` once momentum has run out.
    pub fn step(&mut self) -> Option<Vec2> {
        if self.is_exhausted() {
            return None;
        }
        let delta = self.velocity;
        self.velocity = self.velocity * self.decay;
        Some(delta)
    }
}

/// A zoom change spread over a fixed number of focus-preserving steps.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothZoom {
    start: f64,
    target: f64,
    focus: Option<Point>,
    steps: u32,
    taken: u32,
}

impl SmoothZoom {
    pub fn new(start: f64, target: f64, focus: Option<Point>, steps: u32) -> Self {
        Self {
            start,
            target,
            focus,
            steps: steps.max(1),
            taken: 0,
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn focus(&self) -> Option<Point> {
        self.focus
    }

    pub fn is_finished(&self) -> bool {
        self.taken >= self.steps
    }

    /// Zoom level for this tick, or `None` once the target was reached.
    pub fn step(&mut self) -> Option<f64> {
        if self.is_finished() {
            return None;
        }
        self.taken += 1;
        if self.taken == self.steps {
            return Some(self.target);
        }
        let t = self.taken as f64 / self.steps as f64;
        Some(self.start + (self.target - self.start) * t)
    }
}
