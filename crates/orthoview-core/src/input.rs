//! Input events for mouse/touch/keyboard, in canvas coordinates of one view.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Use web_time for WASM compatibility
#[cfg(target_arch = "wasm32")]
pub use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
pub use std::time::Instant;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Pointer event for a single view's canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: MouseButton,
        time: Instant,
    },
    Move {
        position: Point,
        time: Instant,
    },
    Up {
        position: Point,
        time: Instant,
    },
    /// The pointer left the canvas.
    Leave {
        time: Instant,
    },
    /// Wheel scroll, DOM sign convention: positive `delta.y` scrolls down.
    Wheel {
        position: Point,
        delta: Vec2,
    },
    /// Host-detected double-click.
    DoubleClick {
        position: Point,
    },
}

impl PointerEvent {
    pub fn position(&self) -> Option<Point> {
        match self {
            PointerEvent::Down { position, .. }
            | PointerEvent::Move { position, .. }
            | PointerEvent::Up { position, .. }
            | PointerEvent::Wheel { position, .. }
            | PointerEvent::DoubleClick { position } => Some(*position),
            PointerEvent::Leave { .. } => None,
        }
    }
}

/// One active touch contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub id: u64,
    pub position: Point,
}

/// Touch event. `touches` lists the contacts still down after the event.
#[derive(Debug, Clone, PartialEq)]
pub enum TouchEvent {
    Start { touches: Vec<TouchPoint>, time: Instant },
    Move { touches: Vec<TouchPoint>, time: Instant },
    End { touches: Vec<TouchPoint>, time: Instant },
    Cancel { time: Instant },
}

/// Keyboard event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyEvent {
    Pressed(String),
    Released(String),
}

/// Any input a view can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Pointer(PointerEvent),
    Touch(TouchEvent),
    Key(KeyEvent),
}

/// Midpoint and separation of the first two touches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPair {
    pub midpoint: Point,
    pub distance: f64,
}

pub fn two_point_geometry(touches: &[TouchPoint]) -> Option<TouchPair> {
    match touches {
        [a, b, ..] => Some(TouchPair {
            midpoint: a.position.midpoint(b.position),
            distance: a.position.distance(b.position),
        }),
        _ => None,
    }
}

/// Recognises two clicks close in time and space as a double-click.
#[derive(Debug, Clone, Default)]
pub struct ClickTracker {
    last_click: Option<(Instant, Point)>,
}

impl ClickTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a click. Returns true if it completes a double-click.
    pub fn register(
        &mut self,
        position: Point,
        time: Instant,
        window: Duration,
        max_distance: f64,
    ) -> bool {
        if let Some((last_time, last_position)) = self.last_click {
            let elapsed = time.saturating_duration_since(last_time);
            if elapsed <= window && position.distance(last_position) <= max_distance {
                // Reset so a third click starts a new pair
                self.last_click = None;
                return true;
            }
        }
        self.last_click = Some((time, position));
        false
    }

    pub fn clear(&mut self) {
        self.last_click = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(300);

    #[test]
    fn test_double_click_detection() {
        let mut clicks = ClickTracker::new();
        let pos = Point::new(100.0, 100.0);
        let t0 = Instant::now();

        assert!(!clicks.register(pos, t0, WINDOW, 5.0));
        assert!(clicks.register(pos, t0 + Duration::from_millis(200), WINDOW, 5.0));
        // Third click starts over
        assert!(!clicks.register(pos, t0 + Duration::from_millis(250), WINDOW, 5.0));
    }

    #[test]
    fn test_double_click_too_far() {
        let mut clicks = ClickTracker::new();
        let t0 = Instant::now();

        clicks.register(Point::new(100.0, 100.0), t0, WINDOW, 5.0);
        assert!(!clicks.register(
            Point::new(110.0, 100.0),
            t0 + Duration::from_millis(100),
            WINDOW,
            5.0
        ));
    }

    #[test]
    fn test_double_click_too_slow() {
        let mut clicks = ClickTracker::new();
        let pos = Point::new(10.0, 10.0);
        let t0 = Instant::now();

        clicks.register(pos, t0, WINDOW, 5.0);
        assert!(!clicks.register(pos, t0 + Duration::from_millis(450), WINDOW, 5.0));
    }

    #[test]
    fn test_two_point_geometry() {
        let touches = [
            TouchPoint { id: 1, position: Point::new(0.0, 0.0) },
            TouchPoint { id: 2, position: Point::new(30.0, 40.0) },
        ];
        let pair = two_point_geometry(&touches).unwrap();
        assert_eq!(pair.midpoint, Point::new(15.0, 20.0));
        assert!((pair.distance - 50.0).abs() < f64::EPSILON);

        assert!(two_point_geometry(&touches[..1]).is_none());
    }

    #[test]
    fn test_event_position() {
        let now = Instant::now();
        let down = PointerEvent::Down {
            position: Point::new(3.0, 4.0),
            button: MouseButton::Left,
            time: now,
        };
        assert_eq!(down.position(), Some(Point::new(3.0, 4.0)));
        assert_eq!(PointerEvent::Leave { time: now }.position(), None);
    }
}
