//! Translation of winit window events into viewer input.

use crate::input::{InputEvent, Instant, KeyEvent, MouseButton, PointerEvent, TouchEvent, TouchPoint};
use kurbo::{Point, Vec2};
use winit::event::{ElementState, MouseScrollDelta, TouchPhase, WindowEvent};
use winit::keyboard::Key;

/// Pixels per wheel line.
const LINE_HEIGHT: f64 = 20.0;

/// Converts one window's events into canvas-local viewer input.
///
/// Winit reports a cursor position only when it moves, so the last one is
/// tracked here for button and wheel events.
#[derive(Debug, Clone, Default)]
pub struct WinitInput {
    /// Top-left corner of the view's canvas in window coordinates.
    pub canvas_origin: Point,
    cursor: Option<Point>,
    touches: Vec<TouchPoint>,
}

impl WinitInput {
    pub fn new(canvas_origin: Point) -> Self {
        Self {
            canvas_origin,
            ..Default::default()
        }
    }

    /// Last cursor position in canvas coordinates.
    pub fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    pub fn translate(&mut self, event: &WindowEvent, time: Instant) -> Option<InputEvent> {
        match event {
            WindowEvent::CursorMoved { position, .. } => Some(InputEvent::Pointer(
                self.cursor_moved(Point::new(position.x, position.y), time),
            )),
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                Some(InputEvent::Pointer(PointerEvent::Leave { time }))
            }
            WindowEvent::MouseInput { state, button, .. } => self
                .mouse_input(*state, map_button(*button)?, time)
                .map(InputEvent::Pointer),
            WindowEvent::MouseWheel { delta, .. } => Some(InputEvent::Pointer(PointerEvent::Wheel {
                position: self.cursor?,
                delta: wheel_delta(*delta),
            })),
            WindowEvent::Touch(touch) => self
                .touch(
                    touch.phase,
                    touch.id,
                    Point::new(touch.location.x, touch.location.y),
                    time,
                )
                .map(InputEvent::Touch),
            WindowEvent::KeyboardInput { event, .. } => {
                let name = key_name(&event.logical_key)?;
                Some(InputEvent::Key(match event.state {
                    ElementState::Pressed => KeyEvent::Pressed(name),
                    ElementState::Released => KeyEvent::Released(name),
                }))
            }
            _ => None,
        }
    }

    fn to_canvas(&self, window: Point) -> Point {
        window - self.canvas_origin.to_vec2()
    }

    pub fn cursor_moved(&mut self, window: Point, time: Instant) -> PointerEvent {
        let position = self.to_canvas(window);
        self.cursor = Some(position);
        PointerEvent::Move { position, time }
    }

    /// Button press or release at the last cursor position.
    pub fn mouse_input(
        &mut self,
        state: ElementState,
        button: MouseButton,
        time: Instant,
    ) -> Option<PointerEvent> {
        let position = self.cursor?;
        Some(match state {
            ElementState::Pressed => PointerEvent::Down {
                position,
                button,
                time,
            },
            ElementState::Released => PointerEvent::Up { position, time },
        })
    }

    /// Update the active touch set and report it.
    pub fn touch(&mut self, phase: TouchPhase, id: u64, window: Point, time: Instant) -> Option<TouchEvent> {
        let position = self.to_canvas(window);
        let existing = self.touches.iter().position(|t| t.id == id);
        match phase {
            TouchPhase::Started => {
                match existing {
                    Some(i) => self.touches[i].position = position,
                    None => self.touches.push(TouchPoint { id, position }),
                }
                Some(TouchEvent::Start {
                    touches: self.touches.clone(),
                    time,
                })
            }
            TouchPhase::Moved => {
                self.touches[existing?].position = position;
                Some(TouchEvent::Move {
                    touches: self.touches.clone(),
                    time,
                })
            }
            TouchPhase::Ended => {
                self.touches.remove(existing?);
                Some(TouchEvent::End {
                    touches: self.touches.clone(),
                    time,
                })
            }
            TouchPhase::Cancelled => {
                self.touches.clear();
                Some(TouchEvent::Cancel { time })
            }
        }
    }
}

pub fn map_button(button: winit::event::MouseButton) -> Option<MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(MouseButton::Left),
        winit::event::MouseButton::Right => Some(MouseButton::Right),
        winit::event::MouseButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

/// Wheel delta in pixels, positive `y` meaning scroll down.
pub fn wheel_delta(delta: MouseScrollDelta) -> Vec2 {
    // Winit reports scrolling up as positive y
    match delta {
        MouseScrollDelta::LineDelta(x, y) => Vec2::new(-x as f64 * LINE_HEIGHT, -y as f64 * LINE_HEIGHT),
        MouseScrollDelta::PixelDelta(pos) => Vec2::new(-pos.x, -pos.y),
    }
}

/// Key name as the viewer's key bindings spell it.
pub fn key_name(key: &Key) -> Option<String> {
    match key {
        Key::Named(named) => Some(format!("{named:?}")),
        Key::Character(text) => Some(text.to_string()),
        _ => None,
    }
}
