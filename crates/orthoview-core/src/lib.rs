//! OrthoView Core Library
//!
//! Coordinate and interaction engine for orthogonal (axial, coronal,
//! sagittal) views of a 3-D scan: world/canvas transforms, the shared
//! crosshair, per-view zoom and pan, and gesture recognition.

pub mod animation;
pub mod camera;
pub mod config;
pub mod crosshair;
pub mod gesture;
pub mod input;
pub mod projection;
pub mod transform;
pub mod viewer;
pub mod volume;
pub mod winit_input;

pub use camera::{MAX_ZOOM, MIN_ZOOM, PanBounds, ViewInteractionState, ZoomInfo};
pub use config::{ConfigError, InteractionConfig};
pub use crosshair::{CrosshairCoordinator, CrosshairPosition, SliceStep};
pub use gesture::{CrosshairHit, CursorStyle, DragMode, Gesture, GesturePhase, GestureRouter, GestureTarget};
pub use input::{InputEvent, KeyEvent, MouseButton, PointerEvent, TouchEvent, TouchPoint};
pub use projection::ViewProjection;
pub use transform::{TransformError, canvas_distance_mm, canvas_to_world, validate_coordinates, world_to_canvas, world_to_slice_index};
pub use viewer::{ViewSnapshot, Viewer, ViewerSnapshot, ViewerState};
pub use volume::{Axis, PerView, Vec3, ViewKind, VolumeError, VolumeMetadata, VolumeModel};
pub use winit_input::WinitInput;
