//! Scene-side inputs of the compositor: camera, viewport and render queues.

pub mod camera;
pub mod queue;

pub use camera::{Camera, Viewport};
pub use queue::{MaterialBindings, RenderItem, Scene, SceneLight, SortableGeometry};
