//! Render Queue Snapshot
//!
//! The hosting engine flattens its scene graph into a [`Scene`] before each
//! view is rendered. The compositor only needs the pieces below:
//!
//! - opaque and transparent [`RenderItem`] queues (material bindings, shadow
//!   receivers, optional sortable geometry)
//! - [`SceneLight`]s, of which only ambient cubemap lights matter here
//!
//! Everything else about the scene stays on the engine side of
//! [`RenderBackend`](crate::backend::RenderBackend).

use std::fmt;

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use crate::backend::{TextureId, UniformValue};

/// Geometry that can reorder its primitives back to front.
///
/// Implemented by the engine for transparent meshes. All methods default to
/// "no sorting".
pub trait SortableGeometry: fmt::Debug {
    fn needs_sort_triangles(&self) -> bool {
        false
    }

    /// Sorts triangles for a camera at `camera_position` (object space).
    fn sort_triangles(&mut self, _camera_position: Vec3, _frame: u32) {}

    fn needs_sort_vertices_progressively(&self) -> bool {
        false
    }

    /// Advances an incremental vertex sort by one step for this frame.
    fn sort_vertices_progressively(&mut self, _camera_position: Vec3, _frame: u32) {}

    fn needs_sort_triangles_progressively(&self) -> bool {
        false
    }

    /// Advances an incremental triangle sort by one step for this frame.
    /// Takes the place of [`sort_triangles`](Self::sort_triangles) when
    /// requested.
    fn sort_triangles_progressively(&mut self, _camera_position: Vec3, _frame: u32) {}

    /// True if either sort only converges over several frames.
    fn needs_progressive_sort(&self) -> bool {
        self.needs_sort_vertices_progressively() || self.needs_sort_triangles_progressively()
    }
}

/// Per-material values the render loop overrides (shadow kernel, AO map).
#[derive(Debug, Clone, Default)]
pub struct MaterialBindings {
    values: FxHashMap<String, UniformValue>,
}

impl MaterialBindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn unset(&mut self, name: &str) -> Option<UniformValue> {
        self.values.remove(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn texture(&self, name: &str) -> Option<TextureId> {
        self.get(name).and_then(UniformValue::as_texture)
    }
}

/// One drawable in a render queue.
#[derive(Debug)]
pub struct RenderItem {
    pub world_transform: Mat4,
    pub geometry: Option<Box<dyn SortableGeometry>>,
    pub material: MaterialBindings,
    pub receive_shadow: bool,
    /// Whether the item is written into the G-buffer.
    pub render_normal: bool,
}

impl Default for RenderItem {
    fn default() -> Self {
        Self {
            world_transform: Mat4::IDENTITY,
            geometry: None,
            material: MaterialBindings::default(),
            receive_shadow: true,
            render_normal: true,
        }
    }
}

impl RenderItem {
    #[must_use]
    pub fn new(world_transform: Mat4) -> Self {
        Self {
            world_transform,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_geometry(mut self, geometry: impl SortableGeometry + 'static) -> Self {
        self.geometry = Some(Box::new(geometry));
        self
    }
}

/// A light as far as post-processing is concerned.
#[derive(Debug, Clone, Default)]
pub struct SceneLight {
    /// Prefiltered specular cubemap, for ambient cubemap lights.
    pub cubemap: Option<TextureId>,
    pub intensity: f32,
    /// Skipped by the forward pass while set.
    pub invisible: bool,
}

impl SceneLight {
    #[must_use]
    pub fn ambient_cubemap(cubemap: TextureId, intensity: f32) -> Self {
        Self {
            cubemap: Some(cubemap),
            intensity,
            invisible: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_ambient_cubemap(&self) -> bool {
        self.cubemap.is_some()
    }
}

/// Render-list snapshot for one view.
#[derive(Debug, Default)]
pub struct Scene {
    pub opaque: Vec<RenderItem>,
    pub transparent: Vec<RenderItem>,
    pub lights: Vec<SceneLight>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates both queues, opaque first.
    pub fn items(&self) -> impl Iterator<Item = &RenderItem> {
        self.opaque.iter().chain(self.transparent.iter())
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut RenderItem> {
        self.opaque.iter_mut().chain(self.transparent.iter_mut())
    }

    /// The first ambient cubemap light, if any.
    #[must_use]
    pub fn ambient_cubemap_light(&self) -> Option<&SceneLight> {
        self.lights.iter().find(|l| l.is_ambient_cubemap())
    }
}
