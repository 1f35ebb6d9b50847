use glam::{Mat4, Vec2, Vec3};

/// Perspective camera as seen by the compositor.
///
/// The scene graph owns the real camera; this is the per-view snapshot the
/// render loop mutates (aspect, jitter) and the passes read.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,

    pub world_transform: Mat4,

    // Cached matrices, refreshed by `update()`
    pub(crate) view: Mat4,
    pub(crate) projection: Mat4,
    pub(crate) inv_projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new_perspective(50.0, 1.0, 0.1, 1000.0)
    }
}

impl Camera {
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov,
            aspect,
            near,
            far,
            world_transform: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            inv_projection: Mat4::IDENTITY,
        };
        camera.update();
        camera
    }

    /// Recomputes the projection, its inverse and the view matrix.
    ///
    /// Discards any jitter applied since the last update.
    pub fn update(&mut self) {
        self.projection =
            Mat4::perspective_rh(self.fov.to_radians(), self.aspect.max(f32::EPSILON), self.near, self.far);
        self.inv_projection = self.projection.inverse();
        self.view = self.world_transform.inverse();
    }

    /// Translates the projection in clip space by `offset` (sub-pixel jitter).
    pub fn jitter(&mut self, offset: Vec2) {
        self.projection = Mat4::from_translation(offset.extend(0.0)) * self.projection;
        self.inv_projection = self.projection.inverse();
    }

    pub fn set_world_transform(&mut self, transform: Mat4) {
        self.world_transform = transform;
        self.view = transform.inverse();
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    #[inline]
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    #[inline]
    #[must_use]
    pub fn inv_projection(&self) -> Mat4 {
        self.inv_projection
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Camera position in world space.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.world_transform.w_axis.truncate()
    }
}

/// Output surface size in CSS pixels plus the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub dpr: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            dpr: 1.0,
        }
    }
}

impl Viewport {
    #[must_use]
    pub fn new(width: u32, height: u32, dpr: f32) -> Self {
        Self { width, height, dpr }
    }

    /// Size in device pixels (`width·dpr × height·dpr`), at least 1×1.
    #[must_use]
    pub fn physical_size(&self) -> (u32, u32) {
        let w = (self.width as f32 * self.dpr).round() as u32;
        let h = (self.height as f32 * self.dpr).round() as u32;
        (w.max(1), h.max(1))
    }

    /// Aspect ratio used for the camera projection.
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}
