//! Shadow Map Pass
//!
//! The shadow map itself is rendered by the engine. This pass only owns the
//! rotating PCF kernels: the map is rendered with kernel 0 once per fresh
//! frame, and every accumulation frame afterwards hands receivers the next
//! kernel so the filtered edge converges.

use glam::Vec2;

use crate::backend::{RenderBackend, UniformValue};
use crate::renderer::sampling;
use crate::scene::{Camera, Scene};

pub const DEFAULT_PCF_KERNEL_COUNT: usize = 30;
pub const DEFAULT_PCF_KERNEL_SIZE: usize = 6;

/// Material binding receiving the flattened kernel.
pub const PCF_KERNEL_BINDING: &str = "pcfKernel";

#[derive(Debug, Clone)]
pub struct ShadowMapPass {
    kernels: Vec<Vec<Vec2>>,
    kernel_index: usize,
}

impl Default for ShadowMapPass {
    fn default() -> Self {
        Self::new(DEFAULT_PCF_KERNEL_COUNT, DEFAULT_PCF_KERNEL_SIZE)
    }
}

impl ShadowMapPass {
    #[must_use]
    pub fn new(kernel_count: usize, kernel_size: usize) -> Self {
        Self {
            kernels: sampling::pcf_kernels(kernel_count.max(1), kernel_size.max(1)),
            kernel_index: 0,
        }
    }

    /// Renders the shadow map with the first kernel.
    pub fn render(&mut self, backend: &mut dyn RenderBackend, scene: &Scene, camera: &Camera) {
        self.kernel_index = 0;
        backend.render_shadow_map(scene, camera, &self.kernels[0]);
    }

    /// Selects kernel `frame mod count` and binds it on every shadow receiver.
    pub fn set_kernel_for_frame(&mut self, scene: &mut Scene, frame: u32) {
        self.kernel_index = frame as usize % self.kernels.len();
        let flat: Vec<f32> = self.kernels[self.kernel_index]
            .iter()
            .flat_map(|p| [p.x, p.y])
            .collect();
        for item in scene.items_mut().filter(|item| item.receive_shadow) {
            item.material
                .set(PCF_KERNEL_BINDING, UniformValue::FloatArray(flat.clone()));
        }
    }

    #[must_use]
    pub fn kernel_count(&self) -> usize {
        self.kernels.len()
    }

    #[must_use]
    pub fn kernel_index(&self) -> usize {
        self.kernel_index
    }

    #[must_use]
    pub fn kernel(&self, index: usize) -> &[Vec2] {
        &self.kernels[index % self.kernels.len()]
    }
}
