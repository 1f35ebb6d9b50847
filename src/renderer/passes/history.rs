//! Double-buffered history for temporal passes.

use crate::backend::{RenderBackend, TextureDesc, TextureId};

/// Owned ping-pong texture pair.
#[derive(Debug)]
pub struct HistoryBuffer {
    textures: [TextureId; 2],
    current: usize,
}

impl HistoryBuffer {
    pub fn new(backend: &mut dyn RenderBackend, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            textures: [
                backend.create_texture(&TextureDesc::color("history_a", width, height, format)),
                backend.create_texture(&TextureDesc::color("history_b", width, height, format)),
            ],
            current: 0,
        }
    }

    /// The most recent resolved frame, until the next write.
    #[inline]
    #[must_use]
    pub fn previous(&self) -> TextureId {
        self.textures[1 - self.current]
    }

    /// The texture this frame writes.
    #[inline]
    #[must_use]
    pub fn current(&self) -> TextureId {
        self.textures[self.current]
    }

    /// Swaps roles: `current` becomes `previous`.
    #[inline]
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    pub fn resize(&self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        for texture in self.textures {
            backend.resize_texture(texture, width, height);
        }
    }

    pub fn dispose(self, backend: &mut dyn RenderBackend) {
        for texture in self.textures {
            backend.destroy_texture(texture);
        }
    }
}
