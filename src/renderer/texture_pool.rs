//! Transient Texture Pool
//!
//! Intermediate outputs of the effect graph live for one graph render. The
//! pool hands them out during the render and takes them all back at the end,
//! so the next frame reuses the same backend textures.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    TexturePool                      │
//! │                                                     │
//! │  active: [PooledTexture]                            │
//! │  free:   FxHashMap<PoolKey, Vec<PooledTexture>>     │
//! │                                                     │
//! │  allocate() → TextureId   (during graph render)     │
//! │  reset()                  (end of graph render)     │
//! │  trim(n)                  (after resize)            │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Textures are never destroyed during normal rendering. The pool grows on
//! demand; [`TexturePool::trim`] releases buckets that went unused for a few
//! frames, which is what happens to the old sizes after a resize.

use rustc_hash::FxHashMap;

use crate::backend::{RenderBackend, TextureDesc, TextureId};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct PoolKey {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
}

impl PoolKey {
    fn from_desc(desc: &TextureDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
        }
    }
}

#[derive(Debug)]
struct PooledTexture {
    id: TextureId,
    key: PoolKey,
    /// Frames spent in the free list without being reused.
    idle_frames: u32,
}

#[derive(Debug, Default)]
pub struct TexturePool {
    active: Vec<PooledTexture>,
    free: FxHashMap<PoolKey, Vec<PooledTexture>>,
}

impl TexturePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a texture matching `desc`, reusing a free one when possible.
    ///
    /// The id stays valid until the next [`reset`](Self::reset).
    pub fn allocate(&mut self, backend: &mut dyn RenderBackend, desc: &TextureDesc) -> TextureId {
        let key = PoolKey::from_desc(desc);
        let pooled = match self.free.get_mut(&key).and_then(Vec::pop) {
            Some(mut t) => {
                t.idle_frames = 0;
                t
            }
            None => {
                log::trace!("texture pool miss: {}×{} {:?}", desc.width, desc.height, desc.format);
                PooledTexture {
                    id: backend.create_texture(desc),
                    key,
                    idle_frames: 0,
                }
            }
        };
        let id = pooled.id;
        self.active.push(pooled);
        id
    }

    /// Returns every active texture to the free list.
    pub fn reset(&mut self) {
        for t in self.active.drain(..) {
            self.free.entry(t.key).or_default().push(t);
        }
    }

    /// Destroys free textures idle for more than `max_idle_frames` resets.
    pub fn trim(&mut self, backend: &mut dyn RenderBackend, max_idle_frames: u32) {
        for bucket in self.free.values_mut() {
            for t in bucket.iter_mut() {
                t.idle_frames += 1;
            }
            bucket.retain(|t| {
                let keep = t.idle_frames <= max_idle_frames;
                if !keep {
                    backend.destroy_texture(t.id);
                }
                keep
            });
        }
        self.free.retain(|_, bucket| !bucket.is_empty());
    }

    /// Active plus free.
    #[must_use]
    pub fn total_texture_count(&self) -> usize {
        self.active.len() + self.free.values().map(Vec::len).sum::<usize>()
    }

    pub fn dispose(&mut self, backend: &mut dyn RenderBackend) {
        self.reset();
        for (_, bucket) in self.free.drain() {
            for t in bucket {
                backend.destroy_texture(t.id);
            }
        }
    }
}
