//! Fullscreen Pass Wrapper
//!
//! [`FullscreenPass`] owns one backend pass and mirrors its material state on
//! the CPU. Setters only touch the local copy; [`FullscreenPass::render`]
//! flushes whatever changed since the previous flush and then draws.
//!
//! ```text
//! set_uniform / define            render()
//!        │                           │
//!        ▼                           ▼
//!   wanted state ──── diff ────► applied state ──► backend
//! ```
//!
//! Effects therefore set their parameters every frame without worrying about
//! redundant backend calls.

use rustc_hash::FxHashMap;

use crate::backend::{PassDesc, PassId, RenderBackend, RenderTarget, ShaderStage, UniformValue};
use crate::resources::ShaderDefines;

#[derive(Debug)]
pub struct FullscreenPass {
    id: PassId,
    label: String,
    uniforms: FxHashMap<String, UniformValue>,
    applied_uniforms: FxHashMap<String, UniformValue>,
    defines: ShaderDefines,
    applied_defines: ShaderDefines,
}

impl FullscreenPass {
    pub fn new(backend: &mut dyn RenderBackend, desc: &PassDesc<'_>) -> Self {
        Self {
            id: backend.create_pass(desc),
            label: desc.label.to_string(),
            uniforms: FxHashMap::default(),
            applied_uniforms: FxHashMap::default(),
            defines: ShaderDefines::new(),
            applied_defines: ShaderDefines::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> PassId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        match self.uniforms.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.uniforms.insert(name.to_string(), value);
            }
        }
    }

    pub fn unset_uniform(&mut self, name: &str) {
        self.uniforms.remove(name);
    }

    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    pub fn define(&mut self, stage: ShaderStage, name: &str, value: Option<&str>) {
        self.defines.set(stage, name, value);
    }

    pub fn undefine(&mut self, stage: ShaderStage, name: &str) {
        self.defines.remove(stage, name);
    }

    #[must_use]
    pub fn is_defined(&self, stage: ShaderStage, name: &str) -> bool {
        self.defines.contains(stage, name)
    }

    #[must_use]
    pub fn defines(&self) -> &ShaderDefines {
        &self.defines
    }

    /// Pushes pending changes to the backend without drawing.
    pub fn flush(&mut self, backend: &mut dyn RenderBackend) {
        if self.defines != self.applied_defines {
            for (stage, name) in self.defines.removed_since(&self.applied_defines) {
                backend.undefine(self.id, stage, name);
            }
            for (stage, name, value) in self.defines.added_since(&self.applied_defines) {
                backend.define(self.id, stage, name, value);
            }
            self.applied_defines.clone_from(&self.defines);
        }

        self.applied_uniforms.retain(|name, _| {
            let keep = self.uniforms.contains_key(name);
            if !keep {
                backend.unset_uniform(self.id, name);
            }
            keep
        });
        for (name, value) in &self.uniforms {
            if self.applied_uniforms.get(name) != Some(value) {
                backend.set_uniform(self.id, name, value);
                self.applied_uniforms.insert(name.clone(), value.clone());
            }
        }
    }

    pub fn render(&mut self, backend: &mut dyn RenderBackend, target: &RenderTarget) {
        self.flush(backend);
        backend.draw_pass(self.id, target);
    }

    pub fn dispose(self, backend: &mut dyn RenderBackend) {
        backend.destroy_pass(self.id);
    }
}
