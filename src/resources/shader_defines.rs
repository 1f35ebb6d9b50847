//! Shader Macro Definition System
//!
//! Per-stage shader macro sets backed by interned [`Symbol`]s, so that two
//! define sets compare and hash as integer slices.
//!
//! # Usage
//!
//! ```rust,ignore
//! use viewer_compositor::backend::ShaderStage;
//! use viewer_compositor::resources::ShaderDefines;
//!
//! let mut defines = ShaderDefines::new();
//! defines.set(ShaderStage::Fragment, "KERNEL_SIZE", Some("12"));
//! defines.set(ShaderStage::Fragment, "VERTICAL", None);
//!
//! assert!(defines.contains(ShaderStage::Fragment, "VERTICAL"));
//! ```
//!
//! Effect nodes and [`FullscreenPass`](crate::renderer::FullscreenPass) keep
//! one of these each; the pass diffs its wanted set against the set already
//! applied on the backend and only forwards the changes.

use crate::backend::ShaderStage;
use crate::utils::interner::{self, Symbol};

type DefineKey = (ShaderStage, Symbol);

/// A collection of shader macro definitions, keyed by stage and name.
///
/// A macro may be defined with or without a value (`#define VERTICAL` vs
/// `#define KERNEL_SIZE 12`). Entries are kept sorted so identical sets
/// compare equal regardless of insertion order.
#[derive(Debug, Clone, Default)]
pub struct ShaderDefines {
    defines: Vec<(DefineKey, Option<Symbol>)>,
}

impl ShaderDefines {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            defines: Vec::new(),
        }
    }

    /// Set a define (maintains sorted order). Overwrites an existing value.
    pub fn set(&mut self, stage: ShaderStage, key: &str, value: Option<&str>) {
        let key_sym = interner::intern(key);
        let value_sym = value.map(interner::intern);
        self.set_symbol((stage, key_sym), value_sym);
    }

    #[inline]
    fn set_symbol(&mut self, key: DefineKey, value: Option<Symbol>) {
        match self.defines.binary_search_by_key(&key, |&(k, _)| k) {
            Ok(idx) => self.defines[idx].1 = value,
            Err(idx) => self.defines.insert(idx, (key, value)),
        }
    }

    /// Remove a define. Returns whether it was present.
    pub fn remove(&mut self, stage: ShaderStage, key: &str) -> bool {
        let Some(key_sym) = interner::get(key) else {
            return false;
        };
        if let Ok(idx) = self
            .defines
            .binary_search_by_key(&(stage, key_sym), |&(k, _)| k)
        {
            self.defines.remove(idx);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn contains(&self, stage: ShaderStage, key: &str) -> bool {
        interner::get(key).is_some_and(|key_sym| {
            self.defines
                .binary_search_by_key(&(stage, key_sym), |&(k, _)| k)
                .is_ok()
        })
    }

    /// `Some(value)` when the macro is defined; the inner option is its value.
    #[must_use]
    pub fn get(&self, stage: ShaderStage, key: &str) -> Option<Option<&'static str>> {
        let key_sym = interner::get(key)?;
        self.defines
            .binary_search_by_key(&(stage, key_sym), |&(k, _)| k)
            .ok()
            .map(|idx| self.defines[idx].1.map(interner::resolve))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.defines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.defines.clear();
    }

    /// Iterate all defines as `(stage, name, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (ShaderStage, &'static str, Option<&'static str>)> + '_ {
        self.defines.iter().map(|&((stage, k), v)| {
            (stage, interner::resolve(k), v.map(interner::resolve))
        })
    }

    /// Defines present in `self` that are missing from, or differ in, `applied`.
    pub fn added_since<'a>(
        &'a self,
        applied: &'a ShaderDefines,
    ) -> impl Iterator<Item = (ShaderStage, &'static str, Option<&'static str>)> + 'a {
        self.defines
            .iter()
            .filter(move |&&(key, value)| {
                applied
                    .defines
                    .binary_search_by_key(&key, |&(k, _)| k)
                    .map_or(true, |idx| applied.defines[idx].1 != value)
            })
            .map(|&((stage, k), v)| (stage, interner::resolve(k), v.map(interner::resolve)))
    }

    /// Defines present in `applied` that `self` no longer has.
    pub fn removed_since<'a>(
        &'a self,
        applied: &'a ShaderDefines,
    ) -> impl Iterator<Item = (ShaderStage, &'static str)> + 'a {
        applied
            .defines
            .iter()
            .filter(move |&&(key, _)| self.defines.binary_search_by_key(&key, |&(k, _)| k).is_err())
            .map(|&((stage, k), _)| (stage, interner::resolve(k)))
    }
}

impl PartialEq for ShaderDefines {
    fn eq(&self, other: &Self) -> bool {
        self.defines == other.defines
    }
}

impl Eq for ShaderDefines {}
