//! Effect Parameters
//!
//! Typed parameter names for each effect plus a loosely-typed
//! [`ParamValue`], mirroring the declarative option surface.
//!
//! Every compositor setter takes `Option<ParamValue>`. `None` means the
//! option was absent and leaves the previous value untouched; it never resets
//! to a default. A value of the wrong kind is ignored with a warning.

use glam::Vec4;

use crate::backend::TextureId;

/// A parameter value coming from configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f32),
    Text(String),
    Flag(bool),
    Color(Vec4),
    Texture(TextureId),
}

impl ParamValue {
    #[inline]
    #[must_use]
    pub fn as_number(&self) -> Option<f32> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_color(&self) -> Option<Vec4> {
        match self {
            Self::Color(c) => Some(*c),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_texture(&self) -> Option<TextureId> {
        match self {
            Self::Texture(t) => Some(*t),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Flag(_) => "flag",
            Self::Color(_) => "color",
            Self::Texture(_) => "texture",
        }
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<Vec4> for ParamValue {
    fn from(v: Vec4) -> Self {
        Self::Color(v)
    }
}

impl From<TextureId> for ParamValue {
    fn from(v: TextureId) -> Self {
        Self::Texture(v)
    }
}

/// Screen-space ambient occlusion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SsaoParam {
    /// Sampling radius in view-space units; also drives the depth bias.
    Radius,
    /// Quality tier name, mapped to the hemisphere kernel size.
    Quality,
    Intensity,
}

/// Screen-space reflection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SsrParam {
    /// Quality tier name, mapped to max iteration and pixel stride.
    Quality,
    /// Surfaces rougher than this receive no reflection.
    MaxRoughness,
    /// Toggles the physically based (importance sampled) trace.
    Physical,
}

/// Depth-of-field parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DofParam {
    FocalDistance,
    FocalRange,
    Fstop,
    BlurRadius,
    /// Quality tier name, mapped to the Poisson kernel size.
    Quality,
}

/// Bloom parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BloomParam {
    Intensity,
}

/// Color correction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorCorrectionParam {
    /// Exposure in stops; forwarded to the shader as `2^value`.
    Exposure,
    Brightness,
    Contrast,
    Saturation,
    /// 3D color lookup table, supplied as an already uploaded texture.
    LookupTexture,
}

/// Edge (outline) detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeParam {
    Color,
}
