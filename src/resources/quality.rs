//! Quality Tiers
//!
//! A coarse `low / medium / high / ultra` setting that each effect maps onto
//! its own numeric parameters through a fixed lookup table.
//!
//! | Effect parameter        | Low | Medium | High | Ultra |
//! |-------------------------|-----|--------|------|-------|
//! | SSAO kernel size        | 6   | 12     | 32   | 62    |
//! | DOF blur kernel size    | 4   | 8      | 16   | 32    |
//! | SSR max iteration       | 10  | 15     | 30   | 80    |
//! | SSR pixel stride        | 32  | 16     | 8    | 4     |
//!
//! Unrecognized tier strings resolve to [`QualityTier::Medium`].

use std::fmt;
use std::str::FromStr;

/// Coarse quality setting shared by every effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QualityTier {
    Low,
    /// Documented default, also used for unrecognized strings.
    #[default]
    Medium,
    High,
    Ultra,
}

/// Error returned by [`QualityTier::from_str`] for unknown names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownQualityTier(pub String);

impl fmt::Display for UnknownQualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown quality tier '{}'", self.0)
    }
}

impl std::error::Error for UnknownQualityTier {}

impl FromStr for QualityTier {
    type Err = UnknownQualityTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "ultra" => Ok(Self::Ultra),
            other => Err(UnknownQualityTier(other.to_string())),
        }
    }
}

impl QualityTier {
    /// Parses a tier name, falling back to [`Medium`](Self::Medium).
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_else(|err: UnknownQualityTier| {
            log::warn!("{err}, falling back to medium");
            Self::Medium
        })
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }

    #[must_use]
    pub const fn all() -> &'static [QualityTier] {
        &[Self::Low, Self::Medium, Self::High, Self::Ultra]
    }

    /// SSAO hemisphere kernel size.
    #[must_use]
    pub const fn ssao_kernel_size(self) -> u32 {
        match self {
            Self::Low => 6,
            Self::Medium => 12,
            Self::High => 32,
            Self::Ultra => 62,
        }
    }

    /// Depth-of-field Poisson blur kernel size.
    #[must_use]
    pub const fn dof_kernel_size(self) -> u32 {
        match self {
            Self::Low => 4,
            Self::Medium => 8,
            Self::High => 16,
            Self::Ultra => 32,
        }
    }

    /// SSR ray-march iteration cap.
    #[must_use]
    pub const fn ssr_max_iteration(self) -> u32 {
        match self {
            Self::Low => 10,
            Self::Medium => 15,
            Self::High => 30,
            Self::Ultra => 80,
        }
    }

    /// SSR ray-march pixel stride.
    #[must_use]
    pub const fn ssr_pixel_stride(self) -> u32 {
        match self {
            Self::Low => 32,
            Self::Medium => 16,
            Self::High => 8,
            Self::Ultra => 4,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
