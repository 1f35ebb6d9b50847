//! Low-Discrepancy Sampling Tables
//!
//! Every progressive effect draws its per-frame samples from a Halton
//! sequence so that accumulating frames covers the sample domain evenly:
//!
//! | Consumer          | Table                          | Bases |
//! |-------------------|--------------------------------|-------|
//! | Depth of field    | [`PoissonKernelProvider`]      | 2, 3  |
//! | Temporal SS       | [`jitter_sequence`]            | 2, 3  |
//! | Shadow PCF        | [`pcf_kernels`]                | 2, 3  |
//! | SSAO              | [`hemisphere_kernel`]          | 2, 3  |
//! | SSR (physical)    | [`normal_distribution`]        | 2, 3  |
//!
//! Only the SSAO radius and noise use randomness, from a seeded [`StdRng`]
//! so the output is reproducible.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

/// Number of disk points in the shared DOF blur table.
pub const POISSON_TABLE_SIZE: usize = 960;

/// Halton radical inverse of `index` in `base`, in `[0, 1)`.
#[must_use]
pub fn halton(index: u32, base: u32) -> f32 {
    let mut result = 0.0f32;
    let mut f = 1.0 / base as f32;
    let mut i = index;
    while i > 0 {
        result += f * (i % base) as f32;
        i /= base;
        f /= base as f32;
    }
    result
}

// ============================================================================
// PoissonKernelProvider
// ============================================================================

/// Precomputed table of well-spread points on the unit disk.
///
/// The DOF blur reads a window of `kernel_size` points from it each frame.
/// Consecutive frames read consecutive windows, so accumulation walks the
/// whole table before repeating.
#[derive(Debug, Clone)]
pub struct PoissonKernelProvider {
    points: Vec<Vec2>,
}

impl Default for PoissonKernelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PoissonKernelProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_len(POISSON_TABLE_SIZE)
    }

    #[must_use]
    pub fn with_len(len: usize) -> Self {
        let points = (1..=len as u32)
            .map(|i| {
                let r = halton(i, 2).sqrt();
                let theta = halton(i, 3) * TAU;
                Vec2::new(r * theta.cos(), r * theta.sin())
            })
            .collect();
        Self { points }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Sample offset of the window used at `frame`.
    #[must_use]
    pub fn window_offset(&self, frame: u32, size: usize) -> usize {
        if self.points.is_empty() {
            return 0;
        }
        (frame as usize * size) % self.points.len()
    }

    /// Writes the `size`-point window for `frame` into `out` as `[x, y, x, y, …]`.
    ///
    /// Indices past the end of the table wrap to its start.
    pub fn window_into(&self, frame: u32, size: usize, out: &mut Vec<f32>) {
        out.clear();
        if self.points.is_empty() {
            return;
        }
        let start = self.window_offset(frame, size);
        out.reserve(size * 2);
        for k in 0..size {
            let p = self.points[(start + k) % self.points.len()];
            out.push(p.x);
            out.push(p.y);
        }
    }
}

// ============================================================================
// Temporal jitter & shadow kernels
// ============================================================================

/// `count` Halton (2, 3) points in `[0, 1)²`, starting at index 0.
#[must_use]
pub fn jitter_sequence(count: usize) -> Vec<Vec2> {
    (0..count as u32)
        .map(|i| Vec2::new(halton(i, 2), halton(i, 3)))
        .collect()
}

/// `count` PCF kernels of `size` offsets each, in `[-2, 2)²`.
///
/// Halton indices run on across kernel boundaries, so no two kernels share
/// a point.
#[must_use]
pub fn pcf_kernels(count: usize, size: usize) -> Vec<Vec<Vec2>> {
    let mut index = 0u32;
    (0..count)
        .map(|_| {
            (0..size)
                .map(|_| {
                    let p = Vec2::new(halton(index, 2) * 4.0 - 2.0, halton(index, 3) * 4.0 - 2.0);
                    index += 1;
                    p
                })
                .collect()
        })
        .collect()
}

// ============================================================================
// SSAO
// ============================================================================

/// Seeded generator shared by the SSAO kernel and noise builders.
#[must_use]
pub fn ssao_rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

/// Builds an AO sample kernel of `size` points starting at Halton `offset`.
///
/// Directions come from the Halton sequence (upper hemisphere when
/// `hemisphere` is set, full sphere otherwise); each point is scaled by a
/// random length in `[0, 1)`.
pub fn hemisphere_kernel(size: usize, offset: usize, hemisphere: bool, rng: &mut StdRng) -> Vec<Vec3> {
    let coverage = if hemisphere { 1.0 } else { 2.0 };
    (0..size)
        .map(|i| {
            let index = (i + offset) as u32;
            let phi = halton(index, 2) * coverage * PI / 2.0;
            let theta = halton(index, 3) * TAU;
            let r: f32 = rng.random_range(0.0..1.0);
            Vec3::new(
                theta.cos() * phi.sin() * r,
                theta.sin() * phi.sin() * r,
                phi.cos() * r,
            )
        })
        .collect()
}

/// RGBA8 rotation noise for a `size × size` tile.
pub fn rotation_noise(size: usize, rng: &mut StdRng) -> Vec<u8> {
    let mut data = Vec::with_capacity(size * size * 4);
    for _ in 0..size * size {
        let v = Vec2::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)).normalize_or(Vec2::X);
        data.push(((v.x * 0.5 + 0.5) * 255.0) as u8);
        data.push(((v.y * 0.5 + 0.5) * 255.0) as u8);
        data.push(0);
        data.push(255);
    }
    data
}

// ============================================================================
// SSR
// ============================================================================

/// `samples` cosine-weighted unit vectors on the `+z` hemisphere.
///
/// Used by the physically based SSR trace to perturb the surface normal;
/// the trace reads `sample_per_frame` consecutive entries per frame.
#[must_use]
pub fn normal_distribution(samples: usize) -> Vec<Vec3> {
    (0..samples as u32)
        .map(|i| {
            let phi = halton(i, 2) * TAU;
            let u = halton(i, 3);
            let sin_theta = u.sqrt();
            let cos_theta = (1.0 - u).sqrt();
            Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
        })
        .collect()
}
