//! Sample sets for Monte-Carlo integration over the hemisphere.
//!
//! All directions are in tangent space with +Z along the surface normal. A
//! [`TangentFrame`] maps them into world space for one destination texel.

use std::f32::consts::{FRAC_PI_2, PI};

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Beyond this absolute cosine between the normal and the preferred reference axis the
/// tangent frame switches to the fallback axis.
pub const UP_DEGENERACY_THRESHOLD: f32 = 0.999;

/// A tangent-space direction with an integration weight.
///
/// Laid out as four `f32` so a slice of samples can be uploaded to a compute device as is.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Sample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub weight: f32,
}

impl Sample {
    /// The sample straight along the normal with weight 1.
    pub const UP: Sample = Sample {
        x: 0.0,
        y: 0.0,
        z: 1.0,
        weight: 1.0,
    };

    /// Creates a sample from a direction and weight.
    #[must_use]
    pub fn new(dir: Vec3, weight: f32) -> Self {
        Self {
            x: dir.x,
            y: dir.y,
            z: dir.z,
            weight,
        }
    }

    /// The tangent-space direction.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Van der Corput radical inverse in base 2 (bit reversal of `i` scaled to [0, 1)).
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn radical_inverse_base2(i: u32) -> f32 {
    i.reverse_bits() as f32 * 2.328_306_4e-10 // 1 / 2^32
}

/// The `i`-th point of an `n`-point Hammersley set.
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_base2(i))
}

/// Source of the 2D points that drive GGX importance sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleSequence {
    /// Hammersley set.
    #[default]
    Hammersley,
    /// Roberts R2 additive recurrence.
    Roberts,
    /// Uniform random points from a seeded generator.
    Random {
        /// Generator seed.
        seed: u64,
    },
}

impl SampleSequence {
    /// Generates `n` points in [0, 1)².
    #[must_use]
    pub fn generate(self, n: u32) -> Vec<Vec2> {
        match self {
            Self::Hammersley => (0..n).map(|i| hammersley(i, n)).collect(),
            Self::Roberts => roberts_sequence(n),
            Self::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..n).map(|_| Vec2::new(rng.gen(), rng.gen())).collect()
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn roberts_sequence(n: u32) -> Vec<Vec2> {
    // plastic number
    const G: f64 = 1.324_717_957_244_746;
    let a1 = 1.0 / G;
    let a2 = 1.0 / (G * G);
    (0..n)
        .map(|i| {
            let i = f64::from(i);
            Vec2::new((0.5 + a1 * i).fract() as f32, (0.5 + a2 * i).fract() as f32)
        })
        .collect()
}

/// Cosine-weighted hemisphere samples on a polar grid.
///
/// Quality 0 is a single sample along the normal. Otherwise there are `quality + 1`
/// rings of `4 * quality` segments; the innermost ring is replaced by one pole sample
/// carrying the weight of the whole cap.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cosine_hemisphere_samples(quality: u32) -> Vec<Sample> {
    if quality == 0 {
        return vec![Sample::UP];
    }

    let rings = quality + 1;
    let segments = quality * 4;
    let d_phi = 2.0 * PI / segments as f32;
    let d_theta = FRAC_PI_2 / rings as f32;

    let mut samples = Vec::with_capacity(((rings - 1) * segments + 1) as usize);
    for ring in 0..rings - 1 {
        let theta = (ring as f32 + 0.5) * d_theta;
        let (sin_theta, cos_theta) = theta.sin_cos();
        for segment in 0..segments {
            let phi = (segment as f32 + 0.5) * d_phi;
            let (sin_phi, cos_phi) = phi.sin_cos();
            samples.push(Sample {
                x: sin_theta * cos_phi,
                y: sin_theta * sin_phi,
                z: cos_theta,
                weight: cos_theta * sin_theta,
            });
        }
    }

    let pole_theta = ((rings - 1) as f32 + 0.5) * d_theta;
    samples.push(Sample {
        weight: segments as f32 * pole_theta.cos() * pole_theta.sin(),
        ..Sample::UP
    });

    samples
}

/// GGX half-vector for a 2D point `xi` and a perceptual `roughness`.
#[inline]
#[must_use]
pub fn importance_sample_ggx(xi: Vec2, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = 2.0 * PI * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta)
}

/// GGX half-vector samples for one roughness. Roughness 0 is the single mirror sample.
#[must_use]
pub fn ggx_samples(points: &[Vec2], roughness: f32) -> Vec<Sample> {
    if roughness <= 0.0 {
        return vec![Sample::UP];
    }
    points
        .iter()
        .map(|&xi| Sample::new(importance_sample_ggx(xi, roughness), 1.0))
        .collect()
}

/// Roughness of specular mip `level` out of `levels`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn level_roughness(level: u32, levels: u32) -> f32 {
    if levels <= 1 {
        0.0
    } else {
        level as f32 / (levels - 1) as f32
    }
}

/// Where one level's samples live in [`SpecularSampleSets::samples`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SampleRange {
    pub offset: u32,
    pub count: u32,
}

/// GGX sample tables for every level of a specular mip chain, stored back to back.
#[derive(Debug, Clone)]
pub struct SpecularSampleSets {
    samples: Vec<Sample>,
    index: Vec<SampleRange>,
}

impl SpecularSampleSets {
    /// Generates `quality` samples for each level above 0 from `sequence`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(quality: u32, levels: u32, sequence: SampleSequence) -> Self {
        let points = sequence.generate(quality.max(1));
        let mut samples = Vec::new();
        let mut index = Vec::with_capacity(levels as usize);
        for level in 0..levels {
            let set = ggx_samples(&points, level_roughness(level, levels));
            index.push(SampleRange {
                offset: samples.len() as u32,
                count: set.len() as u32,
            });
            samples.extend(set);
        }
        Self { samples, index }
    }

    /// All samples of all levels.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// The `(offset, count)` of every level.
    #[must_use]
    pub fn index(&self) -> &[SampleRange] {
        &self.index
    }

    /// Number of levels covered.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn levels(&self) -> u32 {
        self.index.len() as u32
    }

    /// The samples of `level`.
    ///
    /// # Panics
    ///
    /// Panics if `level` is out of range.
    #[must_use]
    pub fn level(&self, level: u32) -> &[Sample] {
        let range = self.index[level as usize];
        &self.samples[range.offset as usize..(range.offset + range.count) as usize]
    }
}

/// Stratified sub-texel offsets on an `n`×`n` grid, in texels relative to the texel
/// center. `n` of 0 is treated as 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn super_samples(n: u32) -> Vec<Vec2> {
    let n = n.max(1);
    let step = 1.0 / n as f32;
    (0..n)
        .flat_map(|j| (0..n).map(move |i| (i, j)))
        .map(|(i, j)| Vec2::new((i as f32 + 0.5) * step - 0.5, (j as f32 + 0.5) * step - 0.5))
        .collect()
}

/// Orthonormal basis around a normal.
#[derive(Debug, Clone, Copy)]
pub struct TangentFrame {
    pub right: Vec3,
    pub up: Vec3,
    pub normal: Vec3,
}

impl TangentFrame {
    /// Frame for irradiance convolution: reference axis world Y, or Z near the poles.
    #[must_use]
    pub fn diffuse(normal: Vec3) -> Self {
        let reference = if normal.y.abs() >= UP_DEGENERACY_THRESHOLD {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let right = normal.cross(reference).normalize();
        let up = normal.cross(right).normalize();
        Self { right, up, normal }
    }

    /// Frame for GGX prefiltering: reference axis world Z, or X when the normal is
    /// nearly parallel to Z.
    #[must_use]
    pub fn specular(normal: Vec3) -> Self {
        let reference = if normal.z.abs() < UP_DEGENERACY_THRESHOLD {
            Vec3::Z
        } else {
            Vec3::X
        };
        let right = reference.cross(normal).normalize();
        let up = normal.cross(right);
        Self { right, up, normal }
    }

    /// Transforms a tangent-space direction to world space.
    #[inline]
    #[must_use]
    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.right * v.x + self.up * v.y + self.normal * v.z
    }
}
