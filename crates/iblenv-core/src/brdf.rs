//! Split-sum BRDF integration lookup table.
//!
//! The table is indexed by `n·v` along x and perceptual roughness along y, both sampled at
//! texel centers. Each texel holds the scale and bias applied to F0 when shading with a
//! prefiltered specular environment: `specular = prefiltered * (F0 * scale + bias)`.

use glam::{Vec2, Vec3};
use image::{Rgb32FImage, RgbImage};

use crate::error::{IblError, Result};
use crate::sampling::importance_sample_ggx;

/// Default table resolution.
pub const DEFAULT_LUT_SIZE: u32 = 512;

/// Default number of GGX samples per texel.
pub const DEFAULT_LUT_SAMPLES: u32 = 1024;

/// Smith-Schlick GGX shadowing with the image-based lighting remapping `k = roughness² / 2`.
#[inline]
#[must_use]
pub fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    let g1 = |n_dot_x: f32| n_dot_x / (n_dot_x * (1.0 - k) + k);
    g1(n_dot_v) * g1(n_dot_l)
}

/// Integrates the GGX specular BRDF over the hemisphere for one `(n·v, roughness)` pair,
/// returning `(scale, bias)`.
///
/// `points` drive the importance sampling and are usually a Hammersley set.
#[must_use]
pub fn integrate_brdf(n_dot_v: f32, roughness: f32, points: &[Vec2]) -> Vec2 {
    if points.is_empty() {
        return Vec2::ZERO;
    }
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);

    let mut sum = Vec2::ZERO;
    for &xi in points {
        let h = importance_sample_ggx(xi, roughness);
        let v_dot_h = v.dot(h);
        let l = 2.0 * v_dot_h * h - v;

        let n_dot_l = l.z.max(0.0);
        if n_dot_l > 0.0 {
            let n_dot_h = h.z.max(0.0);
            let v_dot_h = v_dot_h.max(0.0);
            let g = geometry_smith(n_dot_v, n_dot_l, roughness);
            let g_vis = g * v_dot_h / (n_dot_h * n_dot_v).max(1e-6);
            let fc = (1.0 - v_dot_h).powi(5);
            sum += Vec2::new((1.0 - fc) * g_vis, fc * g_vis);
        }
    }
    sum / points.len() as f32
}

/// Coordinate of texel `i` along an axis of `size` texels.
#[inline]
#[must_use]
pub fn texel_center(i: u32, size: u32) -> f32 {
    (i as f32 + 0.5) / size as f32
}

/// A square two-channel table of `(scale, bias)` pairs stored row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct BrdfLut {
    size: u32,
    data: Vec<f32>,
}

impl BrdfLut {
    /// Number of channels per texel.
    pub const CHANNELS: usize = 2;

    /// Wraps packed `(scale, bias)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`IblError::ZeroSizeInput`] for a zero `size` and [`IblError::SizeMismatch`]
    /// if `data` does not hold `size * size` pairs.
    pub fn new(size: u32, data: Vec<f32>) -> Result<Self> {
        if size == 0 {
            return Err(IblError::ZeroSizeInput);
        }
        let expected = (size as usize)
            .checked_mul(size as usize)
            .and_then(|texels| texels.checked_mul(Self::CHANNELS))
            .unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(IblError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { size, data })
    }

    /// Side length in texels.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// All pairs, row-major with roughness increasing per row.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// The `(scale, bias)` pair at column `x` (`n·v`) and row `y` (roughness).
    ///
    /// # Panics
    ///
    /// Panics if `x` or `y` is out of range.
    pub fn get(&self, x: u32, y: u32) -> Vec2 {
        assert!(x < self.size && y < self.size, "texel ({x}, {y}) out of range");
        let o = (y as usize * self.size as usize + x as usize) * Self::CHANNELS;
        Vec2::new(self.data[o], self.data[o + 1])
    }

    /// The table as a float RGB image with scale in red, bias in green and zero blue.
    pub fn to_image(&self) -> Rgb32FImage {
        let pixels = self
            .data
            .chunks_exact(Self::CHANNELS)
            .flat_map(|pair| [pair[0], pair[1], 0.0])
            .collect();
        Rgb32FImage::from_raw(self.size, self.size, pixels)
            .unwrap_or_else(|| Rgb32FImage::new(self.size, self.size))
    }

    /// One channel replicated into a float RGB image.
    ///
    /// # Panics
    ///
    /// Panics if `channel` is not 0 or 1.
    pub fn channel_image(&self, channel: usize) -> Rgb32FImage {
        assert!(channel < Self::CHANNELS, "channel {channel} out of range");
        let pixels = self
            .data
            .chunks_exact(Self::CHANNELS)
            .flat_map(|pair| [pair[channel]; 3])
            .collect();
        Rgb32FImage::from_raw(self.size, self.size, pixels)
            .unwrap_or_else(|| Rgb32FImage::new(self.size, self.size))
    }

    /// An 8-bit preview of `image` with all values stretched to the full range.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn preview(image: &Rgb32FImage, channels: usize) -> RgbImage {
        let (min, max) = image
            .pixels()
            .flat_map(|px| px.0.into_iter().take(channels))
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), c| {
                (lo.min(c), hi.max(c))
            });
        let range = if max > min { max - min } else { 1.0 };
        RgbImage::from_fn(image.width(), image.height(), |x, y| {
            let px = image.get_pixel(x, y).0;
            image::Rgb(std::array::from_fn(|c| {
                if c < channels {
                    ((px[c] - min) / range * 255.0).round() as u8
                } else {
                    0
                }
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::hammersley;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn points(n: u32) -> Vec<Vec2> {
        (0..n).map(|i| hammersley(i, n)).collect()
    }

    #[test]
    fn test_head_on_mirror_reflects_everything() {
        let lut = integrate_brdf(1.0, 0.0, &points(64));
        assert_relative_eq!(lut.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(lut.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_mirror_follows_schlick() {
        let points = points(16);
        for n_dot_v in [0.1, 0.3, 0.5, 0.8] {
            let lut = integrate_brdf(n_dot_v, 0.0, &points);
            let fc = (1.0f32 - n_dot_v).powi(5);
            assert_relative_eq!(lut.x, 1.0 - fc, epsilon = 1e-4);
            assert_relative_eq!(lut.y, fc, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_rough_grazing_loses_energy() {
        let points = points(1024);
        let smooth = integrate_brdf(0.5, 0.1, &points);
        let rough = integrate_brdf(0.5, 1.0, &points);
        assert!(rough.x + rough.y < smooth.x + smooth.y);
        assert!(rough.x > 0.0 && rough.y > 0.0);
    }

    #[test]
    fn test_empty_points() {
        assert_eq!(integrate_brdf(0.5, 0.5, &[]), Vec2::ZERO);
    }

    #[test]
    fn test_lut_validation_and_lookup() {
        assert!(matches!(BrdfLut::new(0, vec![]), Err(IblError::ZeroSizeInput)));
        assert!(matches!(
            BrdfLut::new(2, vec![0.0; 6]),
            Err(IblError::SizeMismatch {
                expected: 8,
                actual: 6
            })
        ));
        let lut = BrdfLut::new(2, (0..8).map(|i| i as f32).collect()).unwrap();
        assert_eq!(lut.get(1, 0), Vec2::new(2.0, 3.0));
        assert_eq!(lut.get(0, 1), Vec2::new(4.0, 5.0));
    }

    #[test]
    fn test_images() {
        let lut = BrdfLut::new(2, vec![0.0, 1.0, 0.5, 0.25, 1.0, 0.0, 0.25, 0.5]).unwrap();
        let image = lut.to_image();
        assert_eq!(image.get_pixel(1, 0).0, [0.5, 0.25, 0.0]);
        assert_eq!(lut.channel_image(1).get_pixel(0, 1).0, [0.0; 3]);

        let preview = BrdfLut::preview(&image, 2);
        assert_eq!(preview.get_pixel(0, 0).0, [0, 255, 0]);
        assert_eq!(preview.get_pixel(1, 0).0, [128, 64, 0]);
    }

    proptest! {
        #[test]
        fn prop_terms_are_finite_and_positive(n_dot_v in 0.01f32..1.0, roughness in 0.0f32..1.0) {
            let lut = integrate_brdf(n_dot_v, roughness, &points(128));
            prop_assert!(lut.is_finite());
            prop_assert!(lut.x >= 0.0 && lut.y >= 0.0);
        }
    }
}
