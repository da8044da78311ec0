//! Texture lookups shared by the software backend.

use std::f32::consts::{FRAC_1_PI, PI};

use glam::{Vec2, Vec3};

use crate::cubemap;

const INV_TWO_PI: f32 = 0.5 / PI;

/// Maps a unit direction to equirectangular texture coordinates in [0, 1]².
#[inline]
#[must_use]
pub fn sample_spherical_map(dir: Vec3) -> Vec2 {
    Vec2::new(
        dir.z.atan2(dir.x) * INV_TWO_PI + 0.5,
        dir.y.asin() * FRAC_1_PI + 0.5,
    )
}

/// Returns the two texel indices and the blend fraction for coordinate `x` (in texels,
/// texel centers at `i + 0.5`) along an axis of `dim` texels.
///
/// Both indices are clamped into `[0, dim - 1]`; when they collapse onto the same texel
/// the fraction is 0 so nothing past the border is blended in.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn axis_taps(x: f32, dim: u32) -> (usize, usize, f32) {
    let x = x - 0.5;
    let floor = x.floor();
    let last = i64::from(dim) - 1;
    let lo = (floor as i64).clamp(0, last) as usize;
    let hi = (floor as i64 + 1).clamp(0, last) as usize;
    if lo >= hi {
        (hi, hi, 0.0)
    } else {
        (lo, hi, x - floor)
    }
}

/// Bilinearly samples the first three channels of a row-major image at `uv` in [0, 1]².
///
/// `pixels` must hold `width * height * channels` floats.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sample_bilinear(width: u32, height: u32, channels: usize, pixels: &[f32], uv: Vec2) -> Vec3 {
    let (u0, u1, fu) = axis_taps(uv.x * width as f32, width);
    let (v0, v1, fv) = axis_taps(uv.y * height as f32, height);

    let row = width as usize * channels;
    let fetch = |u: usize, v: usize| {
        let o = v * row + u * channels;
        Vec3::new(pixels[o], pixels[o + 1], pixels[o + 2])
    };

    let top = fetch(u0, v0) * (1.0 - fu) + fetch(u1, v0) * fu;
    let bottom = fetch(u0, v1) * (1.0 - fu) + fetch(u1, v1) * fu;
    top * (1.0 - fv) + bottom * fv
}

/// Samples one level of a cube map (six RGB faces of `size`×`size`) in direction `dir`.
///
/// Interpolation stays within the face the direction points at. `dir` need not be
/// normalized but must not be zero.
#[must_use]
pub fn sample_cube(pixels: &[f32], size: u32, dir: Vec3) -> Vec3 {
    let (face, uv) = cubemap::dir_to_face_uv(dir);
    let stride = size as usize * size as usize * 3;
    let start = face.index() * stride;
    sample_bilinear(size, size, 3, &pixels[start..start + stride], uv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubemap::{texel_direction, CubeFace};
    use approx::assert_relative_eq;

    fn gradient(width: u32, height: u32) -> Vec<f32> {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[x as f32, y as f32, 1.0, 1.0]);
            }
        }
        pixels
    }

    #[test]
    fn test_texel_centers_are_exact() {
        let pixels = gradient(4, 3);
        for y in 0..3 {
            for x in 0..4 {
                let uv = Vec2::new((x as f32 + 0.5) / 4.0, (y as f32 + 0.5) / 3.0);
                let c = sample_bilinear(4, 3, 4, &pixels, uv);
                let expected = Vec3::new(x as f32, y as f32, 1.0);
                assert!((c - expected).abs().max_element() < 1e-4, "{c} != {expected}");
            }
        }
    }

    #[test]
    fn test_interpolates_between_centers() {
        let pixels = gradient(4, 4);
        let c = sample_bilinear(4, 4, 4, &pixels, Vec2::new(0.5, 0.5));
        assert_relative_eq!(c.x, 1.5);
        assert_relative_eq!(c.y, 1.5);
    }

    #[test]
    fn test_borders_clamp() {
        let pixels = gradient(4, 4);
        assert_eq!(
            sample_bilinear(4, 4, 4, &pixels, Vec2::new(0.0, 0.0)),
            Vec3::new(0.0, 0.0, 1.0)
        );
        assert_eq!(
            sample_bilinear(4, 4, 4, &pixels, Vec2::new(1.0, 1.0)),
            Vec3::new(3.0, 3.0, 1.0)
        );
        assert_eq!(
            sample_bilinear(4, 4, 4, &pixels, Vec2::new(-3.0, 7.0)),
            Vec3::new(0.0, 3.0, 1.0)
        );
    }

    #[test]
    fn test_single_texel_image() {
        let c = sample_bilinear(1, 1, 3, &[0.25, 0.5, 0.75], Vec2::new(0.9, 0.1));
        assert_eq!(c, Vec3::new(0.25, 0.5, 0.75));
    }

    #[test]
    fn test_spherical_map_axes() {
        let uv = sample_spherical_map(Vec3::X);
        assert_relative_eq!(uv.x, 0.5);
        assert_relative_eq!(uv.y, 0.5);
        let uv = sample_spherical_map(Vec3::Y);
        assert_relative_eq!(uv.y, 1.0);
        let uv = sample_spherical_map(Vec3::NEG_Y);
        assert_relative_eq!(uv.y, 0.0);
        let uv = sample_spherical_map(Vec3::Z);
        assert_relative_eq!(uv.x, 0.75);
    }

    #[test]
    fn test_sample_cube_hits_texel_centers() {
        let size = 4;
        let pixels: Vec<f32> = (0..6 * size * size * 3).map(|i| i as f32).collect();
        for face in CubeFace::ALL {
            for row in 0..size {
                for col in 0..size {
                    let dir = texel_direction(face, col, row, size);
                    let index = (face.index() * 16 + (row * size + col) as usize) * 3;
                    let c = sample_cube(&pixels, size, dir);
                    assert_relative_eq!(c.x, pixels[index], epsilon = 1e-3);
                }
            }
        }
    }
}
