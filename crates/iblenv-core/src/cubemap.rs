//! Cube-map geometry and mip-level layout.
//!
//! Faces are stored in the OpenGL order +X, -X, +Y, -Y, +Z, -Z. Within a face texels
//! are row-major. The mapping from (face, column, row) to a direction follows the
//! OpenGL cube-map axis conventions, so that [`dir_to_face_uv`] is the exact inverse
//! of [`face_uv_to_dir`].

use std::ops::Range;

use glam::{Vec2, Vec3};

/// One of the six cube-map faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    /// Right.
    PositiveX,
    /// Left.
    NegativeX,
    /// Top.
    PositiveY,
    /// Bottom.
    NegativeY,
    /// Back.
    PositiveZ,
    /// Front.
    NegativeZ,
}

impl CubeFace {
    /// All faces in storage order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Returns the storage index of this face (0..6).
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns the face stored at `index`, if any.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// A texel visited by [`for_each_texel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Texel {
    /// The face the texel belongs to.
    pub face: CubeFace,
    /// Column within the face.
    pub u: u32,
    /// Row within the face.
    pub v: u32,
    /// Direction through the texel center (not normalized, the dominant component is ±1).
    pub dir: Vec3,
    /// Flat texel index over all six faces.
    pub index: usize,
}

/// Maps face-local coordinates `s, t` in [-1, 1] to a direction.
#[inline]
fn face_st_to_dir(face: CubeFace, s: f32, t: f32) -> Vec3 {
    match face {
        CubeFace::PositiveX => Vec3::new(1.0, -t, -s),
        CubeFace::NegativeX => Vec3::new(-1.0, -t, s),
        CubeFace::PositiveY => Vec3::new(s, 1.0, t),
        CubeFace::NegativeY => Vec3::new(s, -1.0, -t),
        CubeFace::PositiveZ => Vec3::new(s, -t, 1.0),
        CubeFace::NegativeZ => Vec3::new(-s, -t, -1.0),
    }
}

/// Maps a face and texture coordinates in [0, 1]² to an (unnormalized) direction.
#[must_use]
pub fn face_uv_to_dir(face: CubeFace, uv: Vec2) -> Vec3 {
    face_st_to_dir(face, uv.x * 2.0 - 1.0, uv.y * 2.0 - 1.0)
}

/// Returns the direction through the center of texel (`col`, `row`) of a face with
/// `resolution` texels per side.
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn texel_direction(face: CubeFace, col: u32, row: u32, resolution: u32) -> Vec3 {
    // (2x+1)/r - 1 lands on the texel center
    let res = resolution as f32;
    let s = (2.0 * col as f32 + 1.0) / res - 1.0;
    let t = (2.0 * row as f32 + 1.0) / res - 1.0;
    face_st_to_dir(face, s, t)
}

/// Returns the direction through a point of texel (`col`, `row`) displaced by `offset`
/// texels from its center. Offsets in [-0.5, 0.5] stay within the texel footprint.
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn texel_direction_offset(
    face: CubeFace,
    col: u32,
    row: u32,
    resolution: u32,
    offset: Vec2,
) -> Vec3 {
    let res = resolution as f32;
    let s = (2.0 * (col as f32 + 0.5 + offset.x)) / res - 1.0;
    let t = (2.0 * (row as f32 + 0.5 + offset.y)) / res - 1.0;
    face_st_to_dir(face, s, t)
}

/// Selects the face a direction points at and the texture coordinates within it.
///
/// The dominant axis is the one with the largest absolute component; ties prefer X over Y
/// over Z. The returned coordinates are in [0, 1]². The zero vector is not a valid input.
#[must_use]
pub fn dir_to_face_uv(dir: Vec3) -> (CubeFace, Vec2) {
    let a = dir.abs();

    let (face, u, v, major) = if a.x >= a.y && a.x >= a.z {
        if dir.x >= 0.0 {
            (CubeFace::PositiveX, -dir.z, -dir.y, a.x)
        } else {
            (CubeFace::NegativeX, dir.z, -dir.y, a.x)
        }
    } else if a.y >= a.x && a.y >= a.z {
        if dir.y >= 0.0 {
            (CubeFace::PositiveY, dir.x, dir.z, a.y)
        } else {
            (CubeFace::NegativeY, dir.x, -dir.z, a.y)
        }
    } else if dir.z >= 0.0 {
        (CubeFace::PositiveZ, dir.x, -dir.y, a.z)
    } else {
        (CubeFace::NegativeZ, -dir.x, -dir.y, a.z)
    };

    let uv_scale = 0.5 / major;
    (
        face,
        Vec2::new(u * uv_scale + 0.5, v * uv_scale + 0.5),
    )
}

/// Visits every texel of a cube map with `resolution` texels per side.
///
/// Faces are visited in storage order, rows top to bottom, columns left to right, so
/// `texel.index` increases by one per call.
pub fn for_each_texel(resolution: u32, mut visit: impl FnMut(Texel)) {
    let mut index = 0;
    for face in CubeFace::ALL {
        for v in 0..resolution {
            for u in 0..resolution {
                visit(Texel {
                    face,
                    u,
                    v,
                    dir: texel_direction(face, u, v, resolution),
                    index,
                });
                index += 1;
            }
        }
    }
}

/// Returns the per-side resolution of mip `level` for a cube map of `base_size`.
///
/// Halves per level and never drops below 1.
#[must_use]
pub fn level_size(base_size: u32, level: u32) -> u32 {
    base_size.checked_shr(level).unwrap_or(0).max(1)
}

/// Returns the largest useful number of mip levels for `base_size`, i.e. the count of
/// levels down to and including the 1×1 level.
#[must_use]
pub fn max_levels(base_size: u32) -> u32 {
    if base_size == 0 {
        return 0;
    }
    u32::BITS - base_size.leading_zeros()
}

/// Clamps a requested level count to `[1, max_levels(base_size)]`.
#[must_use]
pub fn clamp_levels(base_size: u32, levels: u32) -> u32 {
    levels.clamp(1, max_levels(base_size).max(1))
}

/// Number of texels in one level (all six faces).
#[must_use]
pub fn level_texels(base_size: u32, level: u32) -> usize {
    let size = level_size(base_size, level) as usize;
    6 * size * size
}

/// Number of texels in a cube map of `levels` levels (all six faces).
#[must_use]
pub fn cube_map_pixels(base_size: u32, levels: u32) -> usize {
    (0..levels).map(|level| level_texels(base_size, level)).sum()
}

/// Number of texels in a cube map of `levels` levels, or `None` if the count does not fit
/// in `usize`.
#[must_use]
pub fn checked_cube_map_pixels(base_size: u32, levels: u32) -> Option<usize> {
    (0..levels).try_fold(0usize, |total, level| {
        let size = level_size(base_size, level) as usize;
        size.checked_mul(size)?.checked_mul(6)?.checked_add(total)
    })
}

/// Texel range occupied by `level` in the packed level-major layout.
#[must_use]
pub fn level_range(base_size: u32, level: u32) -> Range<usize> {
    let start = cube_map_pixels(base_size, level);
    start..start + level_texels(base_size, level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_checked_pixel_count() {
        assert_eq!(checked_cube_map_pixels(8, 4), Some(cube_map_pixels(8, 4)));
        assert_eq!(checked_cube_map_pixels(8, 0), Some(0));
        assert_eq!(checked_cube_map_pixels(u32::MAX, 1), None);
    }

    #[test]
    fn test_face_order_and_indices() {
        for (i, face) in CubeFace::ALL.iter().enumerate() {
            assert_eq!(face.index(), i);
            assert_eq!(CubeFace::from_index(i), Some(*face));
        }
        assert_eq!(CubeFace::from_index(6), None);
    }

    #[test]
    fn test_texel_centers_for_resolution_three() {
        // x=0: 1/3 - 1, x=1: 0, x=2: 5/3 - 1
        let d = texel_direction(CubeFace::PositiveZ, 1, 1, 3);
        assert_eq!(d, Vec3::new(0.0, 0.0, 1.0));

        let d = texel_direction(CubeFace::PositiveZ, 0, 0, 3);
        assert_relative_eq!(d.x, -2.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(d.y, 2.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_traversal_sign_flips() {
        let res = 4;
        let mut seen = Vec::new();
        for_each_texel(res, |t| seen.push(t));
        assert_eq!(seen.len(), 6 * 16);

        // +X: first texel is top-left, looking from inside the cube toward +X
        let t = seen[0];
        assert_eq!(t.face, CubeFace::PositiveX);
        assert!(t.dir.y > 0.0 && t.dir.z > 0.0);

        // -X does not flip z
        let t = seen[16];
        assert_eq!(t.face, CubeFace::NegativeX);
        assert!(t.dir.y > 0.0 && t.dir.z < 0.0);

        // +Y: rows run along +z
        let t = seen[32];
        assert_eq!(t.face, CubeFace::PositiveY);
        assert!(t.dir.x < 0.0 && t.dir.z < 0.0);

        // -Y flips z
        let t = seen[48];
        assert_eq!(t.face, CubeFace::NegativeY);
        assert!(t.dir.x < 0.0 && t.dir.z > 0.0);

        // +Z flips y only
        let t = seen[64];
        assert_eq!(t.face, CubeFace::PositiveZ);
        assert!(t.dir.x < 0.0 && t.dir.y > 0.0);

        // -Z flips x as well
        let t = seen[80];
        assert_eq!(t.face, CubeFace::NegativeZ);
        assert!(t.dir.x > 0.0 && t.dir.y > 0.0);
    }

    #[test]
    fn test_traversal_index_is_row_major() {
        let res = 5;
        for_each_texel(res, |t| {
            let expected = t.face.index() * 25 + t.v as usize * 5 + t.u as usize;
            assert_eq!(t.index, expected);
        });
    }

    #[test]
    fn test_texel_direction_maps_back_to_same_texel() {
        let res = 7;
        for_each_texel(res, |t| {
            let (face, uv) = dir_to_face_uv(t.dir);
            assert_eq!(face, t.face);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let (col, row) = ((uv.x * res as f32) as u32, (uv.y * res as f32) as u32);
            assert_eq!((col, row), (t.u, t.v));
        });
    }

    #[test]
    fn test_offset_direction_matches_center() {
        let a = texel_direction(CubeFace::NegativeY, 3, 2, 8);
        let b = texel_direction_offset(CubeFace::NegativeY, 3, 2, 8, Vec2::ZERO);
        assert_relative_eq!(a.x, b.x, epsilon = 1e-6);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-6);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-6);
    }

    #[test]
    fn test_level_sizes_clamp_at_one() {
        assert_eq!(level_size(128, 0), 128);
        assert_eq!(level_size(128, 3), 16);
        assert_eq!(level_size(128, 7), 1);
        assert_eq!(level_size(128, 9), 1);
        assert_eq!(level_size(128, 40), 1);
        assert_eq!(level_size(5, 1), 2);
    }

    #[test]
    fn test_max_levels() {
        assert_eq!(max_levels(0), 0);
        assert_eq!(max_levels(1), 1);
        assert_eq!(max_levels(2), 2);
        assert_eq!(max_levels(128), 8);
        assert_eq!(max_levels(129), 8);
        assert_eq!(clamp_levels(4, 10), 3);
        assert_eq!(clamp_levels(4, 0), 1);
    }

    #[test]
    fn test_packed_layout() {
        assert_eq!(cube_map_pixels(4, 1), 96);
        assert_eq!(cube_map_pixels(4, 3), 96 + 24 + 6);
        assert_eq!(level_range(4, 0), 0..96);
        assert_eq!(level_range(4, 1), 96..120);
        assert_eq!(level_range(4, 2), 120..126);
    }

    proptest! {
        #[test]
        fn prop_face_uv_round_trip(face_idx in 0usize..6, u in 0.0f32..=1.0, v in 0.0f32..=1.0) {
            let face = CubeFace::ALL[face_idx];
            // Edges are shared between faces, keep away from them to get a unique answer.
            let u = 0.001 + u * 0.998;
            let v = 0.001 + v * 0.998;
            let dir = face_uv_to_dir(face, Vec2::new(u, v));
            let (back_face, uv) = dir_to_face_uv(dir);
            prop_assert_eq!(back_face, face);
            prop_assert!((uv.x - u).abs() < 1e-5);
            prop_assert!((uv.y - v).abs() < 1e-5);
        }

        #[test]
        fn prop_scaled_direction_selects_same_texel(x in -1.0f32..1.0, y in -1.0f32..1.0, z in -1.0f32..1.0, k in 0.1f32..10.0) {
            let dir = Vec3::new(x, y, z);
            prop_assume!(dir.length() > 1e-3);
            let (f0, uv0) = dir_to_face_uv(dir);
            let (f1, uv1) = dir_to_face_uv(dir * k);
            prop_assert_eq!(f0, f1);
            prop_assert!((uv0 - uv1).abs().max_element() < 1e-5);
        }
    }
}
