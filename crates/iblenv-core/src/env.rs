//! The multi-level cube-map environment.

use std::ops::Range;

use crate::cubemap::{self, CubeFace};
use crate::error::{IblError, Result};

/// A cube-map environment with one or more precomputed mip levels.
///
/// Pixels are stored as one contiguous RGB `f32` buffer, level-major, then face-major
/// (+X, -X, +Y, -Y, +Z, -Z), then row-major within a face. [`IblEnv::face`] and
/// [`IblEnv::level`] return views into that buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct IblEnv {
    base_size: u32,
    levels: u32,
    data: Vec<f32>,
}

impl IblEnv {
    /// Number of channels per texel.
    pub const CHANNELS: usize = 3;

    /// Creates an environment from packed pixel data.
    ///
    /// A level count of 0 is treated as 1.
    ///
    /// # Errors
    ///
    /// Returns [`IblError::ZeroSizeInput`] if `base_size` is 0 and [`IblError::SizeMismatch`]
    /// if `data` does not hold exactly the texels of all levels. A `levels` count that would
    /// need levels smaller than 1×1 is a mismatch against the full chain of `base_size`.
    pub fn new(data: Vec<f32>, base_size: u32, levels: u32) -> Result<Self> {
        if base_size == 0 {
            return Err(IblError::ZeroSizeInput);
        }
        let requested = levels.max(1);
        let levels = requested.min(cubemap::max_levels(base_size));

        let expected = cubemap::checked_cube_map_pixels(base_size, levels)
            .and_then(|texels| texels.checked_mul(Self::CHANNELS))
            .unwrap_or(usize::MAX);
        if requested != levels || data.len() != expected {
            return Err(IblError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            base_size,
            levels,
            data,
        })
    }

    /// Creates an environment where every texel of every level has the same color.
    ///
    /// # Errors
    ///
    /// Same conditions as [`IblEnv::new`].
    pub fn uniform(base_size: u32, levels: u32, color: [f32; 3]) -> Result<Self> {
        let levels = if base_size == 0 {
            levels
        } else {
            cubemap::clamp_levels(base_size, levels)
        };
        let texels = cubemap::cube_map_pixels(base_size, levels);
        let data = color.iter().copied().cycle().take(texels * 3).collect();
        Self::new(data, base_size, levels)
    }

    /// Per-side resolution of level 0.
    #[must_use]
    pub fn base_size(&self) -> u32 {
        self.base_size
    }

    /// Number of mip levels.
    #[must_use]
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Per-side resolution of `level`.
    #[must_use]
    pub fn size(&self, level: u32) -> u32 {
        cubemap::level_size(self.base_size, level)
    }

    /// All pixel data, every level concatenated.
    #[must_use]
    pub fn all(&self) -> &[f32] {
        &self.data
    }

    /// Consumes the environment and returns its pixel data.
    #[must_use]
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    fn level_floats(&self, level: u32) -> Range<usize> {
        assert!(
            level < self.levels,
            "level {level} out of range, environment has {} levels",
            self.levels
        );
        let texels = cubemap::level_range(self.base_size, level);
        texels.start * Self::CHANNELS..texels.end * Self::CHANNELS
    }

    /// The six faces of `level`.
    ///
    /// # Panics
    ///
    /// Panics if `level >= self.levels()`.
    #[must_use]
    pub fn level(&self, level: u32) -> &[f32] {
        &self.data[self.level_floats(level)]
    }

    /// One face of `level`.
    ///
    /// # Panics
    ///
    /// Panics if `level >= self.levels()`.
    #[must_use]
    pub fn face(&self, level: u32, face: CubeFace) -> &[f32] {
        let range = self.level_floats(level);
        let size = self.size(level) as usize;
        let stride = size * size * Self::CHANNELS;
        let start = range.start + face.index() * stride;
        &self.data[start..start + stride]
    }

    /// Iterates over `(level, face, pixels)` for every face of every level.
    pub fn faces(&self) -> impl Iterator<Item = (u32, CubeFace, &[f32])> + '_ {
        (0..self.levels)
            .flat_map(|level| CubeFace::ALL.into_iter().map(move |face| (level, face)))
            .map(|(level, face)| (level, face, self.face(level, face)))
    }

    /// Returns a single-level environment holding a copy of `level`.
    ///
    /// # Panics
    ///
    /// Panics if `level >= self.levels()`.
    #[must_use]
    pub fn extract_level(&self, level: u32) -> Self {
        Self {
            base_size: self.size(level),
            levels: 1,
            data: self.level(level).to_vec(),
        }
    }
}

/// Builds an [`IblEnv`] level by level.
///
/// Producers that compute each level separately (the specular convolver, the resizer)
/// allocate the packed buffer once and fill one level slice at a time.
#[derive(Debug)]
pub struct IblEnvBuilder {
    base_size: u32,
    levels: u32,
    data: Vec<f32>,
}

impl IblEnvBuilder {
    /// Allocates a zeroed buffer for `levels` levels, clamped to what `base_size` allows.
    ///
    /// # Errors
    ///
    /// Returns [`IblError::ZeroSizeInput`] if `base_size` is 0.
    pub fn new(base_size: u32, levels: u32) -> Result<Self> {
        if base_size == 0 {
            return Err(IblError::ZeroSizeInput);
        }
        let levels = cubemap::clamp_levels(base_size, levels);
        let data = vec![0.0; cubemap::cube_map_pixels(base_size, levels) * IblEnv::CHANNELS];
        Ok(Self {
            base_size,
            levels,
            data,
        })
    }

    /// Number of levels that will be produced.
    #[must_use]
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Per-side resolution of `level`.
    #[must_use]
    pub fn size(&self, level: u32) -> u32 {
        cubemap::level_size(self.base_size, level)
    }

    /// Mutable pixel data of `level`.
    ///
    /// # Panics
    ///
    /// Panics if `level` is out of range.
    pub fn level_mut(&mut self, level: u32) -> &mut [f32] {
        assert!(level < self.levels, "level {level} out of range");
        let texels = cubemap::level_range(self.base_size, level);
        &mut self.data[texels.start * IblEnv::CHANNELS..texels.end * IblEnv::CHANNELS]
    }

    /// Finishes the environment.
    #[must_use]
    pub fn build(self) -> IblEnv {
        IblEnv {
            base_size: self.base_size,
            levels: self.levels,
            data: self.data,
        }
    }
}
