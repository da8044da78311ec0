use glam::{Vec2, Vec3};

use crate::backend::Resizer;
use crate::cubemap::{self, texel_direction_offset};
use crate::env::{IblEnv, IblEnvBuilder};
use crate::error::{IblError, Result};
use crate::sample::sample_cube;
use crate::sampling::super_samples;
use crate::software::{render_level, Execution};

/// Super-sampled cube-map resampling on the CPU.
#[derive(Debug, Clone)]
pub struct SoftwareResizer {
    offsets: Vec<Vec2>,
    execution: Execution,
}

impl SoftwareResizer {
    /// Creates a resizer averaging `supersample`×`supersample` lookups per texel.
    #[must_use]
    pub fn new(supersample: u32) -> Self {
        Self {
            offsets: super_samples(supersample),
            execution: Execution::default(),
        }
    }

    #[must_use]
    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Resamples one level (six faces of `source_size`) into `out` (six faces of `size`).
    pub(crate) fn resize_level(&self, source: &[f32], source_size: u32, out: &mut [f32], size: u32) {
        #[allow(clippy::cast_precision_loss)]
        let norm = 1.0 / self.offsets.len() as f32;
        render_level(self.execution, size, out, |texel| {
            let mut color = Vec3::ZERO;
            for &offset in &self.offsets {
                let dir = texel_direction_offset(texel.face, texel.u, texel.v, size, offset);
                color += sample_cube(source, source_size, dir);
            }
            color * norm
        });
    }
}

impl Resizer for SoftwareResizer {
    fn resize(&self, env: &IblEnv, size: u32) -> Result<IblEnv> {
        if size == 0 {
            return Err(IblError::ZeroSizeInput);
        }

        let mut builder = IblEnvBuilder::new(size, cubemap::clamp_levels(size, env.levels()))?;
        for level in 0..builder.levels() {
            let level_size = builder.size(level);
            self.resize_level(env.level(level), env.size(level), builder.level_mut(level), level_size);
        }

        Ok(builder.build())
    }

    fn name(&self) -> &'static str {
        "software"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubemap::CubeFace;

    fn face_colored(size: u32, levels: u32) -> IblEnv {
        let mut data = Vec::new();
        for level in 0..levels {
            let s = cubemap::level_size(size, level);
            for face in 0..6u8 {
                for _ in 0..s * s {
                    data.extend_from_slice(&[f32::from(face), f32::from(face) * 2.0, 1.0]);
                }
            }
        }
        IblEnv::new(data, size, levels).unwrap()
    }

    #[test]
    fn test_same_size_single_sample_is_identity() {
        let n = 6 * 8 * 8 * 3;
        #[allow(clippy::cast_precision_loss)]
        let data = (0..n).map(|i| (i % 23) as f32).collect();
        let env = IblEnv::new(data, 8, 1).unwrap();
        let resized = SoftwareResizer::new(1).resize(&env, 8).unwrap();
        for (a, b) in resized.all().iter().zip(env.all()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_downsample_keeps_face_colors() {
        let env = face_colored(16, 1);
        let resized = SoftwareResizer::new(3).resize(&env, 4).unwrap();
        for face in CubeFace::ALL {
            #[allow(clippy::cast_precision_loss)]
            let expected = face.index() as f32;
            for px in resized.face(0, face).chunks_exact(3) {
                assert!((px[0] - expected).abs() < 1e-5);
                assert!((px[1] - expected * 2.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_levels_are_kept_and_clamped() {
        let env = face_colored(16, 4);
        let resized = SoftwareResizer::new(2).resize(&env, 32).unwrap();
        assert_eq!(resized.levels(), 4);
        assert_eq!(resized.size(3), 4);

        let shrunk = SoftwareResizer::new(2).resize(&env, 2).unwrap();
        assert_eq!(shrunk.levels(), 2);
        assert_eq!(shrunk.size(1), 1);
    }

    #[test]
    fn test_uniform_env_stays_uniform() {
        let env = IblEnv::uniform(8, 4, [0.25, 0.5, 2.0]).unwrap();
        let resized = SoftwareResizer::new(5).resize(&env, 5).unwrap();
        assert_eq!(resized.levels(), 3);
        for px in resized.all().chunks_exact(3) {
            assert!((px[0] - 0.25).abs() < 1e-5);
            assert!((px[2] - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_serial_matches_parallel() {
        let env = face_colored(8, 3);
        let serial = SoftwareResizer::new(3)
            .with_execution(Execution::Serial)
            .resize(&env, 6)
            .unwrap();
        let parallel = SoftwareResizer::new(3).resize(&env, 6).unwrap();
        assert_eq!(serial, parallel);
    }
}
