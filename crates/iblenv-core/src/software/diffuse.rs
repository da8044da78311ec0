use std::f32::consts::PI;

use glam::Vec3;

use crate::backend::Convolver;
use crate::env::IblEnv;
use crate::error::{IblError, Result};
use crate::sample::sample_cube;
use crate::sampling::{cosine_hemisphere_samples, Sample, TangentFrame};
use crate::software::{render_level, Execution};

/// Cosine-weighted irradiance convolution on the CPU.
///
/// Reads level 0 of the source and produces a single level.
#[derive(Debug, Clone)]
pub struct SoftwareDiffuseConvolver {
    samples: Vec<Sample>,
    execution: Execution,
}

impl SoftwareDiffuseConvolver {
    /// Creates a convolver using [`cosine_hemisphere_samples`] of `quality`.
    #[must_use]
    pub fn new(quality: u32) -> Self {
        Self {
            samples: cosine_hemisphere_samples(quality),
            execution: Execution::default(),
        }
    }

    #[must_use]
    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl Convolver for SoftwareDiffuseConvolver {
    fn convolve(&self, env: &IblEnv, size: u32) -> Result<IblEnv> {
        if size == 0 {
            return Err(IblError::ZeroSizeInput);
        }

        let source = env.level(0);
        let source_size = env.base_size();

        let mut data = vec![0.0; 6 * size as usize * size as usize * IblEnv::CHANNELS];
        render_level(self.execution, size, &mut data, |texel| {
            let frame = TangentFrame::diffuse(texel.dir.normalize());

            let mut color = Vec3::ZERO;
            let mut count = 0u32;
            for s in &self.samples {
                let dir = frame.to_world(s.direction());
                if dir == Vec3::ZERO {
                    continue;
                }
                color += sample_cube(source, source_size, dir) * s.weight;
                count += 1;
            }

            if count == 0 {
                Vec3::ZERO
            } else {
                #[allow(clippy::cast_precision_loss)]
                let norm = PI / count as f32;
                color * norm
            }
        });

        IblEnv::new(data, size, 1)
    }

    fn name(&self) -> &'static str {
        "software"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubemap::CubeFace;

    #[test]
    fn test_uniform_radiance_gives_uniform_irradiance() {
        let radiance = [0.8, 0.4, 0.2];
        let env = IblEnv::uniform(8, 1, radiance).unwrap();
        let quality = 16;
        let result = SoftwareDiffuseConvolver::new(quality)
            .convolve(&env, 4)
            .unwrap();

        let first = &result.all()[..3];
        for px in result.all().chunks_exact(3) {
            for c in 0..3 {
                assert!((px[c] - first[c]).abs() < 1e-5, "{px:?} vs {first:?}");
            }
        }
        for c in 0..3 {
            let relative = (first[c] - radiance[c]).abs() / radiance[c];
            assert!(relative < 0.1, "channel {c}: {} vs {}", first[c], radiance[c]);
        }
    }

    #[test]
    fn test_irradiance_converges_with_quality() {
        let env = IblEnv::uniform(4, 1, [1.0; 3]).unwrap();
        let error = |quality| {
            let result = SoftwareDiffuseConvolver::new(quality)
                .convolve(&env, 1)
                .unwrap();
            (result.all()[0] - 1.0).abs()
        };
        assert!(error(64) < 0.03);
        assert!(error(64) < error(4));
    }

    #[test]
    fn test_quality_zero_is_lookup() {
        let mut data = Vec::new();
        for face in 0..6u8 {
            for _ in 0..4 {
                data.extend_from_slice(&[f32::from(face), 0.0, 0.0]);
            }
        }
        let env = IblEnv::new(data, 2, 1).unwrap();
        let result = SoftwareDiffuseConvolver::new(0).convolve(&env, 2).unwrap();
        for face in CubeFace::ALL {
            #[allow(clippy::cast_precision_loss)]
            let expected = face.index() as f32 * PI;
            for px in result.face(0, face).chunks_exact(3) {
                assert!((px[0] - expected).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_bright_face_lights_its_hemisphere() {
        let mut data = vec![0.0; 6 * 16 * 3];
        let start = CubeFace::PositiveY.index() * 16 * 3;
        data[start..start + 16 * 3].fill(1.0);
        let env = IblEnv::new(data, 4, 1).unwrap();

        let result = SoftwareDiffuseConvolver::new(8).convolve(&env, 2).unwrap();
        let top: f32 = result.face(0, CubeFace::PositiveY).iter().sum();
        let bottom: f32 = result.face(0, CubeFace::NegativeY).iter().sum();
        let side: f32 = result.face(0, CubeFace::PositiveX).iter().sum();
        assert!(top > side);
        assert!(side > bottom);
    }

    #[test]
    fn test_serial_matches_parallel() {
        let n = 6 * 8 * 8 * 3;
        #[allow(clippy::cast_precision_loss)]
        let data = (0..n).map(|i| (i % 17) as f32 * 0.25).collect();
        let env = IblEnv::new(data, 8, 1).unwrap();
        let serial = SoftwareDiffuseConvolver::new(6)
            .with_execution(Execution::Serial)
            .convolve(&env, 4)
            .unwrap();
        let parallel = SoftwareDiffuseConvolver::new(6).convolve(&env, 4).unwrap();
        assert_eq!(serial, parallel);
    }
}
