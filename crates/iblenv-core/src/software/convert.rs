use crate::backend::Converter;
use crate::env::IblEnv;
use crate::error::{IblError, Result};
use crate::hdr::HdrImage;
use crate::sample::{sample_bilinear, sample_spherical_map};
use crate::software::{render_level, Execution};

/// Equirectangular to cube-map reprojection on the CPU.
#[derive(Debug, Clone, Default)]
pub struct SoftwareConverter {
    execution: Execution,
}

impl SoftwareConverter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }
}

impl Converter for SoftwareConverter {
    fn convert(&self, image: &HdrImage, size: u32) -> Result<IblEnv> {
        if size == 0 {
            return Err(IblError::ZeroSizeInput);
        }

        let (width, height, channels) = (image.width(), image.height(), image.channels());
        let pixels = image.pixels();

        let mut data = vec![0.0; 6 * size as usize * size as usize * IblEnv::CHANNELS];
        render_level(self.execution, size, &mut data, |texel| {
            let uv = sample_spherical_map(texel.dir.normalize());
            sample_bilinear(width, height, channels, pixels, uv)
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
    fn test_uniform_panorama_gives_uniform_cube() {
        let image = HdrImage::uniform(64, 32, [0.5, 0.5, 0.5]).unwrap();
        for size in [1, 7, 16] {
            let env = SoftwareConverter::new().convert(&image, size).unwrap();
            assert_eq!(env.levels(), 1);
            assert_eq!(env.base_size(), size);
            for &c in env.all() {
                assert!((c - 0.5).abs() < 1e-6, "{c}");
            }
        }
    }

    #[test]
    fn test_hemispheres_land_on_the_right_faces() {
        // top half of the (flipped) panorama is +Y
        let (w, h) = (32, 16);
        let mut pixels = Vec::new();
        for y in 0..h {
            let value = if y >= h / 2 { 1.0 } else { 0.0 };
            for _ in 0..w {
                pixels.extend_from_slice(&[value, value, value]);
            }
        }
        let image = HdrImage::from_raw(w, h, 3, pixels).unwrap();
        let env = SoftwareConverter::new().convert(&image, 8).unwrap();
        assert!(env.face(0, CubeFace::PositiveY).iter().all(|&c| c == 1.0));
        assert!(env.face(0, CubeFace::NegativeY).iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_zero_size_rejected() {
        let image = HdrImage::uniform(4, 2, [1.0; 3]).unwrap();
        assert!(matches!(
            SoftwareConverter::new().convert(&image, 0),
            Err(IblError::ZeroSizeInput)
        ));
    }

    #[test]
    fn test_serial_matches_parallel() {
        let mut pixels = Vec::new();
        for i in 0..64 * 32 {
            #[allow(clippy::cast_precision_loss)]
            let f = i as f32 / 100.0;
            pixels.extend_from_slice(&[f, f.sin().abs(), 1.0 / (1.0 + f), 1.0]);
        }
        let image = HdrImage::from_raw(64, 32, 4, pixels).unwrap();
        let serial = SoftwareConverter::new()
            .with_execution(Execution::Serial)
            .convert(&image, 9)
            .unwrap();
        let parallel = SoftwareConverter::new().convert(&image, 9).unwrap();
        assert_eq!(serial, parallel);
    }
}
