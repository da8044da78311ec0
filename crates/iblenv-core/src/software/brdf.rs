use std::time::Instant;

use glam::Vec2;
use rayon::prelude::*;

use crate::backend::BrdfIntegrator;
use crate::brdf::{integrate_brdf, texel_center, BrdfLut};
use crate::error::{IblError, Result};
use crate::sampling::SampleSequence;
use crate::software::Execution;

/// Split-sum BRDF integration on the CPU.
#[derive(Debug, Clone)]
pub struct SoftwareBrdfIntegrator {
    points: Vec<Vec2>,
    execution: Execution,
}

impl SoftwareBrdfIntegrator {
    /// Creates an integrator with `quality` Hammersley samples per texel.
    #[must_use]
    pub fn new(quality: u32) -> Self {
        Self {
            points: SampleSequence::Hammersley.generate(quality.max(1)),
            execution: Execution::default(),
        }
    }

    #[must_use]
    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    fn fill_row(&self, size: u32, y: u32, row: &mut [f32]) {
        let roughness = texel_center(y, size);
        for (x, pair) in (0..size).zip(row.chunks_exact_mut(BrdfLut::CHANNELS)) {
            let terms = integrate_brdf(texel_center(x, size), roughness, &self.points);
            pair.copy_from_slice(&terms.to_array());
        }
    }
}

impl BrdfIntegrator for SoftwareBrdfIntegrator {
    fn integrate(&self, size: u32) -> Result<BrdfLut> {
        if size == 0 {
            return Err(IblError::ZeroSizeInput);
        }
        let start = Instant::now();

        let row_floats = size as usize * BrdfLut::CHANNELS;
        let mut data = vec![0.0; row_floats * size as usize];
        #[allow(clippy::cast_possible_truncation)]
        match self.execution {
            Execution::Serial => data
                .chunks_exact_mut(row_floats)
                .enumerate()
                .for_each(|(y, row)| self.fill_row(size, y as u32, row)),
            Execution::Parallel => data
                .par_chunks_mut(row_floats)
                .enumerate()
                .for_each(|(y, row)| self.fill_row(size, y as u32, row)),
        }

        log::debug!("brdf lut ({size}px) took {:.2?}", start.elapsed());
        BrdfLut::new(size, data)
    }

    fn name(&self) -> &'static str {
        "software"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_table_layout() {
        let lut = SoftwareBrdfIntegrator::new(256).integrate(8).unwrap();
        assert_eq!(lut.size(), 8);
        assert_eq!(lut.data().len(), 8 * 8 * 2);

        // smooth row: scale grows towards head-on viewing
        let grazing = lut.get(0, 0);
        let head_on = lut.get(7, 0);
        assert!(head_on.x > grazing.x);
        assert!(head_on.y < grazing.y);
        assert_relative_eq!(head_on.x + head_on.y, 1.0, epsilon = 0.02);

        // rough rows lose energy
        let rough = lut.get(7, 7);
        assert!(rough.x + rough.y < head_on.x + head_on.y);
    }

    #[test]
    fn test_zero_size() {
        assert!(matches!(
            SoftwareBrdfIntegrator::new(16).integrate(0),
            Err(IblError::ZeroSizeInput)
        ));
    }

    #[test]
    fn test_serial_matches_parallel() {
        let serial = SoftwareBrdfIntegrator::new(32)
            .with_execution(Execution::Serial)
            .integrate(6)
            .unwrap();
        let parallel = SoftwareBrdfIntegrator::new(32).integrate(6).unwrap();
        assert_eq!(serial, parallel);
    }
}
