use std::borrow::Cow;
use std::time::Instant;

use glam::Vec3;

use crate::backend::Convolver;
use crate::env::{IblEnv, IblEnvBuilder};
use crate::error::{IblError, Result};
use crate::sample::sample_cube;
use crate::sampling::{Sample, SampleSequence, SpecularSampleSets, TangentFrame};
use crate::software::{render_level, Execution, SoftwareResizer};

/// Supersampling used to produce the mirror level.
pub const MIRROR_LEVEL_SUPERSAMPLE: u32 = 11;

/// GGX prefiltering of a specular mip chain on the CPU.
///
/// Level 0 is a supersampled resize of the source, every further level is filtered with
/// roughness `level / (levels - 1)` from source level 0. When the output size allows fewer
/// levels than requested, roughness is spread over the levels actually produced.
#[derive(Debug, Clone)]
pub struct SoftwareSpecularConvolver {
    sets: SpecularSampleSets,
    quality: u32,
    sequence: SampleSequence,
    levels: u32,
    resizer: SoftwareResizer,
    execution: Execution,
}

impl SoftwareSpecularConvolver {
    /// Creates a convolver with `quality` samples per level drawn from Hammersley points.
    #[must_use]
    pub fn new(quality: u32, levels: u32) -> Self {
        Self::with_sequence(quality, levels, SampleSequence::default())
    }

    /// Creates a convolver drawing its sample points from `sequence`.
    #[must_use]
    pub fn with_sequence(quality: u32, levels: u32, sequence: SampleSequence) -> Self {
        let levels = levels.max(1);
        Self {
            sets: SpecularSampleSets::new(quality, levels, sequence),
            quality,
            sequence,
            levels,
            resizer: SoftwareResizer::new(MIRROR_LEVEL_SUPERSAMPLE),
            execution: Execution::default(),
        }
    }

    #[must_use]
    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self.resizer = self.resizer.with_execution(execution);
        self
    }

    /// Number of levels requested at construction.
    #[must_use]
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Sample sets for a chain of `levels` levels.
    fn sets_for(&self, levels: u32) -> Cow<'_, SpecularSampleSets> {
        if levels == self.levels {
            Cow::Borrowed(&self.sets)
        } else {
            Cow::Owned(SpecularSampleSets::new(self.quality, levels, self.sequence))
        }
    }

    fn filter_level(&self, samples: &[Sample], source: &[f32], source_size: u32, out: &mut [f32], size: u32) {
        render_level(self.execution, size, out, |texel| {
            let n = texel.dir.normalize();
            let frame = TangentFrame::specular(n);

            let mut color = Vec3::ZERO;
            let mut weight = 0.0;
            for s in samples {
                let h = frame.to_world(s.direction());
                // view direction is the normal
                let l = 2.0 * n.dot(h) * h - n;
                let n_dot_l = n.dot(l).max(0.0);
                if n_dot_l > 0.0 {
                    color += sample_cube(source, source_size, l) * n_dot_l;
                    weight += n_dot_l;
                }
            }

            if weight > 0.0 {
                color / weight
            } else {
                Vec3::ZERO
            }
        });
    }
}

impl Convolver for SoftwareSpecularConvolver {
    fn convolve(&self, env: &IblEnv, size: u32) -> Result<IblEnv> {
        if size == 0 {
            return Err(IblError::ZeroSizeInput);
        }

        let source = env.level(0);
        let source_size = env.base_size();
        let mut builder = IblEnvBuilder::new(size, self.levels)?;
        if builder.levels() < self.levels {
            log::warn!(
                "{size}px only allows {} of {} specular levels",
                builder.levels(),
                self.levels
            );
        }
        let sets = self.sets_for(builder.levels());

        for level in 0..builder.levels() {
            let start = Instant::now();
            let level_size = builder.size(level);
            let out = builder.level_mut(level);
            if level == 0 {
                self.resizer.resize_level(source, source_size, out, level_size);
            } else {
                self.filter_level(sets.level(level), source, source_size, out, level_size);
            }
            log::debug!("specular level {level} ({level_size}px) took {:.2?}", start.elapsed());
        }

        Ok(builder.build())
    }

    fn name(&self) -> &'static str {
        "software"
    }
}
