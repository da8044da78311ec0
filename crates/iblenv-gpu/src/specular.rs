use std::time::Instant;

use bytemuck::{Pod, Zeroable};
use iblenv_core::sampling::{SampleSequence, SpecularSampleSets};
use iblenv_core::software::MIRROR_LEVEL_SUPERSAMPLE;
use iblenv_core::{Convolver, IblEnv, IblEnvBuilder, IblError, Result};

use crate::context::{Binding, GpuContext, GpuOptions, Kernel};
use crate::error::{GpuError, GpuResult};
use crate::resizer::ResizeKernel;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SpecularParams {
    src_size: u32,
    size: u32,
    sample_offset: u32,
    sample_count: u32,
}

/// GGX prefiltering of a specular mip chain on the GPU.
///
/// All sample tables are uploaded once as a single buffer and indexed per level. An output
/// size that allows fewer levels than requested uploads tables for the shorter chain for
/// that call.
#[derive(Debug)]
pub struct GpuSpecularConvolver {
    context: Option<GpuContext>,
    kernel: Kernel,
    mirror: ResizeKernel,
    sets: SpecularSampleSets,
    samples: wgpu::Buffer,
    quality: u32,
    sequence: SampleSequence,
    levels: u32,
}

impl GpuSpecularConvolver {
    /// Creates a convolver with `quality` samples per level on a new device.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError`] if no device is available or a kernel fails to build.
    pub fn new(
        options: &GpuOptions,
        quality: u32,
        levels: u32,
        sequence: SampleSequence,
    ) -> GpuResult<Self> {
        Self::with_context(GpuContext::new(options)?, quality, levels, sequence)
    }

    /// Creates a convolver on an existing device.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::PipelineCreationFailed`] if a kernel fails to build.
    pub fn with_context(
        context: GpuContext,
        quality: u32,
        levels: u32,
        sequence: SampleSequence,
    ) -> GpuResult<Self> {
        let levels = levels.max(1);
        let kernel = context.create_kernel(
            "iblenv specular",
            include_str!("shaders/specular.wgsl"),
            &[
                Binding::Uniform,
                Binding::ReadOnly,
                Binding::ReadWrite,
                Binding::ReadOnly,
            ],
        )?;
        let mirror = ResizeKernel::new(&context, MIRROR_LEVEL_SUPERSAMPLE)?;
        let sets = SpecularSampleSets::new(quality, levels, sequence);
        let samples = context.storage("specular samples", sets.samples());
        Ok(Self {
            context: Some(context),
            kernel,
            mirror,
            sets,
            samples,
            quality,
            sequence,
            levels,
        })
    }

    /// Number of levels requested at construction.
    #[must_use]
    pub fn levels(&self) -> u32 {
        self.levels
    }

    #[allow(clippy::too_many_arguments)]
    fn filter_level(
        &self,
        context: &GpuContext,
        sets: &SpecularSampleSets,
        samples: &wgpu::Buffer,
        source: &wgpu::Buffer,
        src_size: u32,
        level: u32,
        size: u32,
    ) -> GpuResult<Vec<f32>> {
        let range = sets.index()[level as usize];
        let params = SpecularParams {
            src_size,
            size,
            sample_offset: range.offset,
            sample_count: range.count,
        };
        let floats = 6 * size as usize * size as usize * IblEnv::CHANNELS;

        let params = context.uniform("specular params", &params);
        let output = context.output("specular output", floats);
        context.dispatch(
            &self.kernel,
            &[&params, source, &output, samples],
            &output,
            size,
            floats,
        )
    }
}

impl Convolver for GpuSpecularConvolver {
    fn convolve(&self, env: &IblEnv, size: u32) -> Result<IblEnv> {
        if size == 0 {
            return Err(IblError::ZeroSizeInput);
        }
        let context = self.context.as_ref().ok_or(GpuError::Released)?;

        let source = context.storage("specular source", env.level(0));
        let mut builder = IblEnvBuilder::new(size, self.levels)?;
        if builder.levels() < self.levels {
            log::warn!(
                "{size}px only allows {} of {} specular levels",
                builder.levels(),
                self.levels
            );
        }
        let clamped = (builder.levels() != self.levels).then(|| {
            let sets = SpecularSampleSets::new(self.quality, builder.levels(), self.sequence);
            let samples = context.storage("specular samples", sets.samples());
            (sets, samples)
        });
        let (sets, samples) = match &clamped {
            Some((sets, samples)) => (sets, samples),
            None => (&self.sets, &self.samples),
        };

        for level in 0..builder.levels() {
            let start = Instant::now();
            let level_size = builder.size(level);
            let data = if level == 0 {
                self.mirror
                    .run(context, &source, 0, env.base_size(), level_size)?
            } else {
                self.filter_level(
                    context,
                    sets,
                    samples,
                    &source,
                    env.base_size(),
                    level,
                    level_size,
                )?
            };
            builder.level_mut(level).copy_from_slice(&data);
            log::debug!("specular level {level} ({level_size}px) took {:.2?}", start.elapsed());
        }
        source.destroy();
        if let Some((_, samples)) = clamped {
            samples.destroy();
        }

        Ok(builder.build())
    }

    fn release(&mut self) {
        if let Some(context) = self.context.take() {
            self.samples.destroy();
            self.mirror.destroy();
            context.destroy();
        }
    }

    fn name(&self) -> &'static str {
        "gpu"
    }
}

impl Drop for GpuSpecularConvolver {
    fn drop(&mut self) {
        self.release();
    }
}
