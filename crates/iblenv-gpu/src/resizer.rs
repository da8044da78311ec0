use bytemuck::{Pod, Zeroable};
use iblenv_core::sampling::super_samples;
use iblenv_core::{cubemap, IblEnv, IblEnvBuilder, IblError, Resizer, Result};

use crate::context::{Binding, GpuContext, GpuOptions, Kernel};
use crate::error::{GpuError, GpuResult};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ResizeParams {
    src_offset: u32,
    src_size: u32,
    size: u32,
    sample_count: u32,
}

/// The supersampled resize kernel with its offset table.
#[derive(Debug)]
pub(crate) struct ResizeKernel {
    kernel: Kernel,
    offsets: wgpu::Buffer,
    sample_count: u32,
}

impl ResizeKernel {
    pub(crate) fn new(context: &GpuContext, supersample: u32) -> GpuResult<Self> {
        let kernel = context.create_kernel(
            "iblenv resize",
            include_str!("shaders/resize.wgsl"),
            &[
                Binding::Uniform,
                Binding::ReadOnly,
                Binding::ReadWrite,
                Binding::ReadOnly,
            ],
        )?;
        let offsets: Vec<[f32; 2]> = super_samples(supersample)
            .into_iter()
            .map(|o| o.to_array())
            .collect();
        #[allow(clippy::cast_possible_truncation)]
        let sample_count = offsets.len() as u32;
        let offsets = context.storage("resize offsets", &offsets);
        Ok(Self {
            kernel,
            offsets,
            sample_count,
        })
    }

    /// Resamples the level starting `src_offset` floats into `source` to `size`.
    pub(crate) fn run(
        &self,
        context: &GpuContext,
        source: &wgpu::Buffer,
        src_offset: usize,
        src_size: u32,
        size: u32,
    ) -> GpuResult<Vec<f32>> {
        #[allow(clippy::cast_possible_truncation)]
        let params = ResizeParams {
            src_offset: src_offset as u32,
            src_size,
            size,
            sample_count: self.sample_count,
        };
        let floats = 6 * size as usize * size as usize * IblEnv::CHANNELS;

        let params = context.uniform("resize params", &params);
        let output = context.output("resize output", floats);
        context.dispatch(
            &self.kernel,
            &[&params, source, &output, &self.offsets],
            &output,
            size,
            floats,
        )
    }

    pub(crate) fn destroy(&self) {
        self.offsets.destroy();
    }
}

/// Supersampled cube-map resampling on the GPU.
#[derive(Debug)]
pub struct GpuResizer {
    context: Option<GpuContext>,
    kernel: ResizeKernel,
}

impl GpuResizer {
    /// Creates a resizer averaging `supersample`×`supersample` lookups per texel on a new
    /// device.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError`] if no device is available or the kernel fails to build.
    pub fn new(options: &GpuOptions, supersample: u32) -> GpuResult<Self> {
        Self::with_context(GpuContext::new(options)?, supersample)
    }

    /// Creates a resizer on an existing device.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::PipelineCreationFailed`] if the kernel fails to build.
    pub fn with_context(context: GpuContext, supersample: u32) -> GpuResult<Self> {
        let kernel = ResizeKernel::new(&context, supersample)?;
        Ok(Self {
            context: Some(context),
            kernel,
        })
    }
}

impl Resizer for GpuResizer {
    fn resize(&self, env: &IblEnv, size: u32) -> Result<IblEnv> {
        if size == 0 {
            return Err(IblError::ZeroSizeInput);
        }
        let context = self.context.as_ref().ok_or(GpuError::Released)?;

        let source = context.storage("resize source", env.all());
        let mut builder = IblEnvBuilder::new(size, cubemap::clamp_levels(size, env.levels()))?;
        for level in 0..builder.levels() {
            let src_offset = cubemap::level_range(env.base_size(), level).start * IblEnv::CHANNELS;
            let level_size = builder.size(level);
            let data = self
                .kernel
                .run(context, &source, src_offset, env.size(level), level_size)?;
            builder.level_mut(level).copy_from_slice(&data);
        }
        source.destroy();

        Ok(builder.build())
    }

    fn release(&mut self) {
        if let Some(context) = self.context.take() {
            self.kernel.destroy();
            context.destroy();
        }
    }

    fn name(&self) -> &'static str {
        "gpu"
    }
}

impl Drop for GpuResizer {
    fn drop(&mut self) {
        self.release();
    }
}
