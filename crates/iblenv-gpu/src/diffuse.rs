use bytemuck::{Pod, Zeroable};
use iblenv_core::sampling::{cosine_hemisphere_samples, Sample};
use iblenv_core::{Convolver, IblEnv, IblError, Result};

use crate::context::{Binding, GpuContext, GpuOptions, Kernel};
use crate::error::{GpuError, GpuResult};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DiffuseParams {
    src_size: u32,
    size: u32,
    sample_count: u32,
    _pad: u32,
}

/// Cosine-weighted irradiance convolution on the GPU.
#[derive(Debug)]
pub struct GpuDiffuseConvolver {
    context: Option<GpuContext>,
    kernel: Kernel,
    samples: wgpu::Buffer,
    sample_count: u32,
}

impl GpuDiffuseConvolver {
    /// Creates a convolver with cosine hemisphere samples of `quality` on a new device.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError`] if no device is available or the kernel fails to build.
    pub fn new(options: &GpuOptions, quality: u32) -> GpuResult<Self> {
        Self::with_context(GpuContext::new(options)?, quality)
    }

    /// Creates a convolver on an existing device.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::PipelineCreationFailed`] if the kernel fails to build.
    pub fn with_context(context: GpuContext, quality: u32) -> GpuResult<Self> {
        let kernel = context.create_kernel(
            "iblenv diffuse",
            include_str!("shaders/diffuse.wgsl"),
            &[
                Binding::Uniform,
                Binding::ReadOnly,
                Binding::ReadWrite,
                Binding::ReadOnly,
            ],
        )?;
        let samples: Vec<Sample> = cosine_hemisphere_samples(quality);
        #[allow(clippy::cast_possible_truncation)]
        let sample_count = samples.len() as u32;
        let samples = context.storage("diffuse samples", &samples);
        Ok(Self {
            context: Some(context),
            kernel,
            samples,
            sample_count,
        })
    }

    fn run(&self, env: &IblEnv, size: u32) -> GpuResult<Vec<f32>> {
        let context = self.context.as_ref().ok_or(GpuError::Released)?;

        let params = DiffuseParams {
            src_size: env.base_size(),
            size,
            sample_count: self.sample_count,
            _pad: 0,
        };
        let floats = 6 * size as usize * size as usize * IblEnv::CHANNELS;

        let params = context.uniform("diffuse params", &params);
        let source = context.storage("diffuse source", env.level(0));
        let output = context.output("diffuse output", floats);
        context.dispatch(
            &self.kernel,
            &[&params, &source, &output, &self.samples],
            &output,
            size,
            floats,
        )
    }
}

impl Convolver for GpuDiffuseConvolver {
    fn convolve(&self, env: &IblEnv, size: u32) -> Result<IblEnv> {
        if size == 0 {
            return Err(IblError::ZeroSizeInput);
        }
        let data = self.run(env, size)?;
        IblEnv::new(data, size, 1)
    }

    fn release(&mut self) {
        if let Some(context) = self.context.take() {
            self.samples.destroy();
            context.destroy();
        }
    }

    fn name(&self) -> &'static str {
        "gpu"
    }
}

impl Drop for GpuDiffuseConvolver {
    fn drop(&mut self) {
        self.release();
    }
}
