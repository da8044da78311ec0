use std::time::Instant;

use bytemuck::{Pod, Zeroable};
use iblenv_core::{BrdfIntegrator, BrdfLut, IblError, Result, SampleSequence, Vec2};

use crate::context::{Binding, GpuContext, GpuOptions, Kernel};
use crate::error::{GpuError, GpuResult};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BrdfParams {
    size: u32,
    sample_count: u32,
    _pad: [u32; 2],
}

/// Split-sum BRDF integration on the GPU.
#[derive(Debug)]
pub struct GpuBrdfIntegrator {
    context: Option<GpuContext>,
    kernel: Kernel,
    points: wgpu::Buffer,
    sample_count: u32,
}

impl GpuBrdfIntegrator {
    /// Creates an integrator with `quality` Hammersley samples per texel on a new device.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError`] if no device is available or the kernel fails to build.
    pub fn new(options: &GpuOptions, quality: u32) -> GpuResult<Self> {
        Self::with_context(GpuContext::new(options)?, quality)
    }

    /// Creates an integrator on an existing device.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::PipelineCreationFailed`] if the kernel fails to build.
    pub fn with_context(context: GpuContext, quality: u32) -> GpuResult<Self> {
        let kernel = context.create_kernel(
            "iblenv brdf",
            include_str!("shaders/brdf.wgsl"),
            &[Binding::Uniform, Binding::ReadOnly, Binding::ReadWrite],
        )?;
        let points: Vec<Vec2> = SampleSequence::Hammersley.generate(quality.max(1));
        let sample_count = points.len() as u32;
        let flat: Vec<f32> = points.iter().flat_map(|p| p.to_array()).collect();
        let points = context.storage("brdf points", &flat);
        Ok(Self {
            context: Some(context),
            kernel,
            points,
            sample_count,
        })
    }

    fn run(&self, size: u32) -> GpuResult<Vec<f32>> {
        let context = self.context.as_ref().ok_or(GpuError::Released)?;

        let params = BrdfParams {
            size,
            sample_count: self.sample_count,
            _pad: [0; 2],
        };
        let floats = size as usize * size as usize * BrdfLut::CHANNELS;

        let params = context.uniform("brdf params", &params);
        let output = context.output("brdf output", floats);
        context.dispatch(
            &self.kernel,
            &[&params, &self.points, &output],
            &output,
            size,
            floats,
        )
    }
}

impl BrdfIntegrator for GpuBrdfIntegrator {
    fn integrate(&self, size: u32) -> Result<BrdfLut> {
        if size == 0 {
            return Err(IblError::ZeroSizeInput);
        }
        let start = Instant::now();
        let data = self.run(size)?;
        log::debug!("brdf lut ({size}px) took {:.2?}", start.elapsed());
        BrdfLut::new(size, data)
    }

    fn release(&mut self) {
        if let Some(context) = self.context.take() {
            self.points.destroy();
            context.destroy();
        }
    }

    fn name(&self) -> &'static str {
        "gpu"
    }
}

impl Drop for GpuBrdfIntegrator {
    fn drop(&mut self) {
        self.release();
    }
}
