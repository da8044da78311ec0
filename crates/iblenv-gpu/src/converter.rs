use bytemuck::{Pod, Zeroable};
use iblenv_core::{Converter, HdrImage, IblEnv, IblError, Result};

use crate::context::{Binding, GpuContext, GpuOptions, Kernel};
use crate::error::{GpuError, GpuResult};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ConvertParams {
    src_width: u32,
    src_height: u32,
    src_channels: u32,
    size: u32,
}

/// Equirectangular to cube-map reprojection on the GPU.
#[derive(Debug)]
pub struct GpuConverter {
    context: Option<GpuContext>,
    kernel: Kernel,
}

impl GpuConverter {
    /// Creates a converter on a new device.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError`] if no device is available or the kernel fails to build.
    pub fn new(options: &GpuOptions) -> GpuResult<Self> {
        Self::with_context(GpuContext::new(options)?)
    }

    /// Creates a converter on an existing device.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::PipelineCreationFailed`] if the kernel fails to build.
    pub fn with_context(context: GpuContext) -> GpuResult<Self> {
        let kernel = context.create_kernel(
            "iblenv convert",
            include_str!("shaders/convert.wgsl"),
            &[Binding::Uniform, Binding::ReadOnly, Binding::ReadWrite],
        )?;
        Ok(Self {
            context: Some(context),
            kernel,
        })
    }

    fn run(&self, image: &HdrImage, size: u32) -> GpuResult<Vec<f32>> {
        let context = self.context.as_ref().ok_or(GpuError::Released)?;

        #[allow(clippy::cast_possible_truncation)]
        let params = ConvertParams {
            src_width: image.width(),
            src_height: image.height(),
            src_channels: image.channels() as u32,
            size,
        };
        let floats = 6 * size as usize * size as usize * IblEnv::CHANNELS;

        let params = context.uniform("convert params", &params);
        let source = context.storage("convert source", image.pixels());
        let output = context.output("convert output", floats);
        context.dispatch(&self.kernel, &[&params, &source, &output], &output, size, floats)
    }
}

impl Converter for GpuConverter {
    fn convert(&self, image: &HdrImage, size: u32) -> Result<IblEnv> {
        if size == 0 {
            return Err(IblError::ZeroSizeInput);
        }
        let data = self.run(image, size)?;
        IblEnv::new(data, size, 1)
    }

    fn release(&mut self) {
        if let Some(context) = self.context.take() {
            context.destroy();
        }
    }

    fn name(&self) -> &'static str {
        "gpu"
    }
}

impl Drop for GpuConverter {
    fn drop(&mut self) {
        self.release();
    }
}
