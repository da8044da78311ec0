//! Backend selection with software fallback.

use std::fmt;
use std::str::FromStr;

use iblenv_core::software::{
    SoftwareBrdfIntegrator, SoftwareConverter, SoftwareDiffuseConvolver, SoftwareResizer,
    SoftwareSpecularConvolver,
};
use iblenv_core::{
    BrdfIntegrator, Converter, Convolver, Execution, IblError, Resizer, Result, SampleSequence,
};
use iblenv_gpu::{
    GpuBrdfIntegrator, GpuConverter, GpuDiffuseConvolver, GpuOptions, GpuResizer, GpuResult,
    GpuSpecularConvolver,
};

/// Which backend to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Implementation {
    /// wgpu compute kernels, falling back to software if no device is available.
    #[default]
    Gpu,
    /// The reference CPU implementation.
    Software,
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu => write!(f, "gpu"),
            Self::Software => write!(f, "software"),
        }
    }
}

impl FromStr for Implementation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpu" | "opencl" => Ok(Self::Gpu),
            "software" | "sw" => Ok(Self::Software),
            other => Err(format!("{other} is not a valid implementation")),
        }
    }
}

/// Backend settings shared by all factories.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendOptions {
    pub implementation: Implementation,
    pub gpu: GpuOptions,
    pub execution: Execution,
}

impl BackendOptions {
    /// Options for the software backend.
    pub fn software() -> Self {
        Self {
            implementation: Implementation::Software,
            ..Self::default()
        }
    }
}

fn select<T: ?Sized>(
    options: &BackendOptions,
    kind: &str,
    gpu: impl FnOnce(&GpuOptions) -> GpuResult<Box<T>>,
    software: impl FnOnce(Execution) -> Box<T>,
) -> Result<Box<T>> {
    if options.implementation == Implementation::Gpu {
        match gpu(&options.gpu).map_err(IblError::from) {
            Ok(backend) => {
                log::info!("using gpu {kind}");
                return Ok(backend);
            }
            Err(err) if err.is_recoverable() => {
                log::warn!("{err}; falling back to software {kind}");
            }
            Err(err) => return Err(err),
        }
    }
    log::info!("using software {kind}");
    Ok(software(options.execution))
}

/// Creates an equirectangular to cube-map converter.
///
/// # Errors
///
/// Only non-recoverable backend errors are returned; init failures fall back to software.
pub fn create_converter(options: &BackendOptions) -> Result<Box<dyn Converter>> {
    select(
        options,
        "converter",
        |gpu| Ok(Box::new(GpuConverter::new(gpu)?) as Box<dyn Converter>),
        |execution| Box::new(SoftwareConverter::new().with_execution(execution)) as Box<dyn Converter>,
    )
}

/// Creates a diffuse irradiance convolver with the given sample `quality`.
pub fn create_diffuse_convolver(options: &BackendOptions, quality: u32) -> Result<Box<dyn Convolver>> {
    select(
        options,
        "diffuse convolver",
        |gpu| Ok(Box::new(GpuDiffuseConvolver::new(gpu, quality)?) as Box<dyn Convolver>),
        |execution| {
            Box::new(SoftwareDiffuseConvolver::new(quality).with_execution(execution))
                as Box<dyn Convolver>
        },
    )
}

/// Creates a specular convolver with `quality` samples per level and `levels` mip levels.
pub fn create_specular_convolver(
    options: &BackendOptions,
    quality: u32,
    levels: u32,
    sequence: SampleSequence,
) -> Result<Box<dyn Convolver>> {
    select(
        options,
        "specular convolver",
        |gpu| {
            Ok(Box::new(GpuSpecularConvolver::new(gpu, quality, levels, sequence)?)
                as Box<dyn Convolver>)
        },
        |execution| {
            Box::new(
                SoftwareSpecularConvolver::with_sequence(quality, levels, sequence)
                    .with_execution(execution),
            ) as Box<dyn Convolver>
        },
    )
}

/// Creates a resizer averaging `supersample`×`supersample` lookups per texel.
pub fn create_resizer(options: &BackendOptions, supersample: u32) -> Result<Box<dyn Resizer>> {
    select(
        options,
        "resizer",
        |gpu| Ok(Box::new(GpuResizer::new(gpu, supersample)?) as Box<dyn Resizer>),
        |execution| {
            Box::new(SoftwareResizer::new(supersample).with_execution(execution)) as Box<dyn Resizer>
        },
    )
}

/// Creates a BRDF lookup table integrator with `quality` samples per texel.
pub fn create_brdf_integrator(
    options: &BackendOptions,
    quality: u32,
) -> Result<Box<dyn BrdfIntegrator>> {
    select(
        options,
        "brdf integrator",
        |gpu| Ok(Box::new(GpuBrdfIntegrator::new(gpu, quality)?) as Box<dyn BrdfIntegrator>),
        |execution| {
            Box::new(SoftwareBrdfIntegrator::new(quality).with_execution(execution))
                as Box<dyn BrdfIntegrator>
        },
    )
}
