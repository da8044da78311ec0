//! iblenv-rs: image-based lighting environments for real-time renderers.
//!
//! Turns equirectangular HDR images into cube maps, convolves them into diffuse
//! irradiance and GGX-prefiltered specular mip chains, resizes them and stores them in the
//! compact `.iblenv` container. It also integrates the split-sum BRDF lookup table that
//! pairs with the specular chain.
//!
//! # Quick Start
//!
//! ```no_run
//! use iblenv::*;
//!
//! fn main() -> Result<()> {
//!     let backend = BackendOptions::default();
//!
//!     let image = HdrImage::load("studio.hdr", &HdrLoadOptions::default())?;
//!     let env = create_converter(&backend)?.convert(&image, 256)?;
//!
//!     let specular = create_specular_convolver(&backend, 1024, 5, SampleSequence::default())?;
//!     let prefiltered = specular.convolve(&env, 128)?;
//!
//!     encode_file("studio_specular.iblenv", &prefiltered, &EncodeOptions::new().compress(1)?)?;
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! Every operation has a software implementation running on the rayon thread pool and a
//! GPU implementation built on wgpu compute shaders. [`Implementation::Gpu`] falls back to
//! the software backend, with a warning, when no device can be created.

pub mod backend;
pub mod job;
pub mod size;

// Re-export core types
pub use iblenv_core::{
    container::{decode, decode_file, encode, encode_file, encode_to_vec, update},
    brdf, cubemap, rgbe, sampling, BrdfIntegrator, BrdfLut, Compression, CompressionKind,
    Converter, Convolver, CubeFace, EncodeOptions, Execution, HdrImage, HdrLoadOptions, Header,
    IblEnv, IblEnvBuilder, IblError, Resizer, Result, SampleSequence, Version,
};

// Re-export backends
pub use iblenv_core::software::{
    SoftwareBrdfIntegrator, SoftwareConverter, SoftwareDiffuseConvolver, SoftwareResizer,
    SoftwareSpecularConvolver,
};
pub use iblenv_gpu::{
    GpuBrdfIntegrator, GpuContext, GpuConverter, GpuDiffuseConvolver, GpuError, GpuOptions,
    GpuResizer, GpuSpecularConvolver,
};

pub use backend::{
    create_brdf_integrator, create_converter, create_diffuse_convolver, create_resizer,
    create_specular_convolver, BackendOptions, Implementation,
};
pub use job::{BatchSummary, JobError, JobReport, LutOutput, OutputNaming, Stage};
pub use size::{ParseSizeError, SizeSpec};

// Re-export glam types for convenience
pub use glam::{Vec2, Vec3};
