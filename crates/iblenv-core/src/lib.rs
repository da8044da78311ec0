//! Core of iblenv-rs.
//!
//! This crate provides the data model and the reference math of the image-based lighting
//! pipeline:
//! - [`IblEnv`], a multi-level cube map stored in one packed buffer
//! - the RGBE pixel codec and the versioned `.iblenv` container
//! - cube-map geometry and sample generators
//! - the split-sum BRDF lookup table
//! - the [`Converter`], [`Convolver`], [`Resizer`] and [`BrdfIntegrator`] interfaces with a
//!   software backend

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Texel counts and sizes are far below the f32 mantissa limit
#![allow(clippy::cast_precision_loss)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod backend;
pub mod brdf;
pub mod container;
pub mod cubemap;
pub mod env;
pub mod error;
pub mod hdr;
pub mod rgbe;
pub mod sample;
pub mod sampling;
pub mod software;

pub use backend::{BrdfIntegrator, Converter, Convolver, Resizer};
pub use brdf::BrdfLut;
pub use container::{Compression, CompressionKind, EncodeOptions, Header, Version};
pub use cubemap::{CubeFace, Texel};
pub use env::{IblEnv, IblEnvBuilder};
pub use error::{IblError, Result};
pub use hdr::{HdrImage, HdrLoadOptions};
pub use sampling::{Sample, SampleRange, SampleSequence, SpecularSampleSets, TangentFrame};
pub use software::{
    Execution, SoftwareBrdfIntegrator, SoftwareConverter, SoftwareDiffuseConvolver,
    SoftwareResizer, SoftwareSpecularConvolver,
};

// Re-export glam types for convenience
pub use glam::{Vec2, Vec3};
