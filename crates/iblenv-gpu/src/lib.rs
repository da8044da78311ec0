//! GPU compute backend for iblenv-rs.
//!
//! Every operation of the software backend has a wgpu counterpart here. Kernels are
//! written in WGSL and share one set of cube-map helpers, so results agree with the
//! software backend within floating-point tolerance.
//!
//! Each backend owns its [`GpuContext`]. Creating one fails with a recoverable error when
//! no adapter is available, and callers are expected to fall back to
//! [`iblenv_core::software`].

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Buffer sizes are computed in usize and handed to wgpu as u64
#![allow(clippy::cast_possible_truncation)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod context;
pub mod error;

mod brdf;
mod converter;
mod diffuse;
mod resizer;
mod specular;

pub use brdf::GpuBrdfIntegrator;
pub use context::{GpuContext, GpuOptions};
pub use converter::GpuConverter;
pub use diffuse::GpuDiffuseConvolver;
pub use error::{GpuError, GpuResult};
pub use resizer::GpuResizer;
pub use specular::GpuSpecularConvolver;
