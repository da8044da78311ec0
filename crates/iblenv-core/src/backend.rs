//! The producer interfaces every backend implements.
//!
//! A backend session is created once with its tunables (sample quality, levels,
//! supersampling) and can then process any number of inputs. Sessions that hold device
//! resources free them in [`Converter::release`] and friends, and again on drop.

use crate::brdf::BrdfLut;
use crate::env::IblEnv;
use crate::error::Result;
use crate::hdr::HdrImage;

/// Reprojects an equirectangular image onto a cube map.
pub trait Converter: Send {
    /// Converts `image` into a single-level environment of `size`×`size` faces.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IblError::ZeroSizeInput`] for a zero `size` and backend errors.
    fn convert(&self, image: &HdrImage, size: u32) -> Result<IblEnv>;

    /// Frees backend resources. The session must not be used afterwards.
    fn release(&mut self) {}

    /// Short backend name for log messages.
    fn name(&self) -> &'static str;
}

/// Filters a cube map (diffuse irradiance or specular prefiltering).
pub trait Convolver: Send {
    /// Convolves `env` into a new environment whose level 0 is `size`×`size`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IblError::ZeroSizeInput`] for a zero `size` and backend errors.
    fn convolve(&self, env: &IblEnv, size: u32) -> Result<IblEnv>;

    /// Frees backend resources. The session must not be used afterwards.
    fn release(&mut self) {}

    /// Short backend name for log messages.
    fn name(&self) -> &'static str;
}

/// Resamples a cube map to a new base resolution.
pub trait Resizer: Send {
    /// Resizes every level of `env` so that level 0 is `size`×`size`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IblError::ZeroSizeInput`] for a zero `size` and backend errors.
    fn resize(&self, env: &IblEnv, size: u32) -> Result<IblEnv>;

    /// Frees backend resources. The session must not be used afterwards.
    fn release(&mut self) {}

    /// Short backend name for log messages.
    fn name(&self) -> &'static str;
}

/// Integrates the split-sum BRDF lookup table.
pub trait BrdfIntegrator: Send {
    /// Generates a `size`×`size` table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IblError::ZeroSizeInput`] for a zero `size` and backend errors.
    fn integrate(&self, size: u32) -> Result<BrdfLut>;

    /// Frees backend resources. The session must not be used afterwards.
    fn release(&mut self) {}

    /// Short backend name for log messages.
    fn name(&self) -> &'static str;
}

impl<T: Converter + ?Sized> Converter for Box<T> {
    fn convert(&self, image: &HdrImage, size: u32) -> Result<IblEnv> {
        (**self).convert(image, size)
    }

    fn release(&mut self) {
        (**self).release();
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: Convolver + ?Sized> Convolver for Box<T> {
    fn convolve(&self, env: &IblEnv, size: u32) -> Result<IblEnv> {
        (**self).convolve(env, size)
    }

    fn release(&mut self) {
        (**self).release();
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: Resizer + ?Sized> Resizer for Box<T> {
    fn resize(&self, env: &IblEnv, size: u32) -> Result<IblEnv> {
        (**self).resize(env, size)
    }

    fn release(&mut self) {
        (**self).release();
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: BrdfIntegrator + ?Sized> BrdfIntegrator for Box<T> {
    fn integrate(&self, size: u32) -> Result<BrdfLut> {
        (**self).integrate(size)
    }

    fn release(&mut self) {
        (**self).release();
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
