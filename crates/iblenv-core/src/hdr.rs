//! HDR source images for the converter.

use std::io::{BufRead, Cursor, Seek};
use std::path::Path;

use image::{DynamicImage, ImageReader};

use crate::error::{IblError, Result};

/// How a source image is turned into linear floats.
///
/// LDR sources (8 or 16 bit) are linearized as `c.powf(ldr_gamma) * ldr_scale`; HDR
/// sources (Radiance, OpenEXR) are used as is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HdrLoadOptions {
    /// Flip rows so that row 0 is the bottom of the panorama.
    pub flip_vertically: bool,
    /// Gamma applied to LDR sources.
    pub ldr_gamma: f32,
    /// Scale applied to LDR sources after linearization.
    pub ldr_scale: f32,
}

impl Default for HdrLoadOptions {
    fn default() -> Self {
        Self {
            flip_vertically: true,
            ldr_gamma: 2.2,
            ldr_scale: 1.0,
        }
    }
}

/// A linear floating-point image, row-major, 3 or 4 channels per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct HdrImage {
    width: u32,
    height: u32,
    channels: usize,
    pixels: Vec<f32>,
}

impl HdrImage {
    /// Wraps raw pixel data.
    ///
    /// # Errors
    ///
    /// Returns [`IblError::ZeroSizeInput`] for an empty image,
    /// [`IblError::InvalidChannels`] unless `channels` is 3 or 4 and
    /// [`IblError::SizeMismatch`] if `pixels` has the wrong length.
    pub fn from_raw(width: u32, height: u32, channels: usize, pixels: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(IblError::ZeroSizeInput);
        }
        if channels != 3 && channels != 4 {
            return Err(IblError::InvalidChannels(channels));
        }
        let expected = width as usize * height as usize * channels;
        if pixels.len() != expected {
            return Err(IblError::SizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    /// An image filled with one color.
    ///
    /// # Errors
    ///
    /// Returns [`IblError::ZeroSizeInput`] for an empty image.
    pub fn uniform(width: u32, height: u32, color: [f32; 3]) -> Result<Self> {
        let pixels = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::from_raw(width, height, 3, pixels)
    }

    /// Loads an image file in any format the `image` crate can decode.
    ///
    /// # Errors
    ///
    /// Returns I/O and decoding errors, and [`IblError::ZeroSizeInput`] for empty images.
    pub fn load(path: impl AsRef<Path>, options: &HdrLoadOptions) -> Result<Self> {
        let img = ImageReader::open(path.as_ref())?
            .with_guessed_format()?
            .decode()?;
        Self::from_dynamic(img, options)
    }

    /// Decodes an image from a reader, guessing the format from its contents.
    ///
    /// # Errors
    ///
    /// Same as [`HdrImage::load`].
    pub fn load_from_reader<R: BufRead + Seek>(reader: R, options: &HdrLoadOptions) -> Result<Self> {
        let img = ImageReader::new(reader).with_guessed_format()?.decode()?;
        Self::from_dynamic(img, options)
    }

    /// Decodes an image held in memory.
    ///
    /// # Errors
    ///
    /// Same as [`HdrImage::load`].
    pub fn load_from_memory(data: &[u8], options: &HdrLoadOptions) -> Result<Self> {
        Self::load_from_reader(Cursor::new(data), options)
    }

    /// Converts a decoded image, applying `options`.
    ///
    /// # Errors
    ///
    /// Returns [`IblError::ZeroSizeInput`] for empty images.
    pub fn from_dynamic(img: DynamicImage, options: &HdrLoadOptions) -> Result<Self> {
        let is_hdr = matches!(
            img,
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)
        );
        let img = if options.flip_vertically { img.flipv() } else { img };

        let rgba = img.to_rgba32f();
        let (width, height) = rgba.dimensions();
        let mut pixels = rgba.into_raw();

        if !is_hdr {
            let (gamma, scale) = (options.ldr_gamma, options.ldr_scale);
            for px in pixels.chunks_exact_mut(4) {
                for c in &mut px[..3] {
                    *c = c.powf(gamma) * scale;
                }
            }
        }

        log::debug!(
            "loaded {width}x{height} {} image",
            if is_hdr { "HDR" } else { "LDR" }
        );
        Self::from_raw(width, height, 4, pixels)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channels per pixel (3 or 4).
    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Row-major pixel data.
    #[must_use]
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// The pixel data expanded to RGBA, alpha 1 where the source has none.
    #[must_use]
    pub fn to_rgba(&self) -> Vec<f32> {
        if self.channels == 4 {
            return self.pixels.clone();
        }
        self.pixels
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 1.0])
            .collect()
    }
}
