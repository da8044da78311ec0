//! Target size given as a percentage of the input or in pixels.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when a size string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseSizeError {
    /// Neither a `%` nor a `px` suffix was given.
    #[error("size {0:?} needs a % or px suffix")]
    MissingUnit(String),

    /// The number in front of the unit is invalid.
    #[error("invalid size {0:?}")]
    InvalidNumber(String),
}

/// A cube-map face resolution relative to the input or absolute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeSpec {
    /// Percentage of the input width (image width or environment base size).
    Percent(f64),
    /// Absolute size in pixels.
    Pixels(u32),
}

impl SizeSpec {
    /// Resolves the size for an input of `width` pixels, rounding to the nearest pixel.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn resolve(self, width: u32) -> u32 {
        match self {
            Self::Percent(percent) => (percent / 100.0 * f64::from(width)).round() as u32,
            Self::Pixels(px) => px,
        }
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(percent) => write!(f, "{percent}%"),
            Self::Pixels(px) => write!(f, "{px}px"),
        }
    }
}

impl FromStr for SizeSpec {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ParseSizeError::InvalidNumber(s.to_string());

        if let Some(number) = s.strip_suffix('%') {
            let percent: f64 = number.trim().parse().map_err(|_| invalid())?;
            if !percent.is_finite() || percent < 0.0 {
                return Err(invalid());
            }
            Ok(Self::Percent(percent))
        } else if let Some(number) = s.strip_suffix("px") {
            number.trim().parse().map(Self::Pixels).map_err(|_| invalid())
        } else {
            Err(ParseSizeError::MissingUnit(s.to_string()))
        }
    }
}
