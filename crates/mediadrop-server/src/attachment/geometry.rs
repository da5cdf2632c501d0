//! Resize geometry strings such as `300x300>`.

use std::fmt;
use std::str::FromStr;

/// Bounding box a variant must fit into.
///
/// The `>` modifier means "only shrink": images already inside the box keep
/// their original size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub shrink_only: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid geometry '{0}': expected WIDTHxHEIGHT with optional '>'")]
pub struct GeometryParseError(String);

impl Geometry {
    pub const fn shrink_to_fit(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            shrink_only: true,
        }
    }

    /// Returns the target size for a source image of `width` x `height`,
    /// preserving aspect ratio. Dimensions never drop below one pixel.
    pub fn fit(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 {
            return (width, height);
        }
        if self.shrink_only && width <= self.width && height <= self.height {
            return (width, height);
        }

        let scale = f64::min(
            self.width as f64 / width as f64,
            self.height as f64 / height as f64,
        );
        let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
        (scaled(width), scaled(height))
    }
}

impl FromStr for Geometry {
    type Err = GeometryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || GeometryParseError(s.to_string());
        let (dims, shrink_only) = match s.strip_suffix('>') {
            Some(dims) => (dims, true),
            None => (s, false),
        };
        let (w, h) = dims.split_once('x').ok_or_else(err)?;
        let width: u32 = w.parse().map_err(|_| err())?;
        let height: u32 = h.parse().map_err(|_| err())?;
        if width == 0 || height == 0 {
            return Err(err());
        }
        Ok(Self {
            width,
            height,
            shrink_only,
        })
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)?;
        if self.shrink_only {
            write!(f, ">")?;
        }
        Ok(())
    }
}
