//! Whole-frame uniformity check for packed 4:2:2 (YUYV) frames.
//!
//! Two horizontally adjacent pixels share one chroma pair and are stored as
//! four bytes `Y0 U Y1 V`. Pixel `(x, y)` starts at byte `(y * width + x) * 2`.

use std::fmt;

/// A decoded pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel {
    /// Luma (Y).
    pub luma: u8,
    /// First chroma sample (U / Cb).
    pub chroma_a: u8,
    /// Second chroma sample (V / Cr).
    pub chroma_b: u8,
}

impl fmt::Display for Pixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Y={}, U={}, V={}", self.luma, self.chroma_a, self.chroma_b)
    }
}

/// Result of a uniformity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uniformity {
    /// Every pixel equals the reference. `None` for a frame with no pixels.
    Uniform {
        /// Decoded pixel (0, 0).
        reference: Option<Pixel>,
    },
    /// First pixel, in row-major order, that differs from pixel (0, 0).
    Mismatch {
        /// Column.
        x: u32,
        /// Row.
        y: u32,
        /// Decoded value at `(x, y)`.
        observed: Pixel,
        /// Decoded pixel (0, 0).
        expected: Pixel,
    },
    /// The buffer is too short for the frame geometry. Nothing was scanned.
    Truncated {
        /// Bytes the geometry needs.
        required: usize,
        /// Bytes in the buffer.
        available: usize,
    },
}

impl Uniformity {
    /// Whether the frame was found uniform.
    #[must_use]
    pub const fn is_uniform(&self) -> bool {
        matches!(self, Self::Uniform { .. })
    }
}

/// Decode pixel `(x, y)` of a frame `width` pixels wide.
///
/// Returns `None` if the bytes the pixel needs lie outside `data`.
#[must_use]
pub fn decode_pixel(data: &[u8], x: u32, y: u32, width: u32) -> Option<Pixel> {
    let index = (y as usize)
        .checked_mul(width as usize)?
        .checked_add(x as usize)?;
    let offset = index.checked_mul(2)?;

    let (a, b) = if x % 2 == 0 {
        (offset.checked_add(1)?, offset.checked_add(3)?)
    } else {
        (offset.checked_sub(1)?, offset.checked_add(1)?)
    };

    Some(Pixel {
        luma: *data.get(offset)?,
        chroma_a: *data.get(a)?,
        chroma_b: *data.get(b)?,
    })
}

/// Bytes a `width` x `height` frame needs so every pixel decodes.
///
/// With an odd width the last pixel is even and reads one pair past the
/// end of the plain `width * height * 2` image.
#[must_use]
pub fn required_len(width: u32, height: u32) -> usize {
    let pixels = (width as usize).saturating_mul(height as usize);
    let image = pixels.saturating_mul(2);
    if width % 2 == 1 {
        image.saturating_add(2)
    } else {
        image
    }
}

/// Check whether every pixel of the frame equals pixel (0, 0).
///
/// Scans row by row and stops at the first differing pixel. Only the first
/// `width * height` pixels are read; driver padding past them is ignored.
#[must_use]
pub fn check_uniform(data: &[u8], width: u32, height: u32) -> Uniformity {
    if width == 0 || height == 0 {
        return Uniformity::Uniform { reference: None };
    }

    let truncated = Uniformity::Truncated {
        required: required_len(width, height),
        available: data.len(),
    };
    if data.len() < required_len(width, height) {
        return truncated;
    }

    let Some(reference) = decode_pixel(data, 0, 0, width) else {
        return truncated;
    };

    for y in 0..height {
        for x in 0..width {
            let Some(pixel) = decode_pixel(data, x, y, width) else {
                return truncated;
            };
            if pixel != reference {
                return Uniformity::Mismatch {
                    x,
                    y,
                    observed: pixel,
                    expected: reference,
                };
            }
        }
    }

    Uniformity::Uniform {
        reference: Some(reference),
    }
}
