//! Core types shared by the decode pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for incremental decoding.
///
/// Every variant is terminal: a session that produces one is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The engine factory could not produce a handle.
    #[error("Decode engine could not be created")]
    EngineCreationFailed,

    /// The engine rejected the compressed stream.
    #[error("Invalid image data: {0}")]
    InvalidData(String),

    /// The engine failed for a reason unrelated to the input bytes.
    #[error("Decode engine error: {0}")]
    EngineInternalError(String),

    /// An input or pixel buffer could not be grown.
    #[error("Failed to allocate buffer of {requested} bytes")]
    BufferAllocationFailed { requested: usize },

    /// A second size post was attempted for the same session.
    #[error("Image size already posted as {existing}, refusing {attempted}")]
    SizePostedTwice { existing: Size, attempted: Size },

    /// The surface pipe could not be built for the requested geometry.
    #[error("Could not construct surface pipe: {0}")]
    PipeConstructionFailed(String),

    /// The surface pipe refused a decoded row.
    #[error("Failed to write row {row} to the surface pipe")]
    FrameWriteFailed { row: u32 },

    /// The engine wrote a different number of pixels than the image holds.
    #[error("Frame decode wrote {actual} pixels, expected {expected}")]
    PixelCountMismatch { expected: usize, actual: usize },

    /// The input loop reached a state that a well-formed decode never visits.
    #[error("Reached unreachable decoder state: {0}")]
    UnreachableStateReached(&'static str),
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels, saturating on overflow.
    pub fn pixel_count(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Check if either dimension is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl IntRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle covering a whole image of `size`.
    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Smallest rectangle containing both `self` and `other`.
    ///
    /// Empty rectangles contribute nothing to the union.
    pub fn union(&self, other: &IntRect) -> IntRect {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => return IntRect::default(),
            (false, true) => return *self,
            (true, false) => return *other,
            (false, false) => {}
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        IntRect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }
}

/// Layout of the 32-bit pixels handed to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SurfaceFormat {
    /// Opaque pixels; the fourth byte is forced to 0xFF.
    #[default]
    Rgbx,
    /// Straight alpha carried through from the engine.
    Rgba,
}

/// Filter type for scaling source rows to the output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    #[default]
    Bilinear,
    /// Lanczos3 interpolation (slower, highest quality).
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Pack four channels into the engine's 32-bit pixel layout.
///
/// Byte order in memory is R, G, B, A regardless of host endianness.
#[inline]
pub fn pack_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    u32::from_le_bytes([r, g, b, a])
}

/// Split a packed pixel back into `[r, g, b, a]`.
#[inline]
pub fn unpack_rgba(pixel: u32) -> [u8; 4] {
    pixel.to_le_bytes()
}
