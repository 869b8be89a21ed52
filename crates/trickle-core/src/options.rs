//! Per-session decoder configuration.

use serde::{Deserialize, Serialize};

use crate::types::{FilterType, Size, SurfaceFormat};

/// Default cap on bytes held by the contiguity buffer (64 MiB).
pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 64 * 1024 * 1024;

/// Options controlling a single decode session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Stop as soon as the image size is known; no pixels are decoded.
    pub metadata_only: bool,
    /// Size of the surface to produce. `None` keeps the source size.
    pub output_size: Option<Size>,
    /// Pixel layout written to the surface.
    pub format: SurfaceFormat,
    /// Filter used when the output size differs from the source size.
    pub filter: FilterType,
    /// Upper bound on bytes accumulated while the engine waits for a
    /// contiguous span. Exceeding it fails the session.
    pub max_buffered_bytes: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            metadata_only: false,
            output_size: None,
            format: SurfaceFormat::default(),
            filter: FilterType::default(),
            max_buffered_bytes: DEFAULT_MAX_BUFFERED_BYTES,
        }
    }
}

impl DecoderOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a size probe that never decodes pixels.
    pub fn metadata_only() -> Self {
        Self {
            metadata_only: true,
            ..Self::default()
        }
    }

    pub fn with_output_size(mut self, size: Size) -> Self {
        self.output_size = Some(size);
        self
    }

    pub fn with_format(mut self, format: SurfaceFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_max_buffered_bytes(mut self, limit: usize) -> Self {
        self.max_buffered_bytes = limit;
        self
    }
}
