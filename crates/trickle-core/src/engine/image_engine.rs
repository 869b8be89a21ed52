//! Decode engine backed by the `image` crate.
//!
//! The format is sniffed from the first [`SIGNATURE_PROBE_LEN`] bytes, which
//! must arrive as one contiguous span. After that every span is consumed into
//! the engine's own buffer. Dimensions come from the buffered header; the
//! frame becomes ready once the container trailer has been seen and a full
//! decode of the buffered bytes succeeds. Bytes after the trailer are
//! accepted and ignored by the decoder.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};
use tracing::{debug, trace};

use super::{DecodeEngine, EngineStatus};
use crate::types::{pack_rgba, Size};

/// Bytes needed to identify the container format.
pub const SIGNATURE_PROBE_LEN: usize = 12;

const PNG_IEND: &[u8] = b"IEND";
const JPEG_EOI: &[u8] = &[0xFF, 0xD9];

pub struct ImageCrateEngine {
    metadata_only: bool,
    format: Option<ImageFormat>,
    data: Vec<u8>,
    /// Buffer length at which the next header probe runs.
    next_probe_at: usize,
    trailer_seen: bool,
    size: Option<Size>,
    frame: Option<Vec<u32>>,
}

impl ImageCrateEngine {
    pub fn new(metadata_only: bool) -> Self {
        Self {
            metadata_only,
            format: None,
            data: Vec::new(),
            next_probe_at: 0,
            trailer_seen: false,
            size: None,
            frame: None,
        }
    }

    /// Factory function; never fails.
    pub fn create(metadata_only: bool) -> Option<Self> {
        Some(Self::new(metadata_only))
    }

    /// The sniffed container format, once known.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    fn sniff(bytes: &[u8]) -> Result<ImageFormat, EngineStatus> {
        match image::guess_format(bytes) {
            Ok(format) if format.reading_enabled() => Ok(format),
            Ok(format) => {
                debug!(?format, "recognized format has no decoder");
                Err(EngineStatus::InvalidData)
            }
            Err(_) => Err(EngineStatus::InvalidData),
        }
    }

    fn reader(&self, format: ImageFormat) -> ImageReader<Cursor<&[u8]>> {
        ImageReader::with_format(Cursor::new(self.data.as_slice()), format)
    }

    /// Look for the trailer in bytes appended since `previous_len`,
    /// including a marker split across two feeds.
    fn scan_trailer(&mut self, format: ImageFormat, previous_len: usize) {
        if self.trailer_seen {
            return;
        }
        let marker = match format {
            ImageFormat::Png => PNG_IEND,
            ImageFormat::Jpeg => JPEG_EOI,
            _ => {
                self.trailer_seen = true;
                return;
            }
        };
        let from = previous_len.saturating_sub(marker.len() - 1);
        if self.data[from..].windows(marker.len()).any(|w| w == marker) {
            debug!(?format, "stream trailer seen");
            self.trailer_seen = true;
        }
    }

    fn probe_dimensions(&mut self, format: ImageFormat) {
        if self.size.is_some() {
            return;
        }
        // Re-parsing the whole buffer on every feed is quadratic for large
        // headers, so failed probes back off until the buffer has doubled.
        if self.data.len() < self.next_probe_at && !self.trailer_seen {
            return;
        }
        match self.reader(format).into_dimensions() {
            Ok((width, height)) => {
                debug!(width, height, "image header parsed");
                self.size = Some(Size::new(width, height));
            }
            Err(e) => {
                self.next_probe_at = self.data.len().saturating_mul(2);
                trace!(error = %e, next = self.next_probe_at, "header not complete yet");
            }
        }
    }

    fn try_decode(&mut self, format: ImageFormat) {
        if self.metadata_only || self.frame.is_some() || self.size.is_none() || !self.trailer_seen {
            return;
        }
        match self.reader(format).decode() {
            Ok(img) => {
                let rgba = img.into_rgba8();
                let pixels = rgba
                    .pixels()
                    .map(|p| pack_rgba(p[0], p[1], p[2], p[3]))
                    .collect();
                self.frame = Some(pixels);
            }
            Err(e) => trace!(error = %e, "frame not decodable yet"),
        }
    }
}

impl DecodeEngine for ImageCrateEngine {
    fn feed(&mut self, bytes: &[u8]) -> EngineStatus {
        let format = match self.format {
            Some(format) => format,
            None => {
                if bytes.len() < SIGNATURE_PROBE_LEN {
                    return EngineStatus::NeedMoreData;
                }
                match Self::sniff(bytes) {
                    Ok(format) => {
                        debug!(?format, "format sniffed");
                        self.format = Some(format);
                        format
                    }
                    Err(status) => return status,
                }
            }
        };

        if self.data.try_reserve(bytes.len()).is_err() {
            return EngineStatus::Error;
        }
        let previous_len = self.data.len();
        self.data.extend_from_slice(bytes);
        self.scan_trailer(format, previous_len);
        self.probe_dimensions(format);
        self.try_decode(format);
        EngineStatus::Ok
    }

    fn needed_bytes(&self) -> Option<usize> {
        self.format.is_none().then_some(SIGNATURE_PROBE_LEN)
    }

    fn query_info(&self) -> Result<Size, EngineStatus> {
        self.size.ok_or(EngineStatus::NeedMoreData)
    }

    fn is_frame_ready(&self) -> bool {
        self.frame.is_some()
    }

    fn decode_frame(&mut self, output: &mut [u32]) -> Result<usize, EngineStatus> {
        let frame = self.frame.as_ref().ok_or(EngineStatus::Error)?;
        if output.len() < frame.len() {
            return Err(EngineStatus::Error);
        }
        output[..frame.len()].copy_from_slice(frame);
        let written = frame.len();
        self.frame = None;
        Ok(written)
    }
}
