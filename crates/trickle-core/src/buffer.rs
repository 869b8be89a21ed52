//! Buffers owned by a decode session.
//!
//! [`ChunkBuffer`] reassembles chunked input into the contiguous span an
//! engine needs when a parse boundary straddles chunks. It only holds data
//! between a need-more-data response and the feed that finally succeeds.
//!
//! [`FrameBuffer`] receives one decoded frame at source resolution.

use tracing::trace;

use crate::types::{DecodeError, Size};

/// Ordered byte accumulator for non-contiguous input.
#[derive(Debug)]
pub struct ChunkBuffer {
    bytes: Vec<u8>,
    limit: usize,
}

impl ChunkBuffer {
    /// Create an empty buffer that refuses to grow past `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Bytes currently reserved, for checking the no-allocation fast path.
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Append `chunk`. Empty chunks are a no-op and never allocate.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), DecodeError> {
        if chunk.is_empty() {
            return Ok(());
        }
        let requested = self
            .bytes
            .len()
            .checked_add(chunk.len())
            .ok_or(DecodeError::BufferAllocationFailed {
                requested: usize::MAX,
            })?;
        if requested > self.limit {
            return Err(DecodeError::BufferAllocationFailed { requested });
        }
        self.bytes
            .try_reserve(chunk.len())
            .map_err(|_| DecodeError::BufferAllocationFailed { requested })?;
        self.bytes.extend_from_slice(chunk);
        trace!(buffered = self.bytes.len(), "chunk appended to contiguity buffer");
        Ok(())
    }

    /// Drop all buffered bytes and release the allocation.
    pub fn clear(&mut self) {
        self.bytes = Vec::new();
    }
}

/// Flat pixel array for one frame, `width * height` packed pixels.
#[derive(Debug)]
pub struct FrameBuffer {
    size: Size,
    pixels: Vec<u32>,
}

impl FrameBuffer {
    /// Allocate a zeroed frame of `size`, failing instead of aborting when
    /// memory is short.
    pub fn allocate(size: Size) -> Result<Self, DecodeError> {
        let count = size.pixel_count();
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(count)
            .map_err(|_| DecodeError::BufferAllocationFailed {
                requested: count.saturating_mul(4),
            })?;
        pixels.resize(count, 0);
        Ok(Self { size, pixels })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    /// Confirm the engine filled every pixel.
    pub fn verify_written(&self, written: usize) -> Result<(), DecodeError> {
        if written == self.pixels.len() {
            Ok(())
        } else {
            Err(DecodeError::PixelCountMismatch {
                expected: self.pixels.len(),
                actual: written,
            })
        }
    }

    /// Rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u32]> {
        self.pixels.chunks_exact(self.size.width.max(1) as usize)
    }
}
