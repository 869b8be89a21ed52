//! Scripted engine for tests.
//!
//! Understands a tiny format: the magic `TOY1`, little-endian `u16` width and
//! height, then `width * height` packed pixels as little-endian `u32`s. The
//! 8-byte header must arrive in one contiguous span; body bytes are consumed
//! as they come.

use std::cell::Cell;
use std::rc::Rc;

use super::{DecodeEngine, EngineStatus};
use crate::types::{pack_rgba, Size};

pub const TOY_MAGIC: &[u8; 4] = b"TOY1";
pub const TOY_HEADER_LEN: usize = 8;

/// Encode a toy payload.
pub fn toy_payload(width: u16, height: u16, pixels: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(TOY_HEADER_LEN + pixels.len() * 4);
    out.extend_from_slice(TOY_MAGIC);
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    for p in pixels {
        out.extend_from_slice(&p.to_le_bytes());
    }
    out
}

/// Deterministic opaque pixels, distinct per position.
pub fn toy_gradient(width: u16, height: u16) -> Vec<u32> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push(pack_rgba(x as u8, y as u8, (x ^ y) as u8, 0xFF));
        }
    }
    pixels
}

/// Behavior switches for a [`ToyEngine`].
#[derive(Debug, Clone, Default)]
pub struct ToyConfig {
    pub fail_create: bool,
    /// Declare the header length as a size hint until the header is parsed.
    pub declare_hint: bool,
    /// Report one pixel fewer than the image holds.
    pub short_write: bool,
    pub fail_decode: bool,
    /// Return `Error` from every feed.
    pub fail_feed: bool,
    /// Status returned by every feed after the header has been parsed.
    pub fail_after_header: Option<EngineStatus>,
}

/// Call counters shared between a test and the engines it creates.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    creates: Rc<Cell<usize>>,
    feeds: Rc<Cell<usize>>,
    fed_bytes: Rc<Cell<usize>>,
    destroys: Rc<Cell<usize>>,
}

impl Counters {
    pub fn creates(&self) -> usize {
        self.creates.get()
    }

    pub fn feeds(&self) -> usize {
        self.feeds.get()
    }

    pub fn fed_bytes(&self) -> usize {
        self.fed_bytes.get()
    }

    pub fn destroys(&self) -> usize {
        self.destroys.get()
    }

    fn bump(cell: &Cell<usize>, by: usize) {
        cell.set(cell.get() + by);
    }
}

pub struct ToyEngine {
    config: ToyConfig,
    counters: Counters,
    metadata_only: bool,
    size: Option<Size>,
    body: Vec<u8>,
}

impl ToyEngine {
    pub fn new(config: ToyConfig) -> Self {
        Self::with_counters(config, Counters::default(), false)
    }

    fn with_counters(config: ToyConfig, counters: Counters, metadata_only: bool) -> Self {
        Counters::bump(&counters.creates, 1);
        Self {
            config,
            counters,
            metadata_only,
            size: None,
            body: Vec::new(),
        }
    }

    /// A factory honoring `config.fail_create`.
    pub fn factory(config: ToyConfig, counters: Counters) -> impl FnMut(bool) -> Option<ToyEngine> {
        move |metadata_only| {
            if config.fail_create {
                None
            } else {
                Some(ToyEngine::with_counters(
                    config.clone(),
                    counters.clone(),
                    metadata_only,
                ))
            }
        }
    }

    fn parse_header(&mut self, bytes: &[u8]) -> EngineStatus {
        let magic_len = bytes.len().min(TOY_MAGIC.len());
        if bytes[..magic_len] != TOY_MAGIC[..magic_len] {
            return EngineStatus::InvalidData;
        }
        if bytes.len() < TOY_HEADER_LEN {
            return EngineStatus::NeedMoreData;
        }
        let width = u16::from_le_bytes([bytes[4], bytes[5]]);
        let height = u16::from_le_bytes([bytes[6], bytes[7]]);
        if width == 0 || height == 0 {
            return EngineStatus::InvalidData;
        }
        self.size = Some(Size::new(width as u32, height as u32));
        self.body.extend_from_slice(&bytes[TOY_HEADER_LEN..]);
        EngineStatus::Ok
    }
}

impl DecodeEngine for ToyEngine {
    fn feed(&mut self, bytes: &[u8]) -> EngineStatus {
        Counters::bump(&self.counters.feeds, 1);
        Counters::bump(&self.counters.fed_bytes, bytes.len());
        if self.config.fail_feed {
            return EngineStatus::Error;
        }
        if self.size.is_none() {
            return self.parse_header(bytes);
        }
        if let Some(status) = self.config.fail_after_header {
            return status;
        }
        self.body.extend_from_slice(bytes);
        EngineStatus::Ok
    }

    fn needed_bytes(&self) -> Option<usize> {
        (self.config.declare_hint && self.size.is_none()).then_some(TOY_HEADER_LEN)
    }

    fn query_info(&self) -> Result<Size, EngineStatus> {
        self.size.ok_or(EngineStatus::NeedMoreData)
    }

    fn is_frame_ready(&self) -> bool {
        !self.metadata_only
            && self
                .size
                .is_some_and(|size| self.body.len() >= size.pixel_count() * 4)
    }

    fn decode_frame(&mut self, output: &mut [u32]) -> Result<usize, EngineStatus> {
        if self.config.fail_decode {
            return Err(EngineStatus::Error);
        }
        let size = self.size.ok_or(EngineStatus::Error)?;
        let count = size.pixel_count();
        if output.len() < count || self.body.len() < count * 4 {
            return Err(EngineStatus::Error);
        }
        for (dst, src) in output.iter_mut().zip(self.body.chunks_exact(4)).take(count) {
            *dst = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        }
        if self.config.short_write {
            Ok(count - 1)
        } else {
            Ok(count)
        }
    }
}

impl Drop for ToyEngine {
    fn drop(&mut self) {
        Counters::bump(&self.counters.destroys, 1);
    }
}
