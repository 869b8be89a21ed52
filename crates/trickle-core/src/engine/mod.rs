//! Adapter around the opaque decode engine.
//!
//! The engine owns all knowledge of the compressed format. This module only
//! defines the contract it must honor ([`DecodeEngine`]) and the owning
//! wrapper a session holds ([`EngineHandle`]), which guarantees the engine is
//! released exactly once on every exit path.
//!
//! # Feed contract
//!
//! Each [`DecodeEngine::feed`] call receives one contiguous span.
//!
//! - [`EngineStatus::Ok`]: the whole span was consumed. Size and frame
//!   readiness must still be checked separately.
//! - [`EngineStatus::NeedMoreData`]: nothing was consumed. The caller must
//!   present the same bytes again, extended with later input.
//! - [`EngineStatus::InvalidData`] / [`EngineStatus::Error`]: fatal.

mod image_engine;

#[cfg(test)]
pub(crate) mod testing;

pub use image_engine::{ImageCrateEngine, SIGNATURE_PROBE_LEN};

#[cfg(test)]
pub(crate) use image_engine::tests::png_bytes;

use tracing::{debug, warn};

use crate::types::{DecodeError, Size};

/// Status codes reported by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Ok,
    NeedMoreData,
    InvalidData,
    Error,
}

impl EngineStatus {
    /// Map a fatal status to the session error it causes.
    ///
    /// Returns `None` for the two non-fatal statuses.
    pub fn into_error(self, context: &str) -> Option<DecodeError> {
        match self {
            EngineStatus::Ok | EngineStatus::NeedMoreData => None,
            EngineStatus::InvalidData => Some(DecodeError::InvalidData(context.to_string())),
            EngineStatus::Error => Some(DecodeError::EngineInternalError(context.to_string())),
        }
    }
}

/// An opaque decoding engine for one image.
///
/// Engines are single-threaded: a handle is only ever driven by the session
/// that owns it.
pub trait DecodeEngine {
    /// Offer one contiguous span of compressed bytes.
    fn feed(&mut self, bytes: &[u8]) -> EngineStatus;

    /// Minimum span length the next `feed` needs to make progress, if known.
    fn needed_bytes(&self) -> Option<usize> {
        None
    }

    /// Image dimensions, once the engine has parsed enough to know them.
    ///
    /// Safe to call repeatedly; any non-`Ok` status means "not yet".
    fn query_info(&self) -> Result<Size, EngineStatus>;

    /// Whether a full frame can be decoded now.
    fn is_frame_ready(&self) -> bool;

    /// Decode the ready frame at source resolution into `output`.
    ///
    /// Returns the number of pixels written.
    fn decode_frame(&mut self, output: &mut [u32]) -> Result<usize, EngineStatus>;

    /// Release the engine. Called exactly once per handle.
    fn destroy(self)
    where
        Self: Sized,
    {
    }
}

/// Produces engines for new sessions.
///
/// Any `FnMut(bool) -> Option<E>` is a factory; the flag is the session's
/// metadata-only mode and `None` means creation failed.
pub trait EngineFactory {
    type Engine: DecodeEngine;

    fn create(&mut self, metadata_only: bool) -> Option<Self::Engine>;
}

impl<E, F> EngineFactory for F
where
    E: DecodeEngine,
    F: FnMut(bool) -> Option<E>,
{
    type Engine = E;

    fn create(&mut self, metadata_only: bool) -> Option<E> {
        self(metadata_only)
    }
}

/// Exclusive owner of one engine.
///
/// The engine is destroyed by [`EngineHandle::destroy`] or, failing that,
/// when the handle is dropped. Calls after destruction report
/// [`EngineStatus::Error`].
pub struct EngineHandle<E: DecodeEngine> {
    engine: Option<E>,
}

impl<E: DecodeEngine> EngineHandle<E> {
    /// Create an engine through `factory`.
    pub fn create<F>(factory: &mut F, metadata_only: bool) -> Result<Self, DecodeError>
    where
        F: EngineFactory<Engine = E>,
    {
        match factory.create(metadata_only) {
            Some(engine) => {
                debug!(metadata_only, "decode engine created");
                Ok(Self {
                    engine: Some(engine),
                })
            }
            None => {
                warn!(metadata_only, "decode engine creation failed");
                Err(DecodeError::EngineCreationFailed)
            }
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) -> EngineStatus {
        match self.engine.as_mut() {
            Some(engine) => engine.feed(bytes),
            None => EngineStatus::Error,
        }
    }

    pub fn needed_bytes(&self) -> Option<usize> {
        self.engine.as_ref().and_then(DecodeEngine::needed_bytes)
    }

    /// Image size if the engine knows it yet.
    pub fn query_info(&self) -> Option<Size> {
        self.engine.as_ref()?.query_info().ok()
    }

    pub fn is_frame_ready(&self) -> bool {
        self.engine
            .as_ref()
            .is_some_and(DecodeEngine::is_frame_ready)
    }

    /// Decode the ready frame into `output`, returning the pixel count written.
    pub fn decode_frame(&mut self, output: &mut [u32]) -> Result<usize, DecodeError> {
        let engine = self.engine.as_mut().ok_or_else(|| {
            DecodeError::EngineInternalError("frame decode on a destroyed engine".to_string())
        })?;
        engine.decode_frame(output).map_err(|status| {
            status
                .into_error("frame decode failed")
                .unwrap_or_else(|| {
                    DecodeError::EngineInternalError(format!(
                        "frame decode returned non-fatal status {status:?}"
                    ))
                })
        })
    }

    /// Release the engine. Later calls are no-ops.
    pub fn destroy(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.destroy();
            debug!("decode engine destroyed");
        }
    }

    pub fn is_live(&self) -> bool {
        self.engine.is_some()
    }
}

impl<E: DecodeEngine> Drop for EngineHandle<E> {
    fn drop(&mut self) {
        self.destroy();
    }
}
