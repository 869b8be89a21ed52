//! Trickle Core - incremental image decoding
//!
//! This crate turns a compressed image that arrives in arbitrary chunks into
//! a decoded RGBA surface. Decoding is driven by a [`DecodeSession`], which
//! feeds chunks to an opaque [`DecodeEngine`], posts the image size exactly
//! once, and writes the finished frame through a [`pipe::SurfacePipe`] that
//! handles format conversion and optional scaling.
//!
//! # Example
//!
//! ```ignore
//! use trickle_core::{ChunkedSource, DecodeSession, DecoderOptions, ImageCrateEngine};
//!
//! let mut source = ChunkedSource::new();
//! let mut session = DecodeSession::new(ImageCrateEngine::create, DecoderOptions::new());
//!
//! source.append(&first_chunk);
//! session.decode(&mut source, None)?; // Suspended
//! source.append(&rest);
//! source.complete();
//! session.decode(&mut source, None)?; // Complete
//! let surface = session.take_surface();
//! ```

pub mod buffer;
pub mod engine;
pub mod lexer;
pub mod observer;
pub mod options;
pub mod pipe;
pub mod session;
pub mod source;
pub mod types;

pub use engine::{DecodeEngine, EngineFactory, EngineHandle, EngineStatus, ImageCrateEngine};
pub use observer::{ImageObserver, ObserverEvent, RecordingObserver};
pub use options::DecoderOptions;
pub use session::{decode_all, probe_size, DecodeSession, DecodedFrame, Progress, SessionState};
pub use source::{ByteSource, ChunkedSource, Resumable, SourceState};
pub use types::{DecodeError, FilterType, IntRect, Size, SurfaceFormat};
