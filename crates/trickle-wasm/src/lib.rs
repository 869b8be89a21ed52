//! Trickle WASM - WebAssembly bindings for Trickle
//!
//! This crate exposes the trickle-core incremental decoder to
//! JavaScript/TypeScript applications.
//!
//! # Module Structure
//!
//! - `types` - WASM-compatible image wrapper and option/error conversion
//! - `session` - Streaming decode session fed chunk by chunk
//! - `decode` - One-shot size probing and decoding
//!
//! # Usage
//!
//! ```typescript
//! import init, { decode_image } from '@trickle/wasm';
//!
//! // Initialize WASM module (must call first)
//! await init();
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const image = decode_image(bytes, undefined);
//! console.log(`Decoded ${image.width}x${image.height}`);
//! ```

use wasm_bindgen::prelude::*;

mod decode;
mod session;
mod types;

pub use decode::{decode_image, probe_size};
pub use session::JsDecodeSession;
pub use types::JsDecodedImage;

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
