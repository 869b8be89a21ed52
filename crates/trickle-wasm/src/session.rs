//! Streaming decode bindings.
//!
//! [`JsDecodeSession`] wraps a core decode session fed from JavaScript as
//! network chunks arrive.
//!
//! # Example
//!
//! ```typescript
//! import { JsDecodeSession } from '@trickle/wasm';
//!
//! const session = new JsDecodeSession({ output_size: { width: 256, height: 256 } });
//! const reader = response.body.getReader();
//! for (;;) {
//!   const { done, value } = await reader.read();
//!   if (done) break;
//!   if (session.push(value)) break;
//! }
//! session.finish();
//! const image = session.take_image();
//! ```

use trickle_core::{
    ChunkedSource, DecodeError, DecodeSession, DecoderOptions, ImageCrateEngine, Progress,
    RecordingObserver, SessionState,
};
use wasm_bindgen::prelude::*;

use crate::types::{error_to_js, options_from_js, JsDecodedImage};

type EngineFn = fn(bool) -> Option<ImageCrateEngine>;

/// An incremental decode driven from JavaScript.
#[wasm_bindgen]
pub struct JsDecodeSession {
    session: DecodeSession<EngineFn, RecordingObserver>,
    source: ChunkedSource,
}

#[wasm_bindgen]
impl JsDecodeSession {
    /// Create a session.
    ///
    /// # Arguments
    /// * `options` - Decoder options object, or `undefined` for defaults
    ///
    /// # Errors
    /// Returns error if the options cannot be deserialized
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<JsDecodeSession, JsValue> {
        Ok(Self::with_options(options_from_js(options)?))
    }

    /// Feed the next chunk. Returns `true` once the decode has completed.
    ///
    /// # Errors
    /// Returns the decode failure; the session stays failed afterwards.
    pub fn push(&mut self, bytes: &[u8]) -> Result<bool, JsValue> {
        self.push_bytes(bytes).map_err(error_to_js)
    }

    /// Mark the end of input.
    ///
    /// # Errors
    /// Returns error if the data ended before the decode completed.
    pub fn finish(&mut self) -> Result<(), JsValue> {
        self.finish_stream().map_err(error_to_js)
    }

    /// Image width, once known
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> Option<u32> {
        self.session.size().map(|s| s.width)
    }

    /// Image height, once known
    #[wasm_bindgen(getter)]
    pub fn height(&self) -> Option<u32> {
        self.session.size().map(|s| s.height)
    }

    /// One of `no-engine`, `awaiting-metadata`, `awaiting-frame`, `done`, `failed`.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        state_name(self.session.state()).to_string()
    }

    /// Take the decoded image. Returns `undefined` before completion or
    /// when it was already taken.
    pub fn take_image(&mut self) -> Option<JsDecodedImage> {
        self.session.take_surface().map(JsDecodedImage::from_surface)
    }
}

impl JsDecodeSession {
    pub(crate) fn with_options(options: DecoderOptions) -> Self {
        Self {
            session: DecodeSession::with_observer(
                ImageCrateEngine::create as EngineFn,
                options,
                RecordingObserver::new(),
            ),
            source: ChunkedSource::new(),
        }
    }

    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) -> Result<bool, DecodeError> {
        // A finished session never drains the source again
        if !self.session.state().is_terminal() {
            self.source.append(bytes);
        }
        Ok(self.pump()? == Progress::Complete)
    }

    pub(crate) fn finish_stream(&mut self) -> Result<(), DecodeError> {
        self.source.complete();
        self.pump().map(|_| ())
    }

    fn pump(&mut self) -> Result<Progress, DecodeError> {
        self.session.decode(&mut self.source, None)
    }
}

fn state_name(state: SessionState) -> &'static str {
    match state {
        SessionState::NoEngine => "no-engine",
        SessionState::AwaitingMetadata => "awaiting-metadata",
        SessionState::AwaitingFrame => "awaiting-frame",
        SessionState::Done => "done",
        SessionState::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use trickle_core::{ObserverEvent, Size};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x * 30) as u8, (y * 30) as u8, 90, 255])
        });
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_streamed_png() {
        let png = png_bytes(6, 4);
        let mut s = JsDecodeSession::with_options(DecoderOptions::default());
        assert_eq!(s.state(), "no-engine");

        let (head, tail) = png.split_at(7);
        assert!(!s.push_bytes(head).unwrap());
        assert_eq!(s.width(), None);
        assert!(s.push_bytes(tail).unwrap());
        s.finish_stream().unwrap();

        assert_eq!(s.state(), "done");
        assert_eq!(s.width(), Some(6));
        assert_eq!(s.height(), Some(4));
        let img = s.take_image().unwrap();
        assert_eq!(img.byte_length(), 6 * 4 * 4);
        assert!(s.take_image().is_none());
        assert_eq!(
            s.session.observer().events().last(),
            Some(&ObserverEvent::DecodeComplete)
        );
    }

    #[test]
    fn test_metadata_only_session() {
        let png = png_bytes(9, 3);
        let mut s = JsDecodeSession::with_options(DecoderOptions::metadata_only());
        assert!(s.push_bytes(&png).unwrap());
        assert_eq!(s.session.size(), Some(Size::new(9, 3)));
        assert!(s.take_image().is_none());
    }

    #[test]
    fn test_finish_before_complete_fails() {
        let png = png_bytes(4, 4);
        let mut s = JsDecodeSession::with_options(DecoderOptions::default());
        assert!(!s.push_bytes(&png[..png.len() / 2]).unwrap());
        assert!(s.finish_stream().is_err());
        assert_eq!(s.state(), "failed");
    }

    #[test]
    fn test_push_after_done_is_dropped() {
        let png = png_bytes(3, 3);
        let mut s = JsDecodeSession::with_options(DecoderOptions::default());
        assert!(s.push_bytes(&png).unwrap());
        for _ in 0..10 {
            assert!(s.push_bytes(&[0u8; 1024]).unwrap());
        }
        assert_eq!(s.source.pending_chunks(), 0);
        assert_eq!(s.state(), "done");
    }

    #[test]
    fn test_push_after_failure_is_dropped() {
        let mut s = JsDecodeSession::with_options(DecoderOptions::default());
        let first = s.push_bytes(&[0u8; 32]).unwrap_err();
        for _ in 0..100 {
            assert_eq!(s.push_bytes(&[0u8; 1024]), Err(first.clone()));
        }
        assert_eq!(s.source.pending_chunks(), 0);
        assert_eq!(s.state(), "failed");
    }

    #[test]
    fn test_garbage_fails() {
        let mut s = JsDecodeSession::with_options(DecoderOptions::default());
        let err = s.push_bytes(&[0u8; 32]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidData(_)));
        assert_eq!(s.state(), "failed");
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use std::io::Cursor;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(5, 5, image::Rgba([10, 20, 30, 255]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[wasm_bindgen_test]
    fn test_session_with_default_options() {
        let mut s = JsDecodeSession::new(JsValue::UNDEFINED).unwrap();
        assert!(s.push(&png_bytes()).unwrap());
        s.finish().unwrap();
        let img = s.take_image().unwrap();
        assert_eq!(img.width(), 5);
        assert_eq!(&img.pixels()[..4], &[10, 20, 30, 255]);
    }

    #[wasm_bindgen_test]
    fn test_session_push_error_is_js_string() {
        let mut s = JsDecodeSession::new(JsValue::NULL).unwrap();
        let err = s.push(&[0u8; 32]).unwrap_err();
        assert!(err.as_string().is_some());
    }
}
