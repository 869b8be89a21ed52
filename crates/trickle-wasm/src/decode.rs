//! One-shot decoding bindings.
//!
//! # Functions
//!
//! - [`probe_size`] - Read the image dimensions without decoding pixels
//! - [`decode_image`] - Decode a complete image held in memory
//!
//! # Example
//!
//! ```typescript
//! import { probe_size, decode_image } from '@trickle/wasm';
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const { width, height } = probe_size(bytes);
//! const image = decode_image(bytes, { filter: 'Lanczos3', output_size: { width: width / 2, height: height / 2 } });
//! ```

use trickle_core::{DecodeError, DecoderOptions, ImageCrateEngine, Size};
use wasm_bindgen::prelude::*;

use crate::types::{error_to_js, options_from_js, JsDecodedImage};

/// Read the image size from its header.
///
/// # Returns
///
/// An object `{ width, height }`.
///
/// # Errors
///
/// Returns an error if the format is not recognized or the header is truncated.
#[wasm_bindgen]
pub fn probe_size(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let size = probe(bytes).map_err(error_to_js)?;
    serde_wasm_bindgen::to_value(&size).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Decode a complete image to RGBA.
///
/// # Arguments
///
/// * `bytes` - The encoded image file as a `Uint8Array`
/// * `options` - Decoder options object, or `undefined` for defaults
///
/// # Errors
///
/// Returns an error if the options are invalid or the image cannot be decoded.
#[wasm_bindgen]
pub fn decode_image(bytes: &[u8], options: JsValue) -> Result<JsDecodedImage, JsValue> {
    let options = options_from_js(options)?;
    decode(bytes, options).map_err(error_to_js)
}

pub(crate) fn probe(bytes: &[u8]) -> Result<Size, DecodeError> {
    trickle_core::probe_size(ImageCrateEngine::create, [bytes])
}

pub(crate) fn decode(bytes: &[u8], options: DecoderOptions) -> Result<JsDecodedImage, DecodeError> {
    let frame = trickle_core::decode_all(ImageCrateEngine::create, bytes, options)?;
    Ok(JsDecodedImage::from_surface(frame.image))
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use std::io::Cursor;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(6, 3, image::Rgba([1, 2, 3, 255]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[wasm_bindgen_test]
    fn test_probe_size_object() {
        let value = probe_size(&png_bytes()).unwrap();
        let size: Size = serde_wasm_bindgen::from_value(value).unwrap();
        assert_eq!(size, Size::new(6, 3));
    }

    #[wasm_bindgen_test]
    fn test_decode_image_default_options() {
        let img = decode_image(&png_bytes(), JsValue::UNDEFINED).unwrap();
        assert_eq!((img.width(), img.height()), (6, 3));
    }

    #[wasm_bindgen_test]
    fn test_decode_image_invalid_bytes() {
        assert!(decode_image(&[0u8; 16], JsValue::UNDEFINED).is_err());
    }
}
