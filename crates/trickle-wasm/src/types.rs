//! WASM-compatible wrapper types and conversions.
//!
//! This module provides the JavaScript-facing image type and the helpers that
//! translate options and errors across the boundary.

use trickle_core::{DecodeError, DecoderOptions};
use wasm_bindgen::prelude::*;

/// A decoded RGBA image for JavaScript.
///
/// # Memory Management
///
/// The pixel data is stored in WASM memory. When you call `pixels()`, a copy is made
/// to JavaScript memory as a `Uint8Array`.
#[wasm_bindgen]
pub struct JsDecodedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

#[wasm_bindgen]
impl JsDecodedImage {
    /// Get the image width in pixels
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get the image height in pixels
    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get the number of bytes in the pixel buffer (width * height * 4)
    #[wasm_bindgen(getter)]
    pub fn byte_length(&self) -> usize {
        self.pixels.len()
    }

    /// Returns RGBA pixel data as Uint8Array.
    ///
    /// Note: This creates a copy of the pixel data.
    pub fn pixels(&self) -> Vec<u8> {
        self.pixels.clone()
    }

    /// Explicitly free WASM memory.
    pub fn free(self) {
        // Dropping self releases the memory
    }
}

impl JsDecodedImage {
    /// Wrap a finished surface.
    pub(crate) fn from_surface(surface: image::RgbaImage) -> Self {
        Self {
            width: surface.width(),
            height: surface.height(),
            pixels: surface.into_raw(),
        }
    }
}

/// Read decoder options from a JS object. `undefined` and `null` mean defaults.
pub(crate) fn options_from_js(value: JsValue) -> Result<DecoderOptions, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(DecoderOptions::default());
    }
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Invalid decoder options: {}", e)))
}

/// Convert a decode failure for JavaScript, echoing it to the console.
pub(crate) fn error_to_js(err: DecodeError) -> JsValue {
    let message = JsValue::from_str(&err.to_string());
    web_sys::console::warn_1(&message);
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_surface() {
        let surface = image::RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]));
        let img = JsDecodedImage::from_surface(surface);
        assert_eq!(img.width(), 3);
        assert_eq!(img.height(), 2);
        assert_eq!(img.byte_length(), 24);
        assert_eq!(&img.pixels()[..4], &[1, 2, 3, 4]);
    }
}
