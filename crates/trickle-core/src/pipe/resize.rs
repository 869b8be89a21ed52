//! Scaling stage for frames whose output size differs from the source.
//!
//! Rows land in a staging image at source resolution; once the last row is
//! written the staged frame is resized with the `image` crate.

use image::RgbaImage;

use crate::types::{DecodeError, FilterType, Size};

/// Validate surface geometry and return its byte length.
pub(crate) fn check_surface(size: Size) -> Result<usize, DecodeError> {
    if size.is_empty() {
        return Err(DecodeError::PipeConstructionFailed(format!(
            "empty surface {size}"
        )));
    }
    size.pixel_count()
        .checked_mul(4)
        .ok_or_else(|| DecodeError::PipeConstructionFailed(format!("surface {size} overflows")))
}

/// Allocate a zeroed RGBA surface, failing instead of aborting when memory is short.
pub(crate) fn allocate_surface(size: Size) -> Result<RgbaImage, DecodeError> {
    let bytes = check_surface(size)?;
    let mut raw = Vec::new();
    raw.try_reserve_exact(bytes)
        .map_err(|_| DecodeError::PipeConstructionFailed(format!("cannot allocate surface {size}")))?;
    raw.resize(bytes, 0);
    RgbaImage::from_raw(size.width, size.height, raw)
        .ok_or_else(|| DecodeError::PipeConstructionFailed(format!("bad surface geometry {size}")))
}

/// Resize a staged frame to `output`.
///
/// # Arguments
///
/// * `staged` - Frame at source resolution
/// * `output` - Target size in pixels
/// * `filter` - Interpolation filter to use
pub(crate) fn resize_frame(staged: &RgbaImage, output: Size, filter: FilterType) -> RgbaImage {
    // Fast path: nothing to scale
    if staged.dimensions() == (output.width, output.height) {
        return staged.clone();
    }
    image::imageops::resize(staged, output.width, output.height, filter.to_image_filter())
}
