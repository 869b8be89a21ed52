//! Surface pipe: carries decoded rows into the output surface.
//!
//! A pipe is built per frame once the image size is known. Rows arrive at
//! source resolution in the fixed packed format, top to bottom. Each row goes
//! through format conversion and then one of two sinks:
//!
//! - **Direct**: output size equals source size. Rows are written straight
//!   into the surface and the invalid rectangle grows row by row.
//! - **Scaled**: rows are staged at source resolution. Writing the last row
//!   resizes the staged frame into the surface and invalidates all of it.
//!
//! The accumulated invalid rectangle is collected with
//! [`SurfacePipe::take_invalid_rect`].

mod resize;

use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::types::{unpack_rgba, DecodeError, FilterType, IntRect, Size, SurfaceFormat};

/// Result of writing one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// The row was accepted; more rows are expected.
    NeedMoreData,
    /// The row was accepted and completed the frame.
    Finished,
    /// The row was rejected.
    Failure,
}

/// Region changed by writes, in both coordinate spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceInvalidRect {
    pub input_space: IntRect,
    pub output_space: IntRect,
}

impl SurfaceInvalidRect {
    fn union(self, other: SurfaceInvalidRect) -> SurfaceInvalidRect {
        SurfaceInvalidRect {
            input_space: self.input_space.union(&other.input_space),
            output_space: self.output_space.union(&other.output_space),
        }
    }
}

struct Staging {
    frame: RgbaImage,
    filter: FilterType,
}

pub struct SurfacePipe {
    input: Size,
    output: Size,
    format: SurfaceFormat,
    next_row: u32,
    surface: RgbaImage,
    staging: Option<Staging>,
    invalid: Option<SurfaceInvalidRect>,
}

impl SurfacePipe {
    /// Build a pipe taking `input`-sized frames to an `output`-sized surface.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::PipeConstructionFailed` for empty sizes or when
    /// the surface cannot be allocated.
    pub fn new(
        input: Size,
        output: Size,
        format: SurfaceFormat,
        filter: FilterType,
    ) -> Result<Self, DecodeError> {
        if input.is_empty() {
            return Err(DecodeError::PipeConstructionFailed(format!(
                "empty input size {input}"
            )));
        }
        // A scaled pipe gets its surface from the resize on the last row.
        let (surface, staging) = if input == output {
            (resize::allocate_surface(output)?, None)
        } else {
            resize::check_surface(output)?;
            let staging = Staging {
                frame: resize::allocate_surface(input)?,
                filter,
            };
            (RgbaImage::new(0, 0), Some(staging))
        };
        debug!(%input, %output, ?format, scaled = staging.is_some(), "surface pipe constructed");
        Ok(Self {
            input,
            output,
            format,
            next_row: 0,
            surface,
            staging,
            invalid: None,
        })
    }

    pub fn input_size(&self) -> Size {
        self.input
    }

    pub fn output_size(&self) -> Size {
        self.output
    }

    pub fn rows_written(&self) -> u32 {
        self.next_row
    }

    pub fn is_finished(&self) -> bool {
        self.next_row == self.input.height
    }

    /// Write the next source row.
    ///
    /// Rows must be exactly `input.width` packed pixels. Writing past the
    /// last row, or a row of the wrong length, is a failure.
    pub fn write_row(&mut self, row: &[u32]) -> WriteState {
        if self.is_finished() {
            warn!(row = self.next_row, "row written past end of frame");
            return WriteState::Failure;
        }
        if row.len() != self.input.width as usize {
            warn!(
                expected = self.input.width,
                actual = row.len(),
                "row length mismatch"
            );
            return WriteState::Failure;
        }

        let y = self.next_row;
        let target = match self.staging.as_mut() {
            Some(staging) => &mut staging.frame,
            None => &mut self.surface,
        };
        for (x, &pixel) in row.iter().enumerate() {
            target.put_pixel(x as u32, y, convert_pixel(pixel, self.format));
        }
        self.next_row += 1;

        if self.staging.is_none() {
            let rect = IntRect::new(0, y, self.input.width, 1);
            self.invalidate(SurfaceInvalidRect {
                input_space: rect,
                output_space: rect,
            });
        }

        if !self.is_finished() {
            return WriteState::NeedMoreData;
        }
        if let Some(staging) = self.staging.take() {
            self.surface = resize::resize_frame(&staging.frame, self.output, staging.filter);
            self.invalidate(SurfaceInvalidRect {
                input_space: IntRect::from_size(self.input),
                output_space: IntRect::from_size(self.output),
            });
        }
        WriteState::Finished
    }

    /// Return and reset the region invalidated since the last call.
    pub fn take_invalid_rect(&mut self) -> Option<SurfaceInvalidRect> {
        self.invalid.take()
    }

    /// The output surface. Empty in a scaled pipe until the last row is written.
    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    pub fn into_surface(self) -> RgbaImage {
        self.surface
    }

    fn invalidate(&mut self, rect: SurfaceInvalidRect) {
        self.invalid = Some(match self.invalid {
            Some(existing) => existing.union(rect),
            None => rect,
        });
    }
}

fn convert_pixel(pixel: u32, format: SurfaceFormat) -> Rgba<u8> {
    let [r, g, b, a] = unpack_rgba(pixel);
    match format {
        SurfaceFormat::Rgbx => Rgba([r, g, b, 0xFF]),
        SurfaceFormat::Rgba => Rgba([r, g, b, a]),
    }
}
