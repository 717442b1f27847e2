//! Depth frames on disk (16-bit grayscale PNG) and 8-bit previews.

use std::path::Path;

use ::image::{ImageBuffer, Luma};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::core::{normalize_depth, DepthFrame, DepthFrameView, DepthRange, GrayImage};

/// 16-bit single-channel image as produced by depth sensors.
pub type DepthImage = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Errors produced by the frame I/O helpers.
#[derive(thiserror::Error, Debug)]
pub enum FrameIoError {
    #[error(transparent)]
    Image(#[from] ::image::ImageError),

    #[error("buffer of {len} samples does not match a {width}x{height} image")]
    BufferSize {
        width: usize,
        height: usize,
        len: usize,
    },
}

/// Copy a 16-bit image into a [`DepthFrame`].
pub fn depth_frame(img: &DepthImage) -> DepthFrame {
    DepthFrame {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

/// Copy a depth frame into a 16-bit image.
pub fn depth_image(frame: &DepthFrameView<'_>) -> Result<DepthImage, FrameIoError> {
    let size_error = || FrameIoError::BufferSize {
        width: frame.width,
        height: frame.height,
        len: frame.data.len(),
    };
    let width = u32::try_from(frame.width).map_err(|_| size_error())?;
    let height = u32::try_from(frame.height).map_err(|_| size_error())?;
    ImageBuffer::from_raw(width, height, frame.data.to_vec()).ok_or_else(size_error)
}

/// Convert a core 8-bit image into an `image::GrayImage`.
pub fn gray_image(img: &GrayImage) -> Result<::image::GrayImage, FrameIoError> {
    let size_error = || FrameIoError::BufferSize {
        width: img.width,
        height: img.height,
        len: img.data.len(),
    };
    let width = u32::try_from(img.width).map_err(|_| size_error())?;
    let height = u32::try_from(img.height).map_err(|_| size_error())?;
    ::image::GrayImage::from_raw(width, height, img.data.clone()).ok_or_else(size_error)
}

/// Load a depth frame from an image file. Non-16-bit inputs are widened by
/// the `image` crate.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(path)))]
pub fn load_depth_png(path: impl AsRef<Path>) -> Result<DepthFrame, FrameIoError> {
    let img = ::image::open(path)?.into_luma16();
    Ok(depth_frame(&img))
}

/// Save a depth frame as a 16-bit grayscale image (format from the extension).
pub fn save_depth_png(frame: &DepthFrameView<'_>, path: impl AsRef<Path>) -> Result<(), FrameIoError> {
    depth_image(frame)?.save(path)?;
    Ok(())
}

/// Min/max-normalized 8-bit view of the valid samples; holes stay black.
pub fn depth_preview(frame: &DepthFrameView<'_>) -> GrayImage {
    match frame.valid_range() {
        Some((min, max)) if max > min => normalize_depth(frame, DepthRange::new(min, max)),
        Some(_) => frame.valid_mask(),
        None => GrayImage::new(frame.width, frame.height),
    }
}

/// Write [`depth_preview`] to disk.
pub fn save_depth_preview(
    frame: &DepthFrameView<'_>,
    path: impl AsRef<Path>,
) -> Result<(), FrameIoError> {
    gray_image(&depth_preview(frame))?.save(path)?;
    Ok(())
}
