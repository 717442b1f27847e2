//! Core types and utilities for depth-sensor to tracker registration.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any depth-camera SDK, marker tracker or image codec: frames are
//! plain row-major buffers, and the sensor's un-projection is abstracted
//! behind [`ProjectiveModel`].

mod camera;
mod homography;
mod image;
mod inpaint;
mod logger;
mod transform;

pub use camera::{CameraParams, CameraParamsError, DepthProjection, ProjectiveModel};
pub use homography::{homography_from_4pt, Homography};
pub use image::{
    sample_bilinear, DepthFrame, DepthFrameView, DepthSample, GrayImage,
};
pub use inpaint::{
    denormalize_depth, inpaint_depth, inpaint_gray, normalize_depth, DepthRange, InpaintParams,
};
pub use transform::{fit_affine_transform, Transform3, TransformFitError, MIN_CORRESPONDENCES};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
