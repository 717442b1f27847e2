//! High-level facade crate for the `depth-ar-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the core geometry crate and the calibrator
//! - (feature `image`) loading and saving 16-bit depth PNGs and 8-bit previews
//! - (feature `cli`) the `depth-ar` command-line tool
//!
//! ## Quickstart
//!
//! ```no_run
//! use depth_ar::frame::load_depth_png;
//! use depth_ar::{Calibrator, CalibratorParams, DepthProjection, Homography, MarkerDetection};
//! use nalgebra::Point2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let frame = load_depth_png("depth.png")?;
//! let homography = Homography::from_array([[2.0, 0.0, 100.0], [0.0, 2.0, 50.0], [0.0, 0.0, 1.0]]);
//! let detection = MarkerDetection::new([100.0, 50.0], homography)?;
//!
//! let mut calibrator = Calibrator::new(DepthProjection::kinect(), CalibratorParams::default());
//! calibrator.attempt_calibration(&detection, &frame.view())?;
//!
//! let p = calibrator.pixel_to_tracker_frame(Point2::new(320.0, 240.0), &frame.view())?;
//! println!("tracker frame: {p:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `depth_ar::core`: depth frames, homographies, 3D transforms, projection
//!   models, hole filling.
//! - `depth_ar::calib`: marker detections, the calibrator and its queries,
//!   JSON config and report types.
//! - `depth_ar::frame` (feature `image`): image-file helpers.

pub use depth_ar_calib as calib;
pub use depth_ar_core as core;

pub use depth_ar_calib::{
    Calibration, CalibrationError, Calibrator, CalibratorParams, MarkerDetection,
    MarkerPhysicalSize, QueryError,
};
pub use depth_ar_core::{
    DepthFrame, DepthFrameView, DepthProjection, Homography, InpaintParams, ProjectiveModel,
    Transform3,
};

#[cfg(feature = "image")]
pub mod frame;
