//! Registration of a depth sensor with a planar-marker tracker.
//!
//! Given one marker detection (working size + homography into the color
//! image) and the depth frame captured with it, the [`Calibrator`]:
//! - checks the projected marker corners against the frame bounds,
//! - fills depth holes on a scratch copy of the frame,
//! - un-projects the corners and estimates the marker's physical size,
//! - samples a dense grid of correspondences over the marker plane,
//! - fits forward (sensor -> tracker) and inverse (tracker -> sensor)
//!   transforms independently by least squares.
//!
//! Point queries are answered against the latest successful fit and fail
//! with [`QueryError::Uncalibrated`] before the first one.
//!
//! Marker detection, image acquisition and rendering are left to the
//! caller.

mod calibrator;
mod detection;
mod io;
mod sampling;

pub use calibrator::{
    Calibration, CalibrationError, Calibrator, CalibratorParams, MarkerPhysicalSize, QueryError,
};
pub use detection::{reference_corners, MarkerDetection, MarkerDetectionError};
pub use io::{CalibConfigError, CalibIoError, CalibrateConfig, CalibrationReport, MarkerConfig};
pub use sampling::{marker_grid, CalibrationSample};

pub use depth_ar_core::{DepthFrame, DepthFrameView, DepthProjection, ProjectiveModel, Transform3};
