//! Coordinate calibrator.
//!
//! Fits the mapping between the depth sensor's real-world frame and the flat
//! tracker frame of a detected marker, keeps the latest successful fit, and
//! answers point queries against it.

mod error;
mod params;
mod pipeline;
mod query;
mod state;

pub use error::{CalibrationError, QueryError};
pub use params::CalibratorParams;
pub use pipeline::Calibrator;
pub use state::{Calibration, MarkerPhysicalSize};
