use depth_ar_core::InpaintParams;
use serde::{Deserialize, Serialize};

/// Configuration for the coordinate calibrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibratorParams {
    /// Correspondence grid columns across the marker width (>= 2).
    pub grid_cols: usize,
    /// Correspondence grid rows across the marker height (>= 2).
    pub grid_rows: usize,
    /// Hole filling applied to the scratch copy of the depth frame.
    pub inpaint: InpaintParams,
}

impl Default for CalibratorParams {
    fn default() -> Self {
        Self {
            grid_cols: 10,
            grid_rows: 5,
            inpaint: InpaintParams::default(),
        }
    }
}

impl CalibratorParams {
    /// Number of correspondences sampled per calibration attempt.
    pub fn sample_count(&self) -> usize {
        self.grid_cols * self.grid_rows
    }
}
