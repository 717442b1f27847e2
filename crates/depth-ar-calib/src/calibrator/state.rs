use depth_ar_core::Transform3;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use super::CalibrationError;

/// Real-world size of the tracked marker, in depth-sensor units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerPhysicalSize {
    /// `height` scaled by the working aspect ratio.
    pub width: f32,
    /// Mean length of the two vertical edges.
    pub height: f32,
    /// Mean length of the two horizontal edges, as measured.
    pub measured_width: f32,
}

impl MarkerPhysicalSize {
    /// Estimate the size from real-world corners in TL, TR, BR, BL order.
    ///
    /// The aspect ratio of the working size is trusted over the measured
    /// width.
    pub fn from_corners(
        corners: &[Point3<f32>; 4],
        working: [f32; 2],
    ) -> Result<Self, CalibrationError> {
        let edge = |a: usize, b: usize| (corners[a] - corners[b]).norm();
        let measured_width = (edge(0, 1) + edge(3, 2)) / 2.0;
        let height = (edge(3, 0) + edge(2, 1)) / 2.0;
        let width = height * (working[0] / working[1]);
        if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
            return Err(CalibrationError::DegenerateMarker { width, height });
        }
        Ok(Self {
            width,
            height,
            measured_width,
        })
    }

    pub fn extent(&self) -> [f32; 2] {
        [self.width, self.height]
    }

    /// Physical units per working unit. Multiplying the tracker's working
    /// size by this factor re-registers the marker at its measured size.
    pub fn scale_relative_to(&self, working: [f32; 2]) -> f32 {
        self.height / working[1]
    }
}

/// One successful calibration. Replaced as a whole by the next success.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Sensor real-world frame to tracker frame.
    pub forward: Transform3,
    /// Tracker frame to sensor real-world frame, fitted on its own.
    pub inverse: Transform3,
    pub marker_size: MarkerPhysicalSize,
    /// Real-world marker corners (TL, TR, BR, BL).
    pub corners: [Point3<f32>; 4],
    /// `[width, height]` of the depth frame used for the fit.
    pub frame_size: [usize; 2],
    /// Number of correspondences in each fit.
    pub samples: usize,
    #[serde(default)]
    pub forward_rms: Option<f64>,
    #[serde(default)]
    pub inverse_rms: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn size_uses_height_and_working_aspect() {
        let corners = [
            Point3::new(0.0, 0.0, 900.0),
            Point3::new(310.0, 0.0, 900.0),
            Point3::new(310.0, 150.0, 900.0),
            Point3::new(0.0, 150.0, 900.0),
        ];
        let size = MarkerPhysicalSize::from_corners(&corners, [100.0, 50.0]).expect("valid");
        assert_abs_diff_eq!(size.height, 150.0, epsilon = 1e-4);
        assert_abs_diff_eq!(size.width, 300.0, epsilon = 1e-4);
        assert_abs_diff_eq!(size.measured_width, 310.0, epsilon = 1e-4);
        assert_abs_diff_eq!(size.scale_relative_to([100.0, 50.0]), 3.0, epsilon = 1e-6);
    }

    #[test]
    fn collapsed_corners_are_rejected() {
        let corners = [Point3::new(5.0, 5.0, 800.0); 4];
        assert!(matches!(
            MarkerPhysicalSize::from_corners(&corners, [10.0, 10.0]),
            Err(CalibrationError::DegenerateMarker { .. })
        ));
    }
}
