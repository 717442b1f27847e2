use depth_ar_core::TransformFitError;

/// Reasons a calibration attempt is rejected. The previously stored
/// calibration is kept in every case.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("depth frame is empty")]
    EmptyFrame,
    #[error("marker corner {corner} at ({x:.1}, {y:.1}) lies outside the {width}x{height} frame")]
    OutOfBounds {
        corner: usize,
        x: f32,
        y: f32,
        width: usize,
        height: usize,
    },
    #[error("sample point ({x:.1}, {y:.1}) lies outside the {width}x{height} frame")]
    SampleOutOfBounds {
        x: f32,
        y: f32,
        width: usize,
        height: usize,
    },
    #[error("no depth at pixel ({x}, {y}) after hole filling")]
    DegenerateDepth { x: usize, y: usize },
    #[error("measured marker size is degenerate ({width}x{height})")]
    DegenerateMarker { width: f32, height: f32 },
    #[error("transform fit failed: {0}")]
    FitFailure(#[from] TransformFitError),
}

/// Reasons a point query has no answer.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("calibrator has no transform yet")]
    Uncalibrated,
    #[error("pixel ({x:.1}, {y:.1}) lies outside the {width}x{height} frame")]
    OutOfFrame {
        x: f32,
        y: f32,
        width: usize,
        height: usize,
    },
    #[error("no depth reading at pixel ({x}, {y})")]
    NoDepth { x: usize, y: usize },
    #[error("point cannot be mapped (degenerate homogeneous coordinate or behind the sensor)")]
    Unmappable,
}
