//! Marker detections handed over by an external planar-marker tracker.

use depth_ar_core::{homography_from_4pt, Homography};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MarkerDetectionError {
    #[error("marker working size must be positive and finite (got {width}x{height})")]
    InvalidSize { width: f32, height: f32 },
    #[error("marker homography is singular or not finite")]
    InvalidHomography,
    #[error("marker corners do not span a quadrilateral")]
    DegenerateCorners,
    #[error("marker corner {corner} is {distance:.2} px away from its homography projection")]
    InconsistentCorners { corner: usize, distance: f32 },
}

/// Largest accepted distance (pixels) between a stored corner and the
/// projection of its reference corner.
const CORNER_TOLERANCE: f32 = 0.5;

/// One detected marker in a color frame.
///
/// `size` is the flat reference ("working") size the tracker uses for the
/// marker, `homography` maps that reference plane to image pixels and
/// `corners` are the image positions of the reference corners in TL, TR,
/// BR, BL order.
///
/// Deserialization re-validates the record and rejects corners that
/// disagree with the homography.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DetectionRecord")]
pub struct MarkerDetection {
    pub size: [f32; 2],
    pub homography: Homography,
    pub corners: [Point2<f32>; 4],
}

/// Reference-plane corners of a `width x height` marker in TL, TR, BR, BL order.
pub fn reference_corners(size: [f32; 2]) -> [Point2<f32>; 4] {
    let [w, h] = size;
    [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ]
}

fn check_size(size: [f32; 2]) -> Result<(), MarkerDetectionError> {
    let [width, height] = size;
    if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
        return Err(MarkerDetectionError::InvalidSize { width, height });
    }
    Ok(())
}

impl MarkerDetection {
    /// Build a detection from the tracker's homography; the image corners are
    /// the projected reference corners.
    pub fn new(size: [f32; 2], homography: Homography) -> Result<Self, MarkerDetectionError> {
        check_size(size)?;
        if !homography.is_valid() {
            return Err(MarkerDetectionError::InvalidHomography);
        }
        let reference = reference_corners(size);
        let corners = reference.map(|p| homography.apply(p));
        Ok(Self {
            size,
            homography,
            corners,
        })
    }

    /// Build a detection from four image corners (TL, TR, BR, BL), fitting
    /// the reference-to-image homography.
    pub fn from_corners(
        size: [f32; 2],
        corners: [Point2<f32>; 4],
    ) -> Result<Self, MarkerDetectionError> {
        check_size(size)?;
        let homography = homography_from_4pt(&reference_corners(size), &corners)
            .filter(Homography::is_valid)
            .ok_or(MarkerDetectionError::DegenerateCorners)?;
        Ok(Self {
            size,
            homography,
            corners,
        })
    }

    /// Image positions of the reference corners under `homography`.
    ///
    /// The calibrator works from these rather than from `corners`, so the
    /// bounds check and the grid sampling always agree.
    pub fn image_corners(&self) -> [Point2<f32>; 4] {
        reference_corners(self.size).map(|p| self.homography.apply(p))
    }

    /// Map points of the reference plane into the image.
    pub fn project(&self, reference: &[Point2<f32>]) -> Vec<Point2<f32>> {
        self.homography.apply_all(reference)
    }
}

#[derive(Deserialize)]
struct DetectionRecord {
    size: [f32; 2],
    homography: Homography,
    corners: [Point2<f32>; 4],
}

impl TryFrom<DetectionRecord> for MarkerDetection {
    type Error = MarkerDetectionError;

    fn try_from(record: DetectionRecord) -> Result<Self, Self::Error> {
        let detection = Self::new(record.size, record.homography)?;
        let pairs = record.corners.iter().zip(&detection.corners);
        for (corner, (stored, projected)) in pairs.enumerate() {
            let distance = (stored - projected).norm();
            if distance.is_nan() || distance > CORNER_TOLERANCE {
                return Err(MarkerDetectionError::InconsistentCorners { corner, distance });
            }
        }
        Ok(Self {
            corners: record.corners,
            ..detection
        })
    }
}
