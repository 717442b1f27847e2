//! Dense correspondence sampling over the marker plane.

use depth_ar_core::{DepthFrameView, ProjectiveModel};
use nalgebra::{Point2, Point3};

use crate::calibrator::CalibrationError;
use crate::detection::MarkerDetection;

/// Regular `cols x rows` grid spanning `[0, width] x [0, height]`, corners
/// included, row-major (x varies fastest).
///
/// `cols` and `rows` are clamped to at least 2.
pub fn marker_grid(cols: usize, rows: usize, width: f32, height: f32) -> Vec<Point2<f32>> {
    let (cols, rows) = (cols.max(2), rows.max(2));
    let x_step = width / (cols - 1) as f32;
    let y_step = height / (rows - 1) as f32;
    (0..rows)
        .flat_map(|y| (0..cols).map(move |x| Point2::new(x as f32 * x_step, y as f32 * y_step)))
        .collect()
}

/// Look up depth at the rounded pixel of `p` and un-project it.
pub(crate) fn unproject<M: ProjectiveModel>(
    model: &M,
    frame: &DepthFrameView<'_>,
    p: Point2<f32>,
) -> Result<Point3<f32>, CalibrationError> {
    let sample = frame
        .sample_at(p)
        .ok_or(CalibrationError::SampleOutOfBounds {
            x: p.x,
            y: p.y,
            width: frame.width,
            height: frame.height,
        })?;
    if !sample.is_valid() {
        return Err(CalibrationError::DegenerateDepth {
            x: sample.x,
            y: sample.y,
        });
    }
    Ok(model.to_real_world(p, sample.depth as f32, frame.width, frame.height))
}

/// Paired correspondences between the flat tracker frame and the depth
/// sensor's real-world frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationSample {
    /// Grid points on the marker plane in tracker units (`z = 0`).
    pub tracker: Vec<Point3<f32>>,
    /// Image positions of the grid points.
    pub image: Vec<Point2<f32>>,
    /// Un-projected sensor points, index-aligned with `tracker`.
    pub real_world: Vec<Point3<f32>>,
}

impl CalibrationSample {
    /// Sample a `cols x rows` grid over the detected marker.
    ///
    /// Tracker points span the physical marker extent `physical = [w, h]`;
    /// the matching image points come from pushing the same grid over the
    /// working size through the detection homography. `frame` should already
    /// be hole-filled: any zero depth fails the whole sample.
    pub fn collect<M: ProjectiveModel>(
        model: &M,
        detection: &MarkerDetection,
        physical: [f32; 2],
        frame: &DepthFrameView<'_>,
        cols: usize,
        rows: usize,
    ) -> Result<Self, CalibrationError> {
        let [working_w, working_h] = detection.size;
        let image = detection.project(&marker_grid(cols, rows, working_w, working_h));
        let tracker: Vec<Point3<f32>> = marker_grid(cols, rows, physical[0], physical[1])
            .into_iter()
            .map(|p| Point3::new(p.x, p.y, 0.0))
            .collect();
        let real_world = image
            .iter()
            .map(|&p| unproject(model, frame, p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tracker,
            image,
            real_world,
        })
    }

    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depth_ar_core::{DepthFrame, DepthProjection, Homography};

    #[test]
    fn grid_spans_the_full_extent() {
        let grid = marker_grid(10, 5, 90.0, 40.0);
        assert_eq!(grid.len(), 50);
        assert_eq!(grid[0], Point2::new(0.0, 0.0));
        assert_eq!(grid[1], Point2::new(10.0, 0.0));
        assert_eq!(grid[10], Point2::new(0.0, 10.0));
        assert_eq!(grid[49], Point2::new(90.0, 40.0));
    }

    #[test]
    fn hole_fails_the_sample() {
        let mut frame = DepthFrame::filled(64, 48, 700);
        frame.set(10, 10, 0);
        let det = MarkerDetection::new(
            [20.0, 10.0],
            Homography::from_array([[1.0, 0.0, 10.0], [0.0, 1.0, 10.0], [0.0, 0.0, 1.0]]),
        )
        .expect("valid detection");

        let err = CalibrationSample::collect(
            &DepthProjection::kinect(),
            &det,
            [180.0, 100.0],
            &frame.view(),
            10,
            5,
        )
        .expect_err("hole under the first grid point");
        assert_eq!(err, CalibrationError::DegenerateDepth { x: 10, y: 10 });

        frame.set(10, 10, 700);
        let sample = CalibrationSample::collect(
            &DepthProjection::kinect(),
            &det,
            [180.0, 100.0],
            &frame.view(),
            10,
            5,
        )
        .expect("no holes");
        assert_eq!(sample.len(), 50);
        assert_eq!(sample.tracker[49], Point3::new(180.0, 100.0, 0.0));
        assert!(sample.real_world.iter().all(|p| p.z == 700.0));
    }
}
