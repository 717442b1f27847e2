use depth_ar_core::{DepthFrameView, ProjectiveModel};
use nalgebra::{Point2, Point3};

use super::{Calibration, Calibrator, QueryError};

impl<M: ProjectiveModel> Calibrator<M> {
    fn current(&self) -> Result<&Calibration, QueryError> {
        self.calibration().ok_or(QueryError::Uncalibrated)
    }

    /// Un-project `pixel` using the raw depth at its rounded location.
    ///
    /// Independent of the calibration state. A zero depth is reported as
    /// [`QueryError::NoDepth`] instead of a point at the sensor origin.
    pub fn real_world_point(
        &self,
        pixel: Point2<f32>,
        frame: &DepthFrameView<'_>,
    ) -> Result<Point3<f32>, QueryError> {
        let sample = frame.sample_at(pixel).ok_or(QueryError::OutOfFrame {
            x: pixel.x,
            y: pixel.y,
            width: frame.width,
            height: frame.height,
        })?;
        if !sample.is_valid() {
            return Err(QueryError::NoDepth {
                x: sample.x,
                y: sample.y,
            });
        }
        Ok(self
            .model()
            .to_real_world(pixel, sample.depth as f32, frame.width, frame.height))
    }

    /// [`Self::real_world_point`] over many pixels; failed lookups are `None`.
    pub fn real_world_points(
        &self,
        pixels: &[Point2<f32>],
        frame: &DepthFrameView<'_>,
    ) -> Vec<Option<Point3<f32>>> {
        pixels
            .iter()
            .map(|&p| self.real_world_point(p, frame).ok())
            .collect()
    }

    /// Map a sensor real-world point into the tracker frame.
    pub fn to_tracker_frame(&self, p: Point3<f32>) -> Result<Point3<f32>, QueryError> {
        self.current()?
            .forward
            .apply(p)
            .ok_or(QueryError::Unmappable)
    }

    /// Map a tracker-frame point into the sensor real-world frame.
    pub fn to_real_world_frame(&self, p: Point3<f32>) -> Result<Point3<f32>, QueryError> {
        self.current()?
            .inverse
            .apply(p)
            .ok_or(QueryError::Unmappable)
    }

    /// Un-project `pixel` and map the result into the tracker frame.
    pub fn pixel_to_tracker_frame(
        &self,
        pixel: Point2<f32>,
        frame: &DepthFrameView<'_>,
    ) -> Result<Point3<f32>, QueryError> {
        let calibration = self.current()?;
        let p = self.real_world_point(pixel, frame)?;
        calibration.forward.apply(p).ok_or(QueryError::Unmappable)
    }

    /// Per-point [`Self::to_tracker_frame`]. Only a missing calibration fails
    /// the batch; unmappable points come back as `None` in place.
    pub fn to_tracker_frame_all(
        &self,
        points: &[Point3<f32>],
    ) -> Result<Vec<Option<Point3<f32>>>, QueryError> {
        let forward = &self.current()?.forward;
        Ok(points.iter().map(|&p| forward.apply(p)).collect())
    }

    /// Per-point [`Self::to_real_world_frame`], same contract as
    /// [`Self::to_tracker_frame_all`].
    pub fn to_real_world_frame_all(
        &self,
        points: &[Point3<f32>],
    ) -> Result<Vec<Option<Point3<f32>>>, QueryError> {
        let inverse = &self.current()?.inverse;
        Ok(points.iter().map(|&p| inverse.apply(p)).collect())
    }

    /// Per-pixel [`Self::pixel_to_tracker_frame`]. Pixels without depth come
    /// back as `None` and do not affect their neighbours.
    pub fn pixels_to_tracker_frame(
        &self,
        pixels: &[Point2<f32>],
        frame: &DepthFrameView<'_>,
    ) -> Result<Vec<Option<Point3<f32>>>, QueryError> {
        let forward = &self.current()?.forward;
        Ok(pixels
            .iter()
            .map(|&px| {
                self.real_world_point(px, frame)
                    .ok()
                    .and_then(|p| forward.apply(p))
            })
            .collect())
    }

    /// Map a tracker-frame point to `(pixel x, pixel y, depth)` in the depth
    /// image the calibration was computed on.
    pub fn tracker_to_projective(&self, p: Point3<f32>) -> Result<Point3<f32>, QueryError> {
        let calibration = self.current()?;
        let real = calibration.inverse.apply(p).ok_or(QueryError::Unmappable)?;
        let [width, height] = calibration.frame_size;
        self.model()
            .to_projective(real, width, height)
            .ok_or(QueryError::Unmappable)
    }

    /// Height of the observed surface above the marker plane at the
    /// tracker-frame location `p`.
    ///
    /// `p` is projected into `frame`, the depth there is read and the
    /// resulting point mapped back into the tracker frame; its `z` is
    /// returned.
    pub fn surface_height(
        &self,
        p: Point3<f32>,
        frame: &DepthFrameView<'_>,
    ) -> Result<f32, QueryError> {
        let projected = self.tracker_to_projective(p)?;
        let pixel = Point2::new(projected.x, projected.y);
        Ok(self.pixel_to_tracker_frame(pixel, frame)?.z)
    }
}
