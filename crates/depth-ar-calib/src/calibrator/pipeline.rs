use depth_ar_core::{
    fit_affine_transform, inpaint_depth, DepthFrameView, DepthProjection, ProjectiveModel,
    Transform3,
};
use nalgebra::Point3;

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{Calibration, CalibrationError, CalibratorParams, MarkerPhysicalSize};
use crate::detection::MarkerDetection;
use crate::sampling::{unproject, CalibrationSample};

/// Depth-sensor to tracker calibrator.
///
/// Holds at most one [`Calibration`]. A new one is only stored after every
/// step of an attempt has succeeded, so readers never see a half-updated
/// forward/inverse pair. Attempts take `&mut self` and queries take `&self`;
/// share a calibrator across threads behind an `RwLock` if needed.
#[derive(Clone, Debug)]
pub struct Calibrator<M = DepthProjection> {
    model: M,
    params: CalibratorParams,
    state: Option<Calibration>,
}

impl Default for Calibrator<DepthProjection> {
    fn default() -> Self {
        Self::new(DepthProjection::default(), CalibratorParams::default())
    }
}

impl<M: ProjectiveModel> Calibrator<M> {
    /// Create an uncalibrated calibrator using `model` for un-projection.
    pub fn new(model: M, mut params: CalibratorParams) -> Self {
        params.grid_cols = params.grid_cols.max(2);
        params.grid_rows = params.grid_rows.max(2);
        Self {
            model,
            params,
            state: None,
        }
    }

    /// Restore a previously computed calibration.
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.state = Some(calibration);
        self
    }

    #[inline]
    pub fn model(&self) -> &M {
        &self.model
    }

    #[inline]
    pub fn params(&self) -> &CalibratorParams {
        &self.params
    }

    #[inline]
    pub fn is_calibrated(&self) -> bool {
        self.state.is_some()
    }

    /// Latest successful calibration, if any.
    #[inline]
    pub fn calibration(&self) -> Option<&Calibration> {
        self.state.as_ref()
    }

    /// Forward transform (real world -> tracker); `None` until calibrated.
    pub fn transform(&self) -> Option<&Transform3> {
        self.state.as_ref().map(|c| &c.forward)
    }

    /// Inverse transform (tracker -> real world); `None` until calibrated.
    pub fn inverse_transform(&self) -> Option<&Transform3> {
        self.state.as_ref().map(|c| &c.inverse)
    }

    pub fn marker_size(&self) -> Option<MarkerPhysicalSize> {
        self.state.as_ref().map(|c| c.marker_size)
    }

    /// Run one calibration attempt and store the result on success.
    ///
    /// On error the previously stored calibration is left untouched.
    pub fn attempt_calibration(
        &mut self,
        detection: &MarkerDetection,
        frame: &DepthFrameView<'_>,
    ) -> Result<&Calibration, CalibrationError> {
        match self.calibrate(detection, frame) {
            Ok(calibration) => {
                log::info!(
                    "marker size {:.1}x{:.1} (measured width {:.1})",
                    calibration.marker_size.width,
                    calibration.marker_size.height,
                    calibration.marker_size.measured_width
                );
                Ok(&*self.state.insert(calibration))
            }
            Err(err) => {
                log::warn!("calibration attempt rejected: {err}");
                Err(err)
            }
        }
    }

    /// Compute a calibration from one detection and the depth frame captured
    /// with it, without touching the stored state.
    ///
    /// Depth lookups go through a hole-filled scratch copy of `frame` that is
    /// dropped before returning.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, detection, frame), fields(width = frame.width, height = frame.height))
    )]
    pub fn calibrate(
        &self,
        detection: &MarkerDetection,
        frame: &DepthFrameView<'_>,
    ) -> Result<Calibration, CalibrationError> {
        if frame.is_empty() {
            return Err(CalibrationError::EmptyFrame);
        }
        let (width, height) = (frame.width, frame.height);
        let image_corners = detection.image_corners();
        for (corner, p) in image_corners.iter().enumerate() {
            if !frame.contains(*p) {
                return Err(CalibrationError::OutOfBounds {
                    corner,
                    x: p.x,
                    y: p.y,
                    width,
                    height,
                });
            }
        }

        let filled = inpaint_depth(frame, &self.params.inpaint);
        let filled = filled.view();

        let mut corners = [Point3::origin(); 4];
        for (dst, &p) in corners.iter_mut().zip(&image_corners) {
            *dst = unproject(&self.model, &filled, p)?;
        }
        let marker_size = MarkerPhysicalSize::from_corners(&corners, detection.size)?;

        let sample = CalibrationSample::collect(
            &self.model,
            detection,
            marker_size.extent(),
            &filled,
            self.params.grid_cols,
            self.params.grid_rows,
        )?;
        log::debug!("collected {} correspondences", sample.len());

        let (forward, inverse) = face_sensor(
            fit_affine_transform(&sample.real_world, &sample.tracker)?,
            fit_affine_transform(&sample.tracker, &sample.real_world)?,
        );
        let forward_rms = forward.rms_error(&sample.real_world, &sample.tracker);
        let inverse_rms = inverse.rms_error(&sample.tracker, &sample.real_world);
        log::debug!("forward transform {:?} (rms {forward_rms:?})", forward.to_array());
        log::debug!("inverse transform {:?} (rms {inverse_rms:?})", inverse.to_array());

        Ok(Calibration {
            forward,
            inverse,
            marker_size,
            corners,
            frame_size: [width, height],
            samples: sample.len(),
            forward_rms,
            inverse_rms,
        })
    }
}

/// Orient tracker `+z` from the marker plane toward the sensor, which sits at
/// the real-world origin, whatever the handedness of the projection model.
///
/// Both fits are flipped through the tracker plane independently when needed;
/// points on the marker plane are unaffected.
fn face_sensor(forward: Transform3, inverse: Transform3) -> (Transform3, Transform3) {
    let flip = Transform3::flip_z();
    let forward = match forward.apply(Point3::origin()) {
        Some(sensor) if sensor.z < 0.0 => flip.compose(&forward),
        _ => forward,
    };
    let base = inverse.apply(Point3::origin());
    let up = inverse.apply(Point3::new(0.0, 0.0, 1.0));
    let inverse = match (base, up) {
        // Moving up must bring the point closer to the sensor.
        (Some(base), Some(up)) if (up - base).dot(&base.coords) > 0.0 => inverse.compose(&flip),
        _ => inverse,
    };
    (forward, inverse)
}
