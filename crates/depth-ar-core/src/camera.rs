//! Projective <-> real-world conversion for depth sensors, and the camera
//! parameter record loaded once at startup.

use std::{fs, path::Path};

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Conversion between the sensor's projective space (pixel + depth) and its
/// real-world 3D frame.
///
/// This is the seam to a depth-camera SDK: implementors may forward to the
/// driver's own conversion routines.
pub trait ProjectiveModel {
    /// Un-project `pixel` with raw `depth` into the real-world frame of a
    /// `width x height` sensor. A zero depth yields a degenerate point at the
    /// sensor origin; callers treat it as "no data".
    fn to_real_world(
        &self,
        pixel: Point2<f32>,
        depth: f32,
        width: usize,
        height: usize,
    ) -> Point3<f32>;

    /// Project a real-world point back to `(pixel x, pixel y, depth)`.
    /// `None` for points at or behind the sensor plane.
    fn to_projective(&self, p: Point3<f32>, width: usize, height: usize) -> Option<Point3<f32>>;
}

/// Built-in depth projection models.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum DepthProjection {
    /// Field-of-view model used by structured-light depth SDKs: `x` grows to
    /// the right, `y` grows upwards, `z` is the raw depth.
    FieldOfView {
        /// Horizontal field of view in radians.
        h_fov: f64,
        /// Vertical field of view in radians.
        v_fov: f64,
    },
    /// Pinhole intrinsics in pixels; `y` grows downwards like the image.
    Pinhole { fx: f64, fy: f64, cx: f64, cy: f64 },
}

impl DepthProjection {
    pub const KINECT_H_FOV: f64 = 1.014_468_670_750_743_8;
    pub const KINECT_V_FOV: f64 = 0.789_809_434_496_447_1;

    /// Field-of-view model with the Kinect depth sensor's factory values.
    pub fn kinect() -> Self {
        Self::FieldOfView {
            h_fov: Self::KINECT_H_FOV,
            v_fov: Self::KINECT_V_FOV,
        }
    }
}

impl Default for DepthProjection {
    fn default() -> Self {
        Self::kinect()
    }
}

impl ProjectiveModel for DepthProjection {
    fn to_real_world(
        &self,
        pixel: Point2<f32>,
        depth: f32,
        width: usize,
        height: usize,
    ) -> Point3<f32> {
        let u = pixel.x as f64;
        let v = pixel.y as f64;
        let z = depth as f64;
        match *self {
            Self::FieldOfView { h_fov, v_fov } => {
                let xz = 2.0 * (h_fov / 2.0).tan();
                let yz = 2.0 * (v_fov / 2.0).tan();
                let x = (u / width as f64 - 0.5) * z * xz;
                let y = (0.5 - v / height as f64) * z * yz;
                Point3::new(x as f32, y as f32, depth)
            }
            Self::Pinhole { fx, fy, cx, cy } => {
                let x = (u - cx) * z / fx;
                let y = (v - cy) * z / fy;
                Point3::new(x as f32, y as f32, depth)
            }
        }
    }

    fn to_projective(&self, p: Point3<f32>, width: usize, height: usize) -> Option<Point3<f32>> {
        let z = p.z as f64;
        if !z.is_finite() || z <= 0.0 {
            return None;
        }
        let (u, v) = match *self {
            Self::FieldOfView { h_fov, v_fov } => {
                let xz = 2.0 * (h_fov / 2.0).tan();
                let yz = 2.0 * (v_fov / 2.0).tan();
                let u = (p.x as f64 / (z * xz) + 0.5) * width as f64;
                let v = (0.5 - p.y as f64 / (z * yz)) * height as f64;
                (u, v)
            }
            Self::Pinhole { fx, fy, cx, cy } => {
                let u = p.x as f64 * fx / z + cx;
                let v = p.y as f64 * fy / z + cy;
                (u, v)
            }
        };
        Some(Point3::new(u as f32, v as f32, p.z))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CameraParamsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("camera matrix has invalid focal lengths (fx={fx}, fy={fy})")]
    InvalidFocalLength { fx: f64, fy: f64 },
}

/// Camera intrinsics as stored on disk: a 3x3 `camera_matrix` (row-major)
/// and lens `distortion_coefficients`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraParams {
    pub camera_matrix: [[f64; 3]; 3],
    #[serde(default)]
    pub distortion_coefficients: Vec<f64>,
}

impl CameraParams {
    /// Load a JSON parameter file from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CameraParamsError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this record to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CameraParamsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn fx(&self) -> f64 {
        self.camera_matrix[0][0]
    }

    pub fn fy(&self) -> f64 {
        self.camera_matrix[1][1]
    }

    /// Pinhole projection using the stored principal point.
    ///
    /// Distortion is not modelled: the depth stream is assumed to be
    /// registered and undistorted by the driver.
    pub fn pinhole(&self) -> Result<DepthProjection, CameraParamsError> {
        let (fx, fy) = (self.fx(), self.fy());
        if !fx.is_finite() || !fy.is_finite() || fx <= 0.0 || fy <= 0.0 {
            return Err(CameraParamsError::InvalidFocalLength { fx, fy });
        }
        if self.distortion_coefficients.iter().any(|&k| k != 0.0) {
            log::debug!(
                "ignoring {} distortion coefficients for depth un-projection",
                self.distortion_coefficients.len()
            );
        }
        Ok(DepthProjection::Pinhole {
            fx,
            fy,
            cx: self.camera_matrix[0][2],
            cy: self.camera_matrix[1][2],
        })
    }

    /// Pinhole projection with the principal point forced to the center of a
    /// `width x height` frame.
    pub fn centered_pinhole(
        &self,
        width: usize,
        height: usize,
    ) -> Result<DepthProjection, CameraParamsError> {
        match self.pinhole()? {
            DepthProjection::Pinhole { fx, fy, .. } => Ok(DepthProjection::Pinhole {
                fx,
                fy,
                cx: width as f64 / 2.0,
                cy: height as f64 / 2.0,
            }),
            other => Ok(other),
        }
    }
}
