//! JSON configuration and report helpers for calibration runs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use depth_ar_core::{CameraParams, CameraParamsError, DepthProjection, Homography};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::{
    Calibration, CalibrationError, Calibrator, CalibratorParams, MarkerDetection,
    MarkerDetectionError,
};

#[derive(thiserror::Error, Debug)]
pub enum CalibIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum CalibConfigError {
    #[error(transparent)]
    Marker(#[from] MarkerDetectionError),
    #[error("marker needs either a homography or four corners")]
    MissingMarkerGeometry,
    #[error(transparent)]
    CameraParams(#[from] CameraParamsError),
}

/// Marker detection as written in a config file.
///
/// When both are present the homography wins over the corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Working `[width, height]` used by the tracker.
    pub size: [f32; 2],
    #[serde(default)]
    pub homography: Option<Homography>,
    /// Image corners `[x, y]` in TL, TR, BR, BL order.
    #[serde(default)]
    pub corners: Option<[[f32; 2]; 4]>,
}

impl MarkerConfig {
    pub fn build_detection(&self) -> Result<MarkerDetection, CalibConfigError> {
        if let Some(h) = self.homography {
            return Ok(MarkerDetection::new(self.size, h)?);
        }
        let corners = self
            .corners
            .ok_or(CalibConfigError::MissingMarkerGeometry)?;
        Ok(MarkerDetection::from_corners(
            self.size,
            corners.map(|[x, y]| Point2::new(x, y)),
        )?)
    }
}

/// Configuration for one calibration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrateConfig {
    /// 16-bit depth image captured with the detection.
    pub depth_path: String,
    pub marker: MarkerConfig,
    /// Explicit un-projection model; takes precedence over `camera_params_path`.
    #[serde(default)]
    pub projection: Option<DepthProjection>,
    /// JSON camera parameters used to build a pinhole model.
    #[serde(default)]
    pub camera_params_path: Option<String>,
    /// Force the pinhole principal point to the frame center.
    #[serde(default)]
    pub center_principal_point: bool,
    #[serde(default)]
    pub params: CalibratorParams,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl CalibrateConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("depth_ar_calibration.json"))
    }

    /// Pick the un-projection model for a `width x height` depth frame:
    /// the explicit projection, else a pinhole built from the camera
    /// parameters, else the default field-of-view model.
    pub fn build_projection(
        &self,
        width: usize,
        height: usize,
    ) -> Result<DepthProjection, CalibConfigError> {
        if let Some(projection) = self.projection {
            return Ok(projection);
        }
        let Some(path) = self.camera_params_path.as_ref() else {
            return Ok(DepthProjection::default());
        };
        let camera = CameraParams::load_json(path)?;
        let projection = if self.center_principal_point {
            camera.centered_pinhole(width, height)?
        } else {
            camera.pinhole()?
        };
        Ok(projection)
    }

    /// Build a calibrator for a `width x height` depth frame.
    pub fn build_calibrator(
        &self,
        width: usize,
        height: usize,
    ) -> Result<Calibrator, CalibConfigError> {
        let projection = self.build_projection(width, height)?;
        Ok(Calibrator::new(projection, self.params.clone()))
    }
}

/// Outcome of one calibration run, restorable into a [`Calibrator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub depth_path: String,
    pub config_path: String,
    pub frame_size: [usize; 2],
    pub marker: MarkerDetection,
    pub projection: DepthProjection,
    pub params: CalibratorParams,
    #[serde(default)]
    pub calibration: Option<Calibration>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CalibrationReport {
    /// Build a base report for a run; neither result nor error is set yet.
    pub fn new(
        cfg: &CalibrateConfig,
        config_path: &Path,
        frame_size: [usize; 2],
        marker: MarkerDetection,
        projection: DepthProjection,
    ) -> Self {
        Self {
            depth_path: cfg.depth_path.clone(),
            config_path: config_path.to_string_lossy().into_owned(),
            frame_size,
            marker,
            projection,
            params: cfg.params.clone(),
            calibration: None,
            error: None,
        }
    }

    /// Record a successful calibration.
    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.calibration = Some(calibration);
        self.error = None;
    }

    /// Record a failed attempt.
    pub fn set_error(&mut self, err: &CalibrationError) {
        self.error = Some(err.to_string());
    }

    /// Rebuild the calibrator this report was produced with; uncalibrated if
    /// the run failed.
    pub fn restore(&self) -> Calibrator {
        let calibrator = Calibrator::new(self.projection, self.params.clone());
        match self.calibration.clone() {
            Some(calibration) => calibrator.with_calibration(calibration),
            None => calibrator,
        }
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn config_defaults_and_marker_geometry() {
        let json = r#"{
            "depth_path": "depth.png",
            "marker": {
                "size": [100.0, 50.0],
                "corners": [[100.0, 50.0], [300.0, 50.0], [300.0, 150.0], [100.0, 150.0]]
            }
        }"#;
        let cfg: CalibrateConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(cfg.params, CalibratorParams::default());
        assert_eq!(cfg.output_path(), PathBuf::from("depth_ar_calibration.json"));
        assert_eq!(
            cfg.build_projection(640, 480).expect("default model"),
            DepthProjection::kinect()
        );

        let det = cfg.marker.build_detection().expect("corners fit");
        let p = det.homography.apply(Point2::new(50.0, 25.0));
        assert!((p.x - 200.0).abs() < 1e-2 && (p.y - 100.0).abs() < 1e-2);

        let missing = MarkerConfig {
            size: [1.0, 1.0],
            homography: None,
            corners: None,
        };
        assert!(matches!(
            missing.build_detection(),
            Err(CalibConfigError::MissingMarkerGeometry)
        ));
    }

    #[test]
    fn camera_params_build_a_centered_pinhole() {
        let dir = tempdir().expect("tempdir");
        let cam_path = dir.path().join("camera.json");
        CameraParams {
            camera_matrix: [[570.0, 0.0, 300.0], [0.0, 570.0, 250.0], [0.0, 0.0, 1.0]],
            distortion_coefficients: vec![0.0; 5],
        }
        .write_json(&cam_path)
        .expect("write camera params");

        let cfg = CalibrateConfig {
            depth_path: "depth.png".to_string(),
            marker: MarkerConfig {
                size: [100.0, 50.0],
                homography: Some(Homography::identity()),
                corners: None,
            },
            projection: None,
            camera_params_path: Some(cam_path.to_string_lossy().into_owned()),
            center_principal_point: true,
            params: CalibratorParams::default(),
            output_path: None,
        };
        assert_eq!(
            cfg.build_projection(640, 480).expect("pinhole"),
            DepthProjection::Pinhole {
                fx: 570.0,
                fy: 570.0,
                cx: 320.0,
                cy: 240.0
            }
        );

        let cfg_path = dir.path().join("config.json");
        cfg.write_json(&cfg_path).expect("write config");
        let back = CalibrateConfig::load_json(&cfg_path).expect("load config");
        assert_eq!(back.marker, cfg.marker);
        assert!(back.center_principal_point);
    }

    #[test]
    fn failed_report_restores_an_uncalibrated_calibrator() {
        let cfg = CalibrateConfig {
            depth_path: "depth.png".to_string(),
            marker: MarkerConfig {
                size: [10.0, 10.0],
                homography: Some(Homography::identity()),
                corners: None,
            },
            projection: None,
            camera_params_path: None,
            center_principal_point: false,
            params: CalibratorParams::default(),
            output_path: None,
        };
        let det = cfg.marker.build_detection().expect("identity homography");
        let mut report = CalibrationReport::new(
            &cfg,
            Path::new("config.json"),
            [640, 480],
            det,
            DepthProjection::kinect(),
        );
        report.set_error(&CalibrationError::EmptyFrame);
        assert_eq!(report.error.as_deref(), Some("depth frame is empty"));
        assert!(!report.restore().is_calibrated());
    }
}
