#![cfg(feature = "cli")]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use depth_ar::calib::CalibrationReport;
use depth_ar::frame::{load_depth_png, save_depth_png};
use depth_ar::DepthFrame;
use predicates::str::contains;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

fn depth_ar() -> Command {
    Command::cargo_bin("depth-ar").expect("depth-ar binary")
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// Flat 640x480 frame at depth 1000 with an optional square hole.
fn write_depth(dir: &TempDir, name: &str, hole: Option<(usize, usize, usize)>) -> PathBuf {
    let mut frame = DepthFrame::filled(640, 480, 1000);
    if let Some((x0, y0, side)) = hole {
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                frame.set(x, y, 0);
            }
        }
    }
    let path = dir.path().join(name);
    save_depth_png(&frame.view(), &path).expect("write depth png");
    path
}

fn write_config(dir: &TempDir, depth: &Path, tx: f64, ty: f64) -> (PathBuf, PathBuf) {
    let report = dir.path().join("report.json");
    let cfg = json!({
        "depth_path": path_str(depth),
        "marker": {
            "size": [100.0, 50.0],
            "homography": [[2.0, 0.0, tx], [0.0, 2.0, ty], [0.0, 0.0, 1.0]]
        },
        "projection": { "model": "pinhole", "fx": 500.0, "fy": 500.0, "cx": 320.0, "cy": 240.0 },
        "output_path": path_str(&report)
    });
    let cfg_path = dir.path().join("calibrate.json");
    fs::write(&cfg_path, serde_json::to_string_pretty(&cfg).expect("json")).expect("write cfg");
    (cfg_path, report)
}

#[test]
fn calibrate_writes_report() {
    let dir = tempdir().expect("tempdir");
    let depth = write_depth(&dir, "depth.png", Some((180, 80, 20)));
    let (cfg, report_path) = write_config(&dir, &depth, 100.0, 50.0);

    depth_ar()
        .arg("calibrate")
        .arg(&cfg)
        .assert()
        .success()
        .stdout(contains("marker size 400.0 x 200.0"));

    let report = CalibrationReport::load_json(&report_path).expect("report");
    assert!(report.error.is_none());
    assert_eq!(report.frame_size, [640, 480]);
    let calibration = report.calibration.expect("calibration stored");
    assert!((calibration.marker_size.height - 200.0).abs() < 1e-2);
    assert_eq!(calibration.samples, 50);
}

#[test]
fn calibrate_reports_out_of_bounds_marker() {
    let dir = tempdir().expect("tempdir");
    let depth = write_depth(&dir, "depth.png", None);
    let (cfg, report_path) = write_config(&dir, &depth, 500.0, 50.0);

    depth_ar()
        .arg("calibrate")
        .arg(&cfg)
        .assert()
        .failure()
        .stderr(contains("outside the 640x480 frame"));

    let report = CalibrationReport::load_json(&report_path).expect("report");
    assert!(report.calibration.is_none());
    assert!(report.error.is_some());

    depth_ar()
        .arg("query")
        .arg(&report_path)
        .arg(&depth)
        .args(["320", "240"])
        .assert()
        .failure()
        .stderr(contains("no transform yet"));
}

#[test]
fn query_maps_pixel_into_tracker_frame() {
    let dir = tempdir().expect("tempdir");
    let depth = write_depth(&dir, "depth.png", None);
    let (cfg, report_path) = write_config(&dir, &depth, 100.0, 50.0);
    depth_ar().arg("calibrate").arg(&cfg).assert().success();

    let out = depth_ar()
        .arg("query")
        .arg(&report_path)
        .arg(&depth)
        .args(["300", "150"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&out).expect("query prints JSON");
    let tracker: Vec<f64> = value["tracker"]
        .as_array()
        .expect("tracker array")
        .iter()
        .map(|v| v.as_f64().expect("number"))
        .collect();
    assert_eq!(tracker.len(), 3);
    for (got, want) in tracker.iter().zip([400.0, 200.0, 0.0]) {
        assert!((got - want).abs() < 1e-2, "tracker {tracker:?}");
    }

    let hole = write_depth(&dir, "hole.png", Some((290, 140, 20)));
    depth_ar()
        .arg("query")
        .arg(&report_path)
        .arg(&hole)
        .args(["300", "150"])
        .assert()
        .failure()
        .stderr(contains("no depth reading"));
}

#[test]
fn inpaint_fills_holes_and_writes_preview() {
    let dir = tempdir().expect("tempdir");
    let input = write_depth(&dir, "holes.png", Some((300, 200, 30)));
    let output = dir.path().join("filled.png");
    let preview = dir.path().join("preview.png");

    depth_ar()
        .arg("inpaint")
        .arg(&input)
        .arg(&output)
        .arg("--preview")
        .arg(&preview)
        .assert()
        .success();

    let filled = load_depth_png(&output).expect("filled frame");
    assert_eq!((filled.width, filled.height), (640, 480));
    assert!(filled.data.iter().all(|&d| d == 1000));
    assert!(preview.exists());
}

#[test]
fn missing_config_is_an_error() {
    let dir = tempdir().expect("tempdir");
    depth_ar()
        .arg("calibrate")
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(contains("error:"));
}
