//! depth-ar CLI: calibrate a depth sensor against a detected marker, fill
//! depth holes, and query calibrated points.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use depth_ar::calib::{CalibrateConfig, CalibrationReport};
use depth_ar::core::inpaint_depth;
use depth_ar::frame::{load_depth_png, save_depth_png, save_depth_preview};
use depth_ar::InpaintParams;
use nalgebra::Point2;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "depth-ar")]
#[command(about = "Register a depth sensor with a planar-marker tracker")]
#[command(version)]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace).
    #[cfg(not(feature = "tracing"))]
    #[arg(long, global = true, default_value = "info")]
    log_level: log::LevelFilter,

    /// Emit JSON log lines; filtering follows `RUST_LOG`.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate from a JSON config and write the calibration report.
    Calibrate {
        /// Path to the calibration config (JSON).
        config: PathBuf,
    },

    /// Fill the holes (zero samples) of a 16-bit depth image.
    Inpaint {
        /// Input 16-bit depth image.
        input: PathBuf,
        /// Output 16-bit depth image.
        output: PathBuf,
        /// Neighbourhood radius in pixels.
        #[arg(long)]
        radius: Option<usize>,
        /// Fill at full resolution instead of on a half-size copy.
        #[arg(long)]
        full_size: bool,
        /// Also write an 8-bit preview of the filled frame.
        #[arg(long)]
        preview: Option<PathBuf>,
    },

    /// Map a depth pixel into the tracker frame using a calibration report.
    Query {
        /// Calibration report written by `calibrate`.
        report: PathBuf,
        /// 16-bit depth image to read the depth from.
        depth: PathBuf,
        /// Pixel column.
        x: f32,
        /// Pixel row.
        y: f32,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_logging(&cli) {
        eprintln!("warning: logger not installed: {err}");
    }
    if let Err(err) = run(cli.command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) -> CliResult<()> {
    depth_ar::core::init_with_level(cli.log_level)?;
    Ok(())
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) -> CliResult<()> {
    depth_ar::core::init_tracing(cli.log_json);
    Ok(())
}

fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Calibrate { config } => run_calibrate(&config),
        Commands::Inpaint {
            input,
            output,
            radius,
            full_size,
            preview,
        } => {
            let mut params = InpaintParams {
                half_size: !full_size,
                ..InpaintParams::default()
            };
            if let Some(radius) = radius {
                params.radius = radius;
            }
            run_inpaint(&input, &output, &params, preview.as_deref())
        }
        Commands::Query {
            report,
            depth,
            x,
            y,
        } => run_query(&report, &depth, Point2::new(x, y)),
    }
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "info"))]
fn run_calibrate(config_path: &Path) -> CliResult<()> {
    let cfg = CalibrateConfig::load_json(config_path)?;
    log::info!("loading depth frame {}", cfg.depth_path);
    let frame = load_depth_png(&cfg.depth_path)?;
    log::info!("depth frame {}x{}", frame.width, frame.height);

    let detection = cfg.marker.build_detection()?;
    let mut calibrator = cfg.build_calibrator(frame.width, frame.height)?;
    let mut report = CalibrationReport::new(
        &cfg,
        config_path,
        [frame.width, frame.height],
        detection.clone(),
        *calibrator.model(),
    );

    let outcome = calibrator
        .attempt_calibration(&detection, &frame.view())
        .cloned();
    let failure = outcome.as_ref().err().map(ToString::to_string);
    match outcome {
        Ok(calibration) => {
            let size = calibration.marker_size;
            println!(
                "marker size {:.1} x {:.1} (scale {:.4})",
                size.width,
                size.height,
                size.scale_relative_to(detection.size)
            );
            report.set_calibration(calibration);
        }
        Err(err) => report.set_error(&err),
    }

    let output_path = cfg.output_path();
    report.write_json(&output_path)?;
    log::info!("report written to {}", output_path.display());

    match failure {
        Some(msg) => Err(format!("calibration failed: {msg}").into()),
        None => Ok(()),
    }
}

fn run_inpaint(
    input: &Path,
    output: &Path,
    params: &InpaintParams,
    preview: Option<&Path>,
) -> CliResult<()> {
    let frame = load_depth_png(input)?;
    let holes = frame.data.iter().filter(|&&d| d == 0).count();
    log::info!(
        "filling {holes} holes in {}x{} frame",
        frame.width,
        frame.height
    );

    let filled = inpaint_depth(&frame.view(), params);
    save_depth_png(&filled.view(), output)?;
    log::info!("filled frame written to {}", output.display());

    if let Some(path) = preview {
        save_depth_preview(&filled.view(), path)?;
        log::info!("preview written to {}", path.display());
    }
    Ok(())
}

fn run_query(report_path: &Path, depth_path: &Path, pixel: Point2<f32>) -> CliResult<()> {
    let report = CalibrationReport::load_json(report_path)?;
    let calibrator = report.restore();
    let frame = load_depth_png(depth_path)?;

    let real_world = calibrator.real_world_point(pixel, &frame.view())?;
    let tracker = calibrator.pixel_to_tracker_frame(pixel, &frame.view())?;
    let out = serde_json::json!({
        "pixel": [pixel.x, pixel.y],
        "real_world": [real_world.x, real_world.y, real_world.z],
        "tracker": [tracker.x, tracker.y, tracker.z],
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
