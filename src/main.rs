//! # `cv-camrecord`
//!
//! Records a V4L2 camera to video files, or shows live sparse optical flow, using the settings
//! in a configuration file.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use cv_camrecord::prelude::*;
use cv_camrecord::{AppConfig, Result, VideoConfig, DEFAULT_CONFIG_PATH};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Configuration file
    #[arg(short, long, value_name = "FILE_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record the camera to video
    Record {
        /// Record a single file of this many seconds
        #[arg(long, value_name = "SECS", conflicts_with = "segment")]
        duration: Option<f64>,

        /// Start a new file every this many seconds until interrupted
        #[arg(long, value_name = "SECS")]
        segment: Option<f64>,
    },

    /// Show sparse optical flow on the live feed
    Flow,
}

// -----------------------------------------------------------------------------------------------
// MAIN
// -----------------------------------------------------------------------------------------------

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    let cfg = AppConfig::from_file(&args.config)?;
    let camera = build_camera(&cfg.video)?;
    let interrupt = Interrupt::install();

    match args.command {
        Command::Record { duration, segment } => {
            let mode = record_mode(duration, segment, &cfg.video)?;

            let summary = Recorder::new(camera, cfg.video.output(), mode, FfmpegSink::open)
                .fourcc(&cfg.video.fourcc)
                .interrupt(interrupt)
                .record()?;

            for file in summary.files.iter() {
                println!("Video saved to: {}", file.display());
            }
        }
        Command::Flow => {
            let summary = FlowVisualizer::new(
                camera,
                MinifbDisplay::new(),
                cfg.flow.corner_params(),
                cfg.flow.lk_params(),
            )
            .interrupt(interrupt)
            .run()?;

            info!("Showed {} frames", summary.frames);
        }
    }

    Ok(())
}

/// The recording mode from the command line flags, falling back to the configuration file.
fn record_mode(
    duration: Option<f64>,
    segment: Option<f64>,
    cfg: &VideoConfig,
) -> Result<RecordMode> {
    match (duration, segment) {
        (Some(d), _) => RecordMode::duration_secs(d),
        (None, Some(s)) => RecordMode::segmented_secs(s),
        (None, None) => cfg.record_mode(),
    }
}

/// Open the configured camera and apply the video settings to it.
fn build_camera(cfg: &VideoConfig) -> Result<Camera<V4l2Device>> {
    let device = V4l2Device::new(&cfg.device).format(cfg.format.as_bytes())?;

    Camera::new(device).open()?.configure(cfg)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
