//! # Configuration Module
//!
//! The configuration file read by the entry points. Any format supported by
//! [`serde_any`](https://docs.rs/serde_any/0.5.0/serde_any/) can be used, the format is guessed
//! from the file extension. Every key is optional and falls back to a fixed default.
//!
//! ```yaml
//! video:
//!   out: data/video/output.mp4
//!   fps: 30
//!   width: 1280
//!   height: 720
//!   exposure: 20000
//!   gain: 0.0
//!   auto_exposure: "Off"
//!   contrast_mode: Linear
//!   contrast: 1
//!   mode: duration
//!   duration_secs: 2
//! ```

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_any;

use crate::camera::{AutoExposure, ContrastMode};
use crate::error::{Error, Result};
use crate::flow::{CornerParams, LkParams};
use crate::recorder::{Output, RecordMode};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// The whole configuration file.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub video: VideoConfig,

    pub flow: FlowConfig,
}

/// Camera and recording settings, the `video` section.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoConfig {
    /// Output file, used when `out_dir` is not set
    pub out: PathBuf,

    /// Directory output files are written to, named after the time using `filename_format`
    pub out_dir: Option<PathBuf>,

    /// `strftime` format of generated file names
    pub filename_format: String,

    /// Camera device path
    pub device: PathBuf,

    /// FourCC pixel format requested from the camera
    pub format: String,

    /// FourCC codec tag of the output video
    pub fourcc: String,

    pub fps: f64,
    pub width: u32,
    pub height: u32,

    /// Exposure time in microseconds
    pub exposure: u32,

    pub gain: f64,
    pub auto_exposure: AutoExposure,
    pub contrast_mode: ContrastMode,
    pub contrast: f64,

    pub mode: ModeKind,

    /// Length of a recording in `duration` mode, or of each file in `segmented` mode
    pub duration_secs: f64,
}

/// Optical flow settings, the `flow` section.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlowConfig {
    pub max_corners: usize,
    pub quality_level: f32,
    pub min_distance: f32,
    pub block_size: usize,

    /// Side length of the tracking window in pixels
    pub window: usize,

    pub max_level: usize,
    pub max_iterations: usize,
    pub epsilon: f32,
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// How a recording is terminated, see [`RecordMode`].
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    UntilInterrupt,
    Duration,
    Segmented,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl AppConfig {
    /// Load the configuration from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Check the file exists
        if !path.as_ref().is_file() {
            return Err(Error::FileNotFound(path.as_ref().to_path_buf()));
        }

        serde_any::from_file(path).map_err(Error::DeserialisationError)
    }
}

impl VideoConfig {
    /// The recording mode described by `mode` and `duration_secs`.
    ///
    /// `duration_secs` must be a positive number of seconds unless recording until interrupted.
    pub fn record_mode(&self) -> Result<RecordMode> {
        match self.mode {
            ModeKind::UntilInterrupt => Ok(RecordMode::UntilInterrupt),
            ModeKind::Duration => RecordMode::duration_secs(self.duration_secs),
            ModeKind::Segmented => RecordMode::segmented_secs(self.duration_secs),
        }
    }

    /// Where recorded files are written.
    pub fn output(&self) -> Output {
        match &self.out_dir {
            Some(dir) => Output::Timestamped {
                dir: dir.clone(),
                format: self.filename_format.clone(),
            },
            None => Output::File(self.out.clone()),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            out: PathBuf::from("data/video/output.mp4"),
            out_dir: None,
            filename_format: String::from("%Y%m%d_%H%M%S.mp4"),
            device: PathBuf::from("/dev/video0"),
            format: String::from("MJPG"),
            fourcc: String::from("mp4v"),
            fps: 30.0,
            width: 1280,
            height: 720,
            exposure: 20000,
            gain: 0.0,
            auto_exposure: AutoExposure::Continuous,
            contrast_mode: ContrastMode::Linear,
            contrast: 1.1,
            mode: ModeKind::UntilInterrupt,
            duration_secs: 60.0,
        }
    }
}

impl FlowConfig {
    pub fn corner_params(&self) -> CornerParams {
        CornerParams {
            max_corners: self.max_corners,
            quality_level: self.quality_level,
            min_distance: self.min_distance,
            block_size: self.block_size,
        }
    }

    pub fn lk_params(&self) -> LkParams {
        LkParams {
            window: self.window,
            max_level: self.max_level,
            max_iterations: self.max_iterations,
            epsilon: self.epsilon,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        let corners = CornerParams::default();
        let lk = LkParams::default();

        Self {
            max_corners: corners.max_corners,
            quality_level: corners.quality_level,
            min_distance: corners.min_distance,
            block_size: corners.block_size,
            window: lk.window,
            max_level: lk.max_level,
            max_iterations: lk.max_iterations,
            epsilon: lk.epsilon,
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
