//! # Camera recording and optical flow
//!
//! This crate configures a camera, records its frames to video files, and visualises sparse
//! optical flow on its live feed.
//! Cameras are accessed through the [`Device`] trait. A V4L2 implementation is provided using
//! [`rscam`](https://github.com/loyd/rscam), therefore currently only Linux is supported out of the
//! box. Videos are encoded by piping raw frames into `ffmpeg`.
//!
//! ## Dependencies
//!
//! Before installing make sure that the following dependencies are installed:
//!
//! - V4L2 - video for linux 2, including the dev headers
//! - ffmpeg, available on the `PATH`
//!
//! ### Ubuntu
//!
//! ```shell
//! sudo apt install v4l-utils libv4l-dev ffmpeg
//! ```
//!
//! ## Usage
//!
//! Cameras are configured through a builder API on [`Camera`]:
//!
//! ```rust,ignore
//! let camera = Camera::new(V4l2Device::new("/dev/video0"))
//!     // Make sure the device is open
//!     .open()?
//!     // Exposure time is only applied with auto exposure off
//!     .set_auto_exposure(AutoExposure::Off)?
//!     .set_exposure_time(20000)?
//!     .set_gain(0.0)?
//!     .set_image_size(1280, 720)?
//!     .set_frame_rate(30.0)?;
//! ```
//!
//! The configured camera is then handed to a [`Recorder`]:
//!
//! ```rust,ignore
//! let summary = Recorder::new(
//!         camera,
//!         Output::File("data/video/output.mp4".into()),
//!         RecordMode::Duration(Duration::from_secs(2)),
//!         FfmpegSink::open,
//!     )
//!     .interrupt(Interrupt::install())
//!     .record()?;
//! ```
//!
//! or to a [`FlowVisualizer`] to show tracked corners in a window.

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use camera::{AutoExposure, Camera, CameraParams, ContrastMode, Grab};
pub use config::{AppConfig, FlowConfig, ModeKind, VideoConfig, DEFAULT_CONFIG_PATH};
pub use device::{Device, GrabResult, GrabStatus, GRAB_TIMEOUT};
pub use error::{Error, Result};
pub use frame::{bgr_to_mat, gray_to_mat, mat_to_bgr, BgrImage, Frame};
pub use interrupt::Interrupt;
pub use recorder::{Output, RecordMode, Recorder, RecordingSummary};
pub use sink::{FfmpegSink, SinkParams, VideoSink};
pub use v4l2::V4l2Device;
pub use visualizer::{Display, DisplayEvent, FlowSummary, FlowVisualizer, MinifbDisplay};

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

mod camera;
mod config;
mod device;
mod error;
mod frame;
mod interrupt;
mod recorder;
mod sink;
mod v4l2;
mod visualizer;

pub mod flow;

pub mod prelude {
    pub use crate::{AutoExposure, Camera, ContrastMode, Device, Frame};
    pub use crate::{FfmpegSink, Output, RecordMode, Recorder, VideoSink};
    pub use crate::{FlowVisualizer, Interrupt, MinifbDisplay, V4l2Device};
}
