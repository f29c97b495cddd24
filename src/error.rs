//! # `cv_camrecord` Error module
//!
//! Provides abstractions over errors which can occur during this crate's use.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::PathBuf;
use std::time::Duration;

use serde_any;
use thiserror;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Result type used by faillible functions inside the `cv_camrecord` crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents errors which can occur during use of the `cv_camrecord` crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Config file not found: {0:?}")]
    FileNotFound(PathBuf),

    #[error("Error deserialising data: {0}")]
    DeserialisationError(serde_any::Error),

    #[error("Camera parameter {0} has not been configured")]
    MissingParameter(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Camera device error: {0}")]
    DeviceError(String),

    #[error("Camera device is not open")]
    DeviceNotOpen,

    #[error("Grab timed out after {0:?}")]
    AcquisitionTimeout(Duration),

    #[error("Grab failed: {0}")]
    AcquisitionFailed(String),

    #[error("Error capturing camera image: {0}")]
    CameraCaptureError(std::io::Error),

    #[error("Error occured while converting an image: {0}")]
    ImageConversionError(image::ImageError),

    #[error("VideoWriter could not be opened: {path:?} ({reason})")]
    SinkOpen { path: PathBuf, reason: String },

    #[error("Error writing frame to the video sink: {0}")]
    SinkWrite(std::io::Error),

    #[error("Frame of size {got:?} does not match the sink size {expected:?}")]
    FrameSizeMismatch { expected: (u32, u32), got: (u32, u32) },

    #[error("Display error: {0}")]
    DisplayError(String),

    #[error("Unexpected image layout: {0}")]
    ImageLayout(String),

    #[error("OpenCV error: {0}")]
    VisionError(#[from] opencv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
