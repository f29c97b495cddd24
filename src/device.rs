//! # Device Module
//!
//! The [`Device`] trait is the boundary between this crate and whatever camera SDK actually
//! drives the hardware. Everything above it (the [`Camera`](crate::Camera) handle, the recorder
//! and the flow visualizer) only ever talks to a camera through this trait.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::time::Duration;

use crate::camera::{AutoExposure, ContrastMode};
use crate::error::Result;
use crate::frame::Frame;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// How long a single retrieval waits for a frame.
pub const GRAB_TIMEOUT: Duration = Duration::from_millis(1000);

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// A camera device driven by an SDK.
///
/// Parameter setters apply a single named parameter to the hardware, they do not validate values
/// beyond what the SDK itself enforces.
pub trait Device {
    /// Open the device. Calling this on an already open device does nothing.
    fn open(&mut self) -> Result<()>;

    /// Close the device. Calling this on a closed device does nothing.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    fn set_auto_exposure(&mut self, mode: AutoExposure) -> Result<()>;

    /// Set the exposure time in microseconds.
    fn set_exposure_time(&mut self, micro_sec: u32) -> Result<()>;

    fn set_gain(&mut self, gain: f64) -> Result<()>;

    fn set_image_size(&mut self, width: u32, height: u32) -> Result<()>;

    /// Enable frame rate control and set the acquisition frame rate.
    fn set_frame_rate(&mut self, fps: f64) -> Result<()>;

    fn set_contrast_mode(&mut self, mode: ContrastMode) -> Result<()>;

    fn set_contrast(&mut self, value: f64) -> Result<()>;

    /// The frame rate the device will actually deliver with the current settings.
    fn resulting_frame_rate(&self) -> Result<f64>;

    /// The current device temperature in degrees Celsius, if the device reports one.
    fn temperature(&self) -> Result<Option<f64>>;

    /// Start continuous acquisition.
    fn start_grabbing(&mut self) -> Result<()>;

    /// Stop continuous acquisition. Calling this when not grabbing does nothing.
    fn stop_grabbing(&mut self) -> Result<()>;

    fn is_grabbing(&self) -> bool;

    /// Wait up to `timeout` for the next result of a continuous acquisition.
    ///
    /// Every result returned from here must be handed back through
    /// [`release_result`](Device::release_result), otherwise the device runs out of buffers.
    fn retrieve_result(&mut self, timeout: Duration) -> Result<GrabResult>;

    /// Return the buffer backing `result` to the device.
    fn release_result(&mut self, result: GrabResult);

    /// Grab a single frame outside of continuous acquisition.
    fn grab_one(&mut self, timeout: Duration) -> Result<Frame>;
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// The outcome of one retrieval from a continuously grabbing device.
#[derive(Debug)]
pub struct GrabResult {
    /// Identifies the device buffer this result occupies.
    pub id: u64,

    /// Device timestamp of the grab
    pub timestamp: u64,

    status: GrabStatus,
}

/// Whether a retrieved result holds a usable frame.
#[derive(Debug)]
pub enum GrabStatus {
    Succeeded(Frame),

    /// The device delivered a buffer but the grab itself failed, e.g. an incomplete transfer
    Failed(String),
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl GrabResult {
    pub fn succeeded(id: u64, timestamp: u64, frame: Frame) -> Self {
        Self {
            id,
            timestamp,
            status: GrabStatus::Succeeded(frame),
        }
    }

    pub fn failed<S: Into<String>>(id: u64, timestamp: u64, reason: S) -> Self {
        Self {
            id,
            timestamp,
            status: GrabStatus::Failed(reason.into()),
        }
    }

    pub fn grab_succeeded(&self) -> bool {
        matches!(self.status, GrabStatus::Succeeded(_))
    }

    /// The grabbed frame, `None` if the grab failed.
    pub fn frame(&self) -> Option<&Frame> {
        match &self.status {
            GrabStatus::Succeeded(f) => Some(f),
            GrabStatus::Failed(_) => None,
        }
    }

    pub fn status(&self) -> &GrabStatus {
        &self.status
    }
}
