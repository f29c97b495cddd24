//! # Camera Module
//!
//! This module provides the camera handle, which wraps a [`Device`] and records every parameter
//! applied to it. The handle is configured through a chainable builder API:
//!
//! ```rust,ignore
//! let camera = Camera::new(V4l2Device::new("/dev/video0"))
//!     .open()?
//!     .set_auto_exposure(AutoExposure::Off)?
//!     .set_exposure_time(20000)?
//!     .set_image_size(1280, 720)?
//!     .set_frame_rate(30.0)?;
//! ```

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::ops::Deref;
use std::time::Duration;

use derive_more::Display;
use log::debug;
use serde::Deserialize;

use crate::config::VideoConfig;
use crate::device::{Device, GrabResult};
use crate::error::{Error, Result};
use crate::frame::Frame;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Every parameter that has been applied to a camera. Unset parameters are `None`, the last
/// value written for a parameter wins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraParams {
    pub auto_exposure: Option<AutoExposure>,

    /// Exposure time in microseconds
    pub exposure_time: Option<u32>,

    pub gain: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub contrast_mode: Option<ContrastMode>,
    pub contrast: Option<f64>,
}

/// Handle to a camera device along with the parameters applied to it.
pub struct Camera<D: Device> {
    device: D,

    params: CameraParams,
}

/// A result retrieved from a grabbing camera.
///
/// The result is handed back to the device when this guard is dropped. As the guard borrows the
/// camera mutably, a result is always released before the next one can be retrieved.
pub struct Grab<'a, D: Device> {
    device: &'a mut D,

    result: Option<GrabResult>,
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Automatic exposure mode of the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Display)]
pub enum AutoExposure {
    /// Exposure time is set manually
    Off,

    /// The camera continuously adjusts the exposure time
    Continuous,
}

/// Contrast enhancement curve applied by the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Display)]
pub enum ContrastMode {
    Linear,

    #[serde(rename = "SCurve")]
    SCurve,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl CameraParams {
    /// Get the configured image size, failing if either dimension is missing.
    pub fn image_size(&self) -> Result<(u32, u32)> {
        let width = self.width.ok_or(Error::MissingParameter("width"))?;
        let height = self.height.ok_or(Error::MissingParameter("height"))?;

        Ok((width, height))
    }
}

impl<D: Device> Camera<D> {
    /// Create a new handle around the device. The device is not opened.
    pub fn new(device: D) -> Self {
        Self {
            device,
            params: CameraParams::default(),
        }
    }

    /// Ensure the device is open.
    pub fn open(mut self) -> Result<Self> {
        self.open_mut()?;

        Ok(self)
    }

    /// Ensure the device is closed.
    pub fn close(mut self) -> Result<Self> {
        self.close_mut()?;

        Ok(self)
    }

    pub(crate) fn open_mut(&mut self) -> Result<()> {
        if !self.device.is_open() {
            self.device.open()?;
            debug!("Camera opened");
        }

        Ok(())
    }

    pub(crate) fn close_mut(&mut self) -> Result<()> {
        if self.device.is_open() {
            self.device.close()?;
            debug!("Camera closed");
        }

        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.device.is_open()
    }

    /// Apply every camera setting from a video configuration.
    pub fn configure(self, cfg: &VideoConfig) -> Result<Self> {
        self.set_auto_exposure(cfg.auto_exposure)?
            .set_contrast_mode(cfg.contrast_mode)?
            .set_contrast(cfg.contrast)?
            .set_exposure_time(cfg.exposure)?
            .set_gain(cfg.gain)?
            .set_image_size(cfg.width, cfg.height)?
            .set_frame_rate(cfg.fps)
    }

    pub fn set_auto_exposure(mut self, mode: AutoExposure) -> Result<Self> {
        self.device.set_auto_exposure(mode)?;
        self.params.auto_exposure = Some(mode);

        Ok(self)
    }

    /// Set the exposure time in microseconds.
    ///
    /// Only applied when auto exposure is off (or has never been set), otherwise the call is
    /// skipped and the recorded exposure time is left untouched.
    pub fn set_exposure_time(mut self, micro_sec: u32) -> Result<Self> {
        match self.params.auto_exposure.unwrap_or(AutoExposure::Off) {
            AutoExposure::Off => {
                self.device.set_auto_exposure(AutoExposure::Off)?;
                self.device.set_exposure_time(micro_sec)?;
                self.params.exposure_time = Some(micro_sec);
            }
            AutoExposure::Continuous => {
                debug!(
                    "Auto exposure is continuous, ignoring exposure time of {} us",
                    micro_sec
                );
            }
        }

        Ok(self)
    }

    pub fn set_gain(mut self, gain: f64) -> Result<Self> {
        self.device.set_gain(gain)?;
        self.params.gain = Some(gain);

        Ok(self)
    }

    pub fn set_image_size(mut self, width: u32, height: u32) -> Result<Self> {
        self.device.set_image_size(width, height)?;
        self.params.width = Some(width);
        self.params.height = Some(height);

        Ok(self)
    }

    pub fn set_frame_rate(mut self, fps: f64) -> Result<Self> {
        self.device.set_frame_rate(fps)?;
        self.params.fps = Some(fps);

        Ok(self)
    }

    pub fn set_contrast_mode(mut self, mode: ContrastMode) -> Result<Self> {
        self.device.set_contrast_mode(mode)?;
        self.params.contrast_mode = Some(mode);

        Ok(self)
    }

    pub fn set_contrast(mut self, value: f64) -> Result<Self> {
        self.device.set_contrast(value)?;
        self.params.contrast = Some(value);

        Ok(self)
    }

    /// The frame rate the camera actually delivers.
    pub fn frame_rate(&self) -> Result<f64> {
        self.device.resulting_frame_rate()
    }

    pub fn temperature(&self) -> Result<Option<f64>> {
        self.device.temperature()
    }

    /// The parameters applied so far.
    pub fn params(&self) -> &CameraParams {
        &self.params
    }

    /// Grab a single frame, waiting at most `timeout`.
    pub fn grab_one(&mut self, timeout: Duration) -> Result<Frame> {
        if !self.device.is_open() {
            return Err(Error::DeviceNotOpen);
        }

        self.device.grab_one(timeout)
    }

    /// Start continuous acquisition if it is not already running.
    pub fn start_grabbing(&mut self) -> Result<()> {
        if !self.device.is_open() {
            return Err(Error::DeviceNotOpen);
        }

        if !self.device.is_grabbing() {
            self.device.start_grabbing()?;
        }

        Ok(())
    }

    /// Stop continuous acquisition if it is running.
    pub fn stop_grabbing(&mut self) -> Result<()> {
        if self.device.is_grabbing() {
            self.device.stop_grabbing()?;
        }

        Ok(())
    }

    pub fn is_grabbing(&self) -> bool {
        self.device.is_grabbing()
    }

    /// Retrieve the next result of a continuous acquisition, waiting at most `timeout`.
    pub fn retrieve(&mut self, timeout: Duration) -> Result<Grab<'_, D>> {
        let result = self.device.retrieve_result(timeout)?;

        Ok(Grab {
            device: &mut self.device,
            result: Some(result),
        })
    }

    /// Borrow the underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Consume the handle, returning the device.
    pub fn into_device(self) -> D {
        self.device
    }
}

impl<'a, D: Device> Deref for Grab<'a, D> {
    type Target = GrabResult;

    fn deref(&self) -> &GrabResult {
        // Only ever taken in drop
        self.result.as_ref().expect("grab result already released")
    }
}

impl<'a, D: Device> Drop for Grab<'a, D> {
    fn drop(&mut self) {
        if let Some(result) = self.result.take() {
            self.device.release_result(result);
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
