//! # V4L2 Device Module
//!
//! A [`Device`] backed by [`rscam`](https://github.com/loyd/rscam), giving access to any camera
//! exposed over Video4Linux2.
//!
//! V4L2 has no notion of a contrast curve or a temperature sensor, so the contrast mode is only
//! recorded and [`temperature`](Device::temperature) always returns `None`. Image size and frame
//! rate are part of the stream format and only take effect when grabbing starts.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::{GrayImage, ImageFormat};
use log::{debug, warn};
use rscam::{Camera as RsCamera, Config};

use crate::camera::{AutoExposure, ContrastMode};
use crate::device::{Device, GrabResult};
use crate::error::{Error, Result};
use crate::frame::Frame;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// `V4L2_EXPOSURE_MANUAL`
const EXPOSURE_MANUAL: i32 = 1;

/// `V4L2_EXPOSURE_APERTURE_PRIORITY`, the continuous auto exposure mode most UVC cameras support
const EXPOSURE_APERTURE_PRIORITY: i32 = 3;

/// V4L2 expresses absolute exposure in units of 100 us.
const EXPOSURE_UNIT_US: u32 = 100;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A V4L2 camera, such as `/dev/video0`.
pub struct V4l2Device {
    path: PathBuf,

    camera: Option<RsCamera>,

    /// FourCC pixel format requested from the driver
    format: [u8; 4],

    resolution: (u32, u32),
    fps: f64,
    num_buffers: u32,

    grabbing: bool,
    next_id: u64,

    /// The driver buffer behind the result that is currently checked out
    pending: Option<(u64, rscam::Frame)>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl V4l2Device {
    /// Create a device for the camera at `path`. The camera is not opened.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            camera: None,
            format: *b"MJPG",
            resolution: (640, 480),
            fps: 10.0,
            num_buffers: 2,
            grabbing: false,
            next_id: 0,
            pending: None,
        }
    }

    /// Set the pixel format using the FourCC notation, default `MJPG`.
    ///
    /// Supported formats are `MJPG`, `GREY` and `YUYV` (of which only the luma is kept).
    pub fn format(mut self, format: &[u8]) -> Result<Self> {
        if format_from_fourcc(format).is_none() {
            return Err(Error::DeviceError(format!(
                "Unsupported pixel format {}",
                String::from_utf8_lossy(format)
            )));
        }

        self.format.copy_from_slice(&format[..4]);

        Ok(self)
    }

    /// Set the number of buffers in the driver queue, default 2.
    pub fn num_buffers(mut self, num_buffers: u32) -> Self {
        self.num_buffers = num_buffers;

        self
    }

    fn camera(&self) -> Result<&RsCamera> {
        self.camera.as_ref().ok_or(Error::DeviceNotOpen)
    }

    fn set_control(&self, id: u32, value: i32) -> Result<()> {
        self.camera()?
            .set_control(id, &value)
            .map_err(|e| Error::DeviceError(format!("Cannot set control {:#x}: {}", id, e)))
    }

    /// V4L2 uses frame intervals rather than frame rates.
    fn interval(&self) -> (u32, u32) {
        let fps = self.fps.round().max(1.0) as u32;
        (1, fps)
    }

    fn decode(&self, frame: &rscam::Frame) -> Result<Frame> {
        let (width, height) = frame.resolution;

        match format_from_fourcc(&self.format) {
            Some(PixelFormat::Encoded(fmt)) => image::load_from_memory_with_format(frame, fmt)
                .map(Frame::new)
                .map_err(Error::ImageConversionError),
            Some(PixelFormat::Grey) => GrayImage::from_raw(width, height, frame.to_vec())
                .map(Frame::from_gray)
                .ok_or_else(|| Error::AcquisitionFailed("Short GREY buffer".into())),
            Some(PixelFormat::Yuyv) => {
                let luma = frame.iter().step_by(2).copied().collect();
                GrayImage::from_raw(width, height, luma)
                    .map(Frame::from_gray)
                    .ok_or_else(|| Error::AcquisitionFailed("Short YUYV buffer".into()))
            }
            None => Err(Error::DeviceError("Unsupported pixel format".into())),
        }
    }

    fn capture(&mut self, timeout: Duration) -> Result<(u64, rscam::Frame)> {
        let start = Instant::now();
        let frame = self.camera()?.capture().map_err(Error::CameraCaptureError)?;

        // rscam blocks until the driver hands over a buffer, a late buffer counts as a timeout
        if start.elapsed() > timeout {
            return Err(Error::AcquisitionTimeout(timeout));
        }

        let id = self.next_id;
        self.next_id += 1;

        Ok((id, frame))
    }
}

impl Device for V4l2Device {
    fn open(&mut self) -> Result<()> {
        if self.camera.is_some() {
            return Ok(());
        }

        let path = self
            .path
            .to_str()
            .ok_or_else(|| Error::DeviceError(format!("Invalid device path {:?}", self.path)))?;

        let camera = RsCamera::new(path)
            .map_err(|e| Error::DeviceError(format!("Cannot open {}: {}", path, e)))?;

        debug!("Opened V4L2 device {}", path);
        self.camera = Some(camera);

        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.stop_grabbing()?;

        if self.camera.take().is_some() {
            debug!("Closed V4L2 device {:?}", self.path);
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.camera.is_some()
    }

    fn set_auto_exposure(&mut self, mode: AutoExposure) -> Result<()> {
        let value = match mode {
            AutoExposure::Off => EXPOSURE_MANUAL,
            AutoExposure::Continuous => EXPOSURE_APERTURE_PRIORITY,
        };

        self.set_control(rscam::CID_EXPOSURE_AUTO, value)
    }

    fn set_exposure_time(&mut self, micro_sec: u32) -> Result<()> {
        let units = (micro_sec / EXPOSURE_UNIT_US).max(1);

        self.set_control(rscam::CID_EXPOSURE_ABSOLUTE, units as i32)
    }

    fn set_gain(&mut self, gain: f64) -> Result<()> {
        self.set_control(rscam::CID_GAIN, gain.round() as i32)
    }

    fn set_image_size(&mut self, width: u32, height: u32) -> Result<()> {
        if self.grabbing {
            return Err(Error::DeviceError(
                "Cannot change the image size while grabbing".into(),
            ));
        }

        self.resolution = (width, height);

        Ok(())
    }

    fn set_frame_rate(&mut self, fps: f64) -> Result<()> {
        if self.grabbing {
            return Err(Error::DeviceError(
                "Cannot change the frame rate while grabbing".into(),
            ));
        }

        self.fps = fps;

        Ok(())
    }

    fn set_contrast_mode(&mut self, mode: ContrastMode) -> Result<()> {
        debug!("V4L2 has no contrast mode control, recording {} only", mode);

        Ok(())
    }

    fn set_contrast(&mut self, value: f64) -> Result<()> {
        self.set_control(rscam::CID_CONTRAST, value.round() as i32)
    }

    fn resulting_frame_rate(&self) -> Result<f64> {
        let (num, den) = self.interval();

        Ok(den as f64 / num as f64)
    }

    fn temperature(&self) -> Result<Option<f64>> {
        Ok(None)
    }

    fn start_grabbing(&mut self) -> Result<()> {
        if self.grabbing {
            return Ok(());
        }

        let config = Config {
            interval: self.interval(),
            resolution: self.resolution,
            format: &self.format,
            nbuffers: self.num_buffers,
            ..Config::default()
        };

        let camera = self.camera.as_mut().ok_or(Error::DeviceNotOpen)?;
        camera
            .start(&config)
            .map_err(|e| Error::DeviceError(format!("Cannot start grabbing: {}", e)))?;

        self.grabbing = true;

        Ok(())
    }

    fn stop_grabbing(&mut self) -> Result<()> {
        if !self.grabbing {
            return Ok(());
        }

        if self.pending.take().is_some() {
            warn!("Stopping acquisition with an unreleased grab result");
        }

        let camera = self.camera.as_mut().ok_or(Error::DeviceNotOpen)?;
        camera
            .stop()
            .map_err(|e| Error::DeviceError(format!("Cannot stop grabbing: {}", e)))?;

        self.grabbing = false;

        Ok(())
    }

    fn is_grabbing(&self) -> bool {
        self.grabbing
    }

    fn retrieve_result(&mut self, timeout: Duration) -> Result<GrabResult> {
        if !self.grabbing {
            return Err(Error::AcquisitionFailed("Camera is not grabbing".into()));
        }

        let (id, raw) = self.capture(timeout)?;
        let timestamp = raw.get_timestamp();

        let result = match self.decode(&raw) {
            Ok(frame) => GrabResult::succeeded(id, timestamp, frame),
            Err(e) => GrabResult::failed(id, timestamp, e.to_string()),
        };

        // The driver buffer stays checked out until the result is released
        self.pending = Some((id, raw));

        Ok(result)
    }

    fn release_result(&mut self, result: GrabResult) {
        match self.pending.take() {
            Some((id, _raw)) if id == result.id => (),
            Some(other) => {
                warn!("Released grab {} while grab {} was pending", result.id, other.0);
                self.pending = Some(other);
            }
            None => warn!("Released grab {} twice", result.id),
        }
    }

    fn grab_one(&mut self, timeout: Duration) -> Result<Frame> {
        let was_grabbing = self.grabbing;
        self.start_grabbing()?;

        let grabbed = self
            .capture(timeout)
            .and_then(|(_, raw)| self.decode(&raw));

        if !was_grabbing {
            self.stop_grabbing()?;
        }

        grabbed
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

enum PixelFormat {
    Encoded(ImageFormat),
    Grey,
    Yuyv,
}

fn format_from_fourcc(format: &[u8]) -> Option<PixelFormat> {
    match format {
        b"MJPG" => Some(PixelFormat::Encoded(ImageFormat::Jpeg)),
        b"GREY" => Some(PixelFormat::Grey),
        b"YUYV" => Some(PixelFormat::Yuyv),
        _ => None,
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
