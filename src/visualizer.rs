//! # Flow Visualizer Module
//!
//! Live sparse optical flow on a camera feed. Every frame is tracked against the previous one,
//! the tracks are drawn over the frame and the result is shown in a window until the quit key
//! is pressed.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::time::Duration;

use log::{debug, info, warn};
use minifb::{Key, Window, WindowOptions};
use opencv::core::Mat;

use crate::camera::Camera;
use crate::device::{Device, GRAB_TIMEOUT};
use crate::error::{Error, Result};
use crate::flow::{CornerParams, FlowTracker, LkParams, Step};
use crate::frame::{mat_to_bgr, BgrImage};
use crate::interrupt::Interrupt;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

pub const WINDOW_TITLE: &str = "OpticalFlow";

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// An on-screen surface the composited frames are rendered to.
pub trait Display {
    /// Render a frame and poll the keyboard.
    fn show(&mut self, img: &BgrImage) -> Result<DisplayEvent>;

    /// Destroy any window created by the display. Calling this more than once does nothing.
    fn close(&mut self);
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A [`Display`] using a `minifb` window, created when the first frame is shown.
pub struct MinifbDisplay {
    title: String,
    quit_key: Key,

    window: Option<Window>,
    buffer: Vec<u32>,
}

/// Drives a [`FlowTracker`] from a camera and shows the result.
pub struct FlowVisualizer<D: Device, W: Display> {
    camera: Camera<D>,
    display: W,

    tracker: FlowTracker,
    interrupt: Interrupt,
}

/// What a finished visualisation did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowSummary {
    /// Frames shown, not counting the seed frame
    pub frames: u64,

    /// Number of times the corners had to be detected again
    pub redetections: u64,
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Result of polling a display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayEvent {
    Continue,

    /// The quit key was pressed or the window closed
    Quit,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl MinifbDisplay {
    /// A display quitting on `q`.
    pub fn new() -> Self {
        Self::with_quit_key(Key::Q)
    }

    pub fn with_quit_key(quit_key: Key) -> Self {
        Self {
            title: String::from(WINDOW_TITLE),
            quit_key,
            window: None,
            buffer: Vec::new(),
        }
    }

    fn window(&mut self, width: usize, height: usize) -> Result<&mut Window> {
        if self.window.is_none() {
            let mut window = Window::new(
                &self.title,
                width,
                height,
                WindowOptions {
                    resize: true,
                    ..WindowOptions::default()
                },
            )
            .map_err(|e| Error::DisplayError(format!("{}", e)))?;

            // Poll at most once per millisecond
            window.limit_update_rate(Some(Duration::from_millis(1)));
            self.window = Some(window);
        }

        self.window
            .as_mut()
            .ok_or_else(|| Error::DisplayError("Window missing".into()))
    }
}

impl Default for MinifbDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MinifbDisplay {
    fn show(&mut self, img: &BgrImage) -> Result<DisplayEvent> {
        let (width, height) = (img.width() as usize, img.height() as usize);

        // minifb expects 0RGB packed pixels
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.clear();
        buffer.extend(
            img.pixels()
                .map(|p| (p[2] as u32) << 16 | (p[1] as u32) << 8 | p[0] as u32),
        );

        let quit_key = self.quit_key;
        let window = self.window(width, height)?;
        let shown = window
            .update_with_buffer(&buffer, width, height)
            .map_err(|e| Error::DisplayError(format!("{}", e)));

        let event = if !window.is_open()
            || window.is_key_down(quit_key)
            || window.is_key_down(Key::Escape)
        {
            DisplayEvent::Quit
        } else {
            DisplayEvent::Continue
        };

        self.buffer = buffer;
        shown?;

        Ok(event)
    }

    fn close(&mut self) {
        if self.window.take().is_some() {
            debug!("Closed {} window", self.title);
        }
    }
}

impl<D: Device, W: Display> FlowVisualizer<D, W> {
    /// Create a visualizer for an opened and configured camera.
    pub fn new(
        camera: Camera<D>,
        display: W,
        corner_params: CornerParams,
        lk_params: LkParams,
    ) -> Self {
        Self {
            camera,
            display,
            tracker: FlowTracker::new(corner_params, lk_params),
            interrupt: Interrupt::new(),
        }
    }

    /// Set the interrupt which ends the visualisation.
    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;

        self
    }

    /// Run until the quit key, an interrupt or a failed grab.
    ///
    /// Acquisition is stopped, the display closed and the camera closed however the loop ends.
    pub fn run(mut self) -> Result<FlowSummary> {
        let outcome = self.run_loop();

        let stopped = self.camera.stop_grabbing();
        self.display.close();
        let closed = self.camera.close_mut();

        let summary = outcome?;
        stopped?;
        closed?;

        info!(
            "Optical flow stopped after {} frames, {} redetections",
            summary.frames, summary.redetections
        );

        Ok(summary)
    }

    fn run_loop(&mut self) -> Result<FlowSummary> {
        self.camera.params().image_size()?;

        let mut summary = FlowSummary::default();

        self.camera.start_grabbing()?;

        // Seed frame for the initial corners
        let seed = {
            let grab = self.camera.retrieve(GRAB_TIMEOUT)?;
            grab.frame()
                .ok_or_else(|| Error::AcquisitionFailed("Initial frame grab failed".into()))?
                .to_gray_mat()?
        };
        self.tracker.seed(&seed)?;

        loop {
            if self.interrupt.is_raised() {
                break;
            }

            let (gray, mut vis): (Mat, Mat) = {
                let grab = self.camera.retrieve(GRAB_TIMEOUT)?;
                match grab.frame() {
                    Some(frame) => (frame.to_gray_mat()?, frame.to_bgr_mat()?),
                    None => {
                        warn!("Grab failed, stopping optical flow");
                        break;
                    }
                }
            };

            if let Step::Redetected(n) = self.tracker.step(&gray, &mut vis)? {
                debug!("No points left, redetected {} corners", n);
                summary.redetections += 1;
            }
            summary.frames += 1;

            if self.display.show(&mat_to_bgr(&vis)?)? == DisplayEvent::Quit {
                break;
            }
        }

        Ok(summary)
    }
}
