//! # Recorder Module
//!
//! Pulls frames from a grabbing camera and appends them to video files.
//!
//! Every recording session ends with the same finalisation, whatever made the loop stop
//! (elapsed duration, interrupt or an error): acquisition is stopped and the sink released,
//! exactly once. The camera is closed once the last session has ended.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeZone};
use log::{info, warn};

use crate::camera::Camera;
use crate::device::{Device, GRAB_TIMEOUT};
use crate::error::{Error, Result};
use crate::interrupt::Interrupt;
use crate::sink::{SinkParams, VideoSink};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Records a camera into one or more video files.
pub struct Recorder<D, S, F>
where
    D: Device,
    S: VideoSink,
    F: FnMut(SinkParams) -> Result<S>,
{
    camera: Camera<D>,

    /// Opens a sink for each recorded file
    open_sink: F,

    output: Output,
    mode: RecordMode,
    fourcc: String,
    interrupt: Interrupt,
}

/// What a finished recording produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordingSummary {
    /// Every video file written, in order
    pub files: Vec<PathBuf>,

    /// Frames written across all files
    pub frames: u64,

    pub elapsed: Duration,

    /// `true` if the recording was ended by an interrupt
    pub interrupted: bool,
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// When a recording ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordMode {
    /// A single file, recorded until interrupted
    UntilInterrupt,

    /// A single file of the given length, unless interrupted earlier
    Duration(Duration),

    /// A new file for every period of the given length, until interrupted
    Segmented(Duration),
}

/// Where recorded files are written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Output {
    /// A fixed file. Segments get a numeric suffix.
    File(PathBuf),

    /// Files in a directory, named after their start time using a `strftime` format.
    Timestamped { dir: PathBuf, format: String },
}

/// Why a session ended without error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionEnd {
    Elapsed,
    Interrupted,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl RecordMode {
    /// A single file of `secs` seconds.
    pub fn duration_secs(secs: f64) -> Result<Self> {
        Ok(RecordMode::Duration(positive_secs("duration", secs)?))
    }

    /// A new file every `secs` seconds.
    pub fn segmented_secs(secs: f64) -> Result<Self> {
        Ok(RecordMode::Segmented(positive_secs("segment", secs)?))
    }

    /// Check that a bounded mode has a non-zero length.
    pub fn validate(&self) -> Result<()> {
        match self {
            RecordMode::Duration(d) | RecordMode::Segmented(d) if d.is_zero() => {
                Err(Error::InvalidParameter {
                    name: "record mode",
                    reason: String::from("recording length must be non-zero"),
                })
            }
            _ => Ok(()),
        }
    }
}

impl Output {
    /// Path of a file started at `now`, `segment` being its index in a segmented recording.
    pub fn path_for<Tz>(&self, segment: Option<usize>, now: &DateTime<Tz>) -> PathBuf
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        match (self, segment) {
            (Output::File(path), None) => path.clone(),
            (Output::File(path), Some(i)) => with_suffix(path, i),
            (Output::Timestamped { dir, format }, _) => dir.join(now.format(format).to_string()),
        }
    }
}

impl<D, S, F> Recorder<D, S, F>
where
    D: Device,
    S: VideoSink,
    F: FnMut(SinkParams) -> Result<S>,
{
    /// Create a recorder for an opened and configured camera.
    pub fn new(camera: Camera<D>, output: Output, mode: RecordMode, open_sink: F) -> Self {
        Self {
            camera,
            open_sink,
            output,
            mode,
            fourcc: String::from("mp4v"),
            interrupt: Interrupt::new(),
        }
    }

    /// Set the FourCC codec tag of the output, default `mp4v`.
    pub fn fourcc(mut self, fourcc: &str) -> Self {
        self.fourcc = fourcc.to_string();

        self
    }

    /// Set the interrupt which ends the recording.
    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;

        self
    }

    /// Run the recording to completion, closing the camera afterwards.
    pub fn record(mut self) -> Result<RecordingSummary> {
        let started = Instant::now();
        let mut summary = RecordingSummary::default();

        let outcome = self.run_sessions(&mut summary);
        let closed = self.camera.close_mut();

        summary.elapsed = started.elapsed();
        outcome?;
        closed?;

        info!(
            "Recorded {} frames to {} file(s) in {:.1} s",
            summary.frames,
            summary.files.len(),
            summary.elapsed.as_secs_f64()
        );

        Ok(summary)
    }

    fn run_sessions(&mut self, summary: &mut RecordingSummary) -> Result<()> {
        self.mode.validate()?;

        match self.mode {
            RecordMode::UntilInterrupt => {
                let path = self.output.path_for(None, &Local::now());
                let end = self.session(&path, None, summary)?;
                summary.interrupted = end == SessionEnd::Interrupted;
            }
            RecordMode::Duration(d) => {
                let path = self.output.path_for(None, &Local::now());
                let end = self.session(&path, Some(d), summary)?;
                summary.interrupted = end == SessionEnd::Interrupted;
            }
            RecordMode::Segmented(d) => {
                for segment in 0.. {
                    let path = self.output.path_for(Some(segment), &Local::now());
                    if self.session(&path, Some(d), summary)? == SessionEnd::Interrupted {
                        summary.interrupted = true;
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Record a single file, finalising it however the capture loop ends.
    fn session(
        &mut self,
        path: &Path,
        bound: Option<Duration>,
        summary: &mut RecordingSummary,
    ) -> Result<SessionEnd> {
        let mut sink = self.create_sink(path)?;
        summary.files.push(path.to_path_buf());

        let started = Instant::now();
        let outcome = self.capture(&mut sink, started, bound);

        // Finalisation, runs exactly once per session
        let stopped = self.camera.stop_grabbing();
        let released = sink.release();
        summary.frames += sink.frames_written();

        match &outcome {
            Ok(SessionEnd::Interrupted) => {
                info!(
                    "Stopped by interrupt - video length: {:.2} s",
                    started.elapsed().as_secs_f64()
                );
                self.log_temperature();
            }
            Ok(SessionEnd::Elapsed) => (),
            Err(e) => warn!("Recording of {:?} stopped early: {}", path, e),
        }

        let end = outcome?;
        stopped?;
        released?;

        Ok(end)
    }

    /// Create the sink for `path` from the camera settings, before any acquisition starts.
    fn create_sink(&mut self, path: &Path) -> Result<S> {
        let fps = match self.camera.frame_rate() {
            Ok(fps) if fps > 0.0 => fps,
            Ok(_) | Err(_) => self.camera.params().fps.unwrap_or(30.0),
        };
        info!("Actual camera frame rate {:.2}", fps);
        self.log_temperature();

        let params = SinkParams::from_camera(path, &self.fourcc, fps, self.camera.params())?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        info!("Recording to {:?}", path);
        (self.open_sink)(params)
    }

    fn capture(
        &mut self,
        sink: &mut S,
        started: Instant,
        bound: Option<Duration>,
    ) -> Result<SessionEnd> {
        self.camera.start_grabbing()?;

        loop {
            if self.interrupt.is_raised() {
                return Ok(SessionEnd::Interrupted);
            }

            if let Some(bound) = bound {
                if started.elapsed() >= bound {
                    return Ok(SessionEnd::Elapsed);
                }
            }

            // The grab is released when it goes out of scope at the end of the iteration
            let grab = self.camera.retrieve(GRAB_TIMEOUT)?;
            if let Some(frame) = grab.frame() {
                sink.write(&frame.bgr8())?;
            }
        }
    }

    fn log_temperature(&self) {
        match self.camera.temperature() {
            Ok(Some(t)) => info!("Internal temperature {:.1} C", t),
            Ok(None) => (),
            Err(e) => warn!("Cannot read camera temperature: {}", e),
        }
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Convert a number of seconds into a non-zero duration.
fn positive_secs(name: &'static str, secs: f64) -> Result<Duration> {
    let invalid = || Error::InvalidParameter {
        name,
        reason: format!("{} is not a positive number of seconds", secs),
    };

    if secs.is_nan() || secs <= 0.0 {
        return Err(invalid());
    }

    match Duration::try_from_secs_f64(secs) {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => Err(invalid()),
    }
}

/// Insert a zero padded segment index before the extension, `out.mp4` becomes `out_003.mp4`.
fn with_suffix(path: &Path, i: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = match path.extension() {
        Some(ext) => format!("{}_{:03}.{}", stem, i, ext.to_string_lossy()),
        None => format!("{}_{:03}", stem, i),
    };

    path.with_file_name(name)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
