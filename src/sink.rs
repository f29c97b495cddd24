//! # Video Sink Module
//!
//! Destinations that recorded frames are appended to. [`FfmpegSink`] pipes raw frames into an
//! `ffmpeg` process which does the encoding.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::io::{BufRead, BufReader, Write};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::camera::CameraParams;
use crate::error::{Error, Result};
use crate::frame::BgrImage;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// How long a freshly spawned encoder must stay alive for the sink to count as open.
pub const OPEN_GRACE: Duration = Duration::from_millis(200);

/// Interval between liveness checks during [`OPEN_GRACE`].
const OPEN_POLL: Duration = Duration::from_millis(10);

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// An append-only video destination.
pub trait VideoSink {
    /// The encoding parameters the sink was opened with.
    fn params(&self) -> &SinkParams;

    /// Append one frame to the video.
    fn write(&mut self, frame: &BgrImage) -> Result<()>;

    /// Flush and close the video. Calling this more than once does nothing.
    fn release(&mut self) -> Result<()>;

    /// Number of frames appended so far.
    fn frames_written(&self) -> u64;
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Encoding parameters of a sink, fixed once the sink is opened.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkParams {
    pub path: PathBuf,

    /// FourCC codec tag, e.g. `mp4v`
    pub fourcc: String,

    pub fps: f64,
    pub width: u32,
    pub height: u32,

    /// `false` to encode single channel video
    pub is_color: bool,
}

/// A sink encoding frames through an `ffmpeg` child process.
pub struct FfmpegSink {
    params: SinkParams,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    log_jh: Option<JoinHandle<()>>,

    frames: u64,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl SinkParams {
    /// Build sink parameters from the size recorded in camera parameters.
    pub fn from_camera<P: AsRef<Path>>(
        path: P,
        fourcc: &str,
        fps: f64,
        params: &CameraParams,
    ) -> Result<Self> {
        let (width, height) = params.image_size()?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            fourcc: fourcc.to_string(),
            fps,
            width,
            height,
            is_color: true,
        })
    }
}

impl FfmpegSink {
    /// Spawn `ffmpeg` (found on the `PATH`) writing to `params.path`.
    pub fn open(params: SinkParams) -> Result<Self> {
        Self::open_with("ffmpeg", params)
    }

    /// Spawn the given `ffmpeg` binary writing to `params.path`.
    pub fn open_with(ffmpeg: &str, params: SinkParams) -> Result<Self> {
        let open_err = |reason: String| Error::SinkOpen {
            path: params.path.clone(),
            reason,
        };

        let mut child = build_ffmpeg_command(ffmpeg, &params)
            .spawn()
            .map_err(|e| open_err(format!("cannot spawn {}: {}", ffmpeg, e)))?;

        let stdin = child.stdin.take();

        // Forward encoder diagnostics to the log
        let log_jh = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    match line {
                        Ok(line) => warn!("[ffmpeg] {}", line),
                        Err(_) => break,
                    }
                }
            })
        });

        // An encoder rejecting its arguments or output path exits straight away
        let started = Instant::now();
        while started.elapsed() < OPEN_GRACE {
            match child.try_wait() {
                Ok(None) => thread::sleep(OPEN_POLL),
                Ok(Some(status)) => {
                    if let Some(jh) = log_jh {
                        let _ = jh.join();
                    }
                    return Err(open_err(format!("encoder exited with {}", status)));
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(open_err(format!("cannot poll encoder: {}", e)));
                }
            }
        }

        debug!("Opened ffmpeg sink {:?}", params.path);

        Ok(Self {
            params,
            child: Some(child),
            stdin,
            log_jh,
            frames: 0,
        })
    }
}

impl VideoSink for FfmpegSink {
    fn params(&self) -> &SinkParams {
        &self.params
    }

    fn write(&mut self, frame: &BgrImage) -> Result<()> {
        check_size(&self.params, frame)?;

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::SinkWrite(std::io::ErrorKind::BrokenPipe.into()))?;

        if self.params.is_color {
            stdin.write_all(frame.as_raw()).map_err(Error::SinkWrite)?;
        } else {
            let luma: Vec<u8> = frame.pixels().map(|p| p[0]).collect();
            stdin.write_all(&luma).map_err(Error::SinkWrite)?;
        }

        self.frames += 1;

        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        // Closing stdin signals the end of the stream
        drop(self.stdin.take());

        let child = match self.child.take() {
            Some(c) => c,
            None => return Ok(()),
        };

        let status = child.wait_with_output()?.status;

        if let Some(jh) = self.log_jh.take() {
            let _ = jh.join();
        }

        debug!(
            "Closed ffmpeg sink {:?} after {} frames ({})",
            self.params.path, self.frames, status
        );

        if status.success() {
            Ok(())
        } else {
            Err(Error::SinkWrite(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("encoder exited with {}", status),
            )))
        }
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Error releasing video sink: {}", e);
        }
    }
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Build the `ffmpeg` command reading raw frames from stdin and encoding them to the sink path.
pub fn build_ffmpeg_command(ffmpeg: &str, params: &SinkParams) -> Command {
    let mut cmd = Command::new(ffmpeg);
    cmd.arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-y");

    // Raw input on stdin
    let in_fmt = if params.is_color { "bgr24" } else { "gray" };
    cmd.arg("-f")
        .arg("rawvideo")
        .arg("-pix_fmt")
        .arg(in_fmt)
        .arg("-s")
        .arg(format!("{}x{}", params.width, params.height))
        .arg("-r")
        .arg(params.fps.to_string())
        .arg("-i")
        .arg("-");

    let (codec, out_fmt) = codec_for_fourcc(&params.fourcc);
    cmd.arg("-c:v").arg(codec);
    if codec == "mpeg4" || codec == "libx264" {
        cmd.arg("-tag:v").arg(&params.fourcc);
    }
    cmd.arg("-pix_fmt").arg(out_fmt);

    cmd.arg(&params.path);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    // Own session, terminal signals must only reach the recorder
    unsafe {
        cmd.pre_exec(|| {
            if let Err(e) = nix::unistd::setsid() {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, e));
            }
            Ok(())
        });
    }

    cmd
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Map a FourCC tag onto an ffmpeg encoder and output pixel format.
fn codec_for_fourcc(fourcc: &str) -> (&'static str, &'static str) {
    match fourcc {
        "avc1" | "h264" | "H264" => ("libx264", "yuv420p"),
        "MJPG" | "mjpg" => ("mjpeg", "yuvj420p"),
        "XVID" | "FMP4" | "DIVX" => ("mpeg4", "yuv420p"),
        _ => ("mpeg4", "yuv420p"),
    }
}

fn check_size(params: &SinkParams, frame: &BgrImage) -> Result<()> {
    let got = frame.dimensions();
    let expected = (params.width, params.height);

    if got != expected {
        return Err(Error::FrameSizeMismatch { expected, got });
    }

    Ok(())
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
