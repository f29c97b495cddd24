//! In-memory devices, sinks and displays which record how they are driven.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use cv_camrecord::{
    AutoExposure, BgrImage, Camera, ContrastMode, Device, Display, DisplayEvent, Error, Frame,
    GrabResult, Interrupt, Result, SinkParams, VideoSink,
};
use image::{GrayImage, Luma};

// -----------------------------------------------------------------------------------------------
// DEVICE
// -----------------------------------------------------------------------------------------------

/// One scripted outcome of a retrieval.
pub enum Scripted {
    Frame(Frame),
    Failed,
    Timeout,
}

/// Everything done to a [`MockDevice`], in order.
#[derive(Default, Debug)]
pub struct DeviceLog {
    pub calls: Vec<String>,
}

impl DeviceLog {
    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == call).count()
    }
}

pub struct MockDevice {
    log: Rc<RefCell<DeviceLog>>,

    script: VecDeque<Scripted>,

    /// Returned once the script runs out, a timeout if `None`
    fallback: Option<Frame>,

    /// Time each retrieval takes
    frame_delay: Duration,

    /// Raise the interrupt once this many results have been retrieved
    interrupt_after: Option<(usize, Interrupt)>,

    open: bool,
    grabbing: bool,
    next_id: u64,
    outstanding: Option<u64>,
}

impl MockDevice {
    pub fn new(log: Rc<RefCell<DeviceLog>>) -> Self {
        Self {
            log,
            script: VecDeque::new(),
            fallback: None,
            frame_delay: Duration::from_millis(0),
            interrupt_after: None,
            open: false,
            grabbing: false,
            next_id: 0,
            outstanding: None,
        }
    }

    pub fn script<I: IntoIterator<Item = Scripted>>(mut self, script: I) -> Self {
        self.script.extend(script);
        self
    }

    pub fn fallback(mut self, frame: Frame) -> Self {
        self.fallback = Some(frame);
        self
    }

    pub fn frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    pub fn interrupt_after(mut self, n: usize, interrupt: Interrupt) -> Self {
        self.interrupt_after = Some((n, interrupt));
        self
    }

    fn call<S: Into<String>>(&self, call: S) {
        self.log.borrow_mut().calls.push(call.into());
    }
}

impl Device for MockDevice {
    fn open(&mut self) -> Result<()> {
        self.call("open");
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.call("close");
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_auto_exposure(&mut self, mode: AutoExposure) -> Result<()> {
        self.call(format!("set_auto_exposure {}", mode));
        Ok(())
    }

    fn set_exposure_time(&mut self, micro_sec: u32) -> Result<()> {
        self.call(format!("set_exposure_time {}", micro_sec));
        Ok(())
    }

    fn set_gain(&mut self, gain: f64) -> Result<()> {
        self.call(format!("set_gain {}", gain));
        Ok(())
    }

    fn set_image_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.call(format!("set_image_size {}x{}", width, height));
        Ok(())
    }

    fn set_frame_rate(&mut self, fps: f64) -> Result<()> {
        self.call(format!("set_frame_rate {}", fps));
        Ok(())
    }

    fn set_contrast_mode(&mut self, mode: ContrastMode) -> Result<()> {
        self.call(format!("set_contrast_mode {}", mode));
        Ok(())
    }

    fn set_contrast(&mut self, value: f64) -> Result<()> {
        self.call(format!("set_contrast {}", value));
        Ok(())
    }

    fn resulting_frame_rate(&self) -> Result<f64> {
        Ok(30.0)
    }

    fn temperature(&self) -> Result<Option<f64>> {
        Ok(Some(40.0))
    }

    fn start_grabbing(&mut self) -> Result<()> {
        self.call("start");
        self.grabbing = true;
        Ok(())
    }

    fn stop_grabbing(&mut self) -> Result<()> {
        self.call("stop");
        self.grabbing = false;
        Ok(())
    }

    fn is_grabbing(&self) -> bool {
        self.grabbing
    }

    fn retrieve_result(&mut self, timeout: Duration) -> Result<GrabResult> {
        assert!(self.grabbing, "retrieve while not grabbing");
        assert!(
            self.outstanding.is_none(),
            "retrieve before the previous result was released"
        );
        self.call("retrieve");

        if self.frame_delay > Duration::from_millis(0) {
            thread::sleep(self.frame_delay);
        }

        let id = self.next_id;
        self.next_id += 1;

        if let Some((n, interrupt)) = &self.interrupt_after {
            if self.next_id as usize >= *n {
                interrupt.raise();
            }
        }

        let scripted = match self.script.pop_front() {
            Some(s) => s,
            None => match &self.fallback {
                Some(f) => Scripted::Frame(f.clone()),
                None => Scripted::Timeout,
            },
        };

        let result = match scripted {
            Scripted::Frame(f) => GrabResult::succeeded(id, id, f),
            Scripted::Failed => GrabResult::failed(id, id, "incomplete frame"),
            Scripted::Timeout => return Err(Error::AcquisitionTimeout(timeout)),
        };

        self.outstanding = Some(id);
        Ok(result)
    }

    fn release_result(&mut self, result: GrabResult) {
        assert_eq!(self.outstanding.take(), Some(result.id), "unexpected release");
        self.call("release");
    }

    fn grab_one(&mut self, timeout: Duration) -> Result<Frame> {
        self.call("grab_one");
        match self.fallback.clone() {
            Some(f) => Ok(f),
            None => Err(Error::AcquisitionTimeout(timeout)),
        }
    }
}

/// An opened camera with manual exposure and the given image size.
pub fn camera(device: MockDevice, width: u32, height: u32) -> Camera<MockDevice> {
    Camera::new(device)
        .open()
        .unwrap()
        .set_auto_exposure(AutoExposure::Off)
        .unwrap()
        .set_exposure_time(20000)
        .unwrap()
        .set_image_size(width, height)
        .unwrap()
        .set_frame_rate(30.0)
        .unwrap()
}

pub fn device_log() -> Rc<RefCell<DeviceLog>> {
    Rc::new(RefCell::new(DeviceLog::default()))
}

// -----------------------------------------------------------------------------------------------
// SINK
// -----------------------------------------------------------------------------------------------

#[derive(Default, Debug)]
pub struct SinkLog {
    pub opened: Vec<SinkParams>,
    pub frames: Vec<BgrImage>,
    pub releases: usize,
}

pub struct MockSink {
    params: SinkParams,
    log: Rc<RefCell<SinkLog>>,
    frames: u64,
    released: bool,
}

impl MockSink {
    pub fn open(params: SinkParams, log: Rc<RefCell<SinkLog>>) -> Self {
        log.borrow_mut().opened.push(params.clone());
        Self {
            params,
            log,
            frames: 0,
            released: false,
        }
    }
}

impl VideoSink for MockSink {
    fn params(&self) -> &SinkParams {
        &self.params
    }

    fn write(&mut self, frame: &BgrImage) -> Result<()> {
        assert!(!self.released, "write after release");
        self.log.borrow_mut().frames.push(frame.clone());
        self.frames += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            self.released = true;
            self.log.borrow_mut().releases += 1;
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}

pub fn sink_log() -> Rc<RefCell<SinkLog>> {
    Rc::new(RefCell::new(SinkLog::default()))
}

/// A sink factory for a recorder, every sink opened sharing `log`.
pub fn sink_opener(log: Rc<RefCell<SinkLog>>) -> impl FnMut(SinkParams) -> Result<MockSink> {
    move |params| Ok(MockSink::open(params, log.clone()))
}

// -----------------------------------------------------------------------------------------------
// DISPLAY
// -----------------------------------------------------------------------------------------------

#[derive(Default, Debug)]
pub struct DisplayLog {
    pub shown: Vec<BgrImage>,
    pub closes: usize,
}

pub struct MockDisplay {
    log: Rc<RefCell<DisplayLog>>,

    /// Press the quit key once this many frames have been shown
    quit_after: Option<usize>,
}

impl MockDisplay {
    pub fn new(log: Rc<RefCell<DisplayLog>>, quit_after: Option<usize>) -> Self {
        Self { log, quit_after }
    }
}

impl Display for MockDisplay {
    fn show(&mut self, img: &BgrImage) -> Result<DisplayEvent> {
        let mut log = self.log.borrow_mut();
        log.shown.push(img.clone());

        match self.quit_after {
            Some(n) if log.shown.len() >= n => Ok(DisplayEvent::Quit),
            _ => Ok(DisplayEvent::Continue),
        }
    }

    fn close(&mut self) {
        self.log.borrow_mut().closes += 1;
    }
}

pub fn display_log() -> Rc<RefCell<DisplayLog>> {
    Rc::new(RefCell::new(DisplayLog::default()))
}

// -----------------------------------------------------------------------------------------------
// FRAMES
// -----------------------------------------------------------------------------------------------

pub fn gray_frame(width: u32, height: u32, value: u8) -> Frame {
    Frame::from_gray(GrayImage::from_pixel(width, height, Luma([value])))
}

/// A bright square on a dark background, which has four strong corners.
pub fn square_frame(x0: u32, y0: u32) -> Frame {
    let mut img = GrayImage::new(96, 96);
    for y in y0..y0 + 24 {
        for x in x0..x0 + 24 {
            img.put_pixel(x, y, Luma([200]));
        }
    }
    Frame::from_gray(img)
}

