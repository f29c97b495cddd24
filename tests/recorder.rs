//! Recorder behaviour against in-memory cameras and sinks.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

mod common;

use std::time::Duration;

use common::*;
use cv_camrecord::{
    BgrImage, Camera, Error, FfmpegSink, Frame, Interrupt, Output, RecordMode, Recorder,
    SinkParams, V4l2Device,
};
use image::Bgr;

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[test]
fn duration_bounded_recording_finalises_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.mp4");

    let dev_log = device_log();
    let device = MockDevice::new(dev_log.clone())
        .fallback(gray_frame(8, 6, 100))
        .frame_delay(Duration::from_millis(5));

    let sinks = sink_log();
    let opener = sink_opener(sinks.clone());

    let summary = Recorder::new(
        camera(device, 8, 6),
        Output::File(path.clone()),
        RecordMode::Duration(Duration::from_millis(100)),
        opener,
    )
    .record()
    .unwrap();

    assert_eq!(summary.files, vec![path.clone()]);
    assert!(!summary.interrupted);
    assert!(summary.frames >= 1);
    assert!(summary.elapsed >= Duration::from_millis(100));

    let sinks = sinks.borrow();
    assert_eq!(sinks.opened.len(), 1);
    assert_eq!(sinks.opened[0].path, path);
    assert_eq!(sinks.opened[0].fourcc, "mp4v");
    assert_eq!((sinks.opened[0].width, sinks.opened[0].height), (8, 6));
    assert_eq!(sinks.opened[0].fps, 30.0);
    assert_eq!(sinks.frames.len() as u64, summary.frames);
    assert_eq!(sinks.releases, 1);

    let dev_log = dev_log.borrow();
    assert_eq!(dev_log.count("start"), 1);
    assert_eq!(dev_log.count("stop"), 1);
    assert_eq!(dev_log.count("close"), 1);
    assert_eq!(dev_log.count("retrieve"), dev_log.count("release"));
}

#[test]
fn zero_length_segments_are_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let dev_log = device_log();
    let device = MockDevice::new(dev_log.clone()).fallback(gray_frame(8, 6, 100));

    let sinks = sink_log();
    let opener = sink_opener(sinks.clone());

    let result = Recorder::new(
        camera(device, 8, 6),
        Output::File(dir.path().join("output.mp4")),
        RecordMode::Segmented(Duration::ZERO),
        opener,
    )
    .record();

    assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    assert!(sinks.borrow().opened.is_empty());

    let dev_log = dev_log.borrow();
    assert_eq!(dev_log.count("start"), 0);
    assert_eq!(dev_log.count("close"), 1);
}

#[test]
fn acquisition_error_still_finalises() {
    let dir = tempfile::tempdir().unwrap();

    let dev_log = device_log();
    let device = MockDevice::new(dev_log.clone()).script(vec![
        Scripted::Frame(gray_frame(8, 6, 1)),
        Scripted::Frame(gray_frame(8, 6, 2)),
        Scripted::Timeout,
    ]);

    let sinks = sink_log();
    let opener = sink_opener(sinks.clone());

    let result = Recorder::new(
        camera(device, 8, 6),
        Output::File(dir.path().join("output.mp4")),
        RecordMode::Duration(Duration::from_secs(10)),
        opener,
    )
    .record();

    match result {
        Err(Error::AcquisitionTimeout(_)) => (),
        other => panic!("expected a timeout, got {:?}", other),
    }

    let sinks = sinks.borrow();
    assert_eq!(sinks.frames.len(), 2);
    assert_eq!(sinks.releases, 1);

    let dev_log = dev_log.borrow();
    assert_eq!(dev_log.count("stop"), 1);
    assert_eq!(dev_log.count("close"), 1);
}

#[test]
fn every_result_is_released_before_the_next() {
    let dir = tempfile::tempdir().unwrap();
    let interrupt = Interrupt::new();

    let dev_log = device_log();
    let device = MockDevice::new(dev_log.clone())
        .script(vec![
            Scripted::Frame(gray_frame(8, 6, 1)),
            Scripted::Failed,
            Scripted::Frame(gray_frame(8, 6, 2)),
        ])
        .fallback(gray_frame(8, 6, 3))
        .interrupt_after(4, interrupt.clone());

    let sinks = sink_log();
    let opener = sink_opener(sinks.clone());

    let summary = Recorder::new(
        camera(device, 8, 6),
        Output::File(dir.path().join("output.mp4")),
        RecordMode::UntilInterrupt,
        opener,
    )
    .interrupt(interrupt)
    .record()
    .unwrap();

    // The failed grab is released but never written
    assert!(summary.interrupted);
    assert_eq!(summary.frames, 3);
    assert_eq!(sinks.borrow().frames.len(), 3);

    let dev_log = dev_log.borrow();
    let grabs: Vec<&str> = dev_log
        .calls
        .iter()
        .map(String::as_str)
        .filter(|c| *c == "retrieve" || *c == "release")
        .collect();
    assert_eq!(grabs.len(), 8);
    for pair in grabs.chunks(2) {
        assert_eq!(pair, ["retrieve", "release"]);
    }
}

#[test]
fn gray_frames_are_written_as_colour() {
    let dir = tempfile::tempdir().unwrap();
    let interrupt = Interrupt::new();

    let bgr = BgrImage::from_pixel(8, 6, Bgr([1, 2, 3]));

    let dev_log = device_log();
    let device = MockDevice::new(dev_log)
        .script(vec![
            Scripted::Frame(gray_frame(8, 6, 9)),
            Scripted::Frame(Frame::from_bgr(bgr.clone())),
        ])
        .interrupt_after(2, interrupt.clone());

    let sinks = sink_log();
    let opener = sink_opener(sinks.clone());

    Recorder::new(
        camera(device, 8, 6),
        Output::File(dir.path().join("output.mp4")),
        RecordMode::UntilInterrupt,
        opener,
    )
    .interrupt(interrupt)
    .record()
    .unwrap();

    let sinks = sinks.borrow();
    assert_eq!(sinks.frames.len(), 2);
    assert!(sinks.frames[0].pixels().all(|p| *p == Bgr([9, 9, 9])));
    assert_eq!(sinks.frames[1], bgr);
}

#[test]
fn sink_failure_happens_before_acquisition() {
    let dir = tempfile::tempdir().unwrap();

    let dev_log = device_log();
    let device = MockDevice::new(dev_log.clone()).fallback(gray_frame(8, 6, 0));

    let opener = |params: SinkParams| -> cv_camrecord::Result<MockSink> {
        Err(Error::SinkOpen {
            path: params.path,
            reason: String::from("codec unavailable"),
        })
    };

    let result = Recorder::new(
        camera(device, 8, 6),
        Output::File(dir.path().join("output.mp4")),
        RecordMode::UntilInterrupt,
        opener,
    )
    .record();

    match result {
        Err(Error::SinkOpen { reason, .. }) => assert_eq!(reason, "codec unavailable"),
        other => panic!("expected a sink error, got {:?}", other),
    }

    let dev_log = dev_log.borrow();
    assert_eq!(dev_log.count("start"), 0);
    assert_eq!(dev_log.count("retrieve"), 0);
    assert_eq!(dev_log.count("close"), 1);
}

#[test]
fn missing_image_size_is_reported() {
    let dir = tempfile::tempdir().unwrap();

    let dev_log = device_log();
    let device = MockDevice::new(dev_log.clone()).fallback(gray_frame(8, 6, 0));
    let camera = Camera::new(device).open().unwrap();

    let sinks = sink_log();
    let opener = sink_opener(sinks.clone());

    let result = Recorder::new(
        camera,
        Output::File(dir.path().join("output.mp4")),
        RecordMode::UntilInterrupt,
        opener,
    )
    .record();

    match result {
        Err(Error::MissingParameter(name)) => assert_eq!(name, "width"),
        other => panic!("expected a missing parameter, got {:?}", other),
    }
    assert!(sinks.borrow().opened.is_empty());
    assert_eq!(dev_log.borrow().count("start"), 0);
}

#[test]
fn segmented_recording_writes_numbered_files() {
    let dir = tempfile::tempdir().unwrap();
    let interrupt = Interrupt::new();

    let dev_log = device_log();
    let device = MockDevice::new(dev_log.clone())
        .fallback(gray_frame(8, 6, 7))
        .frame_delay(Duration::from_millis(2))
        .interrupt_after(40, interrupt.clone());

    let sinks = sink_log();
    let opener = sink_opener(sinks.clone());

    let summary = Recorder::new(
        camera(device, 8, 6),
        Output::File(dir.path().join("clip.mp4")),
        RecordMode::Segmented(Duration::from_millis(30)),
        opener,
    )
    .interrupt(interrupt)
    .record()
    .unwrap();

    assert!(summary.interrupted);
    assert!(summary.files.len() >= 2);
    for (i, file) in summary.files.iter().enumerate() {
        assert_eq!(file, &dir.path().join(format!("clip_{:03}.mp4", i)));
    }

    let sinks = sinks.borrow();
    assert_eq!(sinks.opened.len(), summary.files.len());
    assert_eq!(sinks.releases, summary.files.len());
    assert_eq!(sinks.frames.len(), 40);

    let dev_log = dev_log.borrow();
    assert_eq!(dev_log.count("start"), summary.files.len());
    assert_eq!(dev_log.count("stop"), summary.files.len());
    assert_eq!(dev_log.count("close"), 1);
}

#[test]
fn output_directory_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("data").join("video");
    let interrupt = Interrupt::new();

    let device = MockDevice::new(device_log())
        .fallback(gray_frame(8, 6, 0))
        .interrupt_after(1, interrupt.clone());

    let sinks = sink_log();
    let opener = sink_opener(sinks.clone());

    Recorder::new(
        camera(device, 8, 6),
        Output::Timestamped {
            dir: nested.clone(),
            format: String::from("%Y%m%d_%H%M%S.mp4"),
        },
        RecordMode::UntilInterrupt,
        opener,
    )
    .fourcc("XVID")
    .interrupt(interrupt)
    .record()
    .unwrap();

    assert!(nested.is_dir());

    let sinks = sinks.borrow();
    assert_eq!(sinks.opened[0].fourcc, "XVID");
    assert_eq!(sinks.opened[0].path.parent(), Some(nested.as_path()));
}

/// Records two seconds of 1280x720 video from `/dev/video0` through `ffmpeg`.
#[test]
#[ignore]
fn record_from_real_camera() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.mp4");

    let device = V4l2Device::new("/dev/video0").format(b"MJPG").unwrap();
    let camera = Camera::new(device)
        .open()
        .unwrap()
        .set_image_size(1280, 720)
        .unwrap()
        .set_frame_rate(30.0)
        .unwrap();

    let summary = Recorder::new(
        camera,
        Output::File(path.clone()),
        RecordMode::Duration(Duration::from_secs(2)),
        FfmpegSink::open,
    )
    .record()
    .unwrap();

    assert_eq!(summary.files, vec![path.clone()]);
    assert!(summary.frames > 0 && summary.frames <= 61);
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}
