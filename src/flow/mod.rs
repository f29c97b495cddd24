//! # Sparse Optical Flow Module
//!
//! Corner detection, pyramidal Lucas-Kanade tracking and the overlay used to visualise tracks,
//! all backed by OpenCV. [`FlowTracker`] ties these together, carrying the tracked points from
//! frame to frame.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::debug;
use nalgebra::Point2;
use opencv::core::Mat;
use opencv::prelude::*;

pub use corners::{detect_corners, CornerParams};
pub use lk::{track, LkParams, TrackedPoint};
pub use overlay::{Overlay, MARKER_RADIUS, TRAIL_THICKNESS};

use crate::error::Result;

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

mod corners;
mod lk;
mod overlay;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Tracks corners across consecutive gray frames and draws their trails.
pub struct FlowTracker {
    corner_params: CornerParams,
    lk_params: LkParams,

    /// Previous gray frame, `CV_8UC1`
    prev: Option<Mat>,
    points: Vec<Point2<f32>>,

    overlay: Overlay,
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// What a call to [`FlowTracker::step`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// No points were left, so corners were detected again. Holds the number found.
    Redetected(usize),

    /// Points were tracked. Holds the number that survived.
    Tracked(usize),
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl FlowTracker {
    pub fn new(corner_params: CornerParams, lk_params: LkParams) -> Self {
        Self {
            corner_params,
            lk_params,
            prev: None,
            points: Vec::new(),
            overlay: Overlay::new(corner_params.max_corners),
        }
    }

    /// Start tracking from a gray seed frame, detecting the initial corners.
    pub fn seed(&mut self, gray: &Mat) -> Result<usize> {
        self.redetect(gray)
    }

    /// Advance by one gray frame, drawing trails and markers onto the BGR image `vis`.
    ///
    /// If no points are being tracked the corners are detected again and the trails cleared,
    /// otherwise the points are tracked from the previous frame and only those found are kept.
    pub fn step(&mut self, gray: &Mat, vis: &mut Mat) -> Result<Step> {
        let step = match self.prev.take() {
            Some(prev) if !self.points.is_empty() => {
                let tracked = track(&prev, gray, &self.points, &self.lk_params)?;

                let mut survivors = Vec::with_capacity(tracked.len());
                for (old, new) in self.points.iter().zip(tracked.iter()) {
                    if !new.found {
                        continue;
                    }

                    let i = survivors.len();
                    self.overlay.draw_trail(i, new.point, *old)?;
                    self.overlay.draw_marker(vis, i, new.point)?;
                    survivors.push(new.point);
                }

                self.points = survivors;
                self.prev = Some(gray.try_clone()?);
                Step::Tracked(self.points.len())
            }
            _ => Step::Redetected(self.redetect(gray)?),
        };

        self.overlay.compose(vis)?;

        Ok(step)
    }

    /// The points currently being tracked.
    pub fn points(&self) -> &[Point2<f32>] {
        &self.points
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    fn redetect(&mut self, gray: &Mat) -> Result<usize> {
        self.points = detect_corners(gray, &self.corner_params)?;
        self.overlay.reset(gray.cols() as u32, gray.rows() as u32)?;
        self.prev = Some(gray.try_clone()?);

        debug!("Detected {} corners", self.points.len());

        Ok(self.points.len())
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
