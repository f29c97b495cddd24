//! Pyramidal Lucas-Kanade tracking through OpenCV's `calcOpticalFlowPyrLK`.

use nalgebra::Point2;
use opencv::core::{Mat, Point2f, Size, TermCriteria, TermCriteria_Type, Vector};
use opencv::video;

use crate::error::Result;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Points whose spatial gradient matrix has a smaller minimum eigenvalue are lost.
const MIN_EIGEN_THRESHOLD: f64 = 1e-4;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Parameters of [`track`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LkParams {
    /// Side length of the square search window at each pyramid level
    pub window: usize,

    /// Index of the coarsest pyramid level, 0 disables the pyramid
    pub max_level: usize,

    /// Iteration limit of the termination criteria
    pub max_iterations: usize,

    /// Update size below which the iterations stop
    pub epsilon: f32,
}

impl Default for LkParams {
    fn default() -> Self {
        Self {
            window: 15,
            max_level: 2,
            max_iterations: 10,
            epsilon: 0.03,
        }
    }
}

/// Where a point ended up in the next frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedPoint {
    pub point: Point2<f32>,

    /// `false` if the flow for this point could not be found
    pub found: bool,

    /// Residual of the tracked patch
    pub error: f32,
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Track `points` from the `prev` to the `curr` image, both `CV_8UC1` and of equal size.
///
/// One result is returned for each input point, in order.
pub fn track(
    prev: &Mat,
    curr: &Mat,
    points: &[Point2<f32>],
    params: &LkParams,
) -> Result<Vec<TrackedPoint>> {
    if points.is_empty() {
        return Ok(Vec::new());
    }

    let prev_pts: Vector<Point2f> = points.iter().map(|p| Point2f::new(p.x, p.y)).collect();
    let mut next_pts = Vector::<Point2f>::new();
    let mut status = Vector::<u8>::new();
    let mut err = Vector::<f32>::new();

    let criteria = TermCriteria::new(
        TermCriteria_Type::COUNT as i32 + TermCriteria_Type::EPS as i32,
        params.max_iterations as i32,
        params.epsilon as f64,
    )?;
    let window = params.window as i32;

    video::calc_optical_flow_pyr_lk(
        prev,
        curr,
        &prev_pts,
        &mut next_pts,
        &mut status,
        &mut err,
        Size::new(window, window),
        params.max_level as i32,
        criteria,
        0,
        MIN_EIGEN_THRESHOLD,
    )?;

    Ok(next_pts
        .iter()
        .zip(status.iter())
        .zip(err.iter())
        .map(|((p, s), e)| TrackedPoint {
            point: Point2::new(p.x, p.y),
            found: s == 1,
            error: e,
        })
        .collect())
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
