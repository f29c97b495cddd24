//! Shi-Tomasi corner detection through OpenCV's `goodFeaturesToTrack`.

use nalgebra::Point2;
use opencv::core::{Mat, Point2f, Vector};
use opencv::imgproc;

use crate::error::Result;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Harris free parameter, unused with the minimum eigenvalue response
const HARRIS_K: f64 = 0.04;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Parameters of [`detect_corners`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CornerParams {
    /// Maximum number of corners returned, strongest first
    pub max_corners: usize,

    /// Minimum accepted response as a fraction of the strongest response
    pub quality_level: f32,

    /// Minimum euclidean distance between returned corners, in pixels
    pub min_distance: f32,

    /// Side length of the square the structure tensor is summed over
    pub block_size: usize,
}

impl Default for CornerParams {
    fn default() -> Self {
        Self {
            max_corners: 100,
            quality_level: 0.3,
            min_distance: 7.0,
            block_size: 7,
        }
    }
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Find good features to track in a `CV_8UC1` image, strongest first.
///
/// Returns an empty set if the image has no structure at all.
pub fn detect_corners(gray: &Mat, params: &CornerParams) -> Result<Vec<Point2<f32>>> {
    let mut corners = Vector::<Point2f>::new();

    imgproc::good_features_to_track(
        gray,
        &mut corners,
        params.max_corners as i32,
        params.quality_level as f64,
        params.min_distance as f64,
        &Mat::default(),
        params.block_size as i32,
        false,
        HARRIS_K,
    )?;

    Ok(corners.iter().map(|p| Point2::new(p.x, p.y)).collect())
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
