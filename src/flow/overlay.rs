//! Drawing of track trails and markers.

use nalgebra::Point2;
use opencv::core::{self, Mat, Point, Scalar, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;

use crate::error::Result;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

pub const TRAIL_THICKNESS: i32 = 2;
pub const MARKER_RADIUS: i32 = 5;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Persistent `CV_8UC3` layer of track trails, added on top of each displayed frame.
pub struct Overlay {
    trails: Mat,

    /// BGR colour of each track
    palette: Vec<Scalar>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Overlay {
    /// Create an overlay with one colour for each of up to `num_colors` tracks.
    ///
    /// The trail layer is empty until [`reset`](Overlay::reset) gives it a size.
    pub fn new(num_colors: usize) -> Self {
        Self {
            trails: Mat::default(),
            palette: palette(num_colors.max(1)),
        }
    }

    /// Colour of the `i`th track.
    pub fn color(&self, i: usize) -> Scalar {
        self.palette[i % self.palette.len()]
    }

    /// Extend the trail of the `i`th track.
    pub fn draw_trail(&mut self, i: usize, from: Point2<f32>, to: Point2<f32>) -> Result<()> {
        let color = self.color(i);
        imgproc::line(
            &mut self.trails,
            pixel(from),
            pixel(to),
            color,
            TRAIL_THICKNESS,
            imgproc::LINE_8,
            0,
        )?;

        Ok(())
    }

    /// Mark the current position of the `i`th track on `img`.
    pub fn draw_marker(&self, img: &mut Mat, i: usize, at: Point2<f32>) -> Result<()> {
        imgproc::circle(
            img,
            pixel(at),
            MARKER_RADIUS,
            self.color(i),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;

        Ok(())
    }

    /// Add the trails onto `img`, saturating each channel.
    pub fn compose(&self, img: &mut Mat) -> Result<()> {
        let mut out = Mat::default();
        core::add(&*img, &self.trails, &mut out, &Mat::default(), -1)?;
        *img = out;

        Ok(())
    }

    /// Clear all trails, resizing the layer to `width` by `height`.
    pub fn reset(&mut self, width: u32, height: u32) -> Result<()> {
        self.trails = Mat::new_rows_cols_with_default(
            height as i32,
            width as i32,
            CV_8UC3,
            Scalar::all(0.0),
        )?;

        Ok(())
    }

    pub fn trails(&self) -> &Mat {
        &self.trails
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Integer pixel of a subpixel position, truncated.
fn pixel(p: Point2<f32>) -> Point {
    Point::new(p.x as i32, p.y as i32)
}

/// Distinct, saturated colours spread around the hue circle.
fn palette(n: usize) -> Vec<Scalar> {
    const GOLDEN: f32 = 0.618_034;

    (0..n)
        .map(|i| hsv_to_bgr((i as f32 * GOLDEN).fract(), 0.85, 1.0))
        .collect()
}

fn hsv_to_bgr(h: f32, s: f32, v: f32) -> Scalar {
    let h6 = h * 6.0;
    let sector = h6.floor() as i32 % 6;
    let f = h6 - h6.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match sector {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    let c = |x: f32| (x * 255.0).floor() as f64;
    Scalar::new(c(b), c(g), c(r), 0.0)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
