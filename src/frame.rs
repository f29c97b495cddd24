//! # Frame Module
//!
//! A single decoded camera frame, along with the colour layout conversions needed by the
//! recorder and the flow visualizer.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::borrow::Cow;

use image::{Bgr, DynamicImage, GenericImageView, GrayImage, ImageBuffer};
use opencv::core::{Mat, Scalar, CV_8UC1, CV_8UC3};
use opencv::prelude::*;

use crate::error::{Error, Result};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// An 8-bit image in BGR channel order, the layout video sinks expect.
pub type BgrImage = ImageBuffer<Bgr<u8>, Vec<u8>>;

/// A frame grabbed from a camera.
///
/// Frames are either single channel (grayscale) or colour, depending on the pixel format the
/// device was configured with.
#[derive(Clone, Debug)]
pub struct Frame {
    img: DynamicImage,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Frame {
    pub fn new(img: DynamicImage) -> Self {
        Self { img }
    }

    pub fn from_gray(img: GrayImage) -> Self {
        Self::new(DynamicImage::ImageLuma8(img))
    }

    pub fn from_bgr(img: BgrImage) -> Self {
        Self::new(DynamicImage::ImageBgr8(img))
    }

    pub fn width(&self) -> u32 {
        self.img.width()
    }

    pub fn height(&self) -> u32 {
        self.img.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// `true` if the frame only has a single (luma) channel.
    pub fn is_gray(&self) -> bool {
        matches!(
            self.img,
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_)
        )
    }

    /// Borrow the underlying image.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.img
    }

    /// Convert the frame into the 3 channel BGR layout.
    ///
    /// Grayscale frames have their luma replicated into every channel, BGR frames are returned
    /// as they are.
    pub fn into_bgr8(self) -> BgrImage {
        match self.img {
            DynamicImage::ImageBgr8(b) => b,
            other => other.to_bgr8(),
        }
    }

    /// Get a 3 channel BGR copy of the frame.
    pub fn to_bgr8(&self) -> BgrImage {
        self.clone().into_bgr8()
    }

    /// Get the frame in the 3 channel BGR layout, only converting if it is not BGR already.
    pub fn bgr8(&self) -> Cow<'_, BgrImage> {
        match &self.img {
            DynamicImage::ImageBgr8(b) => Cow::Borrowed(b),
            other => Cow::Owned(other.to_bgr8()),
        }
    }

    /// Get a single channel copy of the frame.
    pub fn to_luma8(&self) -> GrayImage {
        match &self.img {
            DynamicImage::ImageLuma8(b) => b.clone(),
            other => other.to_luma8(),
        }
    }

    /// Get the luma of the frame as a single channel OpenCV matrix.
    pub fn to_gray_mat(&self) -> Result<Mat> {
        gray_to_mat(&self.to_luma8())
    }

    /// Get the frame as a 3 channel BGR OpenCV matrix.
    pub fn to_bgr_mat(&self) -> Result<Mat> {
        bgr_to_mat(&self.bgr8())
    }
}

impl From<DynamicImage> for Frame {
    fn from(img: DynamicImage) -> Self {
        Self::new(img)
    }
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Copy a gray image into a `CV_8UC1` matrix.
pub fn gray_to_mat(img: &GrayImage) -> Result<Mat> {
    raw_to_mat(img.width(), img.height(), CV_8UC1, img.as_raw())
}

/// Copy a BGR image into a `CV_8UC3` matrix.
pub fn bgr_to_mat(img: &BgrImage) -> Result<Mat> {
    raw_to_mat(img.width(), img.height(), CV_8UC3, img.as_raw())
}

/// Copy a `CV_8UC3` matrix back into a BGR image.
pub fn mat_to_bgr(mat: &Mat) -> Result<BgrImage> {
    if mat.typ() != CV_8UC3 {
        return Err(Error::ImageLayout(format!(
            "expected a CV_8UC3 matrix, got type {}",
            mat.typ()
        )));
    }

    let size = mat.size()?;
    let data = mat.data_bytes()?.to_vec();

    BgrImage::from_raw(size.width as u32, size.height as u32, data)
        .ok_or_else(|| Error::ImageLayout("matrix is not continuous".into()))
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn raw_to_mat(width: u32, height: u32, typ: i32, raw: &[u8]) -> Result<Mat> {
    let mut mat =
        Mat::new_rows_cols_with_default(height as i32, width as i32, typ, Scalar::all(0.0))?;

    let dst = mat.data_bytes_mut()?;
    let len = dst.len();
    if raw.len() < len {
        return Err(Error::ImageLayout(format!(
            "buffer of {} bytes is too short for a {}x{} matrix",
            raw.len(),
            width,
            height
        )));
    }
    dst.copy_from_slice(&raw[..len]);

    Ok(mat)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
