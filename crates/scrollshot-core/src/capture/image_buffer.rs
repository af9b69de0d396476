//! Raster wrapper for snapshot and composite data
//!
//! [`ImageBuffer`] wraps an `image::RgbaImage`: a row-major RGBA8 raster with
//! explicit width and height. The overlap detector and stitcher work on raw
//! row slices, so the buffer always stores four channels regardless of what
//! the host delivered.
//!
//! # Examples
//!
//! ```
//! use scrollshot_core::{capture::ImageBuffer, model::PixelRect};
//!
//! let img = ImageBuffer::from_test_pattern(400, 300, 7);
//!
//! let cropped = img.crop(PixelRect::new(10, 20, 100, 50)).unwrap();
//! assert_eq!(cropped.dimensions(), (100, 50));
//! assert_eq!(cropped.pixel(0, 0), img.pixel(10, 20));
//! ```

use image::{DynamicImage, Rgba, RgbaImage};

use crate::{
    error::{CaptureError, CaptureResult},
    model::PixelRect,
};

/// Bytes per pixel in every [`ImageBuffer`]
pub const CHANNELS: usize = 4;

/// Owned RGBA8 raster
///
/// All transformation methods return new `ImageBuffer` instances, leaving
/// the original unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBuffer {
    inner: RgbaImage,
}

impl ImageBuffer {
    /// Wraps an RGBA8 image
    pub fn new(image: RgbaImage) -> Self {
        Self { inner: image }
    }

    /// Converts any decoded image to RGBA8
    ///
    /// # Examples
    ///
    /// ```
    /// use image::DynamicImage;
    /// use scrollshot_core::capture::ImageBuffer;
    ///
    /// let buffer = ImageBuffer::from_dynamic(DynamicImage::new_rgb8(64, 32));
    /// assert_eq!(buffer.dimensions(), (64, 32));
    /// ```
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.into_rgba8())
    }

    /// Builds a buffer from raw RGBA8 bytes
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidParameter`] if `data.len()` is not
    /// `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> CaptureResult<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(CaptureError::InvalidParameter {
                parameter: "data".to_string(),
                reason:    format!(
                    "{} bytes do not describe a {}x{} RGBA8 raster ({} expected)",
                    data.len(),
                    width,
                    height,
                    expected
                ),
            });
        }

        RgbaImage::from_raw(width, height, data)
            .map(Self::new)
            .ok_or_else(|| CaptureError::InvalidParameter {
                parameter: "data".to_string(),
                reason:    "raster buffer rejected".to_string(),
            })
    }

    /// Builds a buffer by evaluating `f` for every pixel
    pub fn from_fn(width: u32, height: u32, f: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        let mut f = f;
        Self::new(RgbaImage::from_fn(width, height, |x, y| Rgba(f(x, y))))
    }

    /// Builds a buffer filled with a single color
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    /// Creates a deterministic, high-entropy test raster
    ///
    /// Every pixel is derived from its coordinates and `seed`, so no two rows
    /// of the pattern look alike. This makes it a good stand-in for a page
    /// whose duplicated rows should be found exactly once.
    ///
    /// # Examples
    ///
    /// ```
    /// use scrollshot_core::capture::ImageBuffer;
    ///
    /// let a = ImageBuffer::from_test_pattern(32, 32, 1);
    /// let b = ImageBuffer::from_test_pattern(32, 32, 1);
    /// assert_eq!(a, b);
    /// ```
    pub fn from_test_pattern(width: u32, height: u32, seed: u64) -> Self {
        Self::from_fn(width, height, |x, y| {
            let v = mix(seed ^ (u64::from(y) << 32 | u64::from(x)));
            [v as u8, (v >> 8) as u8, (v >> 16) as u8, 255]
        })
    }

    /// Crops the image to the specified rectangle
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidParameter`] if the rectangle is empty
    /// or extends beyond the image bounds.
    pub fn crop(&self, rect: PixelRect) -> CaptureResult<Self> {
        let (img_width, img_height) = self.dimensions();

        if rect.is_empty() {
            return Err(CaptureError::InvalidParameter {
                parameter: "crop".to_string(),
                reason:    format!("crop rectangle {} has zero area", rect),
            });
        }

        if !rect.fits_within(img_width, img_height) {
            return Err(CaptureError::InvalidParameter {
                parameter: "crop".to_string(),
                reason:    format!(
                    "crop rectangle {} extends beyond image bounds ({}x{})",
                    rect, img_width, img_height
                ),
            });
        }

        let cropped =
            image::imageops::crop_imm(&self.inner, rect.x, rect.y, rect.width, rect.height)
                .to_image();

        Ok(Self::new(cropped))
    }

    /// Returns the dimensions of the image as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    /// Returns the image width in pixels
    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    /// Returns the image height in pixels
    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    /// Returns the RGBA channels of one pixel
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.inner.get_pixel(x, y).0
    }

    /// Returns row `y` as a contiguous RGBA8 slice
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.inner.as_raw()[start..start + stride]
    }

    /// Returns a contiguous slice of `count` rows starting at `y`
    pub fn rows(&self, y: u32, count: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.inner.as_raw()[start..start + count as usize * stride]
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.inner.width() as usize * CHANNELS
    }

    /// Returns the raw RGBA8 bytes in row-major order
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_raw()
    }

    /// Returns a reference to the underlying image
    pub fn inner(&self) -> &RgbaImage {
        &self.inner
    }

    /// Consumes the buffer and returns the underlying image
    pub fn into_inner(self) -> RgbaImage {
        self.inner
    }

    /// Converts to an RGB8 image, dropping alpha
    ///
    /// Used for formats without an alpha channel such as JPEG.
    pub fn to_rgb8(&self) -> image::RgbImage {
        DynamicImage::ImageRgba8(self.inner.clone()).to_rgb8()
    }
}

impl From<RgbaImage> for ImageBuffer {
    fn from(image: RgbaImage) -> Self {
        Self::new(image)
    }
}

impl From<DynamicImage> for ImageBuffer {
    fn from(image: DynamicImage) -> Self {
        Self::from_dynamic(image)
    }
}

/// SplitMix64 finalizer
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
