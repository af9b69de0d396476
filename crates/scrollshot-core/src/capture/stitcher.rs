//! Composite assembly from captured frames
//!
//! The stitcher crops every frame to the target, measures the duplicated
//! band between each adjacent pair, and writes the frames top to bottom,
//! skipping each frame's duplicated leading rows. Frames are never
//! reordered or dropped.

use super::{FrameRecord, ImageBuffer, OverlapDetector};
use crate::{
    error::{CaptureError, CaptureResult},
    model::StitchOptions,
};

/// The assembled long image plus the overlaps that were removed
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeImage {
    image:    ImageBuffer,
    overlaps: Vec<u32>,
}

impl CompositeImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &ImageBuffer {
        &self.image
    }

    pub fn into_image(self) -> ImageBuffer {
        self.image
    }

    /// Rows dropped from the top of each frame; `overlaps[0]` is always 0
    pub fn overlaps(&self) -> &[u32] {
        &self.overlaps
    }
}

/// Assembles frames into a [`CompositeImage`]
#[derive(Debug, Clone)]
pub struct ImageStitcher {
    options:  StitchOptions,
    detector: OverlapDetector,
}

impl ImageStitcher {
    /// Creates a stitcher with validated options
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidParameter`] if the options are out of
    /// range.
    pub fn new(options: StitchOptions) -> CaptureResult<Self> {
        options.validate()?;
        let detector = OverlapDetector::new(&options);
        Ok(Self { options, detector })
    }

    /// Crops and stitches scheduler output
    ///
    /// # Errors
    ///
    /// - [`CaptureError::AssemblyInvariantViolation`] for an empty list,
    ///   non-contiguous frame indices, or a crop outside its snapshot
    /// - [`CaptureError::FrameWidthMismatch`] if crops differ in width
    #[tracing::instrument(name = "stitch", skip_all, fields(frames = frames.len()))]
    pub fn stitch(&self, frames: Vec<FrameRecord>) -> CaptureResult<CompositeImage> {
        if frames.is_empty() {
            return Err(CaptureError::AssemblyInvariantViolation {
                reason: "no frames to stitch".to_string(),
            });
        }

        let mut cropped = Vec::with_capacity(frames.len());
        for (position, frame) in frames.into_iter().enumerate() {
            if frame.index != position {
                return Err(CaptureError::AssemblyInvariantViolation {
                    reason: format!(
                        "frame at position {} has index {}; indices must be contiguous from 0",
                        position, frame.index
                    ),
                });
            }

            let (snap_w, snap_h) = frame.snapshot.dimensions();
            if frame.crop.is_empty() || !frame.crop.fits_within(snap_w, snap_h) {
                return Err(CaptureError::AssemblyInvariantViolation {
                    reason: format!(
                        "frame {} crop {} is not within its {}x{} snapshot",
                        frame.index, frame.crop, snap_w, snap_h
                    ),
                });
            }

            cropped.push(frame.cropped()?);
        }

        self.stitch_cropped(cropped)
    }

    /// Stitches frames that are already cropped to the target
    ///
    /// # Examples
    ///
    /// ```
    /// use scrollshot_core::{
    ///     capture::{ImageBuffer, ImageStitcher},
    ///     model::StitchOptions,
    /// };
    ///
    /// let frames = vec![
    ///     ImageBuffer::solid(50, 100, [255, 0, 0, 255]),
    ///     ImageBuffer::solid(50, 100, [0, 255, 0, 255]),
    /// ];
    /// let stitcher = ImageStitcher::new(StitchOptions::default()).unwrap();
    /// let composite = stitcher.stitch_cropped(frames).unwrap();
    /// assert_eq!(composite.height(), 200);
    /// ```
    pub fn stitch_cropped(&self, frames: Vec<ImageBuffer>) -> CaptureResult<CompositeImage> {
        let Some(first) = frames.first() else {
            return Err(CaptureError::AssemblyInvariantViolation {
                reason: "no frames to stitch".to_string(),
            });
        };

        let width = first.width();
        if width == 0 {
            return Err(CaptureError::AssemblyInvariantViolation {
                reason: "frames have zero width".to_string(),
            });
        }

        if let Some((frame_index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, f)| f.width() != width)
        {
            return Err(CaptureError::FrameWidthMismatch {
                frame_index,
                expected: width,
                actual: frame.width(),
            });
        }

        let overlaps = self.compute_overlaps(&frames);

        for (i, &overlap) in overlaps.iter().enumerate().skip(1) {
            let bound = frames[i - 1].height().min(frames[i].height());
            if overlap > bound {
                return Err(CaptureError::AssemblyInvariantViolation {
                    reason: format!(
                        "overlap {} between frames {} and {} exceeds frame height {}",
                        overlap,
                        i - 1,
                        i,
                        bound
                    ),
                });
            }
        }

        let total_rows: u64 = frames.iter().map(|f| u64::from(f.height())).sum();
        let removed: u64 = overlaps.iter().map(|&o| u64::from(o)).sum();
        let height = total_rows - removed;

        if height == 0 {
            return Err(CaptureError::AssemblyInvariantViolation {
                reason: "composite height is zero".to_string(),
            });
        }
        let height = u32::try_from(height).map_err(|_| CaptureError::AssemblyInvariantViolation {
            reason: format!("composite height {} exceeds the raster limit", height),
        })?;

        let stride = first.stride();
        let mut data = Vec::with_capacity(height as usize * stride);
        for (frame, &overlap) in frames.iter().zip(&overlaps) {
            data.extend_from_slice(frame.rows(overlap, frame.height() - overlap));
        }

        if data.len() != height as usize * stride {
            return Err(CaptureError::AssemblyInvariantViolation {
                reason: format!(
                    "wrote {} bytes for a {}x{} composite",
                    data.len(),
                    width,
                    height
                ),
            });
        }

        tracing::debug!(
            "Stitched {} frames into {}x{} (overlaps {:?})",
            frames.len(),
            width,
            height,
            overlaps
        );

        Ok(CompositeImage {
            image: ImageBuffer::from_raw(width, height, data)?,
            overlaps,
        })
    }

    /// Overlap of each frame with its predecessor; `[0]` is always 0 and
    /// every entry is 0 when duplicate detection is off
    pub fn compute_overlaps(&self, frames: &[ImageBuffer]) -> Vec<u32> {
        let mut overlaps = Vec::with_capacity(frames.len());
        if frames.is_empty() {
            return overlaps;
        }

        overlaps.push(0);
        for pair in frames.windows(2) {
            let overlap = if self.options.detect_duplicates {
                self.detector.detect(&pair[0], &pair[1])
            } else {
                0
            };
            overlaps.push(overlap);
        }
        overlaps
    }
}
