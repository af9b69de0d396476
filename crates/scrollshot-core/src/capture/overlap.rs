//! Duplicate-row detection between adjacent frames
//!
//! Two consecutive frames of a scroll capture share a band of rows: the
//! bottom of the previous frame reappears at the top of the current one.
//! [`OverlapDetector::detect`] finds the height of that band.
//!
//! For each candidate height `k`, from the largest allowed down to 1, the
//! last `k` rows of the previous frame are compared with the first `k` rows
//! of the current frame on a grid of up to
//! [`MAX_SAMPLE_COLUMNS`](super::constants::MAX_SAMPLE_COLUMNS) columns. Two
//! pixels match when every colour channel differs by at most the tolerance;
//! alpha is ignored. The first `k` whose match fraction exceeds the
//! threshold wins, so the largest qualifying overlap is returned.

use super::{ImageBuffer, constants::MAX_SAMPLE_COLUMNS, image_buffer::CHANNELS};
use crate::model::StitchOptions;

/// Finds duplicated boundary rows between two frames
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapDetector {
    max_overlap_height: u32,
    tolerance:          u8,
    threshold:          f64,
}

impl OverlapDetector {
    pub fn new(options: &StitchOptions) -> Self {
        Self {
            max_overlap_height: options.max_overlap_height,
            tolerance:          options.match_tolerance_per_channel,
            threshold:          options.match_fraction_threshold,
        }
    }

    /// Returns the number of rows at the top of `current` that duplicate the
    /// bottom of `previous`
    ///
    /// The result never exceeds `max_overlap_height` or either frame's
    /// height. Frames of different or zero width yield 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use scrollshot_core::{
    ///     capture::{ImageBuffer, OverlapDetector},
    ///     model::{PixelRect, StitchOptions},
    /// };
    ///
    /// let page = ImageBuffer::from_test_pattern(120, 300, 9);
    /// let top = page.crop(PixelRect::new(0, 0, 120, 200)).unwrap();
    /// let bottom = page.crop(PixelRect::new(0, 150, 120, 150)).unwrap();
    ///
    /// let detector = OverlapDetector::new(&StitchOptions::default());
    /// assert_eq!(detector.detect(&top, &bottom), 50);
    /// ```
    pub fn detect(&self, previous: &ImageBuffer, current: &ImageBuffer) -> u32 {
        let width = previous.width();
        if width == 0 || width != current.width() {
            return 0;
        }

        let max_k = self
            .max_overlap_height
            .min(previous.height())
            .min(current.height());
        if max_k == 0 {
            return 0;
        }

        let columns = sample_columns(width);

        (1..=max_k)
            .rev()
            .find(|&k| self.window_matches(previous, current, k, &columns))
            .unwrap_or(0)
    }

    /// Compares the bottom `k` rows of `previous` with the top `k` rows of
    /// `current`
    fn window_matches(
        &self,
        previous: &ImageBuffer,
        current: &ImageBuffer,
        k: u32,
        columns: &[usize],
    ) -> bool {
        let total = u64::from(k) * columns.len() as u64;
        let base = previous.height() - k;
        let mut mismatches = 0u64;

        for row in 0..k {
            let prev_row = previous.row(base + row);
            let cur_row = current.row(row);

            for &col in columns {
                let i = col * CHANNELS;
                if !self.pixels_match(&prev_row[i..i + 3], &cur_row[i..i + 3]) {
                    mismatches += 1;
                    if !self.passes(total - mismatches, total) {
                        return false;
                    }
                }
            }
        }

        self.passes(total - mismatches, total)
    }

    fn pixels_match(&self, a: &[u8], b: &[u8]) -> bool {
        a.iter()
            .zip(b)
            .all(|(x, y)| x.abs_diff(*y) <= self.tolerance)
    }

    /// A threshold of 1.0 or more can never be strictly exceeded, so it is
    /// read as "every sample matches"
    fn passes(&self, matches: u64, total: u64) -> bool {
        if total == 0 {
            return false;
        }
        if self.threshold >= 1.0 {
            matches == total
        } else {
            matches as f64 / total as f64 > self.threshold
        }
    }
}

/// Evenly spaced sample columns: `min(width, 100)` of them, `floor(width /
/// count)` apart, starting at 0
fn sample_columns(width: u32) -> Vec<usize> {
    let count = width.min(MAX_SAMPLE_COLUMNS);
    if count == 0 {
        return Vec::new();
    }
    let step = (width / count) as usize;
    (0..count as usize).map(|i| i * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PixelRect;

    fn detector() -> OverlapDetector {
        OverlapDetector::new(&StitchOptions::default())
    }

    fn slice(page: &ImageBuffer, y: u32, height: u32) -> ImageBuffer {
        page.crop(PixelRect::new(0, y, page.width(), height)).unwrap()
    }

    #[test]
    fn test_sample_columns() {
        assert_eq!(sample_columns(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(sample_columns(250).len(), 100);
        assert_eq!(sample_columns(250)[1], 2);
        assert_eq!(*sample_columns(250).last().unwrap(), 198);
        assert!(sample_columns(0).is_empty());
    }

    #[test]
    fn test_detects_exact_overlap() {
        let page = ImageBuffer::from_test_pattern(80, 400, 1);
        let a = slice(&page, 0, 200);
        let b = slice(&page, 170, 200);
        assert_eq!(detector().detect(&a, &b), 30);
    }

    #[test]
    fn test_no_overlap_between_unrelated_frames() {
        let a = ImageBuffer::from_test_pattern(80, 100, 1);
        let b = ImageBuffer::from_test_pattern(80, 100, 2);
        assert_eq!(detector().detect(&a, &b), 0);
    }

    #[test]
    fn test_identical_window_returns_maximal_candidate() {
        let a = ImageBuffer::solid(40, 60, [200, 200, 200, 255]);
        let b = ImageBuffer::solid(40, 90, [200, 200, 200, 255]);
        assert_eq!(detector().detect(&a, &b), 60);

        let capped = OverlapDetector::new(&StitchOptions {
            max_overlap_height: 25,
            ..StitchOptions::default()
        });
        assert_eq!(capped.detect(&a, &b), 25);
    }

    #[test]
    fn test_width_mismatch_yields_zero() {
        let a = ImageBuffer::solid(40, 60, [0, 0, 0, 255]);
        let b = ImageBuffer::solid(41, 60, [0, 0, 0, 255]);
        assert_eq!(detector().detect(&a, &b), 0);
    }

    #[test]
    fn test_tolerance_absorbs_small_noise() {
        let page = ImageBuffer::from_test_pattern(60, 200, 4);
        let a = slice(&page, 0, 120);
        let b = slice(&page, 80, 120);
        let noisy = ImageBuffer::from_fn(60, 120, |x, y| {
            let [r, g, blue, alpha] = b.pixel(x, y);
            [r.saturating_add(3), g.saturating_sub(3), blue, alpha]
        });
        assert_eq!(detector().detect(&a, &noisy), 40);

        let strict = OverlapDetector::new(&StitchOptions {
            match_tolerance_per_channel: 0,
            ..StitchOptions::default()
        });
        assert_eq!(strict.detect(&a, &noisy), 0);
    }

    #[test]
    fn test_alpha_is_ignored() {
        let a = ImageBuffer::solid(10, 10, [9, 9, 9, 255]);
        let b = ImageBuffer::solid(10, 10, [9, 9, 9, 0]);
        assert_eq!(detector().detect(&a, &b), 10);
    }

    #[test]
    fn test_threshold_one_requires_every_sample() {
        let exact = OverlapDetector::new(&StitchOptions {
            match_fraction_threshold: 1.0,
            ..StitchOptions::default()
        });
        let a = ImageBuffer::solid(20, 20, [50, 50, 50, 255]);
        let b = ImageBuffer::solid(20, 20, [50, 50, 50, 255]);
        assert_eq!(exact.detect(&a, &b), 20);

        let mut c = b.clone().into_inner();
        c.put_pixel(0, 0, image::Rgba([0, 0, 0, 255]));
        let c = ImageBuffer::new(c);
        // Row 0 of `c` differs, so only windows that skip it could match, and
        // every window starts at row 0 of the current frame.
        assert_eq!(exact.detect(&a, &c), 0);
    }

    #[test]
    fn test_overlap_never_exceeds_bounds() {
        let opts = StitchOptions {
            max_overlap_height: 15,
            ..StitchOptions::default()
        };
        let det = OverlapDetector::new(&opts);
        for (h1, h2) in [(10, 40), (40, 10), (40, 40), (1, 1)] {
            let a = ImageBuffer::solid(8, h1, [1, 2, 3, 255]);
            let b = ImageBuffer::solid(8, h2, [1, 2, 3, 255]);
            let k = det.detect(&a, &b);
            assert!(k <= 15 && k <= h1 && k <= h2);
        }
    }
}
