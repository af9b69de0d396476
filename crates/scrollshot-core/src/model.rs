//! Data models and type definitions for scrollshot
//!
//! This module defines the plain data types shared by the capture pipeline:
//! - Geometry in viewport (CSS) and pixel space
//! - The capture target descriptor handed in by the caller
//! - Stitching and scheduling configuration, serializable for config files

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    capture::constants,
    error::{CaptureError, CaptureResult},
};

/// Rectangle in viewport coordinates (CSS pixels, may be fractional)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ViewportRect {
    pub left:   f64,
    pub top:    f64,
    pub width:  f64,
    pub height: f64,
}

impl ViewportRect {
    /// Creates a new rectangle from its origin and extents
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Returns true if the rectangle covers no area
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Intersects two rectangles, returning `None` when they do not overlap
    ///
    /// # Examples
    ///
    /// ```
    /// use scrollshot_core::model::ViewportRect;
    ///
    /// let a = ViewportRect::new(0.0, 0.0, 100.0, 100.0);
    /// let b = ViewportRect::new(50.0, -20.0, 100.0, 100.0);
    /// assert_eq!(a.intersect(&b), Some(ViewportRect::new(50.0, 0.0, 50.0, 80.0)));
    ///
    /// let far = ViewportRect::new(200.0, 0.0, 10.0, 10.0);
    /// assert_eq!(a.intersect(&far), None);
    /// ```
    pub fn intersect(&self, other: &ViewportRect) -> Option<ViewportRect> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        let rect = ViewportRect::new(left, top, right - left, bottom - top);
        if rect.is_empty() { None } else { Some(rect) }
    }
}

/// Rectangle in physical pixel space of a raw snapshot
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct PixelRect {
    pub x:      u32,
    pub y:      u32,
    pub width:  u32,
    pub height: u32,
}

impl PixelRect {
    /// Creates a new pixel rectangle
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The zero-area rectangle, used to signal an unusable frame
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns true if the rectangle lies entirely within a `width` x `height`
    /// raster
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }

    /// Shrinks the rectangle so it lies within a `width` x `height` raster
    ///
    /// Returns the zero rectangle if nothing remains.
    pub fn clamped_to(&self, width: u32, height: u32) -> Self {
        if self.x >= width || self.y >= height {
            return Self::zero();
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return Self::zero();
        }
        Self::new(self.x, self.y, w, h)
    }
}

impl std::fmt::Display for PixelRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} at {},{}", self.width, self.height, self.x, self.y)
    }
}

/// Visible viewport size in CSS pixels plus the device pixel scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Viewport {
    pub width:        f64,
    pub height:       f64,
    /// Ratio of physical pixels to CSS pixels
    pub device_scale: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, device_scale: f64) -> Self {
        Self {
            width,
            height,
            device_scale,
        }
    }

    /// The viewport rectangle `[0, 0, width, height]`
    pub fn bounds(&self) -> ViewportRect {
        ViewportRect::new(0.0, 0.0, self.width, self.height)
    }

    /// Size of a raw viewport snapshot in physical pixels
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            to_pixels((self.width * self.device_scale).ceil()),
            to_pixels((self.height * self.device_scale).ceil()),
        )
    }
}

/// Scroll metrics of the scrollable region, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScrollMetrics {
    /// Visible extent of the scroll container
    pub client_extent:  u32,
    /// Full content extent of the scroll container
    pub scroll_extent:  u32,
    /// Scroll offset when the metrics were read
    pub current_offset: u32,
}

impl ScrollMetrics {
    pub fn new(client_extent: u32, scroll_extent: u32, current_offset: u32) -> Self {
        Self {
            client_extent,
            scroll_extent,
            current_offset,
        }
    }

    /// Distance the content can scroll (`scroll_extent - client_extent`)
    pub fn scrollable_height(&self) -> u32 {
        self.scroll_extent.saturating_sub(self.client_extent)
    }
}

/// Read-only description of the region to capture
///
/// Constructed once per capture request, usually by probing the host with
/// [`LongCapture::probe_target`](crate::capture::LongCapture::probe_target).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptureTarget {
    /// Target bounds in viewport coordinates
    pub bounds:   ViewportRect,
    pub viewport: Viewport,
    pub scroll:   ScrollMetrics,
}

impl CaptureTarget {
    /// Creates a validated capture target
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidParameter`] if `scroll_extent <
    /// client_extent`, the device scale is not positive, or the bounds are
    /// not finite.
    ///
    /// # Examples
    ///
    /// ```
    /// use scrollshot_core::model::{CaptureTarget, ScrollMetrics, Viewport, ViewportRect};
    ///
    /// let target = CaptureTarget::new(
    ///     ViewportRect::new(0.0, 0.0, 800.0, 500.0),
    ///     Viewport::new(800.0, 600.0, 1.0),
    ///     ScrollMetrics::new(500, 1500, 0),
    /// )
    /// .unwrap();
    /// assert_eq!(target.scroll.scrollable_height(), 1000);
    ///
    /// let bad = CaptureTarget::new(
    ///     ViewportRect::new(0.0, 0.0, 800.0, 500.0),
    ///     Viewport::new(800.0, 600.0, 1.0),
    ///     ScrollMetrics::new(500, 400, 0),
    /// );
    /// assert!(bad.is_err());
    /// ```
    pub fn new(
        bounds: ViewportRect,
        viewport: Viewport,
        scroll: ScrollMetrics,
    ) -> CaptureResult<Self> {
        if scroll.scroll_extent < scroll.client_extent {
            return Err(CaptureError::InvalidParameter {
                parameter: "scroll_extent".to_string(),
                reason:    format!(
                    "scroll extent {} is smaller than client extent {}",
                    scroll.scroll_extent, scroll.client_extent
                ),
            });
        }

        if !(viewport.device_scale.is_finite() && viewport.device_scale > 0.0) {
            return Err(CaptureError::InvalidParameter {
                parameter: "device_scale".to_string(),
                reason:    format!("device scale {} must be positive", viewport.device_scale),
            });
        }

        let finite = [
            bounds.left,
            bounds.top,
            bounds.width,
            bounds.height,
            viewport.width,
            viewport.height,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(CaptureError::InvalidParameter {
                parameter: "bounds".to_string(),
                reason:    "target bounds and viewport size must be finite".to_string(),
            });
        }

        Ok(Self {
            bounds,
            viewport,
            scroll,
        })
    }
}

/// Options controlling how frames are stitched together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StitchOptions {
    /// Whether to search for duplicated rows between adjacent frames
    pub detect_duplicates:           bool,
    /// Upper bound on the overlap search window, in pixels (> 0)
    pub max_overlap_height:          u32,
    /// Per-channel absolute difference tolerated when comparing pixels
    pub match_tolerance_per_channel: u8,
    /// Fraction of matching samples a candidate overlap must exceed, in (0, 1]
    pub match_fraction_threshold:    f64,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            detect_duplicates:           true,
            max_overlap_height:          u32::MAX,
            match_tolerance_per_channel: constants::DEFAULT_MATCH_TOLERANCE,
            match_fraction_threshold:    constants::DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl StitchOptions {
    /// Stitch options with duplicate detection turned off
    pub fn without_dedup() -> Self {
        Self {
            detect_duplicates: false,
            ..Self::default()
        }
    }

    /// Validates option ranges
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidParameter`] if `max_overlap_height` is
    /// zero or the threshold lies outside `(0, 1]`.
    pub fn validate(&self) -> CaptureResult<()> {
        if self.max_overlap_height == 0 {
            return Err(CaptureError::InvalidParameter {
                parameter: "max_overlap_height".to_string(),
                reason:    "must be greater than 0".to_string(),
            });
        }

        let t = self.match_fraction_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(CaptureError::InvalidParameter {
                parameter: "match_fraction_threshold".to_string(),
                reason:    format!("value {} is outside (0, 1]", t),
            });
        }

        Ok(())
    }
}

/// Scheduler tuning plus stitch options for one capture session
///
/// Built with [`CaptureConfig::builder`], deserialized from a config file,
/// or read from the environment with [`CaptureConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CaptureConfig {
    /// Fraction of the client extent shared between consecutive frames
    pub overlap_ratio:         f64,
    /// Composited frames to wait for after each scroll
    pub settle_frames:         u32,
    /// Fixed delay after the frame wait, in milliseconds
    pub settle_delay_ms:       u64,
    /// Wait before retrying a rate-limited snapshot, in milliseconds
    pub rate_limit_backoff_ms: u64,
    /// Snapshot attempts per frame, including the first
    pub max_snapshot_attempts: u32,
    pub stitch:                StitchOptions,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            overlap_ratio:         constants::DEFAULT_OVERLAP_RATIO,
            settle_frames:         constants::DEFAULT_SETTLE_FRAMES,
            settle_delay_ms:       constants::SETTLE_DELAY_MS,
            rate_limit_backoff_ms: constants::RATE_LIMIT_BACKOFF_MS,
            max_snapshot_attempts: constants::MAX_SNAPSHOT_ATTEMPTS,
            stitch:                StitchOptions::default(),
        }
    }
}

impl CaptureConfig {
    /// Creates a builder starting from the defaults
    pub fn builder() -> CaptureConfigBuilder {
        CaptureConfigBuilder::default()
    }

    /// Defaults with every environment override applied
    ///
    /// See [`constants`](crate::capture::constants) for the variable names.
    pub fn from_env() -> Self {
        Self {
            settle_delay_ms: constants::settle_delay_ms(),
            rate_limit_backoff_ms: constants::rate_limit_backoff_ms(),
            max_snapshot_attempts: constants::max_snapshot_attempts(),
            stitch: StitchOptions {
                match_tolerance_per_channel: constants::match_tolerance(),
                match_fraction_threshold: constants::match_threshold(),
                ..StitchOptions::default()
            },
            ..Self::default()
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    /// Validates scheduler and stitch settings
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidParameter`] for an overlap ratio outside
    /// `[0, 1)`, zero snapshot attempts, or invalid stitch options.
    pub fn validate(&self) -> CaptureResult<()> {
        if !(self.overlap_ratio >= 0.0 && self.overlap_ratio < 1.0) {
            return Err(CaptureError::InvalidParameter {
                parameter: "overlap_ratio".to_string(),
                reason:    format!("value {} is outside [0, 1)", self.overlap_ratio),
            });
        }

        if self.max_snapshot_attempts == 0 {
            return Err(CaptureError::InvalidParameter {
                parameter: "max_snapshot_attempts".to_string(),
                reason:    "at least one attempt is required".to_string(),
            });
        }

        self.stitch.validate()
    }
}

/// Builder for [`CaptureConfig`]
#[derive(Debug, Clone, Default)]
pub struct CaptureConfigBuilder {
    config: CaptureConfig,
}

impl CaptureConfigBuilder {
    pub fn overlap_ratio(mut self, ratio: f64) -> Self {
        self.config.overlap_ratio = ratio;
        self
    }

    pub fn settle_frames(mut self, frames: u32) -> Self {
        self.config.settle_frames = frames;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn rate_limit_backoff(mut self, backoff: Duration) -> Self {
        self.config.rate_limit_backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn max_snapshot_attempts(mut self, attempts: u32) -> Self {
        self.config.max_snapshot_attempts = attempts;
        self
    }

    pub fn stitch(mut self, stitch: StitchOptions) -> Self {
        self.config.stitch = stitch;
        self
    }

    pub fn detect_duplicates(mut self, enabled: bool) -> Self {
        self.config.stitch.detect_duplicates = enabled;
        self
    }

    pub fn max_overlap_height(mut self, height: u32) -> Self {
        self.config.stitch.max_overlap_height = height;
        self
    }

    pub fn build(self) -> CaptureConfig {
        self.config
    }
}

/// Output image format for encoding a composite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(CaptureError::InvalidParameter {
                parameter: "format".to_string(),
                reason:    format!("'{}' is not one of png, jpeg, webp", other),
            }),
        }
    }
}

/// Converts a non-negative float pixel count to `u32`, saturating
pub(crate) fn to_pixels(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        value as u32
    }
}
