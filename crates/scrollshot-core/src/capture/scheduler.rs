//! Scroll-position scheduling and frame capture
//!
//! [`CaptureScheduler`] walks the scroll container through a fixed sequence
//! of offsets, waits for the page to settle at each one, and snapshots the
//! viewport through the host's rate-limited [`SnapshotPort`]. The result is
//! an ordered list of [`FrameRecord`]s ready for the stitcher.
//!
//! # Offset plan
//!
//! Consecutive positions advance by `client_extent * (1 - overlap_ratio)`
//! (80% of the visible height by default), so adjacent frames share a band
//! of rows. The last offset is clamped to the scrollable height.
//!
//! ```
//! use scrollshot_core::{capture::plan_scroll_offsets, model::ScrollMetrics};
//!
//! let offsets = plan_scroll_offsets(&ScrollMetrics::new(500, 1500, 0), 0.2).unwrap();
//! assert_eq!(offsets, vec![0, 400, 800, 1000]);
//! ```
//!
//! # Exit paths
//!
//! Whatever happens between the first scroll and the last snapshot, the
//! scheduler scrolls the container back to the offset it found it at before
//! returning.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};

use super::{
    CancelHandle, ImageBuffer, PipelineState, ProgressEvent, ProgressSink, ScrollPort,
    SnapshotPort, geometry::compute_crop_rect,
};
use crate::{
    error::{CaptureError, CaptureResult, SnapshotError},
    model::{CaptureConfig, CaptureTarget, PixelRect, ScrollMetrics},
};

/// Tolerance for float noise in the step arithmetic
const STEP_EPSILON: f64 = 1e-9;

/// One captured viewport snapshot plus where to cut the target out of it
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    /// Position in the capture sequence, contiguous from 0
    pub index:         usize,
    /// Raw viewport snapshot at device resolution
    pub snapshot:      ImageBuffer,
    /// Target rectangle within `snapshot`
    pub crop:          PixelRect,
    /// Scroll offset at capture time
    pub scroll_offset: u32,
}

impl FrameRecord {
    /// Extracts the target region from the raw snapshot
    pub fn cropped(&self) -> CaptureResult<ImageBuffer> {
        self.snapshot.crop(self.crop)
    }
}

/// Counters for one scheduler run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureStats {
    /// Frames captured successfully
    pub frames:             usize,
    /// Snapshot requests made, including throttled ones
    pub snapshot_attempts:  u32,
    /// Snapshot requests that were rate limited and retried
    pub rate_limit_retries: u32,
    /// Wall-clock time the scheduler started
    pub started_at:         DateTime<Utc>,
    /// Time spent capturing frames, including the scroll restore
    pub elapsed:            Duration,
}

impl CaptureStats {
    fn start() -> Self {
        Self {
            frames:             0,
            snapshot_attempts:  0,
            rate_limit_retries: 0,
            started_at:         Utc::now(),
            elapsed:            Duration::ZERO,
        }
    }
}

/// Result of a scheduler run that did not fail
#[derive(Debug)]
pub enum ScheduleOutcome {
    /// Every planned frame was captured
    Completed {
        frames: Vec<FrameRecord>,
        stats:  CaptureStats,
    },
    /// Cancellation was requested between frames; captured frames were
    /// discarded
    Cancelled {
        frames_done:  usize,
        total_frames: usize,
    },
}

/// Computes the scroll offsets to capture, in order
///
/// - `scrollable_height == 0`: one frame at the current offset
/// - otherwise `ceil(scrollable / step) + 1` frames, where
///   `step = client_extent * (1 - overlap_ratio)`; frame `i` sits at
///   `min(i * step, scrollable)`
///
/// # Errors
///
/// Returns [`CaptureError::InvalidParameter`] if the overlap ratio is outside
/// `[0, 1)` or the step would be shorter than one pixel.
///
/// # Examples
///
/// ```
/// use scrollshot_core::{capture::plan_scroll_offsets, model::ScrollMetrics};
///
/// // Nothing to scroll: single frame where the page already is
/// let offsets = plan_scroll_offsets(&ScrollMetrics::new(500, 500, 0), 0.2).unwrap();
/// assert_eq!(offsets, vec![0]);
///
/// // The last step is shortened so offsets never pass the scrollable height
/// let offsets = plan_scroll_offsets(&ScrollMetrics::new(500, 1000, 0), 0.2).unwrap();
/// assert_eq!(offsets, vec![0, 400, 500]);
/// ```
pub fn plan_scroll_offsets(metrics: &ScrollMetrics, overlap_ratio: f64) -> CaptureResult<Vec<u32>> {
    let scrollable = metrics.scrollable_height();
    if scrollable == 0 {
        return Ok(vec![metrics.current_offset]);
    }

    if !(0.0..1.0).contains(&overlap_ratio) {
        return Err(CaptureError::InvalidParameter {
            parameter: "overlap_ratio".to_string(),
            reason:    format!("value {} is outside [0, 1)", overlap_ratio),
        });
    }

    let step = f64::from(metrics.client_extent) * (1.0 - overlap_ratio);
    if step < 1.0 {
        return Err(CaptureError::InvalidParameter {
            parameter: "client_extent".to_string(),
            reason:    format!(
                "scroll step {:.3}px is shorter than one pixel (client extent {})",
                step, metrics.client_extent
            ),
        });
    }

    let scrollable_f = f64::from(scrollable);
    let total = (scrollable_f / step - STEP_EPSILON).ceil() as usize + 1;

    let offsets = (0..total)
        .map(|i| {
            if i == 0 {
                0
            } else {
                let offset = (i as f64 * step + STEP_EPSILON).floor();
                offset.min(scrollable_f) as u32
            }
        })
        .collect();

    Ok(offsets)
}

/// Drives scrolling and snapshotting for one capture
pub struct CaptureScheduler {
    scroll:   Arc<dyn ScrollPort>,
    snapshot: Arc<dyn SnapshotPort>,
    config:   CaptureConfig,
}

impl CaptureScheduler {
    pub fn new(
        scroll: Arc<dyn ScrollPort>,
        snapshot: Arc<dyn SnapshotPort>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            scroll,
            snapshot,
            config,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Captures every planned frame for `target`
    ///
    /// Progress is reported after each successful frame. Cancellation is
    /// honoured before each frame; a cancelled run returns
    /// [`ScheduleOutcome::Cancelled`] and no frames.
    ///
    /// The container is scrolled back to `target.scroll.current_offset` on
    /// every exit path. If that restore fails after an earlier error, the
    /// earlier error is returned and the restore failure is logged.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::RateLimitExceeded`] when one frame exhausts its
    ///   snapshot attempts
    /// - [`CaptureError::SnapshotFailure`] on any other snapshot error
    /// - [`CaptureError::EmptyCropRegion`] if the target leaves the viewport
    /// - [`CaptureError::ScrollFailure`] if the scroll port fails
    /// - [`CaptureError::InvalidParameter`] for an unusable configuration
    #[tracing::instrument(
        name = "capture_frames",
        skip_all,
        fields(
            client_extent = target.scroll.client_extent,
            scroll_extent = target.scroll.scroll_extent
        )
    )]
    pub async fn run(
        &self,
        target: &CaptureTarget,
        progress: &dyn ProgressSink,
        cancel: &CancelHandle,
    ) -> CaptureResult<ScheduleOutcome> {
        self.config.validate()?;

        let offsets = plan_scroll_offsets(&target.scroll, self.config.overlap_ratio)?;
        let started = Instant::now();
        let mut stats = CaptureStats::start();

        tracing::debug!("Planned {} frames at offsets {:?}", offsets.len(), offsets);

        let result = self
            .capture_frames(target, &offsets, progress, cancel, &mut stats)
            .await;

        progress.on_event(ProgressEvent::StateChanged {
            state: PipelineState::ScrollRestore,
        });
        let original = target.scroll.current_offset;
        let restored = self.scroll.set_scroll_offset(original).await;

        stats.elapsed = started.elapsed();

        match (result, restored) {
            (Err(primary), Err(restore_err)) => {
                tracing::error!(
                    "Failed to restore scroll offset {} after capture error: {}",
                    original,
                    restore_err
                );
                Err(primary)
            }
            (Err(primary), Ok(())) => Err(primary),
            (Ok(_), Err(restore_err)) => {
                Err(CaptureError::scroll("set_scroll_offset", restore_err))
            }
            (Ok(None), Ok(())) => {
                let frames_done = stats.frames;
                tracing::info!(
                    "Capture cancelled after {} of {} frames",
                    frames_done,
                    offsets.len()
                );
                Ok(ScheduleOutcome::Cancelled {
                    frames_done,
                    total_frames: offsets.len(),
                })
            }
            (Ok(Some(frames)), Ok(())) => {
                tracing::info!(
                    "Captured {} frames in {:?} ({} snapshot attempts, {} rate-limit retries)",
                    frames.len(),
                    stats.elapsed,
                    stats.snapshot_attempts,
                    stats.rate_limit_retries
                );
                Ok(ScheduleOutcome::Completed { frames, stats })
            }
        }
    }

    /// Returns `None` when cancelled
    async fn capture_frames(
        &self,
        target: &CaptureTarget,
        offsets: &[u32],
        progress: &dyn ProgressSink,
        cancel: &CancelHandle,
        stats: &mut CaptureStats,
    ) -> CaptureResult<Option<Vec<FrameRecord>>> {
        let total_frames = offsets.len();
        let mut frames = Vec::with_capacity(total_frames);

        for (index, &offset) in offsets.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            self.scroll
                .set_scroll_offset(offset)
                .await
                .map_err(|e| CaptureError::scroll("set_scroll_offset", e))?;
            self.settle().await;

            let scroll_offset = self
                .scroll
                .current_offset()
                .await
                .map_err(|e| CaptureError::scroll("current_offset", e))?;
            let bounds = self
                .scroll
                .target_bounds()
                .await
                .map_err(|e| CaptureError::scroll("target_bounds", e))?;

            // Geometry first: an off-screen target must not cost a snapshot.
            let crop = compute_crop_rect(bounds, &target.viewport);
            if crop.is_empty() {
                return Err(CaptureError::EmptyCropRegion {
                    frame_index: index,
                    scroll_offset,
                });
            }

            let snapshot = self.snapshot_with_retry(index, stats).await?;

            let crop = crop.clamped_to(snapshot.width(), snapshot.height());
            if crop.is_empty() {
                return Err(CaptureError::EmptyCropRegion {
                    frame_index: index,
                    scroll_offset,
                });
            }

            tracing::debug!(
                "Frame {}/{} at offset {}: snapshot {}x{}, crop {}",
                index + 1,
                total_frames,
                scroll_offset,
                snapshot.width(),
                snapshot.height(),
                crop
            );

            frames.push(FrameRecord {
                index,
                snapshot,
                crop,
                scroll_offset,
            });
            stats.frames = frames.len();

            progress.on_event(ProgressEvent::FrameCaptured {
                frames_done: frames.len(),
                total_frames,
            });
        }

        Ok(Some(frames))
    }

    async fn settle(&self) {
        if self.config.settle_frames > 0 {
            self.scroll.wait_for_frames(self.config.settle_frames).await;
        }
        let delay = self.config.settle_delay();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    async fn snapshot_with_retry(
        &self,
        frame_index: usize,
        stats: &mut CaptureStats,
    ) -> CaptureResult<ImageBuffer> {
        let max_attempts = self.config.max_snapshot_attempts.max(1);
        let backoff = self.config.rate_limit_backoff();
        let mut attempts = 0;

        loop {
            attempts += 1;
            stats.snapshot_attempts += 1;

            match self.snapshot.capture_viewport().await {
                Ok(image) => return Ok(image),
                Err(SnapshotError::RateLimited) if attempts < max_attempts => {
                    tracing::warn!(
                        "Snapshot rate limited on frame {} (attempt {}/{}), backing off {:?}",
                        frame_index,
                        attempts,
                        max_attempts,
                        backoff
                    );
                    stats.rate_limit_retries += 1;
                    sleep(backoff).await;
                }
                Err(SnapshotError::RateLimited) => {
                    return Err(CaptureError::RateLimitExceeded {
                        frame_index,
                        attempts,
                    });
                }
                Err(SnapshotError::Failed(reason)) => {
                    return Err(CaptureError::SnapshotFailure {
                        frame_index,
                        reason,
                    });
                }
            }
        }
    }
}
