//! Long-capture orchestration
//!
//! [`LongCapture`] ties the pieces together for one capture request:
//!
//! ```text
//! IDLE -> CAPTURING (scroll, settle, snapshot[retry]) -> SCROLL_RESTORE
//!      -> STITCHING -> DONE
//! ```
//!
//! `FAILED` and `CANCELLED` are reachable from any step, always after the
//! scroll offset and the isolated overlays have been restored. The caller
//! receives a composite image, a typed error, or a cancellation, never a
//! partial image.
//!
//! # Exclusivity
//!
//! Only one capture may drive a host surface at a time. Captures that share
//! a [`SurfaceLock`] run one after another.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use scrollshot_core::{
//!     capture::{CancelHandle, CaptureOutcome, LongCapture, NoopProgress, mock::SimulatedPage},
//!     model::CaptureConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let page = Arc::new(SimulatedPage::generated(120, 900, 300, 5));
//!     let config = CaptureConfig::builder()
//!         .settle_delay(std::time::Duration::ZERO)
//!         .build();
//!
//!     let capture =
//!         LongCapture::new(page.clone(), page.clone(), config).with_isolation(page.clone());
//!     let target = capture.probe_target().await.unwrap();
//!
//!     let outcome = capture.run(&target, &NoopProgress, &CancelHandle::new()).await.unwrap();
//!     match outcome {
//!         CaptureOutcome::Completed { image, .. } => assert_eq!(image.height(), 900),
//!         CaptureOutcome::Cancelled { .. } => unreachable!(),
//!     }
//! }
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use super::{
    CaptureScheduler, CaptureStats, CompositeImage, ImageStitcher, IsolationPort, NoIsolation,
    ProgressEvent, ProgressSink, ScheduleOutcome, ScrollPort, SnapshotPort,
};
use crate::{
    error::{CaptureError, CaptureResult},
    model::{CaptureConfig, CaptureTarget, ScrollMetrics},
};

/// Externally observable pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Capturing,
    ScrollRestore,
    Stitching,
    Done,
    Failed,
    Cancelled,
}

/// Cooperative cancellation flag
///
/// Clones share the flag. The scheduler checks it before every frame, so a
/// request takes effect at the next frame boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Serializes captures against one host surface
///
/// Clones share the lock.
#[derive(Debug, Clone, Default)]
pub struct SurfaceLock(Arc<Mutex<()>>);

impl SurfaceLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other capture holds the surface
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }

    /// Returns true if a capture currently holds the surface
    pub fn is_held(&self) -> bool {
        self.0.try_lock().is_err()
    }
}

/// Final result of a capture that did not fail
#[derive(Debug)]
pub enum CaptureOutcome {
    Completed {
        image: CompositeImage,
        stats: CaptureStats,
    },
    Cancelled {
        frames_done:  usize,
        total_frames: usize,
    },
}

impl CaptureOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CaptureOutcome::Cancelled { .. })
    }
}

/// One long capture against a host surface
pub struct LongCapture {
    scroll:    Arc<dyn ScrollPort>,
    snapshot:  Arc<dyn SnapshotPort>,
    isolation: Arc<dyn IsolationPort>,
    lock:      SurfaceLock,
    config:    CaptureConfig,
}

impl LongCapture {
    /// Creates a capture with no isolation and a private surface lock
    pub fn new(
        scroll: Arc<dyn ScrollPort>,
        snapshot: Arc<dyn SnapshotPort>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            scroll,
            snapshot,
            isolation: Arc::new(NoIsolation),
            lock: SurfaceLock::new(),
            config,
        }
    }

    pub fn with_isolation(mut self, isolation: Arc<dyn IsolationPort>) -> Self {
        self.isolation = isolation;
        self
    }

    /// Shares `lock` with other captures on the same surface
    pub fn with_surface_lock(mut self, lock: SurfaceLock) -> Self {
        self.lock = lock;
        self
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Reads the current target geometry and scroll metrics from the host
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::ScrollFailure`] if a port query fails, or
    /// [`CaptureError::InvalidParameter`] if the reported geometry is
    /// inconsistent.
    pub async fn probe_target(&self) -> CaptureResult<CaptureTarget> {
        let port = &self.scroll;
        let bounds = port
            .target_bounds()
            .await
            .map_err(|e| CaptureError::scroll("target_bounds", e))?;
        let viewport = port
            .viewport()
            .await
            .map_err(|e| CaptureError::scroll("viewport", e))?;
        let client_extent = port
            .client_extent()
            .await
            .map_err(|e| CaptureError::scroll("client_extent", e))?;
        let scroll_extent = port
            .scroll_extent()
            .await
            .map_err(|e| CaptureError::scroll("scroll_extent", e))?;
        let current_offset = port
            .current_offset()
            .await
            .map_err(|e| CaptureError::scroll("current_offset", e))?;

        CaptureTarget::new(
            bounds,
            viewport,
            ScrollMetrics::new(client_extent, scroll_extent, current_offset),
        )
    }

    /// Runs the full capture for `target`
    ///
    /// Holds the surface lock for the whole run. Overlays are isolated before
    /// the first scroll and restored on every exit path; a restore failure
    /// after an earlier error is logged and the earlier error returned.
    ///
    /// # Errors
    ///
    /// Any [`CaptureError`] raised by configuration validation, the scheduler
    /// or the stitcher. Isolation errors surface as
    /// [`CaptureError::IsolationFailure`].
    pub async fn run(
        &self,
        target: &CaptureTarget,
        progress: &dyn ProgressSink,
        cancel: &CancelHandle,
    ) -> CaptureResult<CaptureOutcome> {
        let _surface = self.lock.acquire().await;

        emit_state(progress, PipelineState::Capturing);
        tracing::info!(
            "Starting long capture: {} of {} rows scrollable",
            target.scroll.scrollable_height(),
            target.scroll.scroll_extent
        );

        let stitcher = match self
            .config
            .validate()
            .and_then(|()| ImageStitcher::new(self.config.stitch.clone()))
        {
            Ok(stitcher) => stitcher,
            Err(e) => return fail(progress, e),
        };

        let handle = match self.isolation.isolate().await {
            Ok(handle) => handle,
            Err(e) => return fail(progress, CaptureError::isolation("isolate", e)),
        };

        let scheduler =
            CaptureScheduler::new(self.scroll.clone(), self.snapshot.clone(), self.config.clone());
        let scheduled = scheduler.run(target, progress, cancel).await;
        let restored = self.isolation.restore(handle).await;

        let scheduled = match (scheduled, restored) {
            (Err(primary), Err(restore_err)) => {
                tracing::error!(
                    "Failed to restore isolated overlays after capture error: {}",
                    restore_err
                );
                Err(primary)
            }
            (Ok(_), Err(restore_err)) => Err(CaptureError::isolation("restore", restore_err)),
            (scheduled, Ok(())) => scheduled,
        };

        match scheduled {
            Err(e) => fail(progress, e),
            Ok(ScheduleOutcome::Cancelled {
                frames_done,
                total_frames,
            }) => {
                emit_state(progress, PipelineState::Cancelled);
                Ok(CaptureOutcome::Cancelled {
                    frames_done,
                    total_frames,
                })
            }
            Ok(ScheduleOutcome::Completed { frames, stats }) => {
                emit_state(progress, PipelineState::Stitching);
                progress.on_event(ProgressEvent::StitchingStarted {
                    frame_count: frames.len(),
                });

                match stitcher.stitch(frames) {
                    Ok(image) => {
                        tracing::info!(
                            "Long capture complete: {}x{} from {} frames",
                            image.width(),
                            image.height(),
                            stats.frames
                        );
                        emit_state(progress, PipelineState::Done);
                        Ok(CaptureOutcome::Completed { image, stats })
                    }
                    Err(e) => fail(progress, e),
                }
            }
        }
    }
}

fn emit_state(progress: &dyn ProgressSink, state: PipelineState) {
    progress.on_event(ProgressEvent::StateChanged { state });
}

fn fail<T>(progress: &dyn ProgressSink, error: CaptureError) -> CaptureResult<T> {
    tracing::warn!("Long capture failed: {}", error);
    emit_state(progress, PipelineState::Failed);
    Err(error)
}
