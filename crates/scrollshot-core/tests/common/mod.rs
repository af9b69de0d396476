//! Shared helpers for scrollshot-core integration tests

#![allow(dead_code)]

use std::sync::Arc;

use scrollshot_core::{
    capture::{
        CancelHandle, CaptureOutcome, CaptureStats, CompositeImage, LongCapture, ProgressSink,
        mock::SimulatedPage,
    },
    error::CaptureResult,
    model::CaptureConfig,
};

/// Capture over `page` using the page for every port, isolation included
pub fn capture_for(page: &Arc<SimulatedPage>, config: CaptureConfig) -> LongCapture {
    LongCapture::new(page.clone(), page.clone(), config).with_isolation(page.clone())
}

/// Probes the target and runs a capture to completion
pub async fn run_capture(
    capture: &LongCapture,
    progress: &dyn ProgressSink,
    cancel: &CancelHandle,
) -> CaptureResult<CaptureOutcome> {
    let target = capture.probe_target().await?;
    capture.run(&target, progress, cancel).await
}

/// Unwraps a completed outcome
///
/// # Panics
///
/// Panics if the capture was cancelled.
pub fn completed(outcome: CaptureOutcome) -> (CompositeImage, CaptureStats) {
    match outcome {
        CaptureOutcome::Completed { image, stats } => (image, stats),
        CaptureOutcome::Cancelled {
            frames_done,
            total_frames,
        } => panic!("capture cancelled after {}/{} frames", frames_done, total_frames),
    }
}
