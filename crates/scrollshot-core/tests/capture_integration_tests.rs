//! End-to-end capture tests against the simulated host page
//!
//! Every test runs on a paused tokio clock, so settle delays and rate-limit
//! backoffs advance virtual time only.

mod common;

use std::{sync::Arc, time::Duration};

use scrollshot_core::{
    capture::{
        CancelHandle, CaptureOutcome, ImageBuffer, LongCapture, NoopProgress, PipelineState,
        SurfaceLock,
        mock::{IsolationEvent, SimulatedPage},
    },
    error::{CaptureError, ErrorCategory, SnapshotError},
    model::{CaptureConfig, Viewport, ViewportRect},
};
use scrollshot_test_utils::{
    CancelAfterFrames, ProgressLog, assert_duration_above, assert_duration_below, fast_config,
    measure_async,
};

use crate::common::{capture_for, completed, run_capture};

#[tokio::test(start_paused = true)]
async fn test_composite_reproduces_page() {
    let page = Arc::new(SimulatedPage::generated(120, 1500, 500, 11));
    let capture = capture_for(&page, fast_config());
    let log = ProgressLog::new();

    let outcome = run_capture(&capture, &log, &CancelHandle::new()).await.unwrap();
    let (image, stats) = completed(outcome);

    assert_eq!(page.scroll_history(), vec![0, 400, 800, 1000, 0]);
    assert_eq!(image.overlaps(), &[0, 100, 100, 300]);
    assert_eq!(image.height(), 1500);
    assert_eq!(image.image(), page.page());

    assert_eq!(stats.frames, 4);
    assert_eq!(stats.snapshot_attempts, 4);
    assert_eq!(stats.rate_limit_retries, 0);
    assert_eq!(log.frame_progress(), vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    assert!(log.stitching_started());
}

#[tokio::test(start_paused = true)]
async fn test_short_last_step() {
    let page = Arc::new(SimulatedPage::generated(64, 1000, 500, 12));
    let capture = capture_for(&page, fast_config());

    let outcome = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap();
    let (image, _) = completed(outcome);

    assert_eq!(page.scroll_history(), vec![0, 400, 500, 0]);
    assert_eq!(image.overlaps(), &[0, 100, 400]);
    assert_eq!(image.image(), page.page());
}

#[tokio::test(start_paused = true)]
async fn test_nothing_to_scroll_single_frame() {
    let page = Arc::new(SimulatedPage::generated(64, 300, 300, 13));
    let capture = capture_for(&page, fast_config());

    let outcome = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap();
    let (image, stats) = completed(outcome);

    assert_eq!(stats.frames, 1);
    assert_eq!(image.height(), 300);
    assert_eq!(image.image(), page.page());
}

#[tokio::test(start_paused = true)]
async fn test_device_scale_two() {
    // 120x1000 CSS px page rendered at 2x behind a container 250 CSS px tall
    let raster = ImageBuffer::from_test_pattern(240, 2000, 14);
    let page = Arc::new(SimulatedPage::new(
        raster,
        Viewport::new(120.0, 300.0, 2.0),
        ViewportRect::new(0.0, 25.0, 120.0, 250.0),
    ));
    let capture = capture_for(&page, fast_config());

    let outcome = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap();
    let (image, _) = completed(outcome);

    assert_eq!(page.scroll_history(), vec![0, 200, 400, 600, 750, 0]);
    assert_eq!(image.overlaps(), &[0, 100, 100, 100, 200]);
    assert_eq!((image.width(), image.height()), (240, 2000));
    assert_eq!(image.image(), page.page());
}

#[tokio::test(start_paused = true)]
async fn test_fixed_header_hidden_by_isolation() {
    let page = Arc::new(
        SimulatedPage::generated(96, 1200, 400, 15).with_header(40.0, [255, 0, 0, 255]),
    );
    let capture = capture_for(&page, fast_config());

    let outcome = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap();
    let (image, _) = completed(outcome);

    assert_eq!(image.image(), page.page());
    assert_eq!(
        page.isolation_events(),
        vec![IsolationEvent::Isolated, IsolationEvent::Restored]
    );
    assert!(!page.is_isolated());
}

#[tokio::test(start_paused = true)]
async fn test_fixed_header_repeats_without_isolation() {
    let page = Arc::new(
        SimulatedPage::generated(96, 1200, 400, 15).with_header(40.0, [255, 0, 0, 255]),
    );
    let capture = LongCapture::new(page.clone(), page.clone(), fast_config());

    let outcome = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap();
    let (image, _) = completed(outcome);

    assert_ne!(image.image(), page.page());
    assert_eq!(image.image().pixel(0, 0), [255, 0, 0, 255]);
    assert!(page.isolation_events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_snapshots_are_retried() {
    let page = Arc::new(SimulatedPage::generated(64, 1000, 500, 16));
    page.script_snapshots([SnapshotError::RateLimited, SnapshotError::RateLimited]);
    let capture = capture_for(&page, fast_config());

    let (outcome, elapsed) = measure_async(
        "capture with two throttled snapshots",
        run_capture(&capture, &NoopProgress, &CancelHandle::new()),
    )
    .await;
    let (image, stats) = completed(outcome.unwrap());

    // Two backoffs of 500ms on the first frame
    assert_duration_above(elapsed, Duration::from_millis(1000), "retry backoff");
    assert_duration_below(elapsed, Duration::from_millis(1500), "retry backoff");
    assert_eq!(stats.rate_limit_retries, 2);
    assert_eq!(stats.snapshot_attempts, 5);
    assert_eq!(page.snapshot_count(), 5);
    assert_eq!(image.image(), page.page());
}

#[tokio::test(start_paused = true)]
async fn test_periodic_throttle_is_absorbed() {
    let page = Arc::new(SimulatedPage::generated(64, 2000, 400, 17).with_rate_limit_every(3));
    let capture = capture_for(&page, fast_config());

    let outcome = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap();
    let (image, stats) = completed(outcome);

    assert!(stats.rate_limit_retries > 0);
    assert_eq!(image.image(), page.page());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_exhausted() {
    let page = Arc::new(SimulatedPage::generated(64, 1500, 500, 18).with_initial_offset(120));
    page.script_snapshots(std::iter::repeat_n(SnapshotError::RateLimited, 4));
    let capture = capture_for(&page, fast_config());
    let log = ProgressLog::new();

    let err = run_capture(&capture, &log, &CancelHandle::new()).await.unwrap_err();

    assert!(matches!(
        err,
        CaptureError::RateLimitExceeded {
            frame_index: 0,
            attempts:    3,
        }
    ));
    assert!(err.structured_hint().is_transient);
    assert_eq!(page.snapshot_count(), 3);
    assert_eq!(page.scroll_history(), vec![0, 120]);
    assert!(!page.is_isolated());
    assert_eq!(
        log.states(),
        vec![PipelineState::Capturing, PipelineState::ScrollRestore, PipelineState::Failed]
    );
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_failure_is_not_retried() {
    let page = Arc::new(SimulatedPage::generated(64, 1500, 500, 19));
    page.script_snapshots([SnapshotError::Failed("renderer crashed".to_string())]);
    let capture = capture_for(&page, fast_config());

    let err = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap_err();

    match err {
        CaptureError::SnapshotFailure {
            frame_index,
            reason,
        } => {
            assert_eq!(frame_index, 0);
            assert_eq!(reason, "renderer crashed");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(page.snapshot_count(), 1);
    assert_eq!(page.scroll_history(), vec![0, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_frames() {
    let page = Arc::new(SimulatedPage::generated(64, 1500, 500, 20).with_initial_offset(250));
    let capture = capture_for(&page, fast_config());
    let sink = CancelAfterFrames::new(2);

    let outcome = run_capture(&capture, &sink, sink.handle()).await.unwrap();

    match outcome {
        CaptureOutcome::Cancelled {
            frames_done,
            total_frames,
        } => {
            assert_eq!(frames_done, 2);
            assert_eq!(total_frames, 4);
        }
        CaptureOutcome::Completed { .. } => panic!("capture was not cancelled"),
    }
    assert_eq!(page.snapshot_count(), 2);
    assert_eq!(page.scroll_history(), vec![0, 400, 250]);
    assert!(!page.is_isolated());
    assert!(!sink.log().stitching_started());
    assert_eq!(
        sink.log().states(),
        vec![PipelineState::Capturing, PipelineState::ScrollRestore, PipelineState::Cancelled]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start() {
    let page = Arc::new(SimulatedPage::generated(64, 1500, 500, 21));
    let capture = capture_for(&page, fast_config());
    let cancel = CancelHandle::new();
    cancel.cancel();

    let outcome = run_capture(&capture, &NoopProgress, &cancel).await.unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(page.snapshot_count(), 0);
    assert_eq!(page.scroll_history(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn test_layout_shift_out_of_viewport() {
    let page = Arc::new(SimulatedPage::generated(64, 1500, 500, 22).with_layout_shift(1, 2000.0));
    let capture = capture_for(&page, fast_config());

    let err = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap_err();

    assert!(matches!(
        err,
        CaptureError::EmptyCropRegion {
            frame_index:   1,
            scroll_offset: 400,
        }
    ));
    // No snapshot is spent on the frame whose target is off screen
    assert_eq!(page.snapshot_count(), 1);
    assert_eq!(page.scroll_history(), vec![0, 400, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_restore_failure_keeps_primary_error() {
    let page = Arc::new(SimulatedPage::generated(64, 1500, 500, 23).fail_scroll_after(1));
    page.script_snapshots([SnapshotError::Failed("tab discarded".to_string())]);
    let capture = capture_for(&page, fast_config());

    let err = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap_err();

    assert!(matches!(err, CaptureError::SnapshotFailure { frame_index: 0, .. }));
    assert_eq!(page.scroll_history(), vec![0]);
    assert!(!page.is_isolated());
}

#[tokio::test(start_paused = true)]
async fn test_restore_failure_after_success() {
    let page = Arc::new(SimulatedPage::generated(64, 1000, 500, 24).fail_scroll_after(3));
    let capture = capture_for(&page, fast_config());

    let err = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap_err();

    match err {
        CaptureError::ScrollFailure { operation, .. } => {
            assert_eq!(operation, "set_scroll_offset");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(page.scroll_history(), vec![0, 400, 500]);
}

#[tokio::test(start_paused = true)]
async fn test_isolation_failure_stops_before_scrolling() {
    let page = Arc::new(SimulatedPage::generated(64, 1500, 500, 30).fail_isolation());
    let capture = capture_for(&page, fast_config());
    let log = ProgressLog::new();

    let err = run_capture(&capture, &log, &CancelHandle::new()).await.unwrap_err();

    match &err {
        CaptureError::IsolationFailure { operation, reason } => {
            assert_eq!(operation, "isolate");
            assert_eq!(reason, "overlay stylesheet rejected");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.structured_hint().category, ErrorCategory::Isolation);
    assert_eq!(page.snapshot_count(), 0);
    assert_eq!(page.scroll_history(), Vec::<u32>::new());
    assert!(page.isolation_events().is_empty());
    assert_eq!(log.states(), vec![PipelineState::Capturing, PipelineState::Failed]);
}

#[tokio::test(start_paused = true)]
async fn test_overlay_restore_failure_after_success() {
    let page = Arc::new(SimulatedPage::generated(64, 1000, 500, 31).fail_restore());
    let capture = capture_for(&page, fast_config());
    let log = ProgressLog::new();

    let err = run_capture(&capture, &log, &CancelHandle::new()).await.unwrap_err();

    match &err {
        CaptureError::IsolationFailure { operation, .. } => assert_eq!(operation, "restore"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.remediation_hint().contains("Reload the page"));
    // Scroll position is restored even though the overlays are not
    assert_eq!(page.scroll_history(), vec![0, 400, 500, 0]);
    assert!(page.is_isolated());
    assert!(!log.stitching_started());
    assert_eq!(log.states().last(), Some(&PipelineState::Failed));
}

#[tokio::test(start_paused = true)]
async fn test_overlay_restore_failure_keeps_snapshot_error() {
    let page = Arc::new(SimulatedPage::generated(64, 1500, 500, 32).fail_restore());
    page.script_snapshots([SnapshotError::Failed("tab discarded".to_string())]);
    let capture = capture_for(&page, fast_config());

    let err = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap_err();

    assert!(matches!(err, CaptureError::SnapshotFailure { frame_index: 0, .. }));
    assert_eq!(page.scroll_history(), vec![0, 0]);
    assert!(page.is_isolated());
}

#[tokio::test(start_paused = true)]
async fn test_settle_waits_for_frames_and_delay() {
    let page = Arc::new(SimulatedPage::generated(64, 1500, 500, 25));
    let config = CaptureConfig::builder()
        .settle_frames(3)
        .settle_delay(Duration::from_millis(50))
        .build();
    let capture = capture_for(&page, config);

    let (outcome, elapsed) = measure_async(
        "settled capture",
        run_capture(&capture, &NoopProgress, &CancelHandle::new()),
    )
    .await;
    completed(outcome.unwrap());

    assert_eq!(page.frames_waited(), 12);
    assert_duration_above(elapsed, Duration::from_millis(200), "settle delay");
}

#[tokio::test(start_paused = true)]
async fn test_shared_surface_lock_serializes_captures() {
    let page = Arc::new(
        SimulatedPage::generated(64, 1000, 500, 26).with_snapshot_delay(Duration::from_millis(10)),
    );
    let lock = SurfaceLock::new();
    let first = capture_for(&page, fast_config()).with_surface_lock(lock.clone());
    let second = capture_for(&page, fast_config()).with_surface_lock(lock.clone());
    let target = first.probe_target().await.unwrap();

    let (cancel_a, cancel_b) = (CancelHandle::new(), CancelHandle::new());

    let (a, b) = futures::join!(
        first.run(&target, &NoopProgress, &cancel_a),
        second.run(&target, &NoopProgress, &cancel_b),
    );

    let (image_a, _) = completed(a.unwrap());
    let (image_b, _) = completed(b.unwrap());

    assert_eq!(page.max_concurrent_snapshots(), 1);
    assert_eq!(page.scroll_history(), vec![0, 400, 500, 0, 0, 400, 500, 0]);
    assert_eq!(image_a.image(), image_b.image());
    assert!(!lock.is_held());
}

#[tokio::test(start_paused = true)]
async fn test_dedup_disabled_keeps_every_row() {
    let page = Arc::new(SimulatedPage::generated(64, 1500, 500, 27));
    let config = CaptureConfig::builder()
        .settle_delay(Duration::ZERO)
        .detect_duplicates(false)
        .build();
    let capture = capture_for(&page, config);

    let outcome = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap();
    let (image, _) = completed(outcome);

    assert_eq!(image.height(), 2000);
    assert_eq!(image.overlaps(), &[0, 0, 0, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_config_from_json_drives_capture() {
    let json = r#"{
        "overlap_ratio": 0.5,
        "settle_delay_ms": 0,
        "stitch": { "max_overlap_height": 300 }
    }"#;
    let config: CaptureConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.max_snapshot_attempts, 3);
    assert!(config.stitch.detect_duplicates);

    let page = Arc::new(SimulatedPage::generated(64, 1000, 400, 28));
    let capture = capture_for(&page, config);

    let outcome = run_capture(&capture, &NoopProgress, &CancelHandle::new()).await.unwrap();
    let (image, _) = completed(outcome);

    assert_eq!(page.scroll_history(), vec![0, 200, 400, 600, 0]);
    assert_eq!(image.overlaps(), &[0, 200, 200, 200]);
    assert_eq!(image.image(), page.page());
}
