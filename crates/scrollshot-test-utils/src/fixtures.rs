//! Deterministic test fixtures
//!
//! Frames are cut from a noise page so that every duplicated band is exact
//! and no two unrelated rows look alike. Overlap detection on these frames
//! finds precisely the overlap that was built in.

use std::time::Duration;

use parking_lot::Mutex;
use scrollshot_core::{
    capture::{CancelHandle, ImageBuffer, PipelineState, ProgressEvent, ProgressSink},
    model::{CaptureConfig, PixelRect},
};

/// Cuts consecutive frames from one noise page
///
/// Frame `i` has height `heights[i]`; `overlaps[i - 1]` rows at its top
/// repeat the bottom of frame `i - 1`. The page is exactly tall enough, so
/// stitching the frames back with the given overlaps reproduces it.
///
/// # Panics
///
/// Panics if `overlaps.len() + 1 != heights.len()` or an overlap exceeds
/// either neighbour's height.
pub fn frames_with_overlaps(
    width: u32,
    heights: &[u32],
    overlaps: &[u32],
    seed: u64,
) -> Vec<ImageBuffer> {
    assert_eq!(
        overlaps.len() + 1,
        heights.len(),
        "one overlap per adjacent pair of frames"
    );

    let mut starts = Vec::with_capacity(heights.len());
    let mut cursor = 0u32;
    for (i, &height) in heights.iter().enumerate() {
        if i > 0 {
            let overlap = overlaps[i - 1];
            assert!(overlap <= heights[i - 1] && overlap <= height, "overlap too large");
            cursor -= overlap;
        }
        starts.push(cursor);
        cursor += height;
    }

    let page = ImageBuffer::from_test_pattern(width, cursor, seed);
    starts
        .iter()
        .zip(heights)
        .map(|(&y, &height)| {
            page.crop(PixelRect::new(0, y, width, height))
                .expect("frame lies within the page")
        })
        .collect()
}

/// The page [`frames_with_overlaps`] cuts its frames from
pub fn page_for(width: u32, heights: &[u32], overlaps: &[u32], seed: u64) -> ImageBuffer {
    let total: u32 = heights.iter().sum::<u32>() - overlaps.iter().sum::<u32>();
    ImageBuffer::from_test_pattern(width, total, seed)
}

/// Default configuration without the settle delay
///
/// The rate-limit backoff is kept so paused-clock tests can assert it.
pub fn fast_config() -> CaptureConfig {
    CaptureConfig::builder()
        .settle_delay(Duration::ZERO)
        .build()
}

/// Progress sink that records every event
#[derive(Debug, Default)]
pub struct ProgressLog {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    /// `(frames_done, total_frames)` of every frame event, in order
    pub fn frame_progress(&self) -> Vec<(usize, usize)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match *event {
                ProgressEvent::FrameCaptured {
                    frames_done,
                    total_frames,
                } => Some((frames_done, total_frames)),
                _ => None,
            })
            .collect()
    }

    /// Every state change, in order
    pub fn states(&self) -> Vec<PipelineState> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match *event {
                ProgressEvent::StateChanged { state } => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn stitching_started(&self) -> bool {
        self.events
            .lock()
            .iter()
            .any(|event| matches!(event, ProgressEvent::StitchingStarted { .. }))
    }
}

impl ProgressSink for ProgressLog {
    fn on_event(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }
}

/// Progress sink that requests cancellation once `frames` frames are in
#[derive(Debug)]
pub struct CancelAfterFrames {
    frames: usize,
    handle: CancelHandle,
    log:    ProgressLog,
}

impl CancelAfterFrames {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            handle: CancelHandle::new(),
            log: ProgressLog::new(),
        }
    }

    /// The handle to pass to the capture
    pub fn handle(&self) -> &CancelHandle {
        &self.handle
    }

    pub fn log(&self) -> &ProgressLog {
        &self.log
    }
}

impl ProgressSink for CancelAfterFrames {
    fn on_event(&self, event: ProgressEvent) {
        if let ProgressEvent::FrameCaptured { frames_done, .. } = event {
            if frames_done >= self.frames {
                self.handle.cancel();
            }
        }
        self.log.on_event(event);
    }
}
