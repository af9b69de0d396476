//! Long-capture components and host ports
//!
//! # Architecture
//!
//! The host is abstracted behind capability traits that the embedding
//! application implements:
//!
//! - [`ScrollPort`] - Scroll the target container and report its geometry
//! - [`SnapshotPort`] - Capture the visible viewport (rate limited)
//! - [`IsolationPort`] - Hide overlays for the duration of a capture
//!
//! The components, leaves first:
//!
//! | Component | Role |
//! |-----------|------|
//! | [`compute_crop_rect`] | Target bounds + device scale to a pixel crop |
//! | [`CaptureScheduler`] | Scroll sequence, settle, snapshot with retry |
//! | [`OverlapDetector`] | Duplicated rows between two adjacent frames |
//! | [`ImageStitcher`] | Crop, de-duplicate, assemble the composite |
//! | [`LongCapture`] | Isolation, locking, state events, end to end |
//!
//! ## Recommended Usage
//!
//! ```rust,ignore
//! use scrollshot_core::capture::{CancelHandle, ChannelProgress, LongCapture};
//!
//! let capture = LongCapture::new(scroll, snapshot, CaptureConfig::from_env())
//!     .with_isolation(isolation)
//!     .with_surface_lock(lock.clone());
//!
//! let target = capture.probe_target().await?;
//! let (progress, events) = ChannelProgress::channel();
//! match capture.run(&target, &progress, &CancelHandle::new()).await? {
//!     CaptureOutcome::Completed { image, .. } => save(image),
//!     CaptureOutcome::Cancelled { .. } => {}
//! }
//! ```

pub mod constants;
pub mod geometry;
pub mod image_buffer;
pub mod mock;
pub mod overlap;
pub mod pipeline;
pub mod progress;
pub mod scheduler;
pub mod stitcher;
pub mod traits;

pub use geometry::compute_crop_rect;
pub use image_buffer::ImageBuffer;
pub use overlap::OverlapDetector;
pub use pipeline::{CancelHandle, CaptureOutcome, LongCapture, PipelineState, SurfaceLock};
pub use progress::{ChannelProgress, NoopProgress, ProgressEvent, ProgressSink};
pub use scheduler::{
    CaptureScheduler, CaptureStats, FrameRecord, ScheduleOutcome, plan_scroll_offsets,
};
pub use stitcher::{CompositeImage, ImageStitcher};
pub use traits::{IsolationHandle, IsolationPort, NoIsolation, ScrollPort, SnapshotPort};
