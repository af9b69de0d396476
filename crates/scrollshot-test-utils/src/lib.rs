//! Test utilities for scrollshot integration tests
//!
//! Shared fixtures and timing helpers for the workspace's integration tests
//! and benchmarks.
//!
//! # Usage
//!
//! Add to your crate's dev-dependencies:
//!
//! ```toml
//! [dev-dependencies]
//! scrollshot-test-utils = { path = "../scrollshot-test-utils" }
//! ```
//!
//! # Modules
//!
//! - [`fixtures`]: Deterministic frames, progress recording, fast configs
//! - [`timing`]: Timing and duration assertion helpers
//!
//! # Example
//!
//! ```
//! use scrollshot_test_utils::fixtures::frames_with_overlaps;
//!
//! let frames = frames_with_overlaps(50, &[100, 100, 100], &[20, 0], 1);
//! assert_eq!(frames.len(), 3);
//! assert_eq!(frames[0].dimensions(), (50, 100));
//! ```

pub mod fixtures;
pub mod timing;

pub use fixtures::{CancelAfterFrames, ProgressLog, fast_config, frames_with_overlaps};
pub use timing::{assert_duration_above, assert_duration_below, measure_async, measure_sync};
