//! Error types for scroll capture and stitching
//!
//! This module defines the error taxonomy for the capture pipeline with
//! user-facing messages and actionable remediation hints. Each error provides
//! context about what went wrong and suggests next steps for resolution.
//!
//! Cancellation is deliberately absent: a cancelled capture is reported as
//! [`CaptureOutcome::Cancelled`](crate::capture::CaptureOutcome::Cancelled),
//! not as an error.
//!
//! # Structured Error Hints
//!
//! In addition to human-readable remediation hints, errors provide structured
//! metadata via [`ErrorHint`] so callers can decide whether to retry without
//! parsing prose.
//!
//! ```rust,ignore
//! let error = CaptureError::RateLimitExceeded { frame_index: 3, attempts: 3 };
//! let hint = error.structured_hint();
//!
//! if hint.is_transient {
//!     // schedule another capture later
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error returned by a [`SnapshotPort`](crate::capture::SnapshotPort)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// The host refused the snapshot because of its rate limit
    #[error("Snapshot rate limit reached")]
    RateLimited,

    /// Any other snapshot failure; never retried
    #[error("Snapshot failed: {0}")]
    Failed(String),
}

/// Error returned by a [`ScrollPort`](crate::capture::ScrollPort)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ScrollError {
    /// Reason reported by the host
    pub reason: String,
}

impl ScrollError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Error returned by an [`IsolationPort`](crate::capture::IsolationPort)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct IsolationError {
    /// Reason reported by the host
    pub reason: String,
}

impl IsolationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Structured error hint for automated recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHint {
    /// Human-readable description of the error and how to fix it
    pub message: String,

    /// Category of recovery action to attempt
    pub recovery_action: RecoveryAction,

    /// Extra machine-readable context
    pub context: Option<serde_json::Value>,

    /// Whether the error is likely transient (retry may succeed)
    pub is_transient: bool,

    /// Error category for grouping/filtering
    pub category: ErrorCategory,
}

/// Category of recovery action a caller can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Retry the whole capture later
    Retry,
    /// Modify parameters and retry
    ModifyParams,
    /// Require user intervention (e.g. scroll the target into view)
    RequireUser,
    /// No automated recovery possible
    None,
}

/// High-level error category for filtering and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Host snapshot throttling
    RateLimited,
    /// Snapshot or scroll primitive failed
    HostFailure,
    /// Target geometry is unusable
    Geometry,
    /// Fixed overlays could not be hidden or shown again
    Isolation,
    /// Invalid parameters or configuration
    InvalidInput,
    /// Frames could not be assembled
    Assembly,
    /// I/O or system error
    SystemError,
    /// Encoding error
    ProcessingError,
}

/// Error type for the capture pipeline
///
/// Each variant includes detailed context and provides remediation hints
/// through the `remediation_hint()` method.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Snapshot retries exhausted on one frame
    #[error("Snapshot rate limit exceeded on frame {frame_index} after {attempts} attempts")]
    RateLimitExceeded {
        /// Frame whose snapshot kept being throttled
        frame_index: usize,
        /// Attempts made, including the first
        attempts:    u32,
    },

    /// Non rate-limit snapshot failure
    #[error("Snapshot failed on frame {frame_index}: {reason}")]
    SnapshotFailure {
        /// Frame being captured
        frame_index: usize,
        /// Reason reported by the snapshot port
        reason:      String,
    },

    /// Target is fully outside the viewport
    #[error("Target is outside the viewport on frame {frame_index} at scroll offset {scroll_offset}")]
    EmptyCropRegion {
        /// Frame being captured
        frame_index:   usize,
        /// Scroll offset at which the target was not visible
        scroll_offset: u32,
    },

    /// Cropped frames disagree on width
    #[error("Frame {frame_index} is {actual}px wide, expected {expected}px")]
    FrameWidthMismatch {
        /// Offending frame
        frame_index: usize,
        /// Width of the first frame
        expected:    u32,
        /// Width of the offending frame
        actual:      u32,
    },

    /// Internal inconsistency while assembling the composite
    #[error("Composite assembly failed: {reason}")]
    AssemblyInvariantViolation {
        /// Description of the violated invariant
        reason: String,
    },

    /// Scroll port operation failed
    #[error("Scroll operation '{operation}' failed: {reason}")]
    ScrollFailure {
        /// Port operation that failed
        operation: String,
        /// Reason reported by the scroll port
        reason:    String,
    },

    /// Overlay isolation or its restoration failed
    #[error("Overlay isolation '{operation}' failed: {reason}")]
    IsolationFailure {
        /// Isolation step that failed, `isolate` or `restore`
        operation: String,
        /// Reason reported by the isolation port
        reason:    String,
    },

    /// Invalid parameter provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: String,
        /// Reason why it's invalid
        reason:    String,
    },

    /// Image encoding failed
    #[error("Failed to encode image as {format}: {reason}")]
    EncodingFailed {
        /// Image format that failed
        format: String,
        /// Reason for encoding failure
        reason: String,
    },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CaptureError {
    /// Wraps a [`ScrollError`] from the named port operation
    pub fn scroll(operation: &str, error: ScrollError) -> Self {
        CaptureError::ScrollFailure {
            operation: operation.to_string(),
            reason:    error.reason,
        }
    }

    /// Wraps an [`IsolationError`] from the named isolation step
    pub fn isolation(operation: &str, error: IsolationError) -> Self {
        CaptureError::IsolationFailure {
            operation: operation.to_string(),
            reason:    error.reason,
        }
    }

    /// Returns an actionable remediation hint for this error
    ///
    /// # Examples
    ///
    /// ```
    /// use scrollshot_core::error::CaptureError;
    ///
    /// let error = CaptureError::RateLimitExceeded {
    ///     frame_index: 2,
    ///     attempts:    3,
    /// };
    ///
    /// let hint = error.remediation_hint();
    /// assert!(hint.contains("rate limit"));
    /// ```
    pub fn remediation_hint(&self) -> &str {
        match self {
            CaptureError::RateLimitExceeded { .. } => {
                "The host kept refusing snapshots because of its rate limit. Wait a moment and \
                 retry, or raise rate_limit_backoff_ms / max_snapshot_attempts."
            }
            CaptureError::SnapshotFailure { .. } => {
                "The snapshot primitive failed. Check that the page is still visible and the \
                 capture permission has not been revoked."
            }
            CaptureError::EmptyCropRegion { .. } => {
                "The target region is not visible in the viewport. Scroll it into view and make \
                 sure no layout shift moves it during capture."
            }
            CaptureError::FrameWidthMismatch { .. } => {
                "Frames were cropped to different widths. The target was resized or moved \
                 horizontally during capture; retry once the layout is stable."
            }
            CaptureError::AssemblyInvariantViolation { .. } => {
                "The frames could not be assembled consistently. This indicates inconsistent \
                 frame geometry; retry the capture."
            }
            CaptureError::ScrollFailure { .. } => {
                "The scroll container could not be scrolled or measured. Ensure the target \
                 element is still attached and scrollable."
            }
            CaptureError::IsolationFailure { operation, .. } => match operation.as_str() {
                "restore" => {
                    "Fixed headers or banners hidden for the capture could not be shown again. \
                     Reload the page to bring them back."
                }
                _ => {
                    "Fixed headers or banners could not be hidden. Capture without overlay \
                     isolation, or dismiss the overlays and retry."
                }
            },
            CaptureError::InvalidParameter { parameter, .. } => match parameter.as_str() {
                "match_fraction_threshold" => "Threshold must be in (0, 1].",
                "max_overlap_height" => "Maximum overlap height must be greater than 0.",
                "overlap_ratio" => "Overlap ratio must be in [0, 1).",
                _ => "Check the parameter value against the documentation.",
            },
            CaptureError::EncodingFailed { format, .. } => match format.as_str() {
                "jpeg" | "jpg" => {
                    "JPEG encoding failed. Long composites may exceed JPEG's 65535px height \
                     limit; use PNG instead."
                }
                _ => "Image encoding failed. Try a different format (PNG, WebP, or JPEG).",
            },
            CaptureError::IoError(_) => {
                "An I/O error occurred. Check file permissions, disk space, and system resources."
            }
        }
    }

    /// Returns a structured error hint for automated recovery.
    ///
    /// # Example
    ///
    /// ```
    /// use scrollshot_core::error::{CaptureError, ErrorCategory, RecoveryAction};
    ///
    /// let error = CaptureError::EmptyCropRegion {
    ///     frame_index:   0,
    ///     scroll_offset: 0,
    /// };
    ///
    /// let hint = error.structured_hint();
    /// assert_eq!(hint.recovery_action, RecoveryAction::RequireUser);
    /// assert_eq!(hint.category, ErrorCategory::Geometry);
    /// ```
    pub fn structured_hint(&self) -> ErrorHint {
        let message = self.remediation_hint().to_string();
        match self {
            CaptureError::RateLimitExceeded {
                frame_index,
                attempts,
            } => ErrorHint {
                message,
                recovery_action: RecoveryAction::Retry,
                context: Some(serde_json::json!({
                    "frame_index": frame_index,
                    "attempts": attempts,
                })),
                is_transient: true,
                category: ErrorCategory::RateLimited,
            },
            CaptureError::SnapshotFailure {
                frame_index,
                reason,
            } => ErrorHint {
                message,
                recovery_action: RecoveryAction::Retry,
                context: Some(serde_json::json!({
                    "frame_index": frame_index,
                    "reason": reason,
                })),
                is_transient: true,
                category: ErrorCategory::HostFailure,
            },
            CaptureError::EmptyCropRegion {
                frame_index,
                scroll_offset,
            } => ErrorHint {
                message,
                recovery_action: RecoveryAction::RequireUser,
                context: Some(serde_json::json!({
                    "frame_index": frame_index,
                    "scroll_offset": scroll_offset,
                })),
                is_transient: false,
                category: ErrorCategory::Geometry,
            },
            CaptureError::FrameWidthMismatch {
                frame_index,
                expected,
                actual,
            } => ErrorHint {
                message,
                recovery_action: RecoveryAction::Retry,
                context: Some(serde_json::json!({
                    "frame_index": frame_index,
                    "expected_width": expected,
                    "actual_width": actual,
                })),
                is_transient: true,
                category: ErrorCategory::Geometry,
            },
            CaptureError::AssemblyInvariantViolation { reason } => ErrorHint {
                message,
                recovery_action: RecoveryAction::Retry,
                context: Some(serde_json::json!({ "reason": reason })),
                is_transient: false,
                category: ErrorCategory::Assembly,
            },
            CaptureError::ScrollFailure { operation, .. } => ErrorHint {
                message,
                recovery_action: RecoveryAction::RequireUser,
                context: Some(serde_json::json!({ "operation": operation })),
                is_transient: false,
                category: ErrorCategory::HostFailure,
            },
            CaptureError::IsolationFailure { operation, reason } => ErrorHint {
                message,
                recovery_action: RecoveryAction::RequireUser,
                context: Some(serde_json::json!({
                    "operation": operation,
                    "reason": reason,
                })),
                is_transient: false,
                category: ErrorCategory::Isolation,
            },
            CaptureError::InvalidParameter { parameter, reason } => ErrorHint {
                message,
                recovery_action: RecoveryAction::ModifyParams,
                context: Some(serde_json::json!({
                    "invalid_parameter": parameter,
                    "reason": reason,
                })),
                is_transient: false,
                category: ErrorCategory::InvalidInput,
            },
            CaptureError::EncodingFailed { format, .. } => ErrorHint {
                message,
                recovery_action: RecoveryAction::ModifyParams,
                context: Some(serde_json::json!({
                    "failed_format": format,
                    "alternatives": match format.as_str() {
                        "webp" => vec!["png", "jpeg"],
                        "jpeg" | "jpg" => vec!["png", "webp"],
                        _ => vec!["png", "jpeg", "webp"],
                    },
                })),
                is_transient: false,
                category: ErrorCategory::ProcessingError,
            },
            CaptureError::IoError(_) => ErrorHint {
                message,
                recovery_action: RecoveryAction::Retry,
                context: None,
                is_transient: true,
                category: ErrorCategory::SystemError,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_exceeded_message() {
        let error = CaptureError::RateLimitExceeded {
            frame_index: 3,
            attempts:    3,
        };

        let msg = error.to_string();
        assert!(msg.contains("rate limit"));
        assert!(msg.contains("frame 3"));
        assert!(msg.contains("3 attempts"));
    }

    #[test]
    fn test_rate_limit_exceeded_hint_is_transient() {
        let error = CaptureError::RateLimitExceeded {
            frame_index: 0,
            attempts:    3,
        };

        let hint = error.structured_hint();
        assert!(hint.is_transient);
        assert_eq!(hint.recovery_action, RecoveryAction::Retry);
        assert_eq!(hint.category, ErrorCategory::RateLimited);
        assert!(error.remediation_hint().contains("rate_limit_backoff_ms"));
    }

    #[test]
    fn test_snapshot_failure_message() {
        let error = CaptureError::SnapshotFailure {
            frame_index: 1,
            reason:      "tab closed".to_string(),
        };

        let msg = error.to_string();
        assert!(msg.contains("frame 1"));
        assert!(msg.contains("tab closed"));
    }

    #[test]
    fn test_empty_crop_region_message() {
        let error = CaptureError::EmptyCropRegion {
            frame_index:   2,
            scroll_offset: 800,
        };

        let msg = error.to_string();
        assert!(msg.contains("outside the viewport"));
        assert!(msg.contains("800"));
        assert!(error.remediation_hint().contains("Scroll it into view"));
    }

    #[test]
    fn test_frame_width_mismatch_hint_context() {
        let error = CaptureError::FrameWidthMismatch {
            frame_index: 4,
            expected:    800,
            actual:      798,
        };

        assert!(error.to_string().contains("798px"));

        let hint = error.structured_hint();
        let context = hint.context.unwrap();
        assert_eq!(context["expected_width"], 800);
        assert_eq!(context["actual_width"], 798);
    }

    #[test]
    fn test_assembly_violation_not_transient() {
        let error = CaptureError::AssemblyInvariantViolation {
            reason: "negative height".to_string(),
        };

        let hint = error.structured_hint();
        assert!(!hint.is_transient);
        assert_eq!(hint.category, ErrorCategory::Assembly);
    }

    #[test]
    fn test_scroll_failure_from_port_error() {
        let error = CaptureError::scroll("set_scroll_offset", ScrollError::new("detached"));

        let msg = error.to_string();
        assert!(msg.contains("set_scroll_offset"));
        assert!(msg.contains("detached"));
    }

    #[test]
    fn test_isolation_failure_not_reported_as_scroll() {
        let error = CaptureError::isolation("isolate", IsolationError::new("overlay detached"));
        let scroll = CaptureError::scroll("isolate", ScrollError::new("overlay detached"));

        assert!(error.to_string().contains("Overlay isolation 'isolate'"));
        assert!(error.to_string().contains("overlay detached"));
        assert_ne!(error.remediation_hint(), scroll.remediation_hint());

        let hint = error.structured_hint();
        assert_eq!(hint.category, ErrorCategory::Isolation);
        assert_eq!(hint.recovery_action, RecoveryAction::RequireUser);
        assert!(!hint.is_transient);
        assert_eq!(hint.context.unwrap()["operation"], "isolate");
    }

    #[test]
    fn test_isolation_restore_hint_mentions_reload() {
        let error = CaptureError::isolation("restore", IsolationError::new("gone"));

        assert!(error.remediation_hint().contains("Reload the page"));
        assert_ne!(
            error.remediation_hint(),
            CaptureError::isolation("isolate", IsolationError::new("gone")).remediation_hint()
        );
    }

    #[test]
    fn test_invalid_parameter_threshold_hint() {
        let error = CaptureError::InvalidParameter {
            parameter: "match_fraction_threshold".to_string(),
            reason:    "value 1.5 is outside (0, 1]".to_string(),
        };

        assert!(error.remediation_hint().contains("(0, 1]"));
        assert_eq!(error.structured_hint().recovery_action, RecoveryAction::ModifyParams);
    }

    #[test]
    fn test_encoding_failed_jpeg_hint() {
        let error = CaptureError::EncodingFailed {
            format: "jpeg".to_string(),
            reason: "image too tall".to_string(),
        };

        assert!(error.remediation_hint().contains("65535"));

        let hint = error.structured_hint();
        let alternatives = &hint.context.unwrap()["alternatives"];
        assert_eq!(alternatives[0], "png");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: CaptureError = io_error.into();

        assert!(error.to_string().contains("I/O error"));
        assert!(error.remediation_hint().contains("disk space"));
    }

    #[test]
    fn test_snapshot_error_display() {
        assert_eq!(SnapshotError::RateLimited.to_string(), "Snapshot rate limit reached");
        assert!(SnapshotError::Failed("boom".to_string()).to_string().contains("boom"));
    }

    #[test]
    fn test_structured_hint_serialization() {
        let error = CaptureError::RateLimitExceeded {
            frame_index: 1,
            attempts:    3,
        };

        let json = serde_json::to_value(error.structured_hint()).unwrap();
        assert_eq!(json["recovery_action"], "retry");
        assert_eq!(json["category"], "rate_limited");
        assert_eq!(json["is_transient"], true);
    }
}
