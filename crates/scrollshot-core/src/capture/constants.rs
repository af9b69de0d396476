//! Centralized timing and matching defaults for long captures.
//!
//! # Runtime Configuration
//!
//! The host-dependent values can be overridden at runtime via environment
//! variables (read by [`CaptureConfig::from_env`](crate::model::CaptureConfig::from_env)):
//!
//! | Environment Variable | Default | Description |
//! |---------------------|---------|-------------|
//! | `SCROLLSHOT_SETTLE_DELAY_MS` | 50 | Fixed wait after scrolling, before the snapshot |
//! | `SCROLLSHOT_RATE_LIMIT_BACKOFF_MS` | 500 | Wait after a rate-limited snapshot |
//! | `SCROLLSHOT_MAX_SNAPSHOT_ATTEMPTS` | 3 | Snapshot attempts per frame, including the first |
//! | `SCROLLSHOT_MATCH_TOLERANCE` | 5 | Per-channel pixel tolerance for overlap detection |
//! | `SCROLLSHOT_MATCH_THRESHOLD` | 0.95 | Fraction of samples a candidate overlap must exceed |
//!
//! Invalid or out-of-range values fall back to the default.
//!
//! # Host Considerations
//!
//! Browser-style hosts cap how often the visible viewport can be captured
//! (roughly twice per second). The default backoff is sized to one such
//! window so a single retry usually succeeds. Lazy-loaded content and sticky
//! elements need a couple of composited frames to settle after a scroll,
//! which is what the settle frames plus the settle delay provide.

/// Fraction of the client extent shared by consecutive scroll positions.
///
/// With 0.2 every scroll advances by 80% of the visible height, leaving a
/// band of duplicated rows that the overlap detector removes.
pub const DEFAULT_OVERLAP_RATIO: f64 = 0.2;

/// Composited frames to wait for after each scroll.
pub const DEFAULT_SETTLE_FRAMES: u32 = 2;

/// Fixed delay after the frame wait, before requesting a snapshot.
pub const SETTLE_DELAY_MS: u64 = 50;

/// Wait before retrying a rate-limited snapshot.
pub const RATE_LIMIT_BACKOFF_MS: u64 = 500;

/// Snapshot attempts per frame, including the first one.
pub const MAX_SNAPSHOT_ATTEMPTS: u32 = 3;

/// Per-channel absolute difference under which two pixels match.
///
/// Absorbs JPEG-style compression noise and subpixel font rendering
/// differences between two snapshots of the same content.
pub const DEFAULT_MATCH_TOLERANCE: u8 = 5;

/// Fraction of sampled pixels that must match for an overlap candidate.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.95;

/// Upper bound on the number of columns sampled per row during overlap
/// detection.
pub const MAX_SAMPLE_COLUMNS: u32 = 100;

// =============================================================================
// Environment Variable Overrides
// =============================================================================

/// Helper to read a parseable value from the environment or fall back.
fn get_from_env<T: std::str::FromStr>(env_var: &str, default: T) -> T {
    std::env::var(env_var)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Get the settle delay, checking environment variable override.
///
/// Override with: `SCROLLSHOT_SETTLE_DELAY_MS`
///
/// # Example
///
/// ```bash
/// # Slow pages with heavy lazy loading
/// export SCROLLSHOT_SETTLE_DELAY_MS=250
/// ```
pub fn settle_delay_ms() -> u64 {
    get_from_env("SCROLLSHOT_SETTLE_DELAY_MS", SETTLE_DELAY_MS)
}

/// Get the rate-limit backoff, checking environment variable override.
///
/// Override with: `SCROLLSHOT_RATE_LIMIT_BACKOFF_MS`
pub fn rate_limit_backoff_ms() -> u64 {
    get_from_env("SCROLLSHOT_RATE_LIMIT_BACKOFF_MS", RATE_LIMIT_BACKOFF_MS)
}

/// Get the snapshot attempt limit, checking environment variable override.
///
/// Override with: `SCROLLSHOT_MAX_SNAPSHOT_ATTEMPTS`. Zero is rejected.
pub fn max_snapshot_attempts() -> u32 {
    match get_from_env("SCROLLSHOT_MAX_SNAPSHOT_ATTEMPTS", MAX_SNAPSHOT_ATTEMPTS) {
        0 => MAX_SNAPSHOT_ATTEMPTS,
        n => n,
    }
}

/// Get the per-channel match tolerance, checking environment variable override.
///
/// Override with: `SCROLLSHOT_MATCH_TOLERANCE`
pub fn match_tolerance() -> u8 {
    get_from_env("SCROLLSHOT_MATCH_TOLERANCE", DEFAULT_MATCH_TOLERANCE)
}

/// Get the match fraction threshold, checking environment variable override.
///
/// Override with: `SCROLLSHOT_MATCH_THRESHOLD`. Values outside `(0, 1]` are
/// rejected.
pub fn match_threshold() -> f64 {
    let value = get_from_env("SCROLLSHOT_MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD);
    if value > 0.0 && value <= 1.0 {
        value
    } else {
        DEFAULT_MATCH_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_sanity() {
        assert!(DEFAULT_OVERLAP_RATIO > 0.0 && DEFAULT_OVERLAP_RATIO < 1.0);
        assert!(MAX_SNAPSHOT_ATTEMPTS >= 1);
        assert!(DEFAULT_MATCH_THRESHOLD > 0.0 && DEFAULT_MATCH_THRESHOLD <= 1.0);
        assert!(RATE_LIMIT_BACKOFF_MS > SETTLE_DELAY_MS);
    }

    #[test]
    fn test_env_override_defaults() {
        temp_env::with_vars_unset(
            [
                "SCROLLSHOT_SETTLE_DELAY_MS",
                "SCROLLSHOT_RATE_LIMIT_BACKOFF_MS",
                "SCROLLSHOT_MAX_SNAPSHOT_ATTEMPTS",
                "SCROLLSHOT_MATCH_TOLERANCE",
                "SCROLLSHOT_MATCH_THRESHOLD",
            ],
            || {
                assert_eq!(settle_delay_ms(), SETTLE_DELAY_MS);
                assert_eq!(rate_limit_backoff_ms(), RATE_LIMIT_BACKOFF_MS);
                assert_eq!(max_snapshot_attempts(), MAX_SNAPSHOT_ATTEMPTS);
                assert_eq!(match_tolerance(), DEFAULT_MATCH_TOLERANCE);
                assert_eq!(match_threshold(), DEFAULT_MATCH_THRESHOLD);
            },
        );
    }

    #[test]
    fn test_env_override_with_value() {
        temp_env::with_var("SCROLLSHOT_SETTLE_DELAY_MS", Some("250"), || {
            assert_eq!(settle_delay_ms(), 250);
        });

        temp_env::with_var("SCROLLSHOT_RATE_LIMIT_BACKOFF_MS", Some("1000"), || {
            assert_eq!(rate_limit_backoff_ms(), 1000);
        });

        temp_env::with_var("SCROLLSHOT_MAX_SNAPSHOT_ATTEMPTS", Some("5"), || {
            assert_eq!(max_snapshot_attempts(), 5);
        });

        temp_env::with_var("SCROLLSHOT_MATCH_TOLERANCE", Some("12"), || {
            assert_eq!(match_tolerance(), 12);
        });

        temp_env::with_var("SCROLLSHOT_MATCH_THRESHOLD", Some("0.9"), || {
            assert_eq!(match_threshold(), 0.9);
        });
    }

    #[test]
    fn test_env_override_invalid_value() {
        temp_env::with_var("SCROLLSHOT_SETTLE_DELAY_MS", Some("not_a_number"), || {
            assert_eq!(settle_delay_ms(), SETTLE_DELAY_MS);
        });

        temp_env::with_var("SCROLLSHOT_RATE_LIMIT_BACKOFF_MS", Some("-1"), || {
            assert_eq!(rate_limit_backoff_ms(), RATE_LIMIT_BACKOFF_MS);
        });

        temp_env::with_var("SCROLLSHOT_MAX_SNAPSHOT_ATTEMPTS", Some("0"), || {
            assert_eq!(max_snapshot_attempts(), MAX_SNAPSHOT_ATTEMPTS);
        });

        temp_env::with_var("SCROLLSHOT_MATCH_TOLERANCE", Some("300"), || {
            assert_eq!(match_tolerance(), DEFAULT_MATCH_TOLERANCE);
        });

        temp_env::with_var("SCROLLSHOT_MATCH_THRESHOLD", Some("1.5"), || {
            assert_eq!(match_threshold(), DEFAULT_MATCH_THRESHOLD);
        });
    }
}
