//! Timing and performance measurement utilities
//!
//! - [`measure_sync`]: Simple synchronous timing wrapper
//! - [`measure_async`]: Async timing on the tokio clock, so it also measures
//!   virtual time under `#[tokio::test(start_paused = true)]`
//! - [`assert_duration_below`]: Assert duration is under threshold
//! - [`assert_duration_above`]: Assert duration exceeds minimum

use std::{
    future::Future,
    time::{Duration, Instant},
};

/// Measure the duration of a synchronous operation
///
/// Returns the result and elapsed wall-clock duration.
///
/// # Example
///
/// ```ignore
/// use scrollshot_test_utils::timing::measure_sync;
///
/// let (composite, duration) = measure_sync("stitch", || stitcher.stitch_cropped(frames));
/// ```
pub fn measure_sync<F, T>(name: &str, f: F) -> (T, Duration)
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    println!("[TIMING] {}: {:.2}ms", name, elapsed.as_secs_f64() * 1000.0);
    (result, elapsed)
}

/// Measure the duration of an async operation on the tokio clock
///
/// With a paused runtime the result is virtual time: sleeps and backoffs
/// count in full even though the test does not wait for them.
pub async fn measure_async<F, T>(name: &str, fut: F) -> (T, Duration)
where
    F: Future<Output = T>,
{
    let start = tokio::time::Instant::now();
    let result = fut.await;
    let elapsed = start.elapsed();
    println!("[TIMING] {}: {:.2}ms", name, elapsed.as_secs_f64() * 1000.0);
    (result, elapsed)
}

/// Asserts that a duration is below a threshold
///
/// # Example
///
/// ```
/// use scrollshot_test_utils::timing::assert_duration_below;
/// use std::time::Duration;
///
/// assert_duration_below(Duration::from_millis(500), Duration::from_secs(1), "capture");
/// ```
///
/// # Panics
///
/// Panics if `actual > threshold` with a message showing the excess time.
pub fn assert_duration_below(actual: Duration, threshold: Duration, operation: &str) {
    assert!(
        actual <= threshold,
        "{} took {:.3}s, expected <={:.3}s ({}ms over threshold)",
        operation,
        actual.as_secs_f64(),
        threshold.as_secs_f64(),
        (actual.as_millis() as i128) - (threshold.as_millis() as i128)
    );
}

/// Asserts that a duration is at least a minimum
///
/// Used to check that backoffs and settle delays were actually applied.
///
/// # Example
///
/// ```
/// use scrollshot_test_utils::timing::assert_duration_above;
/// use std::time::Duration;
///
/// assert_duration_above(Duration::from_millis(1000), Duration::from_millis(1000), "backoff");
/// ```
///
/// # Panics
///
/// Panics if `actual < minimum`.
pub fn assert_duration_above(actual: Duration, minimum: Duration, operation: &str) {
    assert!(
        actual >= minimum,
        "{} took {:.3}s, expected >={:.3}s",
        operation,
        actual.as_secs_f64(),
        minimum.as_secs_f64()
    );
}
