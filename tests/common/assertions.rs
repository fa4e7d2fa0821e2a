//! Custom assertion macros and helpers
//!
//! Paused-clock helpers assume `#[tokio::test(start_paused = true)]`.

use tokio::time::{Duration, Instant};

/// Unwrap an auth result, printing the `AuthError` on failure
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        $result.unwrap_or_else(|error| panic!("auth call failed: {error:?}"))
    };
}

/// Check that an auth result failed with an error matching `$pattern`
#[macro_export]
macro_rules! assert_err {
    ($result:expr, $pattern:pat $(,)?) => {
        match $result {
            Err(error) => assert!(
                matches!(error, $pattern),
                "unexpected error {:?}, wanted {}",
                error,
                stringify!($pattern)
            ),
            Ok(value) => panic!("auth call succeeded with {:?}", value),
        }
    };
}

/// Assert that `start.elapsed()` is `expected`, within a millisecond of timer slack
#[track_caller]
pub fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    let slack = Duration::from_millis(2);
    assert!(
        elapsed >= expected && elapsed <= expected + slack,
        "Expected {:?} to have elapsed, got {:?}",
        expected,
        elapsed
    );
}

/// Let spawned tasks run until they block, without moving the clock
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Advance the paused clock by `duration`, letting timers fire along the way
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}

/// Assert that a string contains a substring
#[track_caller]
pub fn assert_contains(haystack: &str, needle: &str) {
    assert!(
        haystack.contains(needle),
        "Expected '{}' to contain '{}'",
        haystack,
        needle
    );
}
