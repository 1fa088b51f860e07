//! Bounded exponential backoff
//!
//! After failed attempt `n` (1-based) the caller's task sleeps `unit * 2^(n-1)`
//! before trying again. There is no sleep after the final attempt, and the
//! sleep is not cancellable.

use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use tracing::error;

/// Run `operation` up to `max_attempts` times, returning its first success or
/// the last error.
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: NonZeroU32,
    unit: Duration,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_with_backoff_if(max_attempts, unit, operation, |_| true).await
}

/// Like [`retry_with_backoff`], but an error for which `should_retry` returns
/// false ends the loop immediately.
pub async fn retry_with_backoff_if<T, E, F, Fut, P>(
    max_attempts: NonZeroU32,
    unit: Duration,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = max_attempts.get();
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                error!("Attempt {}: Operation failed: {}", attempt, e);
                if attempt >= max_attempts || !should_retry(&e) {
                    return Err(e);
                }
                tokio::time::sleep(backoff_delay(unit, attempt)).await;
                attempt += 1;
            }
        }
    }
}

/// Unit-returning form: `max_attempts == 0` means no work was requested, so
/// `operation` is never invoked and `Ok(())` is returned.
pub async fn with_retry<E, F, Fut>(max_attempts: u32, unit: Duration, operation: F) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    match NonZeroU32::new(max_attempts) {
        Some(max_attempts) => retry_with_backoff(max_attempts, unit, operation).await,
        None => Ok(()),
    }
}

/// Delay after failed attempt `attempt` (1-based)
pub fn backoff_delay(unit: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    unit.saturating_mul(factor)
}
