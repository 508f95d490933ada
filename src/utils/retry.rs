//! Bounded retry combinator.
//!
//! Cluster-wide invariants are established by eventual convergence, so the
//! only intentionally-retrying operation in the harness is a poll loop with a
//! fixed interval and an overall bound. Unbounded spinning is not an option.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio::time::Instant;
use tracing::warn;

use crate::Error;

/// Why a poll loop stopped without the predicate turning true.
#[derive(Debug)]
pub enum RetryError {
    /// The overall bound elapsed
    Exhausted { waited: Duration },

    /// The predicate itself failed; polling must not continue
    Aborted(Error),
}

/// Polls `predicate` every `interval` until it returns `Ok(true)` or
/// `timeout` elapses.
///
/// A predicate error aborts the loop immediately, which lets a
/// convergence poll fail fast when a polled node stops, instead of hanging
/// to its full timeout.
pub async fn retry_until<F, Fut>(
    predicate: F,
    interval: Duration,
    timeout: Duration,
) -> std::result::Result<(), RetryError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = crate::Result<bool>>,
{
    let started = Instant::now();
    loop {
        match predicate().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => return Err(RetryError::Aborted(e)),
        }

        let waited = started.elapsed();
        if waited + interval > timeout {
            warn!("poll exhausted after {:?}", waited);
            return Err(RetryError::Exhausted { waited });
        }
        sleep(interval).await;
    }
}
