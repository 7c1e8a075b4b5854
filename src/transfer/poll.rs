use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{Result, VaaError};
use crate::spans;
use crate::traits::Clock;

use super::PollingConfig;

/// Calls `fetch` until it yields a value.
///
/// `Ok(None)` and retryable errors count as "not yet"; any other error ends
/// polling at once. Between attempts the loop sleeps on `clock` for the
/// configured backoff (or the server's retry-after, if longer). It gives up
/// with [`VaaError::AttestationTimeout`] once the attempts are spent or the
/// next sleep would overrun `timeout`, and with [`VaaError::Cancelled`] as
/// soon as `cancel` fires.
pub(crate) async fn poll_until_ready<T, F, Fut>(
    clock: &dyn Clock,
    config: &PollingConfig,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
    mut fetch: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = clock.now();
    let max_attempts = config.max_attempts.max(1);

    for attempt in 0..max_attempts {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            result = fetch(attempt) => result,
        };

        let mut delay = config.delay_for_attempt(attempt);
        match result {
            Ok(Some(value)) => {
                info!(attempt = attempt + 1, event = "attestation_ready");
                return Ok(value);
            }
            Ok(None) => {
                debug!(attempt = attempt + 1, event = "attestation_pending");
            }
            Err(VaaError::RateLimitExceeded {
                retry_after_seconds,
            }) => {
                debug!(
                    attempt = attempt + 1,
                    retry_after_seconds,
                    event = "rate_limit_exceeded"
                );
                delay = delay.max(Duration::from_secs(retry_after_seconds));
            }
            Err(e) if e.is_retryable() => {
                debug!(attempt = attempt + 1, error = %e, event = "attestation_pending");
            }
            Err(e) => {
                spans::record_error(&e);
                error!(error = %e, attempt = attempt + 1, event = "attestation_fetch_failed");
                return Err(e);
            }
        }

        if attempt + 1 == max_attempts {
            break;
        }
        if let Some(timeout) = timeout {
            let elapsed = clock.now().saturating_duration_since(started);
            if elapsed + delay > timeout {
                return Err(timed_out(attempt + 1, elapsed));
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = clock.sleep(delay) => {}
        }
    }

    Err(timed_out(
        max_attempts,
        clock.now().saturating_duration_since(started),
    ))
}

fn timed_out(attempts: u32, elapsed: Duration) -> VaaError {
    spans::record_error_with_context(
        "AttestationTimeout",
        &format!("Attestation not available after {attempts} attempts"),
        Some(&format!("Waited {} seconds", elapsed.as_secs())),
    );
    error!(
        attempts,
        elapsed_secs = elapsed.as_secs(),
        event = "attestation_timeout"
    );
    VaaError::AttestationTimeout { attempts }
}

fn cancelled() -> VaaError {
    debug!(event = "attestation_polling_cancelled");
    VaaError::Cancelled
}
