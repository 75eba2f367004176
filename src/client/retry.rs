//! Retry discipline: a thin wrapper over the transport.
//!
//! Retries only on transport errors, 5xx statuses, and 429; every other
//! status — success or client error — is returned to the caller untouched,
//! so the wrapper composes with pagination and per-kind upsert logic.
//! Cancellation is terminal: a tripped token stops the loop before the next
//! attempt.

use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::HttpError;

use super::transport::{HttpRequest, HttpResponse, HttpTransport, excerpt};

/// One retry budget: wait between attempts and the number of retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySetting {
    /// Pause between attempts.
    pub wait_time: Duration,
    /// Retries after the initial attempt.
    pub max_retries: u32,
}

/// Named retry presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Short operations (reads, simple writes).
    pub normal: RetrySetting,
    /// Writes that may hit propagation delays.
    pub long: RetrySetting,
    /// Operations known to converge slowly (e.g. freshly created parents).
    pub very_long: RetrySetting,
}

/// The default presets.
pub const DEFAULT_RETRY_SETTINGS: RetrySettings = RetrySettings {
    normal: RetrySetting {
        wait_time: Duration::from_secs(1),
        max_retries: 3,
    },
    long: RetrySetting {
        wait_time: Duration::from_secs(2),
        max_retries: 6,
    },
    very_long: RetrySetting {
        wait_time: Duration::from_secs(5),
        max_retries: 12,
    },
};

/// `true` for statuses worth retrying.
const fn is_retryable(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Send `request`, retrying per `setting`.
///
/// Requests are re-sent as-is between attempts; the transport builds a fresh
/// body each time, so consumed response bodies on the server side are
/// tolerated.
///
/// # Errors
///
/// Returns [`HttpError::Cancelled`] when the token trips,
/// [`HttpError::RetryBudgetExhausted`] when every attempt failed with a
/// retryable outcome. Non-retryable responses (including 4xx other than 429)
/// are returned as `Ok` for the caller to interpret.
pub fn send_with_retry(
    transport: &dyn HttpTransport,
    cancel: &CancelToken,
    request: &HttpRequest,
    setting: RetrySetting,
) -> Result<HttpResponse, HttpError> {
    let attempts = setting.max_retries.saturating_add(1);
    let mut last_status = 0u16;
    let mut last_excerpt = String::new();

    for attempt in 0..attempts {
        if cancel.is_cancelled() {
            return Err(HttpError::Cancelled);
        }
        if attempt > 0 {
            std::thread::sleep(setting.wait_time);
        }

        match transport.execute(request) {
            Ok(response) if !is_retryable(response.status) => return Ok(response),
            Ok(response) => {
                tracing::debug!(
                    "retryable status {} from {} (attempt {}/{attempts})",
                    response.status,
                    request.url,
                    attempt + 1,
                );
                last_status = response.status;
                last_excerpt = response.excerpt();
            }
            Err(HttpError::Network { message, .. }) => {
                tracing::debug!(
                    "network error calling {} (attempt {}/{attempts}): {message}",
                    request.url,
                    attempt + 1,
                );
                last_status = 0;
                last_excerpt = excerpt(&message);
            }
            Err(other) => return Err(other),
        }
    }

    Err(HttpError::RetryBudgetExhausted {
        url: request.url.clone(),
        attempts,
        status: last_status,
        excerpt: last_excerpt,
    })
}
