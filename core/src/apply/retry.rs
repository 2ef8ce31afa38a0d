//! Bounded retry for known transient engine errors

use std::future::Future;
use tracing::warn;

use crate::config::HarnessConfig;
use crate::error::{Error, Result};

/// Whether an engine error may succeed on a later attempt
pub fn is_transient(err: &Error, config: &HarnessConfig) -> bool {
    match err {
        Error::Apply { retryable: true, .. } => true,
        Error::Apply { message, .. } => config.retryable_match(message).is_some(),
        _ => false,
    }
}

/// Run `operation` until it succeeds, fails permanently, or the retry budget
/// in `config` is spent.
///
/// Only transient errors are retried; everything else is returned on the
/// first attempt. Exhaustion reports the attempt count and the last message.
pub async fn with_retries<T, F, Fut>(name: &str, config: &HarnessConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_transient(&err, config) {
            return Err(err);
        }

        let message = match &err {
            Error::Apply { message, .. } => message.clone(),
            other => other.to_string(),
        };

        if attempt > config.max_retries {
            return Err(Error::RetriesExhausted {
                attempts: attempt,
                message,
            });
        }

        warn!(
            operation = name,
            attempt,
            max_retries = config.max_retries,
            reason = config.retryable_match(&message).unwrap_or("transient error"),
            error = %message,
            "retrying engine call"
        );

        if !config.retry_delay.is_zero() {
            tokio::time::sleep(config.retry_delay).await;
        }
    }
}
