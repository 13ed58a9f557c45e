//! Bounded re-attempts of failed downloads.
//!
//! `max_attempts` counts every request made for a URL, the initial download
//! included. A URL that always fails is therefore requested exactly
//! `max_attempts` times before it is reported as a permanent failure.

use crate::error::MirrorError;
use crate::ledger::FailureLedger;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Pause before each individual re-attempt.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

#[derive(Debug, Default)]
pub struct RetryOutcome {
    /// Permanent failures.
    pub remaining: FailureLedger,
    /// URLs that succeeded on a later attempt, in the order they recovered.
    pub recovered: Vec<String>,
    pub bytes: u64,
    pub passes: u32,
}

/// Re-run `attempt` for every retryable URL in `ledger` until it succeeds or
/// its attempt budget is spent.
pub async fn retry_failures<F, Fut>(
    mut ledger: FailureLedger,
    policy: &RetryPolicy,
    mut attempt: F,
) -> RetryOutcome
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<u64, MirrorError>>,
{
    let mut recovered = Vec::new();
    let mut bytes = 0;
    let mut passes = 0;

    loop {
        let pending = ledger.pending(policy.max_attempts);
        if pending.is_empty() {
            break;
        }
        passes += 1;
        info!(
            "Retry pass {}: {} file(s) still failing",
            passes,
            pending.len()
        );

        for url in pending {
            if !policy.delay.is_zero() {
                tokio::time::sleep(policy.delay).await;
            }
            match attempt(url.clone()).await {
                Ok(written) => {
                    ledger.record_success(&url);
                    info!("Retry succeeded for {} ({} bytes)", url, written);
                    bytes += written;
                    recovered.push(url);
                }
                Err(e) => {
                    let tries = ledger.record_failure(&url, &e, e.is_retryable());
                    warn!(
                        "Attempt {}/{} failed for {}: {}",
                        tries, policy.max_attempts, url, e
                    );
                }
            }
        }
    }

    if !ledger.is_empty() {
        warn!("{} file(s) failed permanently:", ledger.len());
        for (url, record) in ledger.iter() {
            warn!(
                "  {} ({} attempt(s)): {}",
                url, record.attempts, record.last_error
            );
        }
    }

    RetryOutcome {
        remaining: ledger,
        recovered,
        bytes,
        passes,
    }
}
