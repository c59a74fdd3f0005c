//! Workload collaborator: wait for the checker, then run with bounded retries.

use std::future::Future;
use std::time::Duration;

use anyhow::{Result, bail};

use evcheck_engine::CheckerHandle;

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// How long to wait for the checker to start listening.
    pub wait_timeout: Duration,
    /// Total attempts, including the first. Zero is treated as one.
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            attempts: DEFAULT_ATTEMPTS,
        }
    }
}

/// Run `attempt` once the checker is listening, retrying on failure.
///
/// Every failed attempt refreshes the checker deadline so retry latency
/// does not eat into the time the checker has to observe the workload.
/// `attempt` receives the 1-based attempt number.
pub async fn run_workload<F, Fut>(
    checker: &CheckerHandle,
    policy: RetryPolicy,
    mut attempt: F,
) -> Result<()>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if !checker.wait(policy.wait_timeout).await {
        bail!(
            "checker '{}' did not start within {}s",
            checker.name(),
            policy.wait_timeout.as_secs()
        );
    }

    let attempts = policy.attempts.max(1);
    let mut last_error = None;
    for n in 1..=attempts {
        match attempt(n).await {
            Ok(()) => {
                if n > 1 {
                    tracing::info!(attempt = n, "Workload succeeded after retry");
                }
                return Ok(());
            }
            Err(e) => {
                checker.reset_timeout();
                tracing::warn!(attempt = n, attempts, "Workload attempt failed: {e:#}");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e.context(format!("workload failed after {attempts} tries"))),
        None => bail!("workload failed after {attempts} tries"),
    }
}
