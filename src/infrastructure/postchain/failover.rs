//! Endpoint failover - try the next endpoint on error, bounded attempts

use std::future::Future;
use std::time::Duration;

use crate::error::{ExplorerError, Result};

/// How hard to try an endpoint pool before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverPolicy {
    /// Rounds over the pool; each round tries every endpoint once
    pub attempts_per_endpoint: usize,
    /// Pause between rounds
    pub retry_delay: Duration,
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self {
            attempts_per_endpoint: 20,
            retry_delay: Duration::from_millis(250),
        }
    }
}

/// Run `op` against the pool until it succeeds or attempts run out
pub async fn with_failover<T, F, Fut>(
    endpoints: &[String],
    policy: &FailoverPolicy,
    mut op: F,
) -> Result<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    if endpoints.is_empty() {
        return Err(ExplorerError::NoEndpoints);
    }

    let rounds = policy.attempts_per_endpoint.max(1);
    let mut attempts = 0usize;
    let mut last_error = None;

    for round in 0..rounds {
        if round > 0 && !policy.retry_delay.is_zero() {
            tokio::time::sleep(policy.retry_delay).await;
        }
        for endpoint in endpoints {
            attempts += 1;
            match op(endpoint.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    log::debug!("endpoint {} failed (attempt {}): {:#}", endpoint, attempts, err);
                    last_error = Some(err);
                }
            }
        }
    }

    Err(ExplorerError::EndpointsExhausted {
        attempts,
        source: last_error.unwrap_or_else(|| anyhow::anyhow!("no attempt made")),
    })
}
