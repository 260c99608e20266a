use std::future::Future;
use std::time::Duration;

use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    #[cfg(test)]
    pub(crate) fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Equal jitter backoff: base/2 + rand(0, base/2).
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as u64 * 2u64.pow(attempt);
        let half = base / 2;
        Duration::from_millis(half + fastrand::u64(..half.max(1)))
    }
}

/// Run `op` until it succeeds, a non-retriable error occurs, or the attempts run out.
pub async fn with_retries<T, E, F, Fut>(
    policy: RetryPolicy,
    is_retriable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < attempts && is_retriable(&e) => {
                let delay = policy.backoff(attempt);
                debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// True once a run has used up its failure budget.
pub fn circuit_broken(failure_count: u32, limit: u32) -> bool {
    failure_count >= limit
}
