use crate::config::RetryConfig;
use crate::error::IsRetryable;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Run `operation` until it succeeds, fails with a non-retryable error or
/// uses up `config.max_attempts` attempts, sleeping with exponential backoff
/// in between.
pub async fn download_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    let mut delay = config.initial_delay;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = wait.as_millis() as u64,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(wait).await;

                attempt += 1;
                delay = Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
                    .min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(error = %e, attempts = attempt, "Giving up after all attempts");
                } else {
                    tracing::error!(error = %e, "Failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Stretch a delay by a random 0-100%.
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + factor))
}
