//! Backoff for node calls
//!
//! Only failures classified by [`BotError::is_retryable`] are retried. Reads
//! made before a bet is broadcast go through [`with_retry_or_stop`], so a stop
//! request cuts the backoff short. Reads for a committed round use
//! [`with_retry`] and always run their full schedule.

use crate::errors::{BotError, BotResult};
use crate::session::StopSignal;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff policy for transient RPC failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Pause before retry number `retry` (1-based), capped at `max_delay`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(scaled)
            .map(|delay| delay.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }
}

/// Retry `f` on transient errors, sleeping through every backoff
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, f: F) -> BotResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BotResult<T>>,
{
    retry_loop(config, operation, None, f).await
}

/// Like [`with_retry`], but a stop during backoff ends with `BotError::Cancelled`
pub async fn with_retry_or_stop<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    stop: &StopSignal,
    f: F,
) -> BotResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BotResult<T>>,
{
    retry_loop(config, operation, Some(stop), f).await
}

async fn retry_loop<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    stop: Option<&StopSignal>,
    mut f: F,
) -> BotResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BotResult<T>>,
{
    let mut retry = 0;

    loop {
        let err = match f().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(err);
        }
        if retry >= config.max_retries {
            warn!("[Retry] {} gave up after {} attempts: {}", operation, retry + 1, err);
            return Err(err);
        }

        retry += 1;
        let delay = config.delay_for(retry);
        debug!(
            "[Retry] {} failed ({}), retry {}/{} in {:?}",
            operation, err, retry, config.max_retries, delay
        );

        match stop {
            Some(stop) => {
                if stop.sleep_or_stop(delay).await {
                    debug!("[Retry] {} abandoned, stop requested", operation);
                    return Err(BotError::Cancelled);
                }
            }
            None => sleep(delay).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn flaky(calls: Arc<AtomicU32>, failures: u32) -> impl FnMut() -> std::future::Ready<BotResult<u32>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < failures {
                Err(BotError::TransientRpc("rate limited".into()))
            } else {
                Ok(n)
            })
        }
    }

    #[test]
    fn test_delay_schedule_doubles_up_to_cap() {
        let config = RetryConfig::default();
        let delays: Vec<u64> = (1..=5).map(|r| config.delay_for(r).as_millis() as u64).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 4000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let value = with_retry(&RetryConfig::default(), "token_balance", flaky(calls.clone(), 2))
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 500ms + 1000ms of backoff
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let config = RetryConfig {
            max_retries: 2,
            ..Default::default()
        };
        let calls = Arc::new(AtomicU32::new(0));

        let result = with_retry(&config, "last_game", flaky(calls.clone(), u32::MAX)).await;

        assert!(matches!(result, Err(BotError::TransientRpc(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_node_rejection_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry(&RetryConfig::default(), "submit_bet", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<u32, _>(BotError::Rpc {
                    code: -32000,
                    message: "nonce too low".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(BotError::Rpc { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cuts_backoff_short() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        let stop = StopSignal::new();
        let remote = stop.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            remote.stop();
        });

        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();
        let result = with_retry_or_stop(&config, "last_game", &stop, flaky(calls.clone(), u32::MAX)).await;

        assert!(matches!(result, Err(BotError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stoppable_retry_still_succeeds_without_stop() {
        let calls = Arc::new(AtomicU32::new(0));
        let value = with_retry_or_stop(
            &RetryConfig::default(),
            "native_balance",
            &StopSignal::new(),
            flaky(calls.clone(), 1),
        )
        .await
        .unwrap();

        assert_eq!(value, 1);
    }
}
