//! Backoff policy for remote store calls.
//!
//! A failed call waits `base_delay`, then twice that, then four times that,
//! and so on up to `max_delay`, until `max_attempts` calls have been made.
//! No error is treated as permanent. When the last attempt fails its error is
//! handed back as-is.

use crate::config::NetworkConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Calls made in total, first one included. Zero behaves like one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Randomize each wait to 50-150% of its nominal length.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: NetworkConfig::MAX_ATTEMPTS,
            base_delay: NetworkConfig::BASE_DELAY,
            max_delay: NetworkConfig::MAX_DELAY,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Wait that follows failed attempt number `attempt` (first attempt is 1).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31);
        let nominal = self
            .base_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay);

        if !self.jitter {
            return nominal;
        }
        let factor: f64 = rand::rng().random_range(0.5..1.5);
        nominal.mul_f64(factor).min(self.max_delay)
    }
}

/// What happened across the attempts of one call.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub attempts: u32,
    /// Waits between attempts, oldest first.
    pub delays: Vec<Duration>,
    pub success: bool,
    pub last_error: Option<String>,
}

impl RetryStats {
    pub fn total_delay(&self) -> Duration {
        self.delays.iter().sum()
    }
}

/// Call `operation` until it succeeds or the policy gives up.
///
/// `label` prefixes every log line. The returned stats are filled in either
/// way.
pub async fn retry_async<F, Fut, T, E>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
) -> (Result<T, E>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let limit = config.max_attempts.max(1);
    let mut stats = RetryStats::default();

    loop {
        stats.attempts += 1;
        let err = match operation().await {
            Ok(value) => {
                if stats.attempts > 1 {
                    debug!("{}: ok on attempt {}", label, stats.attempts);
                }
                stats.success = true;
                return (Ok(value), stats);
            }
            Err(err) => err,
        };

        stats.last_error = Some(err.to_string());
        if stats.attempts >= limit {
            warn!("{}: giving up after {} attempt(s): {}", label, stats.attempts, err);
            return (Err(err), stats);
        }

        let wait = config.calculate_delay(stats.attempts);
        warn!(
            "{}: attempt {} of {} failed ({}); next try in {:?}",
            label, stats.attempts, limit, err, wait
        );
        stats.delays.push(wait);
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(attempts: u32, base_ms: u64) -> RetryConfig {
        RetryConfig {
            max_attempts: attempts,
            base_delay: Duration::from_millis(base_ms),
            ..Default::default()
        }
    }

    #[test]
    fn test_delays_double_from_base() {
        let config = RetryConfig::default();
        let delays: Vec<u64> = (1..=4).map(|n| config.calculate_delay(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8]);
    }

    #[test]
    fn test_delay_stops_at_cap() {
        let config = RetryConfig {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(12),
            ..Default::default()
        };
        assert_eq!(config.calculate_delay(2), Duration::from_secs(10));
        assert_eq!(config.calculate_delay(3), Duration::from_secs(12));
        assert_eq!(config.calculate_delay(40), Duration::from_secs(12));
    }

    #[test]
    fn test_jittered_delay_stays_in_band() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(400),
            jitter: true,
            ..Default::default()
        };
        let delay = config.calculate_delay(2);
        assert!(delay >= Duration::from_millis(400));
        assert!(delay <= Duration::from_millis(1200));
    }

    #[tokio::test]
    async fn test_first_success_waits_nothing() {
        let (result, stats) =
            retry_async(&fast(3, 100), "noop", || async { Ok::<_, String>("rows") }).await;

        assert_eq!(result, Ok("rows"));
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.total_delay(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success() {
        let calls = Cell::new(0u32);
        let started = tokio::time::Instant::now();

        let (result, stats) = retry_async(&fast(3, 100), "flaky", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(format!("connection reset ({})", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(stats.attempts, 3);
        assert_eq!(
            stats.delays,
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
        assert_eq!(started.elapsed(), Duration::from_millis(300));
        assert!(stats.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_error_is_returned_unchanged() {
        let calls = Cell::new(0u32);
        let (result, stats) = retry_async(&fast(3, 10), "doomed", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Err::<(), _>(format!("HTTP 503 on try {}", n)) }
        })
        .await;

        assert_eq!(result, Err("HTTP 503 on try 3".to_string()));
        assert_eq!(stats.delays.len(), 2);
        assert!(!stats.success);
        assert_eq!(stats.last_error.as_deref(), Some("HTTP 503 on try 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_retried_too() {
        let calls = Cell::new(0u32);
        let (result, _) = retry_async(&fast(2, 10), "bad request", || {
            calls.set(calls.get() + 1);
            async { Err::<(), _>("HTTP 400".to_string()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }
}
