use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{Result, SubdubError};

/// Waits between attempts. Tests swap in a recorder.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounded attempts with a per-attempt backoff table
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Vec<Duration>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff_secs.iter().copied().map(Duration::from_secs).collect(),
        }
    }

    /// Delay after the failed `attempt` (1-based); the last table value repeats.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let slot = (attempt.saturating_sub(1) as usize).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(slot).copied().unwrap_or_default()
    }

    /// Run `operation` until it succeeds or attempts run out.
    /// The final failed attempt returns its error without sleeping.
    pub async fn run<T, F, Fut>(&self, sleeper: &dyn Sleeper, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("│ {} failed (attempt {}/{}): {}", label, attempt, attempts, e);
                    last_error = Some(e);

                    if attempt < attempts {
                        let delay = self.delay_for(attempt);
                        warn!("│ Retrying in {}s", delay.as_secs());
                        sleeper.sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SubdubError::Translation(format!("{} was never attempted", label))))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records requested delays instead of sleeping.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSleeper {
        pub delays: Arc<Mutex<Vec<Duration>>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn policy(max_attempts: u32, backoff: &[u64]) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: backoff.iter().copied().map(Duration::from_secs).collect(),
        }
    }

    #[test]
    fn test_delay_repeats_last_value() {
        let policy = policy(10, &[5, 10, 30]);
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(3), Duration::from_secs(30));
        assert_eq!(policy.delay_for(7), Duration::from_secs(30));
        assert_eq!(RetryPolicy { max_attempts: 1, backoff: vec![] }.delay_for(1), Duration::ZERO);
    }

    #[test]
    fn test_from_config_defaults() {
        let config = crate::config::Config::default();
        let policy = RetryPolicy::from_config(&config.translate.retry);
        assert_eq!(policy.max_attempts, 20);
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(6), Duration::from_secs(300));
        assert_eq!(policy.delay_for(19), Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let sleeper = RecordingSleeper::default();
        let policy = policy(5, &[5, 10]);

        let result = policy
            .run(&sleeper, "batch", |attempt| async move {
                if attempt < 3 {
                    Err(SubdubError::Translation("flaky".to_string()))
                } else {
                    Ok(attempt)
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 3);
        assert_eq!(*sleeper.delays.lock().unwrap(), vec![Duration::from_secs(5), Duration::from_secs(10)]);
    }

    #[tokio::test]
    async fn test_no_sleep_after_final_attempt() {
        let sleeper = RecordingSleeper::default();
        let policy = policy(3, &[1]);

        let err = policy
            .run(&sleeper, "batch", |attempt| async move {
                Err::<(), _>(SubdubError::Translation(format!("attempt {}", attempt)))
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("attempt 3"));
        assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
    }
}
