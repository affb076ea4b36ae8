//! Inference Gateway
//!
//! Wraps exactly one backend call with a per-call deadline and a bounded
//! retry loop. Only failure categories named by the [`RetryPolicy`] are
//! retried; with the default policy nothing is. Backoff for attempt `i` is
//! `min(base * 2^i, cap)` plus up to 20% jitter, slept only between attempts.
//!
//! Dropping the returned future cancels the in-flight call or backoff sleep.

use rand::Rng;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use super::provider::SharedBackend;
use super::timeout::with_timeout;
use crate::config::GatewayConfig;
use crate::constants::retry;
use crate::router::DecodingOptions;
use crate::types::{ErrorCategory, EscalatorError, LlmError, Result};

/// Which failures are retried, how often, and how long to wait
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first call
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Retryable categories; empty means no retries
    pub retry_on: HashSet<ErrorCategory>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: retry::DEFAULT_RETRIES,
            base_delay: Duration::from_secs_f64(retry::BASE_DELAY_SECS),
            max_delay: Duration::from_secs_f64(retry::MAX_DELAY_SECS),
            retry_on: HashSet::new(),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Ok(Self {
            retries: config.retries,
            base_delay: delay_from_secs("gateway.backoff_secs", config.backoff_secs)?,
            max_delay: delay_from_secs("gateway.backoff_cap_secs", config.backoff_cap_secs)?,
            retry_on: config.retry_on.iter().copied().collect(),
        })
    }

    pub fn with_retry_on(mut self, categories: impl IntoIterator<Item = ErrorCategory>) -> Self {
        self.retry_on = categories.into_iter().collect();
        self
    }

    pub fn should_retry(&self, err: &LlmError) -> bool {
        self.retry_on.contains(&err.category)
    }

    /// Delay before retry number `attempt + 1`, without jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(self.base_delay, attempt, self.max_delay)
    }
}

fn delay_from_secs(key: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| {
        EscalatorError::Config(format!("{} is not a usable delay ({}): {}", key, secs, e))
    })
}

/// Exponential backoff with cap
fn calculate_backoff(base: Duration, attempt: u32, max: Duration) -> Duration {
    let factor = 2f64.powi(attempt.min(62) as i32);
    let next = base.as_secs_f64() * factor;
    if next >= max.as_secs_f64() {
        max
    } else {
        Duration::from_secs_f64(next)
    }
}

/// Stretch `delay` by a random 0..20%
fn random_jitter(delay: Duration) -> Duration {
    let fraction = rand::rng().random_range(0.0..retry::JITTER_FRACTION);
    delay.mul_f64(1.0 + fraction)
}

/// One successful generation
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    /// Wall time of the successful attempt
    pub elapsed: Duration,
    /// Backend model name
    pub model: String,
    pub request_id: String,
}

pub struct InferenceGateway {
    backend: SharedBackend,
    policy: RetryPolicy,
    timeout: Duration,
    log_prompts: bool,
}

impl InferenceGateway {
    pub fn new(backend: SharedBackend, config: &GatewayConfig) -> Result<Self> {
        Ok(Self {
            backend,
            policy: RetryPolicy::from_config(config)?,
            timeout: Duration::from_secs(config.timeout_secs),
            log_prompts: config.log_prompts,
        })
    }

    pub fn with_policy(backend: SharedBackend, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            backend,
            policy,
            timeout,
            log_prompts: false,
        }
    }

    /// Generate with retries. Exhausted or non-retryable failures surface as
    /// [`EscalatorError::Transport`] carrying the last error.
    #[instrument(skip(self, prompt, options), fields(backend = self.backend.name()))]
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &DecodingOptions,
    ) -> Result<Generation> {
        if self.log_prompts {
            debug!(prompt, "Prompt");
        }

        let mut attempt = 0u32;
        loop {
            let start = Instant::now();
            let result = with_timeout(
                self.timeout,
                self.backend.generate(model, prompt, options),
                "generate",
            )
            .await;

            let err = match result {
                Ok(reply) => {
                    let elapsed = start.elapsed();
                    debug!(
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        request_id = %reply.request_id,
                        "Generation complete"
                    );
                    return Ok(Generation {
                        text: reply.text,
                        elapsed,
                        model: model.to_string(),
                        request_id: reply.request_id,
                    });
                }
                Err(e) if e.backend.is_none() => e.backend(self.backend.name()),
                Err(e) => e,
            };

            if !self.policy.should_retry(&err) {
                debug!(category = %err.category, "Failure is not retryable");
                return Err(EscalatorError::Transport(err));
            }
            if attempt >= self.policy.retries {
                warn!(attempts = attempt + 1, error = %err, "Retries exhausted");
                return Err(EscalatorError::Transport(err));
            }

            let wait = random_jitter(self.policy.delay_for(attempt));
            debug!(
                attempt,
                category = %err.category,
                wait_ms = wait.as_millis() as u64,
                "Retrying after backoff"
            );
            sleep(wait).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::testing::ScriptedBackend;
    use crate::ai::provider::{BackendReply, InferenceBackend};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn network_error() -> LlmError {
        LlmError::new(ErrorCategory::Network, "connection refused")
    }

    fn retrying_policy() -> RetryPolicy {
        RetryPolicy::default().with_retry_on([ErrorCategory::Network, ErrorCategory::Timeout])
    }

    #[tokio::test]
    async fn test_default_policy_does_not_retry() {
        let backend = Arc::new(ScriptedBackend::new().always("m", Err(network_error())));
        let gateway =
            InferenceGateway::with_policy(backend.clone(), RetryPolicy::default(), Duration::from_secs(5));

        let err = gateway
            .generate("m", "hi", &DecodingOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .push("m", Err(network_error()))
                .push_text("m", "{}"),
        );
        let gateway =
            InferenceGateway::with_policy(backend.clone(), retrying_policy(), Duration::from_secs(5));

        let generation = gateway
            .generate("m", "hi", &DecodingOptions::default())
            .await
            .unwrap();
        assert_eq!(generation.text, "{}");
        assert_eq!(generation.model, "m");
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_bounded_sleep() {
        let backend = Arc::new(ScriptedBackend::new().always("m", Err(network_error())));
        let gateway =
            InferenceGateway::with_policy(backend.clone(), retrying_policy(), Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        let err = gateway
            .generate("m", "hi", &DecodingOptions::default())
            .await
            .unwrap_err();
        let slept = start.elapsed();

        assert_eq!(backend.calls(), 3);
        match err {
            EscalatorError::Transport(e) => {
                assert_eq!(e.category, ErrorCategory::Network);
                assert_eq!(e.backend.as_deref(), Some("scripted"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // 0.25 + 0.5 before jitter, at most 20% more with it
        // (timer resolution is a millisecond)
        assert!(slept >= Duration::from_millis(749), "{slept:?}");
        assert!(slept <= Duration::from_millis(902), "{slept:?}");
    }

    #[tokio::test]
    async fn test_application_failure_never_retried() {
        let backend = Arc::new(ScriptedBackend::new().always(
            "m",
            Err(LlmError::new(ErrorCategory::BadRequest, "bad options")),
        ));
        let gateway =
            InferenceGateway::with_policy(backend.clone(), retrying_policy(), Duration::from_secs(5));

        assert!(gateway.generate("m", "hi", &DecodingOptions::default()).await.is_err());
        assert_eq!(backend.calls(), 1);
    }

    struct StallingBackend {
        calls: AtomicU32,
    }

    #[async_trait]
    impl InferenceBackend for StallingBackend {
        async fn generate(
            &self,
            _model: &str,
            _prompt: &str,
            _options: &DecodingOptions,
        ) -> std::result::Result<BackendReply, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_secs(3600)).await;
            Ok(BackendReply {
                text: "late".to_string(),
                request_id: "r".to_string(),
            })
        }

        fn name(&self) -> &str {
            "stalling"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_are_retryable() {
        let backend = Arc::new(StallingBackend {
            calls: AtomicU32::new(0),
        });
        let gateway =
            InferenceGateway::with_policy(backend.clone(), retrying_policy(), Duration::from_secs(1));

        let err = gateway
            .generate("m", "hi", &DecodingOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EscalatorError::Transport(ref e) if e.category == ErrorCategory::Timeout));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_future_cancels_backoff() {
        let backend = Arc::new(ScriptedBackend::new().always("m", Err(network_error())));
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            ..retrying_policy()
        };
        let gateway = InferenceGateway::with_policy(backend.clone(), policy, Duration::from_secs(5));

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            gateway.generate("m", "hi", &DecodingOptions::default()),
        )
        .await;
        assert!(outcome.is_err());
        assert_eq!(backend.calls(), 1);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = retrying_policy();
        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for(40), Duration::from_secs(2));

        let worst: Duration = (0..policy.retries)
            .map(|i| policy.delay_for(i).mul_f64(1.0 + retry::JITTER_FRACTION))
            .sum();
        assert!(worst <= Duration::from_millis(900));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from_config(&GatewayConfig::default()).unwrap();
        assert!(policy.should_retry(&network_error()));
        assert!(!policy.should_retry(&LlmError::new(ErrorCategory::RateLimit, "slow down")));
    }

    #[test]
    fn test_policy_rejects_unrepresentable_delays() {
        for secs in [f64::INFINITY, f64::NAN, -1.0, 1e300] {
            let config = GatewayConfig {
                backoff_cap_secs: secs,
                ..GatewayConfig::default()
            };
            let err = RetryPolicy::from_config(&config).unwrap_err();
            assert!(err.is_configuration(), "{}", secs);
            assert!(err.to_string().contains("gateway.backoff_cap_secs"));
        }
    }

    proptest! {
        #[test]
        fn prop_jittered_delay_within_bounds(
            base_ms in 1u64..1000,
            cap_ms in 1000u64..5000,
            attempt in 0u32..10,
        ) {
            let policy = RetryPolicy {
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(cap_ms),
                ..RetryPolicy::default()
            };
            let delay = policy.delay_for(attempt);
            prop_assert!(delay <= policy.max_delay);
            let ratio = random_jitter(delay).as_secs_f64() / delay.as_secs_f64();
            prop_assert!(ratio > 1.0 - 1e-6);
            prop_assert!(ratio < 1.0 + retry::JITTER_FRACTION + 1e-6);
        }
    }
}
