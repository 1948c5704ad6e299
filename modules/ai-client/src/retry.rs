use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::Rng;
use tracing::warn;
use typed_builder::TypedBuilder;

use crate::traits::{ChatModel, Completion, Prompt};

/// Bounded retry around a single model invocation.
///
/// Delay before attempt `n + 1` is `base_delay * 3^n` plus up to `base_delay`
/// of jitter. Every attempt is capped by `timeout`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RetryPolicy {
    #[builder(default = 3)]
    pub max_attempts: u32,
    #[builder(default = Duration::from_secs(1))]
    pub base_delay: Duration,
    #[builder(default = Duration::from_secs(60))]
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay * 3u32.saturating_pow(attempt);
        let jitter_ms = self.base_delay.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        };
        backoff + jitter
    }
}

/// Wraps any [`ChatModel`] with a per-call timeout and bounded retries.
///
/// Only the transport call is retried; whatever the caller does with the
/// returned content (parsing, validation) happens once.
pub struct RetryingModel<M> {
    inner: M,
    policy: RetryPolicy,
}

impl<M: ChatModel> RetryingModel<M> {
    pub fn new(inner: M, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<M: ChatModel> ChatModel for RetryingModel<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn invoke(&self, prompt: Prompt) -> Result<Completion> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let outcome =
                tokio::time::timeout(self.policy.timeout, self.inner.invoke(prompt.clone())).await;

            let error = match outcome {
                Ok(Ok(completion)) => return Ok(completion),
                Ok(Err(e)) => e,
                Err(_) => anyhow!(
                    "{} timed out after {}s",
                    self.inner.name(),
                    self.policy.timeout.as_secs_f32()
                ),
            };

            if attempt + 1 < max_attempts {
                warn!(
                    model = self.inner.name(),
                    attempt = attempt + 1,
                    max_attempts,
                    error = %error,
                    "LLM call failed, retrying"
                );
                tokio::time::sleep(self.policy.backoff(attempt)).await;
            }
            last_error = Some(error);
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("{} was never invoked", self.inner.name()))
            .context(format!("giving up after {max_attempts} attempts")))
    }
}
