//! Bounded exponential backoff around a [`BalanceSource`]

use super::{BalanceError, BalanceSource, WalletBalances};
use crate::config::RetryConfig;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Retry policy for transient balance failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based): base * 2^(attempt-1), capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

pub struct RetryingBalanceSource<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: BalanceSource> RetryingBalanceSource<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: BalanceSource> BalanceSource for RetryingBalanceSource<S> {
    async fn get_balances(&self, address: &str) -> Result<WalletBalances, BalanceError> {
        let mut attempt = 1;
        loop {
            match self.inner.get_balances(address).await {
                Ok(balances) => return Ok(balances),
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        address,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Balance lookup failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
