use std::time::Duration;

use serde::Deserialize;

use crate::commitment::Commitment;

/// Connection settings. Every field has a default, so callers may
/// deserialize a partial document from whatever source they use.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub commitment: Commitment,
    /// Overrides the 60s/30s confirmation timeout.
    pub confirm_transaction_initial_timeout_ms: Option<u64>,
    /// Fetch a fresh blockhash for every send.
    pub disable_blockhash_caching: bool,
    pub blockhash_cache_ttl_ms: u64,
    pub retry: RetryConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            commitment: Commitment::Finalized,
            confirm_transaction_initial_timeout_ms: None,
            disable_blockhash_caching: false,
            blockhash_cache_ttl_ms: 30_000,
            retry: RetryConfig::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn confirm_transaction_initial_timeout(&self) -> Option<Duration> {
        self.confirm_transaction_initial_timeout_ms
            .map(Duration::from_millis)
    }

    pub fn blockhash_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.blockhash_cache_ttl_ms)
    }
}

/// Backoff for retryable RPC failures.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based): doubles from the
    /// initial backoff up to the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(32);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}
