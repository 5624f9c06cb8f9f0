//! Configuration module for the replay pipeline
//!
//! All heuristic thresholds live here as overridable defaults. The pattern
//! thresholds in particular carry no calibration guarantee; they are
//! starting points, not truths.

use alloy_primitives::U256;
use std::time::Duration;

use crate::models::types::Network;
use crate::utils::constants::{
    eth_to_wei, get_default_rpc_url, rpc_url_env_key, BLOCK_REPLAY_BACKOFF_BASE_MS,
    BLOCK_REPLAY_BACKOFF_CAP_MS, BLOCK_REPLAY_MAX_RETRIES, BLOCK_REPLAY_TIMEOUT_SECS,
    DEFAULT_CACHE_TTL_SECS, TX_REPLAY_BACKOFF_BASE_MS, TX_REPLAY_BACKOFF_CAP_MS,
    TX_REPLAY_MAX_RETRIES, TX_REPLAY_TIMEOUT_SECS,
};

/// Retry behavior for one RPC method class
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt
    pub max_retries: u32,
    /// Backoff base; delay after failed attempt n is `min(base * 2^n, cap)`
    pub backoff_base_ms: u64,
    /// Backoff cap
    pub backoff_cap_ms: u64,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Policy for `trace_replayTransaction`
    pub fn transaction() -> Self {
        Self {
            max_retries: TX_REPLAY_MAX_RETRIES,
            backoff_base_ms: TX_REPLAY_BACKOFF_BASE_MS,
            backoff_cap_ms: TX_REPLAY_BACKOFF_CAP_MS,
            timeout: Duration::from_secs(TX_REPLAY_TIMEOUT_SECS),
        }
    }

    /// Policy for `trace_replayBlockTransactions`. Longer budget and fewer
    /// retries: block replay costs very-high tier × transaction count.
    pub fn block() -> Self {
        Self {
            max_retries: BLOCK_REPLAY_MAX_RETRIES,
            backoff_base_ms: BLOCK_REPLAY_BACKOFF_BASE_MS,
            backoff_cap_ms: BLOCK_REPLAY_BACKOFF_CAP_MS,
            timeout: Duration::from_secs(BLOCK_REPLAY_TIMEOUT_SECS),
        }
    }

    /// Backoff delay after failed attempt `attempt` (0-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .backoff_base_ms
            .saturating_mul(1u64 << attempt.min(32));
        Duration::from_millis(exp.min(self.backoff_cap_ms))
    }
}

/// Thresholds and knobs for the analysis pipeline
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Network to analyze against
    pub network: Network,
    /// RPC endpoint (env override or per-network default)
    pub rpc_url: String,
    /// Cache TTL for processed analyses and fallback results
    pub cache_ttl_secs: u64,

    /// Per-call gas above this is flagged as a high-gas call
    pub high_gas_call_threshold: u64,
    /// Call stacks deeper than this get a depth hint
    pub max_depth_warning: usize,
    /// SSTORE count above this is storage-heavy
    pub sstore_warning_count: u64,
    /// SLOAD count above this suggests missing caching
    pub sload_warning_count: u64,

    /// Balance delta (wei) flagged as a large transfer
    pub large_transfer_wei: U256,
    /// Balance delta (wei) escalated to critical
    pub critical_transfer_wei: U256,
    /// Whole-token delta on a known token flagged as a large transfer
    /// (scaled by the token's declared decimals at flag time)
    pub large_token_transfer_units: u64,
    /// Whole-token delta escalated to critical
    pub critical_token_transfer_units: u64,
    /// Flash-loan heuristic: single-tx balance swing above this (wei)
    pub flash_loan_swing_wei: U256,
    /// Admin-abuse heuristic: more admin-tagged calls than this
    pub admin_call_threshold: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::for_network(Network::Mainnet)
    }
}

impl AnalysisConfig {
    pub fn for_network(network: Network) -> Self {
        let rpc_url = std::env::var(rpc_url_env_key(network))
            .unwrap_or_else(|_| get_default_rpc_url(network).to_string());

        Self {
            network,
            rpc_url,
            cache_ttl_secs: env_u64("REPLAY_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS),
            high_gas_call_threshold: env_u64("REPLAY_HIGH_GAS_THRESHOLD", 500_000),
            max_depth_warning: env_u64("REPLAY_MAX_DEPTH_WARNING", 10) as usize,
            sstore_warning_count: env_u64("REPLAY_SSTORE_WARNING", 50),
            sload_warning_count: env_u64("REPLAY_SLOAD_WARNING", 200),
            large_transfer_wei: eth_to_wei(env_u64("REPLAY_LARGE_TRANSFER_ETH", 100)),
            critical_transfer_wei: eth_to_wei(env_u64("REPLAY_CRITICAL_TRANSFER_ETH", 1_000)),
            large_token_transfer_units: env_u64("REPLAY_LARGE_TOKEN_UNITS", 100_000),
            critical_token_transfer_units: env_u64("REPLAY_CRITICAL_TOKEN_UNITS", 1_000_000),
            flash_loan_swing_wei: eth_to_wei(env_u64("REPLAY_FLASH_LOAN_SWING_ETH", 1_000)),
            admin_call_threshold: env_u64("REPLAY_ADMIN_CALL_THRESHOLD", 3) as usize,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_policy_budgets() {
        let policy = RetryPolicy::transaction();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.timeout, Duration::from_secs(60));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(1_000));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(2_000));
        assert_eq!(policy.backoff_delay(10), Duration::from_millis(10_000)); // capped
    }

    #[test]
    fn test_block_policy_budgets() {
        let policy = RetryPolicy::block();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.timeout, Duration::from_secs(300));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(2_000));
        assert_eq!(policy.backoff_delay(6), Duration::from_millis(30_000)); // capped
    }

    #[test]
    fn test_default_config_thresholds() {
        let config = AnalysisConfig::default();
        assert_eq!(config.admin_call_threshold, 3);
        assert_eq!(config.large_transfer_wei, eth_to_wei(100));
        assert!(config.flash_loan_swing_wei > config.large_transfer_wei);
        assert!(config.critical_token_transfer_units > config.large_token_transfer_units);
    }
}
