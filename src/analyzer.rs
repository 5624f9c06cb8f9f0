//! Replay Analyzer Orchestrator
//!
//! Composes the RPC client, processors, security engine, and cache into
//! the one entry point the presentation layer consumes. Each request
//! produces one immutable `ProcessedReplayData`; section-level failures
//! degrade the record instead of failing it. The only state shared across
//! requests is the cache.

use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::core::fallback::{
    FallbackConstraints, FallbackEngine, FallbackResult, MethodExecutor, MethodId,
};
use crate::core::security;
use crate::models::errors::AppResult;
use crate::models::types::{
    PerformanceMetrics, ProcessedReplayData, ReplayPayload, ReplayRequest, ReplayTarget,
    TracerType,
};
use crate::processors::{state_diff, token, trace, vm_trace};
use crate::providers::replay::{CancelToken, ReplayClient, ReplayProgress};
use crate::providers::rpc::RpcProvider;
use crate::utils::cache::{CacheStats, TtlCache};

pub struct ReplayAnalyzer {
    client: ReplayClient,
    provider: RpcProvider,
    cache: TtlCache<ProcessedReplayData>,
    fallback: FallbackEngine,
    config: AnalysisConfig,
}

impl ReplayAnalyzer {
    pub fn new(config: AnalysisConfig) -> AppResult<Self> {
        let provider = RpcProvider::new(config.rpc_url.clone())?;
        info!(
            "🚀 Analyzer ready: {} on {}",
            provider.masked_url(),
            config.network.as_str()
        );
        Ok(Self {
            client: ReplayClient::new(provider.clone()),
            provider,
            cache: TtlCache::with_ttl(config.cache_ttl_secs),
            fallback: FallbackEngine::new(TtlCache::with_ttl(config.cache_ttl_secs)),
            config,
        })
    }

    /// Analyze one transaction: validate, check cache, replay with retry,
    /// process, cache the result.
    pub async fn analyze_transaction(
        &self,
        tx_hash: &str,
        tracers: Vec<TracerType>,
        cancel: &CancelToken,
    ) -> AppResult<ProcessedReplayData> {
        let mut request = ReplayRequest::transaction(tx_hash, tracers);
        request.network = self.config.network;

        let key = request.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let payload = self
            .client
            .replay_transaction(tx_hash, &request.tracers, cancel)
            .await?;

        let processed = process_payload(&request, &payload, &self.config);
        self.cache.set(key, processed.clone());
        Ok(processed)
    }

    /// Analyze every transaction in a block. Results are not cached: a
    /// block-level record set is too large for the TTL cache to earn its
    /// keep, and per-transaction re-analysis hits the transaction path.
    pub async fn analyze_block<F>(
        &self,
        block: &str,
        tracers: Vec<TracerType>,
        cancel: &CancelToken,
        on_progress: F,
    ) -> AppResult<Vec<ProcessedReplayData>>
    where
        F: Fn(ReplayProgress),
    {
        let payloads = self
            .client
            .replay_block(block, &tracers, cancel, on_progress)
            .await?;

        let results = payloads
            .iter()
            .map(|payload| {
                let hash = payload
                    .transaction_hash
                    .clone()
                    .unwrap_or_else(|| block.to_string());
                let mut request = ReplayRequest::transaction(hash, tracers.clone());
                request.network = self.config.network;
                let mut processed = process_payload(&request, payload, &self.config);
                processed.target = ReplayTarget::Block(block.to_string());
                processed
            })
            .collect();
        Ok(results)
    }

    /// Run a transaction analysis through the cost-aware fallback engine
    /// instead of insisting on a full replay.
    pub async fn analyze_with_fallback(
        &self,
        tx_hash: &str,
        preferred: MethodId,
        constraints: FallbackConstraints,
    ) -> AppResult<FallbackResult> {
        let executor = RpcMethodExecutor {
            provider: &self.provider,
        };
        self.fallback
            .analyze(&executor, &format!("tx:{}", tx_hash), preferred, constraints)
            .await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cleanup_cache(&self) -> usize {
        self.cache.cleanup_expired()
    }
}

/// Maps registry method ids onto concrete RPC calls
struct RpcMethodExecutor<'a> {
    provider: &'a RpcProvider,
}

impl MethodExecutor for RpcMethodExecutor<'_> {
    async fn execute(&self, method: MethodId, target: &str) -> AppResult<serde_json::Value> {
        let tx_hash = target.strip_prefix("tx:").unwrap_or(target);
        match method {
            MethodId::FullReplay => {
                self.provider
                    .call(
                        "trace_replayTransaction",
                        serde_json::json!([tx_hash, ["trace", "stateDiff", "vmTrace"]]),
                    )
                    .await
            }
            MethodId::TraceOnly => {
                self.provider
                    .call(
                        "trace_replayTransaction",
                        serde_json::json!([tx_hash, ["trace"]]),
                    )
                    .await
            }
            MethodId::TraceTransaction => {
                self.provider
                    .call("trace_transaction", serde_json::json!([tx_hash]))
                    .await
            }
            MethodId::ReceiptLogs => {
                self.provider
                    .call("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
                    .await
            }
            MethodId::BasicTransaction => {
                self.provider
                    .call("eth_getTransactionByHash", serde_json::json!([tx_hash]))
                    .await
            }
        }
    }
}

// ============================================
// PURE PROCESSING
// ============================================

/// Turn a raw payload into the immutable analysis record. Pure: all
/// network work already happened. A requested section missing from the
/// payload degrades to `None` plus an entry in `errors`.
pub fn process_payload(
    request: &ReplayRequest,
    payload: &ReplayPayload,
    config: &AnalysisConfig,
) -> ProcessedReplayData {
    let tx_hash = payload
        .transaction_hash
        .clone()
        .unwrap_or_else(|| request.target.to_string());
    let mut errors = Vec::new();

    let trace_analysis = if request.wants(TracerType::Trace) {
        match &payload.trace {
            Some(records) => Some(trace::process_trace(&tx_hash, records, config)),
            None => {
                errors.push("Requested trace section missing from payload".to_string());
                None
            }
        }
    } else {
        None
    };

    let diff_analysis = if request.wants(TracerType::StateDiff) {
        match &payload.state_diff {
            Some(diff) => Some(state_diff::process_state_diff(&tx_hash, diff, config)),
            None => {
                errors.push("Requested stateDiff section missing from payload".to_string());
                None
            }
        }
    } else {
        None
    };

    let vm_analysis = if request.wants(TracerType::VmTrace) {
        match &payload.vm_trace {
            Some(vm) => Some(vm_trace::process_vm_trace(vm, config)),
            None => {
                errors.push("Requested vmTrace section missing from payload".to_string());
                None
            }
        }
    } else {
        None
    };

    let token_analysis = diff_analysis.as_ref().map(token::process_token_flows);

    let security = security::analyze(
        trace_analysis.as_ref(),
        diff_analysis.as_ref(),
        token_analysis.as_ref(),
        config,
    );
    let performance = derive_performance(trace_analysis.as_ref(), vm_analysis.as_ref());

    if !errors.is_empty() {
        warn!("⚠️ Partial analysis for {}: {:?}", request.target, errors);
    }

    ProcessedReplayData {
        target: request.target.clone(),
        network: request.network,
        requested_tracers: request.tracers.clone(),
        trace: trace_analysis,
        state_diff: diff_analysis,
        vm_trace: vm_analysis,
        token: token_analysis,
        security,
        performance,
        errors,
        analyzed_at: chrono::Utc::now(),
    }
}

fn derive_performance(
    trace: Option<&crate::models::types::TraceAnalysis>,
    vm: Option<&crate::models::types::VmTraceAnalysis>,
) -> PerformanceMetrics {
    let mut metrics = PerformanceMetrics::default();

    if let Some(trace) = trace {
        metrics.total_gas = trace.total_gas;
        metrics.call_count = trace.call_count;
        metrics.failed_calls = trace.error_count;
        if trace.call_count > 0 {
            metrics.avg_gas_per_call = trace.total_gas / trace.call_count as u64;
            metrics.failure_ratio = trace.error_count as f64 / trace.call_count as f64;
        }
        metrics.hints.extend(trace.hints.iter().cloned());
    }
    if let Some(vm) = vm {
        metrics.hints.extend(vm.hints.iter().cloned());
    }
    metrics
}
