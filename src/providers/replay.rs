//! Replay RPC Client Module
//!
//! Issues `trace_replayTransaction` / `trace_replayBlockTransactions`
//! requests with per-method budgets, sequential exponential-backoff retry,
//! cooperative cancellation, and coarse progress reporting for block-level
//! operations. Retries never run in parallel: a duplicate replay call is a
//! duplicate very-high-tier RPC cost.

use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{ReplayPayload, TracerType};
use crate::providers::rpc::RpcProvider;
use crate::utils::validation::{normalize_block_id, validate_tracers, validate_tx_hash};

// ============================================
// CANCELLATION
// ============================================

/// Caller-held side of a cancellation pair
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal every in-flight operation holding the matching token
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cooperative cancellation token raced against RPC calls and timeouts.
/// Dropping the handle without cancelling leaves tokens permanently live.
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that can never fire (for callers without cancellation
    /// needs). The sender is dropped uncancelled, so `cancelled()` pends
    /// forever.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when cancellation fires; pend forever otherwise
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a linked cancel handle/token pair
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

// ============================================
// PROGRESS REPORTING
// ============================================

/// Coarse stages of a block-level replay, for caller responsiveness during
/// operations that can take minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayProgress {
    FetchingBlock,
    CountingTransactions { count: usize },
    Replaying,
    Done,
}

// ============================================
// RETRY LOOP
// ============================================

/// Run `op` under a retry policy. Attempts are sequential; backoff after
/// failed attempt n is `min(base * 2^n, cap)`. Non-retryable errors and
/// cancellation surface immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    what: &str,
    mut op: F,
) -> AppResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = AppResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(AppError::cancelled(format!("{} cancelled", what)));
        }

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() || attempt >= policy.max_retries => return Err(e),
            Err(e) => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    "⏳ {} attempt {}/{} failed ({}), retrying in {}ms",
                    what,
                    attempt + 1,
                    policy.max_retries + 1,
                    e.code_str(),
                    delay.as_millis()
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(AppError::cancelled(format!("{} cancelled during backoff", what)));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}

// ============================================
// REPLAY CLIENT
// ============================================

/// Client for the node's trace-replay surface
pub struct ReplayClient {
    provider: RpcProvider,
    tx_policy: RetryPolicy,
    block_policy: RetryPolicy,
}

impl ReplayClient {
    pub fn new(provider: RpcProvider) -> Self {
        Self {
            provider,
            tx_policy: RetryPolicy::transaction(),
            block_policy: RetryPolicy::block(),
        }
    }

    /// Override policies (test hook and advanced tuning)
    pub fn with_policies(mut self, tx: RetryPolicy, block: RetryPolicy) -> Self {
        self.tx_policy = tx;
        self.block_policy = block;
        self
    }

    /// Replay one transaction with retry. Validation failures surface
    /// immediately without any network call.
    pub async fn replay_transaction(
        &self,
        tx_hash: &str,
        tracers: &[TracerType],
        cancel: &CancelToken,
    ) -> AppResult<ReplayPayload> {
        validate_tx_hash(tx_hash)?;
        validate_tracers(tracers)?;

        let params = serde_json::json!([tx_hash, tracer_names(tracers)]);
        let policy = self.tx_policy;

        info!("🔁 Replaying transaction {} ({:?})", tx_hash, tracers);
        let raw = retry_with_backoff(&policy, cancel, "trace_replayTransaction", |_| {
            self.attempt("trace_replayTransaction", params.clone(), policy.timeout, cancel)
        })
        .await?;

        parse_payload(raw, tracers)
    }

    /// Replay every transaction in a block with retry and progress
    /// reporting. A cheap `eth_getBlockByNumber` pre-flight estimates the
    /// transaction count; its failure does not abort the replay.
    pub async fn replay_block<F>(
        &self,
        block: &str,
        tracers: &[TracerType],
        cancel: &CancelToken,
        on_progress: F,
    ) -> AppResult<Vec<ReplayPayload>>
    where
        F: Fn(ReplayProgress),
    {
        let block_param = normalize_block_id(block)?;
        validate_tracers(tracers)?;

        on_progress(ReplayProgress::FetchingBlock);
        match self
            .attempt(
                "eth_getBlockByNumber",
                serde_json::json!([block_param, false]),
                Duration::from_secs(10),
                cancel,
            )
            .await
        {
            Ok(header) => {
                let count = header
                    .get("transactions")
                    .and_then(|t| t.as_array())
                    .map(|t| t.len())
                    .unwrap_or(0);
                on_progress(ReplayProgress::CountingTransactions { count });
            }
            Err(e) if e.code == crate::models::errors::ErrorCode::OperationCancelled => {
                return Err(e);
            }
            Err(e) => {
                debug!("Pre-flight block fetch failed, continuing: {}", e);
                on_progress(ReplayProgress::CountingTransactions { count: 0 });
            }
        }

        on_progress(ReplayProgress::Replaying);
        let params = serde_json::json!([block_param, tracer_names(tracers)]);
        let policy = self.block_policy;

        info!("🔁 Replaying block {} ({:?})", block_param, tracers);
        let raw = retry_with_backoff(&policy, cancel, "trace_replayBlockTransactions", |_| {
            self.attempt(
                "trace_replayBlockTransactions",
                params.clone(),
                policy.timeout,
                cancel,
            )
        })
        .await?;

        let items = raw
            .as_array()
            .ok_or_else(|| AppError::parsing("Block replay response is not an array"))?;

        let mut payloads = Vec::with_capacity(items.len());
        for item in items {
            payloads.push(parse_payload(item.clone(), tracers)?);
        }
        on_progress(ReplayProgress::Done);
        Ok(payloads)
    }

    /// One attempt: the RPC call raced against the per-method timeout and
    /// the cancellation token. The first to resolve wins; losers are
    /// abandoned cooperatively.
    async fn attempt(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> AppResult<Value> {
        tokio::select! {
            _ = cancel.cancelled() => {
                Err(AppError::cancelled(format!("{} cancelled by caller", method)))
            }
            outcome = tokio::time::timeout(timeout, self.provider.call(method, params)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(AppError::timeout(format!(
                        "{} exceeded {}s budget",
                        method,
                        timeout.as_secs()
                    ))),
                }
            }
        }
    }
}

fn tracer_names(tracers: &[TracerType]) -> Vec<&'static str> {
    tracers.iter().map(|t| t.as_str()).collect()
}

/// Shape-check the raw payload against the replay contract, then parse.
/// `trace` must be an array and `stateDiff`/`vmTrace` objects; a mismatch
/// is a `ParsingError`, never a silent coercion.
fn parse_payload(raw: Value, tracers: &[TracerType]) -> AppResult<ReplayPayload> {
    let obj = raw
        .as_object()
        .ok_or_else(|| AppError::parsing("Replay payload is not an object"))?;

    for tracer in tracers {
        let (key, ok) = match tracer {
            TracerType::Trace => (
                "trace",
                obj.get("trace").map_or(true, |v| v.is_array() || v.is_null()),
            ),
            TracerType::StateDiff => (
                "stateDiff",
                obj.get("stateDiff").map_or(true, |v| v.is_object() || v.is_null()),
            ),
            TracerType::VmTrace => (
                "vmTrace",
                obj.get("vmTrace").map_or(true, |v| v.is_object() || v.is_null()),
            ),
        };
        if !ok {
            return Err(AppError::parsing(format!(
                "Replay payload field `{}` has wrong shape",
                key
            )));
        }
    }

    serde_json::from_value(raw).map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::ErrorCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn tx_policy() -> RetryPolicy {
        RetryPolicy::transaction()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_timing_and_attempt_count() {
        // 3 consecutive timeouts with max_retries=2: exactly 3 attempts,
        // backoff delays 1000ms then 2000ms, then the Timeout surfaces.
        let attempts = AtomicU32::new(0);
        let start = Instant::now();

        let result: AppResult<()> =
            retry_with_backoff(&tx_policy(), &CancelToken::never(), "test", |_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::timeout("simulated")) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.code, ErrorCode::Timeout);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(3_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_skips_validation_errors() {
        let attempts = AtomicU32::new(0);

        let result: AppResult<()> =
            retry_with_backoff(&tx_policy(), &CancelToken::never(), "test", |_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::invalid_tx_hash("0xnope")) }
            })
            .await;

        assert_eq!(result.unwrap_err().code, ErrorCode::InvalidTxHash);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);

        let result = retry_with_backoff(&tx_policy(), &CancelToken::never(), "test", |_| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AppError::rate_limited())
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_token_never_fires() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());

        // cancelled() must pend forever, not resolve on the dropped sender
        let outcome = tokio::select! {
            _ = token.cancelled() => "cancelled",
            _ = tokio::time::sleep(Duration::from_secs(3600)) => "pending",
        };
        assert_eq!(outcome, "pending");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_cancelled_token_skips_all_attempts() {
        let (handle, token) = cancel_pair();
        handle.cancel();

        let attempts = AtomicU32::new(0);
        let result: AppResult<()> = retry_with_backoff(&tx_policy(), &token, "test", |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert_eq!(result.unwrap_err().code, ErrorCode::OperationCancelled);
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let (handle, token) = cancel_pair();
        let attempts = std::sync::Arc::new(AtomicU32::new(0));

        let loop_attempts = attempts.clone();
        let task = tokio::spawn(async move {
            retry_with_backoff::<(), _, _>(&tx_policy(), &token, "test", move |_| {
                loop_attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::timeout("simulated")) }
            })
            .await
        });

        // Let the first attempt fail and the backoff sleep begin
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.cancel();

        let result = task.await.unwrap();
        assert_eq!(result.unwrap_err().code, ErrorCode::OperationCancelled);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_payload_shape_checks() {
        let bad_trace = serde_json::json!({ "trace": {}, "stateDiff": null, "vmTrace": null });
        let err = parse_payload(bad_trace, &[TracerType::Trace]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParsingError);

        let bad_diff = serde_json::json!({ "trace": [], "stateDiff": [], "vmTrace": null });
        let err = parse_payload(bad_diff, &[TracerType::StateDiff]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParsingError);

        let good = serde_json::json!({
            "output": "0x",
            "trace": [],
            "stateDiff": {},
            "vmTrace": null
        });
        let payload = parse_payload(good, &TracerType::ALL).unwrap();
        assert!(payload.trace.is_some());
        assert!(payload.state_diff.is_some());
        assert!(payload.vm_trace.is_none());
    }

    #[tokio::test]
    async fn test_block_preflight_failure_does_not_abort_replay() {
        // Closed port: the pre-flight block fetch fails, yet the progress
        // sequence must still advance to Replaying (with count 0) and the
        // main call must be attempted and surface its own error.
        let fast = RetryPolicy {
            max_retries: 0,
            backoff_base_ms: 1,
            backoff_cap_ms: 1,
            timeout: Duration::from_secs(5),
        };
        let client = ReplayClient::new(RpcProvider::new("http://127.0.0.1:1").unwrap())
            .with_policies(fast, fast);

        let stages = std::sync::Mutex::new(Vec::new());
        let err = client
            .replay_block("100", &[TracerType::Trace], &CancelToken::never(), |p| {
                stages.lock().unwrap().push(p)
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::NetworkError);
        let stages = stages.into_inner().unwrap();
        assert_eq!(
            stages,
            vec![
                ReplayProgress::FetchingBlock,
                ReplayProgress::CountingTransactions { count: 0 },
                ReplayProgress::Replaying,
            ]
        );
    }

    #[tokio::test]
    async fn test_replay_rejects_invalid_hash_without_network() {
        // Provider points at a closed port; validation must fail first.
        let client = ReplayClient::new(RpcProvider::new("http://127.0.0.1:1").unwrap());
        let err = client
            .replay_transaction("0x1234", &[TracerType::Trace], &CancelToken::never())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTxHash);

        let err = client
            .replay_transaction(
                "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
                &[],
                &CancelToken::never(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyTracerSet);
    }
}
