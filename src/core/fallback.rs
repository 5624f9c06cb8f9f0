//! Fallback Analysis Engine
//!
//! Cost-aware method selection over a closed, static registry. The flow is
//! a small state machine: cache lookup, preferred attempt, ranked fallback
//! walk, last-resort minimal method, exhaustion. Methods are a closed enum
//! switched on by the executor; no trait objects, so the whole graph is
//! exhaustively testable.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::errors::{AppError, AppResult};
use crate::utils::cache::TtlCache;

/// Confidence reported for a cache hit, regardless of the original
/// method's reliability
const CACHED_CONFIDENCE: f64 = 0.95;

// ============================================
// METHOD REGISTRY
// ============================================

/// Closed set of analysis methods, from full replay down to the minimal
/// last resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodId {
    FullReplay,
    TraceOnly,
    TraceTransaction,
    ReceiptLogs,
    BasicTransaction,
}

impl MethodId {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodId::FullReplay => "full_replay",
            MethodId::TraceOnly => "trace_only",
            MethodId::TraceTransaction => "trace_transaction",
            MethodId::ReceiptLogs => "receipt_logs",
            MethodId::BasicTransaction => "basic_transaction",
        }
    }
}

/// Coarse cost tiers, ordered cheap to expensive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CostTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

/// Static registry entry. Read-only after startup.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisMethod {
    pub id: MethodId,
    pub rpc_calls: u32,
    pub est_time_secs: u64,
    pub tier: CostTier,
    /// Declared reliability in [0,1]; becomes the result confidence
    pub reliability: f64,
    /// Method ids this method can stand in for
    pub fallback_for: &'static [MethodId],
    pub limitations: &'static [&'static str],
}

static REGISTRY: [AnalysisMethod; 5] = [
    AnalysisMethod {
        id: MethodId::FullReplay,
        rpc_calls: 1,
        est_time_secs: 60,
        tier: CostTier::VeryHigh,
        reliability: 0.95,
        fallback_for: &[],
        limitations: &[],
    },
    AnalysisMethod {
        id: MethodId::TraceOnly,
        rpc_calls: 1,
        est_time_secs: 30,
        tier: CostTier::High,
        reliability: 0.92,
        fallback_for: &[MethodId::FullReplay],
        limitations: &["No state diff or VM trace; storage-level findings unavailable"],
    },
    AnalysisMethod {
        id: MethodId::TraceTransaction,
        rpc_calls: 1,
        est_time_secs: 15,
        tier: CostTier::Medium,
        reliability: 0.85,
        fallback_for: &[MethodId::FullReplay, MethodId::TraceOnly],
        limitations: &["Flat trace without replay semantics; gas attribution approximate"],
    },
    AnalysisMethod {
        id: MethodId::ReceiptLogs,
        rpc_calls: 2,
        est_time_secs: 5,
        tier: CostTier::Low,
        reliability: 0.70,
        fallback_for: &[
            MethodId::FullReplay,
            MethodId::TraceOnly,
            MethodId::TraceTransaction,
        ],
        limitations: &["Event logs only; internal calls and state changes invisible"],
    },
    AnalysisMethod {
        id: MethodId::BasicTransaction,
        rpc_calls: 1,
        est_time_secs: 2,
        tier: CostTier::Low,
        reliability: 0.50,
        fallback_for: &[],
        limitations: &["Transaction envelope only; no execution data at all"],
    },
];

/// Registry entry for a method id
pub fn method(id: MethodId) -> &'static AnalysisMethod {
    REGISTRY
        .iter()
        .find(|m| m.id == id)
        .unwrap_or(&REGISTRY[4])
}

/// All registry entries
pub fn registry() -> &'static [AnalysisMethod] {
    &REGISTRY
}

// ============================================
// EXECUTION SEAM
// ============================================

/// Executes one analysis method against a target. The engine is generic
/// over this so tests can count attempts without a network.
pub trait MethodExecutor {
    fn execute(
        &self,
        method: MethodId,
        target: &str,
    ) -> impl std::future::Future<Output = AppResult<serde_json::Value>>;
}

// ============================================
// RESULTS AND CONSTRAINTS
// ============================================

/// Caller constraints on method selection
#[derive(Debug, Clone, Copy)]
pub struct FallbackConstraints {
    /// No method above this tier will ever be attempted
    pub max_cost: CostTier,
}

impl Default for FallbackConstraints {
    fn default() -> Self {
        Self {
            max_cost: CostTier::VeryHigh,
        }
    }
}

/// Outcome of a fallback-managed analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackResult {
    pub method_used: MethodId,
    pub data: serde_json::Value,
    pub confidence: f64,
    pub limitations: Vec<String>,
    pub cached: bool,
    /// Set when a fallback served the request; names the method the
    /// caller wanted
    pub suggested_upgrade: Option<MethodId>,
}

/// Caller-weighted preferences for advisory ranking
#[derive(Debug, Clone, Copy)]
pub struct CostBenefitWeights {
    pub accuracy: f64,
    pub speed: f64,
    pub cost: f64,
}

// ============================================
// ENGINE
// ============================================

/// The fallback selection engine. Holds the result cache; the method
/// registry is static.
pub struct FallbackEngine {
    cache: TtlCache<FallbackResult>,
}

impl FallbackEngine {
    pub fn new(cache: TtlCache<FallbackResult>) -> Self {
        Self { cache }
    }

    /// Run the selection state machine: cache, preferred, ranked
    /// fallbacks, last resort, exhaustion.
    pub async fn analyze<E: MethodExecutor>(
        &self,
        executor: &E,
        target: &str,
        preferred: MethodId,
        constraints: FallbackConstraints,
    ) -> AppResult<FallbackResult> {
        let cache_key = format!("{}:{}", target, preferred.as_str());
        if let Some(mut hit) = self.cache.get(&cache_key) {
            hit.cached = true;
            hit.confidence = CACHED_CONFIDENCE;
            return Ok(hit);
        }

        let preferred_method = method(preferred);
        if preferred_method.tier <= constraints.max_cost {
            match executor.execute(preferred, target).await {
                Ok(data) => {
                    let result = make_result(preferred_method, data, None);
                    self.cache.set(cache_key, result.clone());
                    return Ok(result);
                }
                Err(e) => {
                    warn!("⚠️ Preferred method {} failed: {}", preferred.as_str(), e);
                }
            }
        } else {
            debug!(
                "Preferred method {} over cost budget, walking fallbacks",
                preferred.as_str()
            );
        }

        for candidate in ranked_fallbacks(preferred, constraints.max_cost) {
            match executor.execute(candidate.id, target).await {
                Ok(data) => {
                    info!(
                        "🔀 Fallback {} served request for {}",
                        candidate.id.as_str(),
                        target
                    );
                    let result = make_result(candidate, data, Some(preferred));
                    self.cache.set(cache_key, result.clone());
                    return Ok(result);
                }
                Err(e) => {
                    warn!("⚠️ Fallback {} failed: {}", candidate.id.as_str(), e);
                }
            }
        }

        // Last resort: minimal information beats none
        if preferred != MethodId::BasicTransaction {
            let basic = method(MethodId::BasicTransaction);
            if let Ok(data) = executor.execute(MethodId::BasicTransaction, target).await {
                let result = make_result(basic, data, Some(preferred));
                self.cache.set(cache_key, result.clone());
                return Ok(result);
            }
        }

        Err(AppError::methods_exhausted(target))
    }

    /// Advisory cost-benefit ranking over the whole registry, highest
    /// score first. Does not attempt anything.
    pub fn rank_cost_benefit(&self, weights: CostBenefitWeights) -> Vec<(MethodId, f64)> {
        let mut ranked: Vec<(MethodId, f64)> = REGISTRY
            .iter()
            .map(|m| {
                let speed = 1.0 / (1.0 + m.est_time_secs as f64);
                let cheapness = match m.tier {
                    CostTier::Low => 1.0,
                    CostTier::Medium => 0.66,
                    CostTier::High => 0.33,
                    CostTier::VeryHigh => 0.0,
                };
                let score = weights.accuracy * m.reliability
                    + weights.speed * speed
                    + weights.cost * cheapness;
                (m.id, score)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// Affordable fallbacks for a preferred method, best first: reliability
/// descending, then cost tier ascending.
fn ranked_fallbacks(preferred: MethodId, max_cost: CostTier) -> Vec<&'static AnalysisMethod> {
    let mut candidates: Vec<&AnalysisMethod> = REGISTRY
        .iter()
        .filter(|m| m.fallback_for.contains(&preferred) && m.tier <= max_cost)
        .collect();
    candidates.sort_by(|a, b| {
        b.reliability
            .partial_cmp(&a.reliability)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.tier.cmp(&b.tier))
    });
    candidates
}

fn make_result(
    used: &AnalysisMethod,
    data: serde_json::Value,
    suggested_upgrade: Option<MethodId>,
) -> FallbackResult {
    FallbackResult {
        method_used: used.id,
        data,
        confidence: used.reliability,
        limitations: used.limitations.iter().map(|s| s.to_string()).collect(),
        cached: false,
        suggested_upgrade,
    }
}
