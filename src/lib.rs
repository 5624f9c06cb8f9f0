//! Replay Sentry Library
//!
//! Transaction replay analysis pipeline over the parity-style trace RPC
//! surface:
//! - Call-trace, state-diff, and VM-trace processing
//! - Security flagging with a 0-100 risk score
//! - Flash-loan / admin-abuse / sandwich heuristics
//! - Cost-aware fallback method selection with TTL caching

pub mod analyzer;
pub mod config;
pub mod core;
pub mod models;
pub mod processors;
pub mod providers;
pub mod utils;

pub use analyzer::{process_payload, ReplayAnalyzer};
pub use config::{AnalysisConfig, RetryPolicy};
pub use core::fallback::{
    CostTier, FallbackConstraints, FallbackEngine, FallbackResult, MethodExecutor, MethodId,
};
pub use models::errors::{AppError, AppResult, ErrorCode};
pub use models::types::{
    Network, ProcessedReplayData, ReplayPayload, ReplayRequest, ReplayTarget, RiskLevel,
    SecurityAnalysis, SecurityFlag, TracerType,
};
pub use providers::replay::{cancel_pair, CancelHandle, CancelToken, ReplayClient, ReplayProgress};
pub use providers::rpc::RpcProvider;
pub use utils::cache::{CacheStats, TtlCache};
