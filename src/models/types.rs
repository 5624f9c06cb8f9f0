//! Type definitions for the replay pipeline
//!
//! Raw wire types mirror the parity-style `trace_replayTransaction` payload;
//! processed types form the immutable `ProcessedReplayData` record handed to
//! the presentation layer. Processed maps are `BTreeMap` so that processing
//! the same raw payload twice serializes byte-identically.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================
// REQUEST MODEL
// ============================================

/// Tracer kinds accepted by the replay RPC surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TracerType {
    Trace,
    StateDiff,
    VmTrace,
}

impl TracerType {
    pub const ALL: [TracerType; 3] = [TracerType::Trace, TracerType::StateDiff, TracerType::VmTrace];

    /// Wire name as expected by `trace_replayTransaction`
    pub fn as_str(&self) -> &'static str {
        match self {
            TracerType::Trace => "trace",
            TracerType::StateDiff => "stateDiff",
            TracerType::VmTrace => "vmTrace",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trace" => Some(TracerType::Trace),
            "stateDiff" => Some(TracerType::StateDiff),
            "vmTrace" => Some(TracerType::VmTrace),
            _ => None,
        }
    }
}

/// Supported networks. Endpoint resolution lives in `utils::constants`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Sepolia,
    Holesky,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Sepolia => "sepolia",
            Network::Holesky => "holesky",
        }
    }
}

/// What to replay: a single transaction or every transaction in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayTarget {
    /// 0x-prefixed 32-byte transaction hash
    Transaction(String),
    /// Decimal number, 0x-hex quantity, or 32-byte block hash
    Block(String),
}

impl fmt::Display for ReplayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayTarget::Transaction(h) => write!(f, "tx:{}", h),
            ReplayTarget::Block(b) => write!(f, "block:{}", b),
        }
    }
}

/// A replay analysis request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRequest {
    pub target: ReplayTarget,
    pub tracers: Vec<TracerType>,
    pub network: Network,
}

impl ReplayRequest {
    pub fn transaction(hash: impl Into<String>, tracers: Vec<TracerType>) -> Self {
        Self {
            target: ReplayTarget::Transaction(hash.into()),
            tracers,
            network: Network::Mainnet,
        }
    }

    pub fn wants(&self, tracer: TracerType) -> bool {
        self.tracers.contains(&tracer)
    }

    /// Deterministic cache key: identical requests hit the same entry
    /// regardless of tracer ordering.
    pub fn cache_key(&self) -> String {
        let mut names: Vec<&str> = self.tracers.iter().map(|t| t.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        format!("{}:{}:{}", self.target, self.network.as_str(), names.join("+"))
    }
}

// ============================================
// RAW WIRE TYPES (parity replay format)
// ============================================

/// Call/create action of one trace frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTraceAction {
    #[serde(default)]
    pub from: String,
    pub to: Option<String>,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub gas: String,
    pub input: Option<String>,
    /// Present for contract creations instead of `input`
    pub init: Option<String>,
    pub call_type: Option<String>,
}

/// Result of one trace frame (absent when the frame errored)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTraceResult {
    #[serde(default)]
    pub gas_used: String,
    pub output: Option<String>,
}

/// One flat call record.
///
/// `trace_address` is the only hierarchy key the node provides: an ordered
/// list of child indices from the root frame. No parent pointers exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTraceRecord {
    pub action: RawTraceAction,
    pub result: Option<RawTraceResult>,
    pub error: Option<String>,
    #[serde(default)]
    pub trace_address: Vec<u32>,
    #[serde(default)]
    pub subtraces: u32,
    #[serde(rename = "type", default)]
    pub trace_type: String,
}

/// Parity state-diff delta encoding: `"="` unchanged, `{"+": v}` created,
/// `{"-": v}` removed, `{"*": {from, to}}` changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Delta {
    Unchanged(String),
    Altered(AlteredDelta),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlteredDelta {
    #[serde(rename = "+")]
    Added(String),
    #[serde(rename = "-")]
    Removed(String),
    #[serde(rename = "*")]
    Changed { from: String, to: String },
}

impl Delta {
    /// Value before the transaction, if any
    pub fn from_value(&self) -> Option<&str> {
        match self {
            Delta::Altered(AlteredDelta::Removed(v)) => Some(v),
            Delta::Altered(AlteredDelta::Changed { from, .. }) => Some(from),
            _ => None,
        }
    }

    /// Value after the transaction, if any
    pub fn to_value(&self) -> Option<&str> {
        match self {
            Delta::Altered(AlteredDelta::Added(v)) => Some(v),
            Delta::Altered(AlteredDelta::Changed { to, .. }) => Some(to),
            _ => None,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Delta::Altered(_))
    }
}

impl Default for Delta {
    fn default() -> Self {
        Delta::Unchanged("=".to_string())
    }
}

/// Per-address before/after state record
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawStateDiffRecord {
    #[serde(default)]
    pub balance: Delta,
    #[serde(default)]
    pub nonce: Delta,
    #[serde(default)]
    pub code: Delta,
    #[serde(default)]
    pub storage: BTreeMap<String, Delta>,
}

/// Whole-transaction state diff keyed by touched address
pub type RawStateDiff = BTreeMap<String, RawStateDiffRecord>;

/// One VM step: opcode, its gas cost, and an optional nested sub-trace for
/// internal calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVmStep {
    #[serde(default)]
    pub cost: u64,
    pub op: Option<String>,
    pub pc: Option<u64>,
    pub sub: Option<RawVmTrace>,
}

/// Nested VM trace
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawVmTrace {
    pub code: Option<String>,
    #[serde(default)]
    pub ops: Vec<RawVmStep>,
}

/// Raw payload of `trace_replayTransaction`; sections absent when the
/// corresponding tracer was not requested.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReplayPayload {
    pub output: Option<String>,
    pub trace: Option<Vec<RawTraceRecord>>,
    pub state_diff: Option<RawStateDiff>,
    pub vm_trace: Option<RawVmTrace>,
    pub transaction_hash: Option<String>,
}

// ============================================
// PROCESSED: CALL TRACE
// ============================================

/// Aggregated per-contract call stats
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStats {
    pub calls: u64,
    pub gas_used: u64,
    pub errors: u64,
}

/// A decoded function call (matched against the static 4-byte table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub contract: String,
    pub selector: String,
    /// `unknown` when the selector is not in the table
    pub name: String,
    pub gas_used: u64,
    pub success: bool,
    pub trace_index: usize,
}

/// A value-carrying call, recorded independent of call success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueTransfer {
    pub from: String,
    pub to: String,
    pub value: U256,
    pub success: bool,
    pub trace_index: usize,
}

/// One node in the reconstructed call tree. Indices reference the arena in
/// [`CallHierarchy::nodes`]; node order matches raw record order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallNode {
    pub index: usize,
    pub from: String,
    pub to: Option<String>,
    pub value: U256,
    pub gas_used: u64,
    pub call_type: String,
    pub depth: usize,
    pub error: Option<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Call tree as an arena with parent/child links resolved by
/// trace-address prefix matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallHierarchy {
    pub nodes: Vec<CallNode>,
    /// Indices of parentless nodes (depth-0 roots, plus orphans from
    /// malformed traces whose parent record is missing)
    pub roots: Vec<usize>,
}

/// Gas-efficiency observations derived from a processed section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HintKind {
    HighGasCall,
    FailedCall,
    DeepCallStack,
    StorageHeavy,
    MissingCaching,
    HotOpcode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationHint {
    pub kind: HintKind,
    pub description: String,
    pub gas_impact: Option<u64>,
}

/// Output of the call-trace processor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceAnalysis {
    pub tx_hash: String,
    pub total_gas: u64,
    pub call_count: usize,
    pub max_depth: usize,
    pub error_count: usize,
    pub contract_interactions: BTreeMap<String, ContractStats>,
    pub function_calls: Vec<FunctionCall>,
    pub value_transfers: Vec<ValueTransfer>,
    pub hierarchy: CallHierarchy,
    pub hints: Vec<OptimizationHint>,
}

// ============================================
// PROCESSED: STATE DIFF
// ============================================

/// Exact signed difference between two unsigned 256-bit values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDelta {
    pub negative: bool,
    pub magnitude: U256,
}

impl SignedDelta {
    pub fn between(from: U256, to: U256) -> Self {
        if to >= from {
            Self { negative: false, magnitude: to - from }
        } else {
            Self { negative: true, magnitude: from - to }
        }
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }
}

impl fmt::Display for SignedDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.magnitude)
        } else {
            write!(f, "{}", self.magnitude)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub address: String,
    pub from: U256,
    pub to: U256,
    pub delta: SignedDelta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceChange {
    pub address: String,
    pub from: u64,
    pub to: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeChangeType {
    Created,
    Destroyed,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChange {
    pub address: String,
    pub change_type: CodeChangeType,
    pub size_before: usize,
    pub size_after: usize,
}

/// Position-based semantic reading of a storage slot, following the common
/// ERC-20 layout convention. Balance/allowance classification is a magnitude
/// heuristic, not ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotInterpretation {
    TotalSupply,
    Owner,
    Paused,
    Name { decoded: String },
    Symbol { decoded: String },
    Balance,
    Allowance,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageChange {
    pub address: String,
    pub slot: String,
    pub from: U256,
    pub to: U256,
    pub interpretation: SlotInterpretation,
}

/// Output of the state-diff processor. `flags` is the side channel of
/// security findings emitted while interpreting changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDiffAnalysis {
    pub tx_hash: String,
    pub balance_changes: Vec<BalanceChange>,
    pub nonce_changes: Vec<NonceChange>,
    pub code_changes: Vec<CodeChange>,
    pub storage_changes: Vec<StorageChange>,
    pub flags: Vec<SecurityFlag>,
}

// ============================================
// PROCESSED: TOKEN FLOWS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSlotDelta {
    pub slot: String,
    pub delta: SignedDelta,
    /// Exact decimal rendering using the token's declared decimals
    pub formatted: String,
}

/// Aggregated deltas for one known token contract touched by the transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFlow {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
    pub supply_delta: Option<TokenSlotDelta>,
    pub balance_deltas: Vec<TokenSlotDelta>,
    pub allowance_deltas: Vec<TokenSlotDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAnalysis {
    pub flows: Vec<TokenFlow>,
}

// ============================================
// PROCESSED: VM TRACE
// ============================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcodeStats {
    pub count: u64,
    pub gas: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpcodeGas {
    pub op: String,
    pub count: u64,
    pub gas: u64,
    /// Fraction of total gas consumed by this opcode
    pub share: f64,
}

/// Output of the VM-trace processor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmTraceAnalysis {
    pub total_ops: u64,
    pub total_gas: u64,
    pub opcode_stats: BTreeMap<String, OpcodeStats>,
    pub category_gas: BTreeMap<String, u64>,
    pub top_opcodes: Vec<OpcodeGas>,
    pub hints: Vec<OptimizationHint>,
}

// ============================================
// SECURITY MODEL
// ============================================

/// Severity of a security flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlagSeverity {
    Info,
    Warning,
    High,
    Critical,
}

impl FlagSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagSeverity::Info => "info",
            FlagSeverity::Warning => "warning",
            FlagSeverity::High => "high",
            FlagSeverity::Critical => "critical",
        }
    }

    /// Fixed risk-score contribution. The exact table is part of the
    /// external contract and must not drift.
    pub fn weight(&self) -> u32 {
        match self {
            FlagSeverity::Critical => 25,
            FlagSeverity::High => 15,
            FlagSeverity::Warning => 8,
            FlagSeverity::Info => 3,
        }
    }
}

/// Closed set of flag types. Recommendations key off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagType {
    AdminFunctionCall,
    OwnershipChange,
    ContractCodeChange,
    SupplyChange,
    PausedStateChange,
    LargeEthTransfer,
    LargeTokenTransfer,
    FailedInternalCall,
    UnmatchedTokenTransfer,
    DeepCallStack,
    HighGasCall,
}

/// One security finding. Flags are append-only; nothing mutates them after
/// emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityFlag {
    pub severity: FlagSeverity,
    pub flag_type: FlagType,
    pub description: String,
    /// Structured details for drill-down display
    pub details: serde_json::Value,
    /// Optional transaction or address reference
    pub reference: Option<String>,
}

impl SecurityFlag {
    pub fn new(
        severity: FlagSeverity,
        flag_type: FlagType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            flag_type,
            description: description.into(),
            details: serde_json::Value::Null,
            reference: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Heuristic attack patterns. These are indicators, not proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternType {
    FlashLoan,
    AdminAbuse,
    Sandwich,
}

impl PatternType {
    /// Score contribution before scaling by confidence
    pub fn weight(&self) -> u32 {
        match self {
            PatternType::FlashLoan => 25,
            PatternType::AdminAbuse => 15,
            PatternType::Sandwich => 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub pattern: PatternType,
    pub confidence: f64,
    pub description: String,
    pub evidence: Vec<String>,
}

/// Risk level bands over the 0-100 score. The mapping is exact for
/// compatibility with downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => RiskLevel::Critical,
            60..=79 => RiskLevel::High,
            40..=59 => RiskLevel::Medium,
            20..=39 => RiskLevel::Low,
            _ => RiskLevel::Minimal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Minimal => "MINIMAL",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Minimal => "✅",
            RiskLevel::Low => "🟡",
            RiskLevel::Medium => "🟠",
            RiskLevel::High => "🔴",
            RiskLevel::Critical => "💀",
        }
    }
}

/// One entry in the display timeline (call order)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub sequence: usize,
    pub depth: usize,
    pub kind: String,
    pub description: String,
    pub gas_used: u64,
}

/// Output of the security analysis engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityAnalysis {
    pub flags: Vec<SecurityFlag>,
    pub risk_score: u8,
    pub risk_level: Option<RiskLevel>,
    pub recommendations: Vec<String>,
    pub patterns: Vec<DetectedPattern>,
    pub timeline: Vec<TimelineEvent>,
}

// ============================================
// AGGREGATE OUTPUT
// ============================================

/// Derived gas/performance metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_gas: u64,
    pub call_count: usize,
    pub failed_calls: usize,
    pub avg_gas_per_call: u64,
    pub failure_ratio: f64,
    pub hints: Vec<OptimizationHint>,
}

/// The aggregate analysis record handed to the presentation layer.
///
/// Created once per request, immutable after construction, exclusively
/// owned by the caller. A section is `Some` only if its tracer was
/// requested and processed successfully; section-level failures land in
/// `errors` instead of failing the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedReplayData {
    pub target: ReplayTarget,
    pub network: Network,
    pub requested_tracers: Vec<TracerType>,
    pub trace: Option<TraceAnalysis>,
    pub state_diff: Option<StateDiffAnalysis>,
    pub vm_trace: Option<VmTraceAnalysis>,
    pub token: Option<TokenAnalysis>,
    pub security: SecurityAnalysis,
    pub performance: PerformanceMetrics,
    pub errors: Vec<String>,
    pub analyzed_at: chrono::DateTime<chrono::Utc>,
}

impl ProcessedReplayData {
    /// Pretty-print a terminal summary
    pub fn summary(&self) -> String {
        let level = self.security.risk_level.unwrap_or(RiskLevel::Minimal);
        let mut out = format!(
            "\n{} Risk: {} ({}/100) | {}\n",
            level.emoji(),
            level.as_str(),
            self.security.risk_score,
            self.target,
        );
        if let Some(trace) = &self.trace {
            out.push_str(&format!(
                "   Calls: {} | Max depth: {} | Gas: {} | Errors: {}\n",
                trace.call_count, trace.max_depth, trace.total_gas, trace.error_count
            ));
        }
        if let Some(diff) = &self.state_diff {
            out.push_str(&format!(
                "   State: {} balance / {} storage / {} code changes\n",
                diff.balance_changes.len(),
                diff.storage_changes.len(),
                diff.code_changes.len()
            ));
        }
        if !self.security.flags.is_empty() {
            out.push_str("   Flags:\n");
            for flag in &self.security.flags {
                out.push_str(&format!(
                    "     - [{}] {}\n",
                    flag.severity.as_str(),
                    flag.description
                ));
            }
        }
        for rec in &self.security.recommendations {
            out.push_str(&format!("   → {}\n", rec));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracer_roundtrip() {
        for t in TracerType::ALL {
            assert_eq!(TracerType::parse(t.as_str()), Some(t));
        }
        assert_eq!(TracerType::parse("fullTrace"), None);
    }

    #[test]
    fn test_cache_key_tracer_order_independent() {
        let a = ReplayRequest::transaction("0xabc", vec![TracerType::Trace, TracerType::VmTrace]);
        let b = ReplayRequest::transaction("0xabc", vec![TracerType::VmTrace, TracerType::Trace]);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_delta_parity_encoding() {
        let changed: Delta =
            serde_json::from_str(r#"{"*":{"from":"0x1","to":"0x2"}}"#).unwrap();
        assert_eq!(changed.from_value(), Some("0x1"));
        assert_eq!(changed.to_value(), Some("0x2"));

        let added: Delta = serde_json::from_str(r#"{"+":"0x5"}"#).unwrap();
        assert_eq!(added.from_value(), None);
        assert_eq!(added.to_value(), Some("0x5"));

        let removed: Delta = serde_json::from_str(r#"{"-":"0x5"}"#).unwrap();
        assert_eq!(removed.to_value(), None);

        let unchanged: Delta = serde_json::from_str(r#""=""#).unwrap();
        assert!(!unchanged.is_changed());
    }

    #[test]
    fn test_signed_delta() {
        let up = SignedDelta::between(U256::from(5), U256::from(9));
        assert!(!up.negative);
        assert_eq!(up.magnitude, U256::from(4));

        let down = SignedDelta::between(U256::from(9), U256::from(5));
        assert!(down.negative);
        assert_eq!(down.to_string(), "-4");
    }

    #[test]
    fn test_severity_weights_exact() {
        assert_eq!(FlagSeverity::Critical.weight(), 25);
        assert_eq!(FlagSeverity::High.weight(), 15);
        assert_eq!(FlagSeverity::Warning.weight(), 8);
        assert_eq!(FlagSeverity::Info.weight(), 3);
    }

    #[test]
    fn test_risk_level_bands_exact() {
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(59), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(39), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(19), RiskLevel::Minimal);
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Minimal);
    }

    #[test]
    fn test_code_change_type_wire_name() {
        let destroyed = serde_json::to_string(&CodeChangeType::Destroyed).unwrap();
        assert_eq!(destroyed, r#""destroyed""#);
    }
}
