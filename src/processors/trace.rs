//! Call-Trace Processor Module
//!
//! Turns the flat `trace` record list into aggregate stats, decoded
//! function calls, value transfers, and a reconstructed call tree. Two
//! passes: one linear scan for stats, one arena build for the hierarchy.

use std::collections::HashMap;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::models::types::{
    CallHierarchy, CallNode, ContractStats, FunctionCall, HintKind, OptimizationHint,
    RawTraceRecord, TraceAnalysis, ValueTransfer,
};
use crate::utils::constants::{lookup_function, parse_hex_u256};
use alloy_primitives::U256;

/// Process the flat trace section. Pure; the same records always yield the
/// same analysis.
pub fn process_trace(
    tx_hash: &str,
    records: &[RawTraceRecord],
    config: &AnalysisConfig,
) -> TraceAnalysis {
    let mut analysis = TraceAnalysis {
        tx_hash: tx_hash.to_string(),
        call_count: records.len(),
        ..Default::default()
    };

    // ============================================
    // LINEAR PASS: STATS, DECODING, TRANSFERS
    // ============================================

    for (index, record) in records.iter().enumerate() {
        let gas_used = record
            .result
            .as_ref()
            .and_then(|r| parse_hex_u256(&r.gas_used))
            .map(u256_to_u64)
            .unwrap_or(0);
        let success = record.error.is_none();
        let depth = record.trace_address.len();

        analysis.max_depth = analysis.max_depth.max(depth);
        if !success {
            analysis.error_count += 1;
        }

        // Root frame gas covers the whole transaction
        if record.trace_address.is_empty() {
            analysis.total_gas = analysis.total_gas.max(gas_used);
        }

        if let Some(to) = &record.action.to {
            let stats = analysis
                .contract_interactions
                .entry(to.to_lowercase())
                .or_insert_with(ContractStats::default);
            stats.calls += 1;
            stats.gas_used += gas_used;
            if !success {
                stats.errors += 1;
            }
        }

        // Calldata shorter than a selector is a plain transfer, not a call
        if let Some(input) = &record.action.input {
            if let Some((selector, name)) = lookup_function(input) {
                analysis.function_calls.push(FunctionCall {
                    contract: record.action.to.clone().unwrap_or_default(),
                    selector: selector.to_string(),
                    name: name.to_string(),
                    gas_used,
                    success,
                    trace_index: index,
                });
            }
        }

        // Value transfers are recorded regardless of call success; a
        // reverted transfer is still signal for the security pass.
        let value = parse_hex_u256(&record.action.value).unwrap_or(U256::ZERO);
        if !value.is_zero() {
            analysis.value_transfers.push(ValueTransfer {
                from: record.action.from.clone(),
                to: record.action.to.clone().unwrap_or_default(),
                value,
                success,
                trace_index: index,
            });
        }
    }

    analysis.hierarchy = build_hierarchy(records);
    analysis.hints = derive_hints(&analysis, config);

    debug!(
        "🔍 Trace processed: {} calls, depth {}, {} errors",
        analysis.call_count, analysis.max_depth, analysis.error_count
    );
    analysis
}

/// Rebuild the call tree from trace addresses. The parent of a record at
/// path `[a, .., z]` is the record at `[a, .., y]`; resolving shortest
/// paths first guarantees parents exist before their children. Records
/// whose parent is missing (malformed trace) stay parentless rather than
/// being dropped, so node count always equals call count.
fn build_hierarchy(records: &[RawTraceRecord]) -> CallHierarchy {
    let mut hierarchy = CallHierarchy {
        nodes: records
            .iter()
            .enumerate()
            .map(|(index, record)| CallNode {
                index,
                from: record.action.from.clone(),
                to: record.action.to.clone(),
                value: parse_hex_u256(&record.action.value).unwrap_or(U256::ZERO),
                gas_used: record
                    .result
                    .as_ref()
                    .and_then(|r| parse_hex_u256(&r.gas_used))
                    .map(u256_to_u64)
                    .unwrap_or(0),
                call_type: record
                    .action
                    .call_type
                    .clone()
                    .unwrap_or_else(|| record.trace_type.clone()),
                depth: record.trace_address.len(),
                error: record.error.clone(),
                parent: None,
                children: Vec::new(),
            })
            .collect(),
        roots: Vec::new(),
    };

    let mut by_path: HashMap<&[u32], usize> = HashMap::new();
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by_key(|&i| records[i].trace_address.len());

    for i in order {
        let path = records[i].trace_address.as_slice();
        if path.is_empty() {
            hierarchy.roots.push(i);
        } else if let Some(&parent) = by_path.get(&path[..path.len() - 1]) {
            hierarchy.nodes[i].parent = Some(parent);
            hierarchy.nodes[parent].children.push(i);
        } else {
            hierarchy.roots.push(i);
        }
        by_path.insert(path, i);
    }

    hierarchy
}

fn derive_hints(analysis: &TraceAnalysis, config: &AnalysisConfig) -> Vec<OptimizationHint> {
    let mut hints = Vec::new();

    for call in &analysis.function_calls {
        if call.gas_used > config.high_gas_call_threshold {
            hints.push(OptimizationHint {
                kind: HintKind::HighGasCall,
                description: format!(
                    "Call to {} ({}) used {} gas",
                    call.contract, call.name, call.gas_used
                ),
                gas_impact: Some(call.gas_used),
            });
        }
    }

    if analysis.error_count > 0 {
        hints.push(OptimizationHint {
            kind: HintKind::FailedCall,
            description: format!(
                "{} internal call(s) reverted; their gas is still charged",
                analysis.error_count
            ),
            gas_impact: None,
        });
    }

    if analysis.max_depth > config.max_depth_warning {
        hints.push(OptimizationHint {
            kind: HintKind::DeepCallStack,
            description: format!(
                "Call stack depth {} exceeds {}",
                analysis.max_depth, config.max_depth_warning
            ),
            gas_impact: None,
        });
    }

    hints
}

fn u256_to_u64(value: U256) -> u64 {
    value.try_into().unwrap_or(u64::MAX)
}
