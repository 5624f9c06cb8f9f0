//! VM-Trace Processor Module
//!
//! Flattens the nested `vmTrace` section into per-opcode gas attribution.
//! Sub-traces from internal calls are folded into the same tallies; the
//! output cares about where gas went, not which frame spent it.

use tracing::debug;

use crate::config::AnalysisConfig;
use crate::models::types::{
    HintKind, OpcodeGas, OpcodeStats, OptimizationHint, RawVmTrace, VmTraceAnalysis,
};
use crate::utils::constants::opcode_category;

const TOP_OPCODE_COUNT: usize = 5;

/// Share of total gas above which a single opcode gets a hot-opcode hint
const HOT_OPCODE_SHARE: f64 = 0.10;

/// Process the VM-trace section. Pure.
pub fn process_vm_trace(trace: &RawVmTrace, config: &AnalysisConfig) -> VmTraceAnalysis {
    let mut analysis = VmTraceAnalysis::default();
    tally(trace, &mut analysis);

    for (op, stats) in &analysis.opcode_stats {
        let category = opcode_category(op).as_str().to_string();
        *analysis.category_gas.entry(category).or_insert(0) += stats.gas;
    }

    let mut ranked: Vec<OpcodeGas> = analysis
        .opcode_stats
        .iter()
        .map(|(op, stats)| OpcodeGas {
            op: op.clone(),
            count: stats.count,
            gas: stats.gas,
            share: if analysis.total_gas > 0 {
                stats.gas as f64 / analysis.total_gas as f64
            } else {
                0.0
            },
        })
        .collect();
    ranked.sort_by(|a, b| b.gas.cmp(&a.gas).then_with(|| a.op.cmp(&b.op)));
    ranked.truncate(TOP_OPCODE_COUNT);
    analysis.top_opcodes = ranked;

    analysis.hints = derive_hints(&analysis, config);

    debug!(
        "🔍 VM trace processed: {} ops, {} gas across {} opcodes",
        analysis.total_ops,
        analysis.total_gas,
        analysis.opcode_stats.len()
    );
    analysis
}

fn tally(trace: &RawVmTrace, analysis: &mut VmTraceAnalysis) {
    for step in &trace.ops {
        if let Some(op) = &step.op {
            let stats = analysis
                .opcode_stats
                .entry(op.clone())
                .or_insert_with(OpcodeStats::default);
            stats.count += 1;
            stats.gas += step.cost;
            analysis.total_ops += 1;
            analysis.total_gas += step.cost;
        }
        if let Some(sub) = &step.sub {
            tally(sub, analysis);
        }
    }
}

fn derive_hints(analysis: &VmTraceAnalysis, config: &AnalysisConfig) -> Vec<OptimizationHint> {
    let mut hints = Vec::new();

    if let Some(sstore) = analysis.opcode_stats.get("SSTORE") {
        if sstore.count > config.sstore_warning_count {
            hints.push(OptimizationHint {
                kind: HintKind::StorageHeavy,
                description: format!(
                    "{} SSTOREs ({} gas); consider batching storage writes",
                    sstore.count, sstore.gas
                ),
                gas_impact: Some(sstore.gas),
            });
        }
    }

    if let Some(sload) = analysis.opcode_stats.get("SLOAD") {
        if sload.count > config.sload_warning_count {
            hints.push(OptimizationHint {
                kind: HintKind::MissingCaching,
                description: format!(
                    "{} SLOADs; repeated reads of the same slot are not cached",
                    sload.count
                ),
                gas_impact: Some(sload.gas),
            });
        }
    }

    for entry in &analysis.top_opcodes {
        if entry.share > HOT_OPCODE_SHARE && entry.op != "SSTORE" && entry.op != "SLOAD" {
            hints.push(OptimizationHint {
                kind: HintKind::HotOpcode,
                description: format!(
                    "{} accounts for {:.1}% of VM gas",
                    entry.op,
                    entry.share * 100.0
                ),
                gas_impact: Some(entry.gas),
            });
        }
    }

    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::RawVmStep;

    fn step(op: &str, cost: u64) -> RawVmStep {
        RawVmStep {
            cost,
            op: Some(op.to_string()),
            pc: None,
            sub: None,
        }
    }

    #[test]
    fn test_flat_tally() {
        let trace = RawVmTrace {
            code: None,
            ops: vec![step("PUSH1", 3), step("PUSH1", 3), step("SSTORE", 20_000)],
        };
        let analysis = process_vm_trace(&trace, &AnalysisConfig::default());

        assert_eq!(analysis.total_ops, 3);
        assert_eq!(analysis.total_gas, 20_006);
        assert_eq!(analysis.opcode_stats["PUSH1"].count, 2);
        assert_eq!(analysis.opcode_stats["SSTORE"].gas, 20_000);
        assert_eq!(analysis.category_gas["stack"], 6);
        assert_eq!(analysis.category_gas["storage"], 20_000);
    }

    #[test]
    fn test_nested_sub_traces_folded() {
        let trace = RawVmTrace {
            code: None,
            ops: vec![
                step("CALL", 700),
                RawVmStep {
                    cost: 0,
                    op: None,
                    pc: None,
                    sub: Some(RawVmTrace {
                        code: None,
                        ops: vec![step("SLOAD", 2_100), step("SLOAD", 100)],
                    }),
                },
            ],
        };
        let analysis = process_vm_trace(&trace, &AnalysisConfig::default());

        assert_eq!(analysis.total_ops, 3);
        assert_eq!(analysis.opcode_stats["SLOAD"].count, 2);
        assert_eq!(analysis.opcode_stats["SLOAD"].gas, 2_200);
    }

    #[test]
    fn test_top_opcodes_ranked_by_gas() {
        let trace = RawVmTrace {
            code: None,
            ops: vec![step("ADD", 3), step("SSTORE", 20_000), step("MLOAD", 9)],
        };
        let analysis = process_vm_trace(&trace, &AnalysisConfig::default());

        assert_eq!(analysis.top_opcodes[0].op, "SSTORE");
        assert!(analysis.top_opcodes[0].share > 0.99);
    }

    #[test]
    fn test_storage_heavy_hint() {
        let mut ops = Vec::new();
        for _ in 0..60 {
            ops.push(step("SSTORE", 5_000));
        }
        let trace = RawVmTrace { code: None, ops };
        let analysis = process_vm_trace(&trace, &AnalysisConfig::default());

        assert!(analysis
            .hints
            .iter()
            .any(|h| h.kind == HintKind::StorageHeavy));
    }

    #[test]
    fn test_empty_trace() {
        let analysis = process_vm_trace(&RawVmTrace::default(), &AnalysisConfig::default());
        assert_eq!(analysis.total_ops, 0);
        assert!(analysis.top_opcodes.is_empty());
        assert!(analysis.hints.is_empty());
    }
}
