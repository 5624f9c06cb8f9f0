//! Security Analysis Engine
//!
//! Consumes the processed trace, state-diff, and token sections and emits
//! severity-tagged flags, heuristic pattern detections, a call timeline,
//! and a 0-100 risk score. Detectors run independently; a cross-reference
//! pass then looks for inconsistencies between sections. Every pattern
//! here is an indicator with a confidence, never a proof.

use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::core::risk_score;
use crate::models::types::{
    DetectedPattern, FlagSeverity, FlagType, PatternType, RiskLevel, SecurityAnalysis,
    SecurityFlag, StateDiffAnalysis, TimelineEvent, TokenAnalysis, TraceAnalysis,
};
use crate::utils::constants::{
    get_token_info, is_admin_selector, is_swap_selector, wei_to_eth,
};

/// Run the full security pass over whatever sections were processed.
/// Absent sections simply contribute nothing; the engine never fails.
pub fn analyze(
    trace: Option<&TraceAnalysis>,
    state_diff: Option<&StateDiffAnalysis>,
    token: Option<&TokenAnalysis>,
    config: &AnalysisConfig,
) -> SecurityAnalysis {
    let mut analysis = SecurityAnalysis::default();

    // State-diff processing already flagged its own findings; merge them
    if let Some(diff) = state_diff {
        analysis.flags.extend(diff.flags.iter().cloned());
    }

    if let Some(trace) = trace {
        detect_trace_flags(trace, config, &mut analysis.flags);
        analysis.timeline = build_timeline(trace);
    }

    cross_reference(trace, state_diff, token, &mut analysis.flags);
    analysis.patterns = detect_patterns(trace, state_diff, config);

    let (score, level) = risk_score::compute(&analysis.flags, &analysis.patterns);
    analysis.risk_score = score;
    analysis.risk_level = Some(level);
    analysis.recommendations = risk_score::recommendations(&analysis.flags, &analysis.patterns);

    if level >= RiskLevel::High {
        info!(
            "🔴 Risk {} ({}/100): {} flag(s), {} pattern(s)",
            level.as_str(),
            score,
            analysis.flags.len(),
            analysis.patterns.len()
        );
    } else {
        debug!("Risk {} ({}/100)", level.as_str(), score);
    }
    analysis
}

// ============================================
// TRACE DETECTORS
// ============================================

fn detect_trace_flags(
    trace: &TraceAnalysis,
    config: &AnalysisConfig,
    flags: &mut Vec<SecurityFlag>,
) {
    for call in &trace.function_calls {
        if is_admin_selector(&call.selector) {
            flags.push(
                SecurityFlag::new(
                    FlagSeverity::High,
                    FlagType::AdminFunctionCall,
                    format!("Admin function {} called on {}", call.name, call.contract),
                )
                .with_details(serde_json::json!({
                    "selector": call.selector,
                    "success": call.success,
                }))
                .with_reference(call.contract.clone()),
            );
        }
        if call.gas_used > config.high_gas_call_threshold {
            flags.push(SecurityFlag::new(
                FlagSeverity::Info,
                FlagType::HighGasCall,
                format!("{} on {} used {} gas", call.name, call.contract, call.gas_used),
            ));
        }
    }

    for transfer in &trace.value_transfers {
        let severity = if transfer.value >= config.critical_transfer_wei {
            FlagSeverity::Critical
        } else if transfer.value >= config.large_transfer_wei {
            FlagSeverity::High
        } else {
            continue;
        };
        flags.push(
            SecurityFlag::new(
                severity,
                FlagType::LargeEthTransfer,
                format!(
                    "{:.4} ETH moved {} → {}",
                    wei_to_eth(transfer.value),
                    transfer.from,
                    transfer.to
                ),
            )
            .with_details(serde_json::json!({ "wei": transfer.value.to_string() })),
        );
    }

    if trace.error_count > 0 {
        flags.push(SecurityFlag::new(
            FlagSeverity::Warning,
            FlagType::FailedInternalCall,
            format!("{} internal call(s) reverted", trace.error_count),
        ));
    }

    if trace.max_depth > config.max_depth_warning {
        flags.push(SecurityFlag::new(
            FlagSeverity::Warning,
            FlagType::DeepCallStack,
            format!("Call stack reached depth {}", trace.max_depth),
        ));
    }
}

// ============================================
// CROSS-REFERENCE PASS
// ============================================

/// A decoded ERC-20 transfer on a known token that left no storage change
/// on that token is suspicious: either the transfer silently no-opped or
/// the diff is lying. Only runs when both sections are present.
fn cross_reference(
    trace: Option<&TraceAnalysis>,
    state_diff: Option<&StateDiffAnalysis>,
    _token: Option<&TokenAnalysis>,
    flags: &mut Vec<SecurityFlag>,
) {
    let (Some(trace), Some(diff)) = (trace, state_diff) else {
        return;
    };

    for call in &trace.function_calls {
        let is_transfer = call.name.starts_with("transfer(") || call.name.starts_with("transferFrom(");
        if !is_transfer || !call.success {
            continue;
        }
        let contract = call.contract.to_lowercase();
        if get_token_info(&contract).is_none() {
            continue;
        }
        let touched = diff
            .storage_changes
            .iter()
            .any(|c| c.address == contract);
        if !touched {
            flags.push(
                SecurityFlag::new(
                    FlagSeverity::Warning,
                    FlagType::UnmatchedTokenTransfer,
                    format!(
                        "Successful {} on {} with no matching storage change",
                        call.name, contract
                    ),
                )
                .with_reference(contract),
            );
        }
    }
}

// ============================================
// PATTERN HEURISTICS
// ============================================

fn detect_patterns(
    trace: Option<&TraceAnalysis>,
    state_diff: Option<&StateDiffAnalysis>,
    config: &AnalysisConfig,
) -> Vec<DetectedPattern> {
    let mut patterns = Vec::new();

    // Flash loan: a single-transaction balance swing above the configured
    // absolute threshold. Borrow-and-repay nets out in the diff, so the
    // swing is read from the largest single movement.
    if let Some(diff) = state_diff {
        let swings: Vec<&crate::models::types::BalanceChange> = diff
            .balance_changes
            .iter()
            .filter(|c| c.delta.magnitude > config.flash_loan_swing_wei)
            .collect();
        if !swings.is_empty() {
            patterns.push(DetectedPattern {
                pattern: PatternType::FlashLoan,
                confidence: 0.6,
                description: format!(
                    "Balance swing above {:.0} ETH within one transaction",
                    wei_to_eth(config.flash_loan_swing_wei)
                ),
                evidence: swings
                    .iter()
                    .map(|c| format!("{}: {:.4} ETH", c.address, wei_to_eth(c.delta.magnitude)))
                    .collect(),
            });
        }
    }

    if let Some(trace) = trace {
        let admin_calls: Vec<&crate::models::types::FunctionCall> = trace
            .function_calls
            .iter()
            .filter(|c| is_admin_selector(&c.selector))
            .collect();
        if admin_calls.len() > config.admin_call_threshold {
            patterns.push(DetectedPattern {
                pattern: PatternType::AdminAbuse,
                confidence: 0.7,
                description: format!(
                    "{} admin-tagged calls in one transaction (threshold {})",
                    admin_calls.len(),
                    config.admin_call_threshold
                ),
                evidence: admin_calls
                    .iter()
                    .map(|c| format!("{} on {}", c.name, c.contract))
                    .collect(),
            });
        }

        let swaps: Vec<&crate::models::types::FunctionCall> = trace
            .function_calls
            .iter()
            .filter(|c| is_swap_selector(&c.selector))
            .collect();
        if !swaps.is_empty() {
            patterns.push(DetectedPattern {
                pattern: PatternType::Sandwich,
                confidence: 0.5,
                description: "Swap-like calls present; possible sandwich leg".to_string(),
                evidence: swaps
                    .iter()
                    .map(|c| format!("{} on {}", c.name, c.contract))
                    .collect(),
            });
        }
    }

    patterns
}

// ============================================
// TIMELINE
// ============================================

/// Call-order timeline for display. One event per call node, in raw
/// record order (which is execution order for parity traces).
fn build_timeline(trace: &TraceAnalysis) -> Vec<TimelineEvent> {
    trace
        .hierarchy
        .nodes
        .iter()
        .map(|node| {
            let target = node.to.as_deref().unwrap_or("(create)");
            let description = if node.value.is_zero() {
                format!("{} {} → {}", node.call_type, node.from, target)
            } else {
                format!(
                    "{} {} → {} ({:.4} ETH)",
                    node.call_type,
                    node.from,
                    target,
                    wei_to_eth(node.value)
                )
            };
            TimelineEvent {
                sequence: node.index,
                depth: node.depth,
                kind: if node.error.is_some() {
                    "reverted".to_string()
                } else {
                    node.call_type.clone()
                },
                description,
                gas_used: node.gas_used,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::{
        BalanceChange, CallHierarchy, CallNode, FunctionCall, SignedDelta, ValueTransfer,
    };
    use crate::utils::constants::eth_to_wei;
    use alloy_primitives::U256;

    fn call(contract: &str, selector: &str, name: &str) -> FunctionCall {
        FunctionCall {
            contract: contract.to_string(),
            selector: selector.to_string(),
            name: name.to_string(),
            gas_used: 50_000,
            success: true,
            trace_index: 0,
        }
    }

    #[test]
    fn test_empty_sections_are_minimal_risk() {
        let analysis = analyze(None, None, None, &AnalysisConfig::default());
        assert_eq!(analysis.risk_score, 0);
        assert_eq!(analysis.risk_level, Some(RiskLevel::Minimal));
        assert!(analysis.flags.is_empty());
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn test_admin_call_flagged_high() {
        let trace = TraceAnalysis {
            function_calls: vec![call("0xtoken", "0xf2fde38b", "transferOwnership(address)")],
            ..Default::default()
        };
        let analysis = analyze(Some(&trace), None, None, &AnalysisConfig::default());

        assert!(analysis.flags.iter().any(|f| {
            f.flag_type == FlagType::AdminFunctionCall && f.severity == FlagSeverity::High
        }));
        assert_eq!(analysis.risk_score, 15);
    }

    #[test]
    fn test_large_transfer_severities() {
        let trace = TraceAnalysis {
            value_transfers: vec![
                ValueTransfer {
                    from: "0xa".into(),
                    to: "0xb".into(),
                    value: eth_to_wei(1_500),
                    success: true,
                    trace_index: 0,
                },
                ValueTransfer {
                    from: "0xa".into(),
                    to: "0xc".into(),
                    value: U256::from(1u64),
                    success: true,
                    trace_index: 1,
                },
            ],
            ..Default::default()
        };
        let analysis = analyze(Some(&trace), None, None, &AnalysisConfig::default());

        let large: Vec<_> = analysis
            .flags
            .iter()
            .filter(|f| f.flag_type == FlagType::LargeEthTransfer)
            .collect();
        assert_eq!(large.len(), 1);
        assert_eq!(large[0].severity, FlagSeverity::Critical);
    }

    #[test]
    fn test_unmatched_token_transfer_cross_reference() {
        let usdc = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
        let trace = TraceAnalysis {
            function_calls: vec![call(usdc, "0xa9059cbb", "transfer(address,uint256)")],
            ..Default::default()
        };
        // Diff present but no storage change on the token
        let diff = StateDiffAnalysis::default();
        let analysis = analyze(Some(&trace), Some(&diff), None, &AnalysisConfig::default());

        assert!(analysis
            .flags
            .iter()
            .any(|f| f.flag_type == FlagType::UnmatchedTokenTransfer));
    }

    #[test]
    fn test_flash_loan_pattern() {
        let config = AnalysisConfig::default();
        let diff = StateDiffAnalysis {
            balance_changes: vec![BalanceChange {
                address: "0xpool".into(),
                from: U256::ZERO,
                to: eth_to_wei(5_000),
                delta: SignedDelta::between(U256::ZERO, eth_to_wei(5_000)),
            }],
            ..Default::default()
        };
        let analysis = analyze(None, Some(&diff), None, &config);

        let pattern = analysis
            .patterns
            .iter()
            .find(|p| p.pattern == PatternType::FlashLoan)
            .unwrap();
        assert!((pattern.confidence - 0.6).abs() < f64::EPSILON);
        assert!(!pattern.evidence.is_empty());
    }

    #[test]
    fn test_admin_abuse_needs_more_than_threshold() {
        let config = AnalysisConfig::default();
        let admin = || call("0xtoken", "0x40c10f19", "mint(address,uint256)");

        let at_threshold = TraceAnalysis {
            function_calls: (0..config.admin_call_threshold).map(|_| admin()).collect(),
            ..Default::default()
        };
        let analysis = analyze(Some(&at_threshold), None, None, &config);
        assert!(!analysis.patterns.iter().any(|p| p.pattern == PatternType::AdminAbuse));

        let over = TraceAnalysis {
            function_calls: (0..=config.admin_call_threshold).map(|_| admin()).collect(),
            ..Default::default()
        };
        let analysis = analyze(Some(&over), None, None, &config);
        assert!(analysis.patterns.iter().any(|p| p.pattern == PatternType::AdminAbuse));
    }

    #[test]
    fn test_timeline_order_and_reverts() {
        let trace = TraceAnalysis {
            hierarchy: CallHierarchy {
                nodes: vec![
                    CallNode {
                        index: 0,
                        from: "0xa".into(),
                        to: Some("0xb".into()),
                        value: U256::ZERO,
                        gas_used: 100,
                        call_type: "call".into(),
                        depth: 0,
                        error: None,
                        parent: None,
                        children: vec![1],
                    },
                    CallNode {
                        index: 1,
                        from: "0xb".into(),
                        to: Some("0xc".into()),
                        value: U256::ZERO,
                        gas_used: 50,
                        call_type: "call".into(),
                        depth: 1,
                        error: Some("Reverted".into()),
                        parent: Some(0),
                        children: vec![],
                    },
                ],
                roots: vec![0],
            },
            ..Default::default()
        };
        let analysis = analyze(Some(&trace), None, None, &AnalysisConfig::default());

        assert_eq!(analysis.timeline.len(), 2);
        assert_eq!(analysis.timeline[0].sequence, 0);
        assert_eq!(analysis.timeline[1].kind, "reverted");
    }
}
