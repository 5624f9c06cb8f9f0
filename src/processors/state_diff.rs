//! State-Diff Processor Module
//!
//! Interprets the parity-style `stateDiff` section: balance, nonce, code,
//! and storage deltas per touched address. Storage slots get a semantic
//! reading from the common ERC-20 layout; security-relevant changes are
//! emitted as flags on the side channel for the security engine to merge.

use tracing::debug;

use crate::config::AnalysisConfig;
use crate::models::types::{
    BalanceChange, CodeChange, CodeChangeType, FlagSeverity, FlagType, NonceChange,
    RawStateDiff, SecurityFlag, SignedDelta, SlotInterpretation, StateDiffAnalysis,
    StorageChange,
};
use crate::processors::token::format_token_amount;
use crate::utils::constants::{get_token_info, hex_byte_len, parse_hex_u256, wei_to_eth, TokenInfo};
use alloy_primitives::U256;

/// Process the state-diff section. Pure; flags are appended, never mutated.
pub fn process_state_diff(
    tx_hash: &str,
    diff: &RawStateDiff,
    config: &AnalysisConfig,
) -> StateDiffAnalysis {
    let mut analysis = StateDiffAnalysis {
        tx_hash: tx_hash.to_string(),
        ..Default::default()
    };

    for (address, record) in diff {
        let address = address.to_lowercase();

        if record.balance.is_changed() {
            let from = parse_hex_u256(record.balance.from_value().unwrap_or("0x0"))
                .unwrap_or(U256::ZERO);
            let to =
                parse_hex_u256(record.balance.to_value().unwrap_or("0x0")).unwrap_or(U256::ZERO);
            let delta = SignedDelta::between(from, to);

            if !delta.is_zero() {
                flag_large_balance_change(&address, &delta, config, &mut analysis.flags);
                analysis.balance_changes.push(BalanceChange {
                    address: address.clone(),
                    from,
                    to,
                    delta,
                });
            }
        }

        if record.nonce.is_changed() {
            let from = parse_hex_u256(record.nonce.from_value().unwrap_or("0x0"))
                .and_then(|v| v.try_into().ok())
                .unwrap_or(0u64);
            let to = parse_hex_u256(record.nonce.to_value().unwrap_or("0x0"))
                .and_then(|v| v.try_into().ok())
                .unwrap_or(0u64);
            analysis.nonce_changes.push(NonceChange {
                address: address.clone(),
                from,
                to,
            });
        }

        if record.code.is_changed() {
            let change = classify_code_change(&address, &record.code);
            analysis.flags.push(
                SecurityFlag::new(
                    FlagSeverity::Critical,
                    FlagType::ContractCodeChange,
                    format!(
                        "Contract code {} at {}",
                        match change.change_type {
                            CodeChangeType::Created => "created",
                            CodeChangeType::Destroyed => "destroyed",
                            CodeChangeType::Modified => "modified",
                        },
                        address
                    ),
                )
                .with_reference(address.clone()),
            );
            analysis.code_changes.push(change);
        }

        let token = get_token_info(&address);
        let decimals = token.map(|t| t.decimals).unwrap_or(18);
        for (slot, delta) in &record.storage {
            if !delta.is_changed() {
                continue;
            }
            let from =
                parse_hex_u256(delta.from_value().unwrap_or("0x0")).unwrap_or(U256::ZERO);
            let to = parse_hex_u256(delta.to_value().unwrap_or("0x0")).unwrap_or(U256::ZERO);
            let interpretation =
                interpret_slot(slot, from, to, decimals, delta.to_value().or(delta.from_value()));

            flag_sensitive_slot(&address, slot, &interpretation, &mut analysis.flags);
            if let Some(info) = token {
                if matches!(
                    interpretation,
                    SlotInterpretation::Balance | SlotInterpretation::TotalSupply
                ) {
                    let token_delta = SignedDelta::between(from, to);
                    flag_large_token_delta(&address, info, &token_delta, config, &mut analysis.flags);
                }
            }
            analysis.storage_changes.push(StorageChange {
                address: address.clone(),
                slot: slot.clone(),
                from,
                to,
                interpretation,
            });
        }
    }

    debug!(
        "🔍 State diff processed: {} balance, {} storage, {} code changes",
        analysis.balance_changes.len(),
        analysis.storage_changes.len(),
        analysis.code_changes.len()
    );
    analysis
}

/// Code delta classification: `to` absent means removal (selfdestruct),
/// `from` absent means deployment, both present means an upgrade or
/// metamorphic rewrite.
fn classify_code_change(address: &str, code: &crate::models::types::Delta) -> CodeChange {
    let before = code.from_value();
    let after = code.to_value();
    let change_type = match (before, after) {
        (None, Some(_)) => CodeChangeType::Created,
        (Some(_), None) => CodeChangeType::Destroyed,
        _ => CodeChangeType::Modified,
    };
    CodeChange {
        address: address.to_string(),
        change_type,
        size_before: before.map(hex_byte_len).unwrap_or(0),
        size_after: after.map(hex_byte_len).unwrap_or(0),
    }
}

/// Semantic reading of a storage slot by the common ERC-20 layout: slot 0
/// totalSupply, slot 3 owner, slot 4 paused, slots 5/6 name/symbol.
///
/// Other slots are classified by magnitude: a value within
/// `10^(decimals-6) .. 10^(decimals+12)` reads as a plausible balance; far
/// larger values (effectively-infinite approvals) read as allowances.
/// This is a heuristic over hashed-key slots, not ground truth.
fn interpret_slot(
    slot: &str,
    from: U256,
    to: U256,
    decimals: u8,
    raw_value: Option<&str>,
) -> SlotInterpretation {
    match parse_hex_u256(slot) {
        Some(n) if n == U256::ZERO => return SlotInterpretation::TotalSupply,
        Some(n) if n == U256::from(3) => return SlotInterpretation::Owner,
        Some(n) if n == U256::from(4) => return SlotInterpretation::Paused,
        Some(n) if n == U256::from(5) => {
            return SlotInterpretation::Name {
                decoded: decode_short_string(raw_value.unwrap_or("")),
            };
        }
        Some(n) if n == U256::from(6) => {
            return SlotInterpretation::Symbol {
                decoded: decode_short_string(raw_value.unwrap_or("")),
            };
        }
        _ => {}
    }

    let magnitude = from.max(to);
    if magnitude.is_zero() {
        return SlotInterpretation::Unknown;
    }
    let low = U256::from(10u64).pow(U256::from(decimals.saturating_sub(6)));
    let high = U256::from(10u64).pow(U256::from(decimals as u64 + 12));
    if magnitude >= low && magnitude <= high {
        SlotInterpretation::Balance
    } else if magnitude > high {
        SlotInterpretation::Allowance
    } else {
        SlotInterpretation::Unknown
    }
}

/// Decode a Solidity short-string slot (data left-aligned, last byte holds
/// `length * 2`). Falls back to lossy printable extraction when the layout
/// does not match.
fn decode_short_string(raw: &str) -> String {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = match hex::decode(digits) {
        Ok(b) => b,
        Err(_) => return String::new(),
    };
    if let Some(&last) = bytes.last() {
        let len = (last / 2) as usize;
        if last % 2 == 0 && len < bytes.len() {
            return String::from_utf8_lossy(&bytes[..len]).to_string();
        }
    }
    bytes
        .iter()
        .filter(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|&b| b as char)
        .collect()
}

fn flag_large_balance_change(
    address: &str,
    delta: &SignedDelta,
    config: &AnalysisConfig,
    flags: &mut Vec<SecurityFlag>,
) {
    let severity = if delta.magnitude >= config.critical_transfer_wei {
        FlagSeverity::Critical
    } else if delta.magnitude >= config.large_transfer_wei {
        FlagSeverity::High
    } else {
        return;
    };
    flags.push(
        SecurityFlag::new(
            severity,
            FlagType::LargeEthTransfer,
            format!(
                "Balance of {} moved by {:.4} ETH",
                address,
                wei_to_eth(delta.magnitude)
            ),
        )
        .with_details(serde_json::json!({
            "address": address,
            "delta_wei": delta.to_string(),
        })),
    );
}

/// Large balance/supply movements on a registry token mirror the native
/// ETH thresholds, scaled by the token's declared decimals.
fn flag_large_token_delta(
    address: &str,
    info: TokenInfo,
    delta: &SignedDelta,
    config: &AnalysisConfig,
    flags: &mut Vec<SecurityFlag>,
) {
    let scale = U256::from(10u64).pow(U256::from(info.decimals as u64));
    let critical = U256::from(config.critical_token_transfer_units) * scale;
    let large = U256::from(config.large_token_transfer_units) * scale;

    let severity = if delta.magnitude >= critical {
        FlagSeverity::Critical
    } else if delta.magnitude >= large {
        FlagSeverity::High
    } else {
        return;
    };
    flags.push(
        SecurityFlag::new(
            severity,
            FlagType::LargeTokenTransfer,
            format!(
                "{} {} moved on {}",
                format_token_amount(delta, info.decimals),
                info.symbol,
                address
            ),
        )
        .with_details(serde_json::json!({
            "address": address,
            "symbol": info.symbol,
            "raw_delta": delta.to_string(),
        }))
        .with_reference(address.to_string()),
    );
}

fn flag_sensitive_slot(
    address: &str,
    slot: &str,
    interpretation: &SlotInterpretation,
    flags: &mut Vec<SecurityFlag>,
) {
    let flag = match interpretation {
        SlotInterpretation::Owner => Some((
            FlagSeverity::Critical,
            FlagType::OwnershipChange,
            format!("Owner slot changed on {}", address),
        )),
        SlotInterpretation::Paused => Some((
            FlagSeverity::High,
            FlagType::PausedStateChange,
            format!("Paused flag toggled on {}", address),
        )),
        SlotInterpretation::TotalSupply => Some((
            FlagSeverity::High,
            FlagType::SupplyChange,
            format!("Total supply changed on {}", address),
        )),
        _ => None,
    };
    if let Some((severity, flag_type, description)) = flag {
        flags.push(
            SecurityFlag::new(severity, flag_type, description)
                .with_details(serde_json::json!({ "address": address, "slot": slot })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::{AlteredDelta, Delta, RawStateDiffRecord};
    use std::collections::BTreeMap;

    fn changed(from: &str, to: &str) -> Delta {
        Delta::Altered(AlteredDelta::Changed {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    fn diff_with(address: &str, record: RawStateDiffRecord) -> RawStateDiff {
        let mut diff = BTreeMap::new();
        diff.insert(address.to_string(), record);
        diff
    }

    #[test]
    fn test_balance_change_with_exact_delta() {
        let diff = diff_with(
            "0xABCD",
            RawStateDiffRecord {
                balance: changed("0x10", "0x4"),
                ..Default::default()
            },
        );
        let analysis = process_state_diff("0x1", &diff, &AnalysisConfig::default());

        assert_eq!(analysis.balance_changes.len(), 1);
        let change = &analysis.balance_changes[0];
        assert_eq!(change.address, "0xabcd");
        assert!(change.delta.negative);
        assert_eq!(change.delta.magnitude, U256::from(12));
    }

    #[test]
    fn test_code_destruction_is_critical() {
        let diff = diff_with(
            "0xdead",
            RawStateDiffRecord {
                code: Delta::Altered(AlteredDelta::Removed("0x6080604052".to_string())),
                ..Default::default()
            },
        );
        let analysis = process_state_diff("0x1", &diff, &AnalysisConfig::default());

        assert_eq!(analysis.code_changes.len(), 1);
        assert_eq!(
            analysis.code_changes[0].change_type,
            CodeChangeType::Destroyed
        );
        assert_eq!(analysis.code_changes[0].size_before, 5);
        assert_eq!(analysis.code_changes[0].size_after, 0);
        assert!(analysis.flags.iter().any(|f| {
            f.severity == FlagSeverity::Critical && f.flag_type == FlagType::ContractCodeChange
        }));
    }

    #[test]
    fn test_owner_slot_flagged_critical() {
        let mut storage = BTreeMap::new();
        storage.insert(
            "0x0000000000000000000000000000000000000000000000000000000000000003".to_string(),
            changed("0x0a", "0x0b"),
        );
        let diff = diff_with(
            "0xtoken",
            RawStateDiffRecord {
                storage,
                ..Default::default()
            },
        );
        let analysis = process_state_diff("0x1", &diff, &AnalysisConfig::default());

        assert_eq!(
            analysis.storage_changes[0].interpretation,
            SlotInterpretation::Owner
        );
        assert!(analysis
            .flags
            .iter()
            .any(|f| f.flag_type == FlagType::OwnershipChange));
    }

    #[test]
    fn test_balance_vs_allowance_heuristic() {
        // 1000 tokens at 18 decimals: plausible balance
        assert_eq!(
            interpret_slot(
                "0xdeadbeef",
                U256::ZERO,
                U256::from(10u64).pow(U256::from(21)),
                18,
                None
            ),
            SlotInterpretation::Balance
        );
        // Effectively-infinite approval: above the balance range
        assert_eq!(
            interpret_slot("0xdeadbeef", U256::ZERO, U256::MAX, 18, None),
            SlotInterpretation::Allowance
        );
        // Tiny value below the range
        assert_eq!(
            interpret_slot("0xdeadbeef", U256::ZERO, U256::from(5), 18, None),
            SlotInterpretation::Unknown
        );
    }

    #[test]
    fn test_short_string_decoding() {
        // "WETH" (4 bytes) in Solidity short-string layout: length byte 8
        let raw = "0x5745544800000000000000000000000000000000000000000000000000000008";
        assert_eq!(decode_short_string(raw), "WETH");
    }

    #[test]
    fn test_large_balance_flag_severities() {
        let config = AnalysisConfig::default();
        let mut flags = Vec::new();

        let big = SignedDelta::between(U256::ZERO, config.large_transfer_wei);
        flag_large_balance_change("0xwhale", &big, &config, &mut flags);
        assert_eq!(flags[0].severity, FlagSeverity::High);

        let huge = SignedDelta::between(U256::ZERO, config.critical_transfer_wei);
        flag_large_balance_change("0xwhale", &huge, &config, &mut flags);
        assert_eq!(flags[1].severity, FlagSeverity::Critical);

        let small = SignedDelta::between(U256::ZERO, U256::from(1));
        flag_large_balance_change("0xwhale", &small, &config, &mut flags);
        assert_eq!(flags.len(), 2);
    }

    #[test]
    fn test_large_token_balance_delta_flagged() {
        let usdc = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
        let flagged = |raw_to: &str| {
            let mut storage = BTreeMap::new();
            storage.insert("0xdeadbeef".to_string(), changed("0x0", raw_to));
            let diff = diff_with(
                usdc,
                RawStateDiffRecord {
                    storage,
                    ..Default::default()
                },
            );
            process_state_diff("0x1", &diff, &AnalysisConfig::default())
        };

        // 10M USDC (6 decimals): over the critical whole-token threshold
        let analysis = flagged("0x9184e72a000");
        let flag = analysis
            .flags
            .iter()
            .find(|f| f.flag_type == FlagType::LargeTokenTransfer)
            .unwrap();
        assert_eq!(flag.severity, FlagSeverity::Critical);
        assert!(flag.description.contains("USDC"));

        // 200k USDC: above large, below critical
        let analysis = flagged("0x2e90edd000");
        let flag = analysis
            .flags
            .iter()
            .find(|f| f.flag_type == FlagType::LargeTokenTransfer)
            .unwrap();
        assert_eq!(flag.severity, FlagSeverity::High);

        // 5 USDC: no flag
        let analysis = flagged("0x4c4b40");
        assert!(!analysis
            .flags
            .iter()
            .any(|f| f.flag_type == FlagType::LargeTokenTransfer));
    }

    #[test]
    fn test_unknown_contract_storage_not_token_flagged() {
        let mut storage = BTreeMap::new();
        // Huge value on a contract outside the token registry
        storage.insert(
            "0xdeadbeef".to_string(),
            changed("0x0", "0x9184e72a000000000000"),
        );
        let diff = diff_with(
            "0xnotatoken",
            RawStateDiffRecord {
                storage,
                ..Default::default()
            },
        );
        let analysis = process_state_diff("0x1", &diff, &AnalysisConfig::default());
        assert!(!analysis
            .flags
            .iter()
            .any(|f| f.flag_type == FlagType::LargeTokenTransfer));
    }

    #[test]
    fn test_unchanged_sections_ignored() {
        let diff = diff_with("0xquiet", RawStateDiffRecord::default());
        let analysis = process_state_diff("0x1", &diff, &AnalysisConfig::default());
        assert!(analysis.balance_changes.is_empty());
        assert!(analysis.storage_changes.is_empty());
        assert!(analysis.flags.is_empty());
    }
}
