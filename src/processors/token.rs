//! Token-Flow Processor Module
//!
//! Aggregates storage deltas on known token contracts into per-token
//! flows: supply movement, balance movements, allowance movements. Amounts
//! are rendered with exact integer arithmetic at the token's declared
//! decimals; no floating point touches a token quantity.

use tracing::debug;

use crate::models::types::{
    SignedDelta, SlotInterpretation, StateDiffAnalysis, TokenAnalysis, TokenFlow, TokenSlotDelta,
};
use crate::utils::constants::get_token_info;
use alloy_primitives::U256;
use std::collections::BTreeMap;

/// Derive token flows from a processed state diff. Only contracts in the
/// static token registry participate; unknown contracts have no trusted
/// decimals to format with.
pub fn process_token_flows(diff: &StateDiffAnalysis) -> TokenAnalysis {
    let mut flows: BTreeMap<String, TokenFlow> = BTreeMap::new();

    for change in &diff.storage_changes {
        let Some(info) = get_token_info(&change.address) else {
            continue;
        };

        let flow = flows.entry(change.address.clone()).or_insert_with(|| TokenFlow {
            address: change.address.clone(),
            symbol: info.symbol.to_string(),
            decimals: info.decimals,
            supply_delta: None,
            balance_deltas: Vec::new(),
            allowance_deltas: Vec::new(),
        });

        let delta = SignedDelta::between(change.from, change.to);
        if delta.is_zero() {
            continue;
        }
        let slot_delta = TokenSlotDelta {
            slot: change.slot.clone(),
            formatted: format_token_amount(&delta, info.decimals),
            delta,
        };

        match change.interpretation {
            SlotInterpretation::TotalSupply => flow.supply_delta = Some(slot_delta),
            SlotInterpretation::Balance => flow.balance_deltas.push(slot_delta),
            SlotInterpretation::Allowance => flow.allowance_deltas.push(slot_delta),
            _ => {}
        }
    }

    let analysis = TokenAnalysis {
        flows: flows.into_values().collect(),
    };
    debug!("🔍 Token flows: {} known token(s) touched", analysis.flows.len());
    analysis
}

/// Exact decimal rendering: integer division and remainder at the token's
/// decimals, trailing fractional zeros trimmed.
pub fn format_token_amount(delta: &SignedDelta, decimals: u8) -> String {
    let scale = U256::from(10u64).pow(U256::from(decimals as u64));
    let whole = delta.magnitude / scale;
    let frac = delta.magnitude % scale;
    let sign = if delta.negative { "-" } else { "" };

    if frac.is_zero() {
        return format!("{}{}", sign, whole);
    }
    let frac_str = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}{}.{}", sign, whole, frac_str.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::StorageChange;

    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    fn change(address: &str, from: u64, to: u64, interp: SlotInterpretation) -> StorageChange {
        StorageChange {
            address: address.to_string(),
            slot: "0xdeadbeef".to_string(),
            from: U256::from(from),
            to: U256::from(to),
            interpretation: interp,
        }
    }

    #[test]
    fn test_known_token_balance_flow() {
        let diff = StateDiffAnalysis {
            storage_changes: vec![
                change(USDC, 0, 1_500_000, SlotInterpretation::Balance),
                change("0xnotatoken", 0, 99, SlotInterpretation::Balance),
            ],
            ..Default::default()
        };
        let analysis = process_token_flows(&diff);

        assert_eq!(analysis.flows.len(), 1);
        let flow = &analysis.flows[0];
        assert_eq!(flow.symbol, "USDC");
        assert_eq!(flow.balance_deltas.len(), 1);
        assert_eq!(flow.balance_deltas[0].formatted, "1.5");
    }

    #[test]
    fn test_supply_delta_slot() {
        let diff = StateDiffAnalysis {
            storage_changes: vec![change(USDC, 2_000_000, 1_000_000, SlotInterpretation::TotalSupply)],
            ..Default::default()
        };
        let analysis = process_token_flows(&diff);
        let supply = analysis.flows[0].supply_delta.as_ref().unwrap();
        assert!(supply.delta.negative);
        assert_eq!(supply.formatted, "-1");
    }

    #[test]
    fn test_exact_formatting_no_floats() {
        // 18-decimal value that would lose precision as f64
        let delta = SignedDelta::between(
            U256::ZERO,
            U256::from(1_000_000_000_000_000_001u128),
        );
        assert_eq!(format_token_amount(&delta, 18), "1.000000000000000001");

        let whole = SignedDelta::between(U256::ZERO, U256::from(5_000_000u64));
        assert_eq!(format_token_amount(&whole, 6), "5");

        let small = SignedDelta::between(U256::from(10u64), U256::ZERO);
        assert_eq!(format_token_amount(&small, 6), "-0.00001");
    }

    #[test]
    fn test_unknown_interpretations_ignored() {
        let diff = StateDiffAnalysis {
            storage_changes: vec![change(USDC, 0, 5, SlotInterpretation::Unknown)],
            ..Default::default()
        };
        let analysis = process_token_flows(&diff);
        let flow = &analysis.flows[0];
        assert!(flow.supply_delta.is_none());
        assert!(flow.balance_deltas.is_empty());
        assert!(flow.allowance_deltas.is_empty());
    }
}
