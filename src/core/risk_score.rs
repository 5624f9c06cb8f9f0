//! Risk Scoring Module
//!
//! Additive scoring over security flags and detected patterns. The weight
//! tables and score-band mapping are part of the external contract; every
//! recommendation traces back to the flag or pattern type that caused it.

use crate::models::types::{
    DetectedPattern, FlagType, PatternType, RiskLevel, SecurityFlag,
};

/// Compute the clamped 0-100 score and its band. Flags contribute their
/// fixed severity weight; patterns contribute `weight × confidence`.
pub fn compute(flags: &[SecurityFlag], patterns: &[DetectedPattern]) -> (u8, RiskLevel) {
    let flag_score: f64 = flags.iter().map(|f| f.severity.weight() as f64).sum();
    let pattern_score: f64 = patterns
        .iter()
        .map(|p| p.pattern.weight() as f64 * p.confidence.clamp(0.0, 1.0))
        .sum();

    let score = (flag_score + pattern_score).round().clamp(0.0, 100.0) as u8;
    (score, RiskLevel::from_score(score))
}

/// Deduplicated recommendations in flag order. Static lookup only; no
/// freeform generation.
pub fn recommendations(flags: &[SecurityFlag], patterns: &[DetectedPattern]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |text: &str| {
        if !out.iter().any(|r| r == text) {
            out.push(text.to_string());
        }
    };

    for flag in flags {
        push(flag_recommendation(flag.flag_type));
    }
    for pattern in patterns {
        push(pattern_recommendation(pattern.pattern));
    }
    out
}

fn flag_recommendation(flag_type: FlagType) -> &'static str {
    match flag_type {
        FlagType::AdminFunctionCall => {
            "Verify the caller was authorized to invoke privileged functions"
        }
        FlagType::OwnershipChange => {
            "Confirm the ownership transfer was intentional and the new owner is trusted"
        }
        FlagType::ContractCodeChange => {
            "Audit the new bytecode; code changes in a live contract are rarely benign"
        }
        FlagType::SupplyChange => "Check mint/burn events against the token's stated policy",
        FlagType::PausedStateChange => {
            "Confirm the pause toggle came from an authorized operator"
        }
        FlagType::LargeEthTransfer => "Trace the destination of the large ETH movement",
        FlagType::LargeTokenTransfer => "Trace the destination of the large token movement",
        FlagType::FailedInternalCall => {
            "Inspect reverted internal calls; partial failure can mask manipulation"
        }
        FlagType::UnmatchedTokenTransfer => {
            "Verify the token contract actually moved funds; the transfer may have no-opped"
        }
        FlagType::DeepCallStack => "Review the deep call chain for delegation loops",
        FlagType::HighGasCall => "Profile the high-gas call for unbounded loops",
    }
}

fn pattern_recommendation(pattern: PatternType) -> &'static str {
    match pattern {
        PatternType::FlashLoan => {
            "Check whether the flash-loan-sized swing funded price manipulation"
        }
        PatternType::AdminAbuse => {
            "Review the burst of admin calls; batched privilege use often precedes an exit"
        }
        PatternType::Sandwich => {
            "Compare neighboring transactions in the block for sandwich ordering"
        }
    }
}
