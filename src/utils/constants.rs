//! Constants Module - Single Source of Truth
//!
//! Every static lookup table used by the pipeline lives here: function
//! signatures, opcode categories, the known-token registry, and network
//! endpoints. No hardcoded tables in other modules. All maps are read-only
//! after startup; nothing here is runtime-extensible.

use crate::models::types::Network;
use alloy_primitives::U256;
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "ReplaySentry";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for HTTP requests
pub const USER_AGENT: &str = "ReplaySentry/0.1.0";

// ============================================
// RPC BUDGETS
// ============================================

/// Timeout for a single-transaction replay attempt (seconds)
pub const TX_REPLAY_TIMEOUT_SECS: u64 = 60;
/// Maximum retries for single-transaction replay
pub const TX_REPLAY_MAX_RETRIES: u32 = 2;
/// Backoff base for single-transaction replay (milliseconds)
pub const TX_REPLAY_BACKOFF_BASE_MS: u64 = 1_000;
/// Backoff cap for single-transaction replay (milliseconds)
pub const TX_REPLAY_BACKOFF_CAP_MS: u64 = 10_000;

/// Timeout for a block-level replay attempt (seconds). Block replays cost
/// very-high tier × transaction count, hence the larger budget.
pub const BLOCK_REPLAY_TIMEOUT_SECS: u64 = 300;
/// Maximum retries for block-level replay
pub const BLOCK_REPLAY_MAX_RETRIES: u32 = 1;
/// Backoff base for block-level replay (milliseconds)
pub const BLOCK_REPLAY_BACKOFF_BASE_MS: u64 = 2_000;
/// Backoff cap for block-level replay (milliseconds)
pub const BLOCK_REPLAY_BACKOFF_CAP_MS: u64 = 30_000;

/// Default cache TTL (seconds)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

// ============================================
// NETWORK ENDPOINTS
// ============================================

/// Default RPC endpoint for a network. `REPLAY_RPC_URL` overrides for any
/// network; the defaults are public archive-capable endpoints.
pub fn get_default_rpc_url(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "https://eth.llamarpc.com",
        Network::Sepolia => "https://ethereum-sepolia-rpc.publicnode.com",
        Network::Holesky => "https://ethereum-holesky-rpc.publicnode.com",
    }
}

/// Environment variable that overrides the endpoint for a network
pub fn rpc_url_env_key(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "REPLAY_RPC_URL",
        Network::Sepolia => "REPLAY_RPC_URL_SEPOLIA",
        Network::Holesky => "REPLAY_RPC_URL_HOLESKY",
    }
}

// ============================================
// FUNCTION SIGNATURES (4-byte selectors)
// ============================================

lazy_static! {
    /// Known 4-byte selectors → function names. Unmatched selectors decode
    /// as `unknown`.
    pub static ref FUNCTION_SIGNATURES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        // ERC-20
        m.insert("0xa9059cbb", "transfer(address,uint256)");
        m.insert("0x23b872dd", "transferFrom(address,address,uint256)");
        m.insert("0x095ea7b3", "approve(address,uint256)");
        m.insert("0x70a08231", "balanceOf(address)");
        m.insert("0xdd62ed3e", "allowance(address,address)");
        m.insert("0x18160ddd", "totalSupply()");
        // Ownership / admin
        m.insert("0x8da5cb5b", "owner()");
        m.insert("0xf2fde38b", "transferOwnership(address)");
        m.insert("0x715018a6", "renounceOwnership()");
        m.insert("0x8456cb59", "pause()");
        m.insert("0x3f4ba83a", "unpause()");
        m.insert("0x40c10f19", "mint(address,uint256)");
        m.insert("0x42966c68", "burn(uint256)");
        m.insert("0x9dc29fac", "burn(address,uint256)");
        m.insert("0x3659cfe6", "upgradeTo(address)");
        m.insert("0x4f1ef286", "upgradeToAndCall(address,bytes)");
        m.insert("0xf9f92be4", "blacklist(address)");
        m.insert("0x1a895266", "unBlacklist(address)");
        // WETH
        m.insert("0xd0e30db0", "deposit()");
        m.insert("0x2e1a7d4d", "withdraw(uint256)");
        // DEX swaps
        m.insert("0x7ff36ab5", "swapExactETHForTokens(uint256,address[],address,uint256)");
        m.insert("0x18cbafe5", "swapExactTokensForETH(uint256,uint256,address[],address,uint256)");
        m.insert("0x38ed1739", "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)");
        m.insert("0xfb3bdb41", "swapETHForExactTokens(uint256,address[],address,uint256)");
        m.insert("0x022c0d9f", "swap(uint256,uint256,address,bytes)");
        m.insert("0x128acb08", "swap(address,bool,int256,uint160,bytes)");
        m.insert("0x414bf389", "exactInputSingle((address,address,uint24,address,uint256,uint256,uint256,uint160))");
        // Flash loans
        m.insert("0xab9c4b5d", "flashLoan(address,address[],uint256[],uint256[],address,bytes,uint16)");
        m.insert("0x5cffe9de", "flashLoan(address,address,uint256,bytes)");
        // Multicall / routing
        m.insert("0xac9650d8", "multicall(bytes[])");
        m.insert("0x1f00ca74", "getAmountsIn(uint256,address[])");
        m.insert("0xd06ca61f", "getAmountsOut(uint256,address[])");
        m
    };

    /// Selectors tagged as admin/privileged operations
    pub static ref ADMIN_SIGNATURES: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("0xf2fde38b"); // transferOwnership
        s.insert("0x715018a6"); // renounceOwnership
        s.insert("0x8456cb59"); // pause
        s.insert("0x3f4ba83a"); // unpause
        s.insert("0x40c10f19"); // mint
        s.insert("0x3659cfe6"); // upgradeTo
        s.insert("0x4f1ef286"); // upgradeToAndCall
        s.insert("0xf9f92be4"); // blacklist
        s.insert("0x1a895266"); // unBlacklist
        s
    };

    /// Selectors that look like DEX swaps (sandwich-pattern indicator)
    pub static ref SWAP_SIGNATURES: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("0x7ff36ab5");
        s.insert("0x18cbafe5");
        s.insert("0x38ed1739");
        s.insert("0xfb3bdb41");
        s.insert("0x022c0d9f");
        s.insert("0x128acb08");
        s.insert("0x414bf389");
        s
    };
}

/// Look up a function name by calldata. Input shorter than a selector
/// decodes to None (plain transfer, not a function call).
pub fn lookup_function(input: &str) -> Option<(&str, &'static str)> {
    if input.len() < 10 || !input.starts_with("0x") {
        return None;
    }
    let selector = &input[..10];
    let lowered = selector.to_lowercase();
    let name = FUNCTION_SIGNATURES
        .get(lowered.as_str())
        .copied()
        .unwrap_or("unknown");
    Some((selector, name))
}

/// Whether a selector is admin-tagged
pub fn is_admin_selector(selector: &str) -> bool {
    ADMIN_SIGNATURES.contains(selector.to_lowercase().as_str())
}

/// Whether a selector looks like a DEX swap
pub fn is_swap_selector(selector: &str) -> bool {
    SWAP_SIGNATURES.contains(selector.to_lowercase().as_str())
}

// ============================================
// OPCODE CATEGORIES
// ============================================

/// Coarse opcode categories for gas attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeCategory {
    Arithmetic,
    Comparison,
    Storage,
    Memory,
    Stack,
    Flow,
    System,
    Log,
    Environment,
    Other,
}

impl OpcodeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpcodeCategory::Arithmetic => "arithmetic",
            OpcodeCategory::Comparison => "comparison",
            OpcodeCategory::Storage => "storage",
            OpcodeCategory::Memory => "memory",
            OpcodeCategory::Stack => "stack",
            OpcodeCategory::Flow => "flow",
            OpcodeCategory::System => "system",
            OpcodeCategory::Log => "log",
            OpcodeCategory::Environment => "environment",
            OpcodeCategory::Other => "other",
        }
    }
}

lazy_static! {
    static ref OPCODE_CATEGORIES: HashMap<&'static str, OpcodeCategory> = {
        use OpcodeCategory::*;
        let mut m = HashMap::new();
        for op in ["ADD", "SUB", "MUL", "DIV", "SDIV", "MOD", "SMOD", "ADDMOD",
                   "MULMOD", "EXP", "SIGNEXTEND"] {
            m.insert(op, Arithmetic);
        }
        for op in ["LT", "GT", "SLT", "SGT", "EQ", "ISZERO", "AND", "OR", "XOR",
                   "NOT", "BYTE", "SHL", "SHR", "SAR"] {
            m.insert(op, Comparison);
        }
        for op in ["SLOAD", "SSTORE", "TLOAD", "TSTORE"] {
            m.insert(op, Storage);
        }
        for op in ["MLOAD", "MSTORE", "MSTORE8", "MSIZE", "MCOPY",
                   "CALLDATACOPY", "CODECOPY", "RETURNDATACOPY", "EXTCODECOPY"] {
            m.insert(op, Memory);
        }
        for op in ["POP", "PUSH0"] {
            m.insert(op, Stack);
        }
        for op in ["JUMP", "JUMPI", "JUMPDEST", "PC", "STOP", "RETURN", "REVERT"] {
            m.insert(op, Flow);
        }
        for op in ["CALL", "CALLCODE", "DELEGATECALL", "STATICCALL", "CREATE",
                   "CREATE2", "SELFDESTRUCT"] {
            m.insert(op, System);
        }
        for op in ["LOG0", "LOG1", "LOG2", "LOG3", "LOG4"] {
            m.insert(op, Log);
        }
        for op in ["ADDRESS", "BALANCE", "ORIGIN", "CALLER", "CALLVALUE",
                   "CALLDATALOAD", "CALLDATASIZE", "CODESIZE", "GASPRICE",
                   "EXTCODESIZE", "EXTCODEHASH", "RETURNDATASIZE", "BLOCKHASH",
                   "COINBASE", "TIMESTAMP", "NUMBER", "PREVRANDAO", "GASLIMIT",
                   "CHAINID", "SELFBALANCE", "BASEFEE", "GAS", "KECCAK256", "SHA3"] {
            m.insert(op, Environment);
        }
        m
    };
}

/// Categorize an opcode. PUSH/DUP/SWAP families are matched by prefix;
/// anything unrecognized is `Other`.
pub fn opcode_category(op: &str) -> OpcodeCategory {
    if let Some(cat) = OPCODE_CATEGORIES.get(op) {
        return *cat;
    }
    if op.starts_with("PUSH") || op.starts_with("DUP") || op.starts_with("SWAP") {
        return OpcodeCategory::Stack;
    }
    OpcodeCategory::Other
}

// ============================================
// KNOWN TOKEN REGISTRY
// ============================================

/// Static metadata for a known token contract
#[derive(Debug, Clone, Copy)]
pub struct TokenInfo {
    pub symbol: &'static str,
    pub decimals: u8,
}

lazy_static! {
    /// Known mainnet token contracts (lowercase address → metadata)
    pub static ref TOKEN_REGISTRY: HashMap<&'static str, TokenInfo> = {
        let mut m = HashMap::new();
        m.insert("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", TokenInfo { symbol: "WETH", decimals: 18 });
        m.insert("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", TokenInfo { symbol: "USDC", decimals: 6 });
        m.insert("0xdac17f958d2ee523a2206206994597c13d831ec7", TokenInfo { symbol: "USDT", decimals: 6 });
        m.insert("0x6b175474e89094c44da98b954eedeac495271d0f", TokenInfo { symbol: "DAI", decimals: 18 });
        m.insert("0x2260fac5e5542a773aa44fbcfedf7c193bc2c599", TokenInfo { symbol: "WBTC", decimals: 8 });
        m.insert("0x514910771af9ca656af840dff83e8264ecf986ca", TokenInfo { symbol: "LINK", decimals: 18 });
        m.insert("0x1f9840a85d5af5bf1d1762f925bdaddc4201f984", TokenInfo { symbol: "UNI", decimals: 18 });
        m.insert("0x7fc66500c84a76ad7e9c93437bfc5ac33e2ddae9", TokenInfo { symbol: "AAVE", decimals: 18 });
        m
    };
}

/// Look up a known token by address (case-insensitive)
pub fn get_token_info(address: &str) -> Option<TokenInfo> {
    TOKEN_REGISTRY.get(address.to_lowercase().as_str()).copied()
}

// ============================================
// CONVERSION UTILITIES
// ============================================

/// Convert wei to ETH for display thresholds only; raw amounts stay exact
#[inline]
pub fn wei_to_eth(wei: U256) -> f64 {
    let wei_u128: u128 = wei.try_into().unwrap_or(u128::MAX);
    wei_u128 as f64 / 1e18
}

/// Convert whole ETH to wei
#[inline]
pub fn eth_to_wei(eth: u64) -> U256 {
    U256::from(eth) * U256::from(10u64).pow(U256::from(18u64))
}

/// Parse a 0x-hex quantity into U256; empty/absent values read as zero
pub fn parse_hex_u256(value: &str) -> Option<U256> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "0x" {
        return Some(U256::ZERO);
    }
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    U256::from_str_radix(digits, 16).ok()
}

/// Hex code blob length in bytes (for code-change sizing)
pub fn hex_byte_len(value: &str) -> usize {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    digits.len() / 2
}
