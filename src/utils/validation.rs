//! Input validation for replay targets
//!
//! Hashes and block identifiers are validated syntactically before any
//! network call; invalid input fails immediately and is never retried.

use crate::models::errors::{AppError, AppResult};
use crate::models::types::TracerType;

/// Check a 0x-prefixed 32-byte transaction hash
pub fn validate_tx_hash(hash: &str) -> AppResult<()> {
    if is_hex_hash(hash) {
        Ok(())
    } else {
        Err(AppError::invalid_tx_hash(hash))
    }
}

/// Validate a block identifier and normalize it to 0x-hex for dispatch.
///
/// Accepted forms: non-negative decimal integer, 0x-prefixed hex quantity,
/// or a 32-byte 0x-prefixed block hash.
pub fn normalize_block_id(block: &str) -> AppResult<String> {
    let trimmed = block.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_block_id(block));
    }

    // 32-byte hash passes through as-is
    if is_hex_hash(trimmed) {
        return Ok(trimmed.to_lowercase());
    }

    if let Some(digits) = trimmed.strip_prefix("0x") {
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(format!("0x{}", digits.to_lowercase()));
        }
        return Err(AppError::invalid_block_id(block));
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        let number: u64 = trimmed
            .parse()
            .map_err(|_| AppError::invalid_block_id(block))?;
        return Ok(format!("0x{:x}", number));
    }

    Err(AppError::invalid_block_id(block))
}

/// Validate a requested tracer set: non-empty, every member known
pub fn validate_tracers(tracers: &[TracerType]) -> AppResult<()> {
    if tracers.is_empty() {
        return Err(AppError::new(
            crate::models::errors::ErrorCode::EmptyTracerSet,
            "At least one tracer must be requested",
        ));
    }
    Ok(())
}

/// Parse tracer names from wire strings, rejecting unknown values
pub fn parse_tracer_names(names: &[&str]) -> AppResult<Vec<TracerType>> {
    let mut tracers = Vec::with_capacity(names.len());
    for name in names {
        match TracerType::parse(name) {
            Some(t) => tracers.push(t),
            None => return Err(AppError::unsupported_tracer(name)),
        }
    }
    validate_tracers(&tracers)?;
    Ok(tracers)
}

fn is_hex_hash(value: &str) -> bool {
    value.len() == 66
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::ErrorCode;

    const GOOD_HASH: &str =
        "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";

    #[test]
    fn test_tx_hash_validation() {
        assert!(validate_tx_hash(GOOD_HASH).is_ok());
        assert!(validate_tx_hash("0x1234").is_err());
        assert!(validate_tx_hash(&GOOD_HASH[2..]).is_err()); // missing prefix
        assert!(validate_tx_hash(&format!("0x{}", "g".repeat(64))).is_err());
    }

    #[test]
    fn test_block_id_normalization() {
        assert_eq!(normalize_block_id("17000000").unwrap(), "0x1036640");
        assert_eq!(normalize_block_id("0x1036640").unwrap(), "0x1036640");
        assert_eq!(normalize_block_id("0xABC").unwrap(), "0xabc");
        assert_eq!(normalize_block_id(GOOD_HASH).unwrap(), GOOD_HASH);
        assert_eq!(normalize_block_id("0").unwrap(), "0x0");
    }

    #[test]
    fn test_block_id_rejects_garbage() {
        for bad in ["", "latest", "-5", "0x", "12a4", "0xmnop"] {
            let err = normalize_block_id(bad).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidBlockId, "input: {:?}", bad);
        }
    }

    #[test]
    fn test_tracer_parsing() {
        let ok = parse_tracer_names(&["trace", "stateDiff"]).unwrap();
        assert_eq!(ok.len(), 2);

        let err = parse_tracer_names(&["trace", "fullTrace"]).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedTracer);

        let err = parse_tracer_names(&[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyTracerSet);
    }
}
