//! Centralized Error Handling Module
//!
//! Every failure path in the replay pipeline carries a unique error code,
//! which makes retry decisions and log monitoring straightforward.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - VALIDATE_xxx: input validation (never retried)
//! - RPC_xxx: transport/node errors
//! - REPLAY_xxx: replay pipeline errors
//! - FALLBACK_xxx: fallback engine errors

use std::fmt;

/// Application-wide error type. All errors in the pipeline flow through this.
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring and retry classification
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// Whether a retry may succeed for this error
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for the replay pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Validation Errors (never retried)
    // ============================================
    /// Transaction hash is not 0x-prefixed 32-byte hex
    InvalidTxHash,
    /// Block identifier is not a decimal, hex quantity, or 32-byte hash
    InvalidBlockId,
    /// Tracer is not one of trace / stateDiff / vmTrace
    UnsupportedTracer,
    /// Tracer set was empty
    EmptyTracerSet,

    // ============================================
    // Transport Errors
    // ============================================
    /// Operation exceeded its time budget (retried)
    Timeout,
    /// Node returned HTTP 429 or JSON-RPC -32005 (retried with backoff)
    RateLimited,
    /// Connection-level failure (retried)
    NetworkError,
    /// Node returned a JSON-RPC error (retried unless classified otherwise)
    RpcError,
    /// Response shape does not match the replay contract (not retried)
    ParsingError,
    /// Caller-initiated cancellation (never retried)
    OperationCancelled,

    // ============================================
    // Fallback Engine Errors
    // ============================================
    /// Every method in the fallback chain failed
    MethodsExhausted,

    // ============================================
    // Generic
    // ============================================
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidTxHash => "VALIDATE_INVALID_TX_HASH",
            Self::InvalidBlockId => "VALIDATE_INVALID_BLOCK_ID",
            Self::UnsupportedTracer => "VALIDATE_UNSUPPORTED_TRACER",
            Self::EmptyTracerSet => "VALIDATE_EMPTY_TRACER_SET",

            Self::Timeout => "RPC_TIMEOUT",
            Self::RateLimited => "RPC_RATE_LIMITED",
            Self::NetworkError => "RPC_NETWORK_ERROR",
            Self::RpcError => "RPC_ERROR",
            Self::ParsingError => "REPLAY_PARSING_ERROR",
            Self::OperationCancelled => "REPLAY_CANCELLED",

            Self::MethodsExhausted => "FALLBACK_METHODS_EXHAUSTED",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Check if error is retryable.
    ///
    /// Validation errors, parsing errors (a contract violation by the data
    /// source) and cancellations must surface immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited | Self::NetworkError | Self::RpcError
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    pub fn invalid_tx_hash(hash: &str) -> Self {
        Self::new(
            ErrorCode::InvalidTxHash,
            format!("Invalid transaction hash: {}", hash),
        )
    }

    pub fn invalid_block_id(block: &str) -> Self {
        Self::new(
            ErrorCode::InvalidBlockId,
            format!("Invalid block identifier: {}", block),
        )
    }

    pub fn unsupported_tracer(tracer: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedTracer,
            format!("Unsupported tracer: {}", tracer),
        )
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, msg)
    }

    pub fn rate_limited() -> Self {
        Self::new(ErrorCode::RateLimited, "Rate limited (HTTP 429)")
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn rpc(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcError, msg)
    }

    pub fn parsing(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParsingError, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::OperationCancelled, msg)
    }

    pub fn methods_exhausted(target: &str) -> Self {
        Self::new(
            ErrorCode::MethodsExhausted,
            format!("All analysis methods failed for target {}", target),
        )
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::Timeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::NetworkError, "Connection failed")
        } else {
            Self::with_source(ErrorCode::NetworkError, "Transport error", err)
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::ParsingError, "JSON parse error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::timeout("Replay exceeded 60s budget");
        assert_eq!(err.code, ErrorCode::Timeout);
        assert_eq!(err.code_str(), "RPC_TIMEOUT");
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::Timeout.is_retryable());
        assert!(ErrorCode::RateLimited.is_retryable());
        assert!(ErrorCode::NetworkError.is_retryable());
        assert!(!ErrorCode::InvalidTxHash.is_retryable());
        assert!(!ErrorCode::ParsingError.is_retryable());
        assert!(!ErrorCode::OperationCancelled.is_retryable());
    }

    #[test]
    fn test_display_includes_code() {
        let err = AppError::invalid_tx_hash("0xdeadbeef");
        let rendered = err.to_string();
        assert!(rendered.contains("VALIDATE_INVALID_TX_HASH"));
        assert!(rendered.contains("0xdeadbeef"));
    }
}
