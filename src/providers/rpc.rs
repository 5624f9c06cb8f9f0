//! JSON-RPC Provider Module
//!
//! Thin transport over reqwest with gzip compression and a custom
//! User-Agent. This layer executes exactly one call per invocation and
//! classifies failures into the error taxonomy; retry and timeout budgets
//! belong to the replay client, which differ per method.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::USER_AGENT as USER_AGENT_CONST;

/// JSON-RPC provider bound to one endpoint
#[derive(Clone)]
pub struct RpcProvider {
    url: String,
    client: reqwest::Client,
}

impl RpcProvider {
    /// Create a provider for an endpoint
    pub fn new(url: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            url: url.into(),
            client: Self::build_client()?,
        })
    }

    /// Build HTTP client with gzip compression enabled; replay payloads for
    /// busy transactions routinely exceed 100kb.
    fn build_client() -> AppResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        reqwest::Client::builder()
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorCode::NetworkError, "Failed to build HTTP client", e)
            })
    }

    /// Execute a single JSON-RPC call. No retry here; callers own budgets.
    pub async fn call(&self, method: &str, params: serde_json::Value) -> AppResult<serde_json::Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        debug!("🔍 RPC call: {}", method);

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(AppError::from)?;

        let status = response.status();
        if status == 429 {
            return Err(AppError::rate_limited());
        }
        if !status.is_success() {
            return Err(AppError::network(format!("HTTP error: {}", status)));
        }

        let json: RpcResponse = response
            .json()
            .await
            .map_err(|e| AppError::with_source(ErrorCode::ParsingError, "Malformed RPC response", e))?;

        if let Some(error) = json.error {
            return Err(error.into_app_error(method));
        }

        json.result
            .ok_or_else(|| AppError::parsing(format!("No result in {} response", method)))
    }

    /// Endpoint with any embedded API key masked, for logging
    pub fn masked_url(&self) -> String {
        if let Some((base, _key)) = self.url.rsplit_once("/v2/") {
            return format!("{}/v2/***HIDDEN***", base);
        }
        self.url.clone()
    }
}

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    result: Option<serde_json::Value>,
    error: Option<RpcErrorBody>,
}

/// JSON-RPC error body
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

impl RpcErrorBody {
    /// Rate limit: HTTP 429 equivalent carried in-band (code -32005)
    pub fn is_rate_limit(&self) -> bool {
        self.code == -32005 || self.message.to_lowercase().contains("rate limit")
    }

    /// Method not found (code -32601): the node lacks the trace API
    pub fn is_method_not_found(&self) -> bool {
        self.code == -32601
    }

    /// Parse error (code -32700)
    pub fn is_parse_error(&self) -> bool {
        self.code == -32700
    }

    fn into_app_error(self, method: &str) -> AppError {
        if self.is_rate_limit() {
            AppError::rate_limited()
        } else if self.is_method_not_found() {
            // A node without the trace API will never grow one mid-retry
            AppError::new(
                ErrorCode::ParsingError,
                format!("Method {} not supported by this node", method),
            )
        } else if self.is_parse_error() {
            // The node rejected our request body; retrying the same bytes
            // cannot help
            AppError::parsing(format!("Node could not parse {} request", method))
        } else {
            AppError::rpc(format!("RPC error: {} (code: {})", self.message, self.code))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_classification() {
        let rate_limit = RpcErrorBody {
            code: -32005,
            message: "Rate limit exceeded".to_string(),
        };
        assert!(rate_limit.is_rate_limit());
        assert_eq!(
            rate_limit.into_app_error("trace_replayTransaction").code,
            ErrorCode::RateLimited
        );

        let missing = RpcErrorBody {
            code: -32601,
            message: "Method not found".to_string(),
        };
        assert!(missing.is_method_not_found());
        assert_eq!(
            missing.into_app_error("trace_replayTransaction").code,
            ErrorCode::ParsingError
        );

        let malformed = RpcErrorBody {
            code: -32700,
            message: "Parse error".to_string(),
        };
        assert!(malformed.is_parse_error());
        let err = malformed.into_app_error("trace_replayTransaction");
        assert_eq!(err.code, ErrorCode::ParsingError);
        assert!(!err.is_retryable());

        let generic = RpcErrorBody {
            code: -32000,
            message: "execution aborted".to_string(),
        };
        assert_eq!(generic.into_app_error("eth_call").code, ErrorCode::RpcError);
    }

    #[test]
    fn test_masked_url() {
        let provider = RpcProvider::new("https://eth-mainnet.g.alchemy.com/v2/secret").unwrap();
        assert_eq!(
            provider.masked_url(),
            "https://eth-mainnet.g.alchemy.com/v2/***HIDDEN***"
        );

        let public = RpcProvider::new("https://eth.llamarpc.com").unwrap();
        assert_eq!(public.masked_url(), "https://eth.llamarpc.com");
    }
}
