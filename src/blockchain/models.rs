// src/blockchain/models.rs

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

// --- Tool boundary errors ---

/// Everything that can go wrong inside a tool. Nothing in this enum crosses
/// the tool boundary as an error type: callers receive `envelope()` output.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Missing required parameter: {0}")]
    MissingParam(&'static str),
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParam { name: &'static str, reason: String },
    #[error("Failed to connect to {network} {environment}")]
    Connection { network: String, environment: String },
    #[error("{0}")]
    Chain(String),
    #[error("{0}")]
    Fetch(String),
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),
}

impl ToolError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ToolError::InvalidParam {
            name,
            reason: reason.into(),
        }
    }

    pub fn chain(message: impl Into<String>) -> Self {
        ToolError::Chain(message.into())
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        ToolError::Fetch(message.into())
    }

    /// The uniform error envelope every tool returns on failure.
    /// The message is always a plain string; details are optional structure.
    pub fn envelope(&self) -> Value {
        match self {
            ToolError::InvalidParam { name, reason } => json!({
                "error": self.to_string(),
                "details": { "parameter": name, "reason": reason },
            }),
            ToolError::Connection { network, environment } => json!({
                "error": self.to_string(),
                "details": { "network": network, "environment": environment },
            }),
            _ => json!({ "error": self.to_string() }),
        }
    }
}

/// Shorthand used by every tool internals function.
pub type ToolResult = Result<Value, ToolError>;

// --- Token metadata ---

/// ERC-20 metadata, fetched once per contract and memoized for the process
/// lifetime (explicit force_refresh is the only invalidation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u32,
}

// --- Process-scoped caches ---

/// Caches shared by the domain tools. Owned by `AppState`, never global.
/// Concurrent population is benign: last write wins on the same key.
#[derive(Debug, Default)]
pub struct ToolCaches {
    /// "network:token_address" -> metadata
    pub tokens: DashMap<String, TokenMetadata>,
    /// "resolve:name" / "lookup:address" -> cached result payload
    pub ens: DashMap<String, Value>,
    /// "network:contract:token_id" -> cached metadata payload
    pub nft_metadata: DashMap<String, Value>,
    /// "cid/path" -> cached content payload
    pub ipfs: DashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_param_envelope_names_the_parameter() {
        let env = ToolError::MissingParam("token_address").envelope();
        assert!(env["error"]
            .as_str()
            .unwrap()
            .contains("token_address"));
        assert!(env.get("details").is_none());
    }

    #[test]
    fn invalid_param_envelope_carries_structured_details() {
        let env = ToolError::invalid("address", "not hex").envelope();
        assert_eq!(env["details"]["parameter"], "address");
        assert_eq!(env["details"]["reason"], "not hex");
        assert!(env["error"].is_string());
    }
}
