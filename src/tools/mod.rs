//! Domain tools: each module dispatches on an `action` argument, validates
//! its parameters, ensures a live connection and returns a flat JSON result
//! or the `{"error": ...}` envelope. Nothing else ever crosses the tool
//! boundary.

use serde_json::Value;
use tracing::error;

use crate::blockchain::models::{ToolError, ToolResult};
use crate::blockchain::ConnectionHandle;
use crate::AppState;

pub mod connection;
pub mod contract;
pub mod defi;
pub mod ens;
pub mod ipfs;
pub mod nft;
pub mod token;

pub const TOOL_NAMES: &[&str] = &[
    "web3_connection",
    "smart_contract",
    "token",
    "nft",
    "defi",
    "ens",
    "ipfs",
];

/// Route a tool call by name. None means the tool does not exist (a protocol
/// error, not a tool error).
pub async fn dispatch(name: &str, state: &AppState, args: &Value) -> Option<Value> {
    let result = match name {
        "web3_connection" => connection::execute(state, args).await,
        "smart_contract" => contract::execute(state, args).await,
        "token" => token::execute(state, args).await,
        "nft" => nft::execute(state, args).await,
        "defi" => defi::execute(state, args).await,
        "ens" => ens::execute(state, args).await,
        "ipfs" => ipfs::execute(state, args).await,
        _ => return None,
    };
    if let Some(message) = result.get("error").and_then(|v| v.as_str()) {
        error!("{} tool error: {}", name, message);
    }
    Some(result)
}

/// Collapse the internal Result into the envelope contract.
pub(crate) fn finish(result: ToolResult) -> Value {
    match result {
        Ok(payload) => payload,
        Err(e) => e.envelope(),
    }
}

/// Shared "ensure a live connection" step used after parameter validation.
pub(crate) async fn connect(
    state: &AppState,
    network: &str,
    environment: &str,
) -> Result<ConnectionHandle, ToolError> {
    state
        .connections
        .get_connection(network, environment)
        .await
        .ok_or_else(|| ToolError::Connection {
            network: network.to_string(),
            environment: environment.to_string(),
        })
}
