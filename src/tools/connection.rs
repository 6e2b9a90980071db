// src/tools/connection.rs

use serde_json::Value;

use crate::blockchain::models::{ToolError, ToolResult};
use crate::utils::{network_params, opt_bool, opt_str};
use crate::AppState;

/// Actions accepted by the web3_connection tool.
enum ConnectionAction {
    Connect,
    Status,
}

impl ConnectionAction {
    fn parse(args: &Value) -> Result<Self, ToolError> {
        match opt_str(args, "action").unwrap_or("connect") {
            "connect" => Ok(Self::Connect),
            "status" => Ok(Self::Status),
            other => Err(ToolError::UnsupportedAction(other.to_string())),
        }
    }
}

pub async fn execute(state: &AppState, args: &Value) -> Value {
    super::finish(run(state, args).await)
}

async fn run(state: &AppState, args: &Value) -> ToolResult {
    let action = ConnectionAction::parse(args)?;
    let (network, environment) = network_params(args);

    let force_reconnect = match action {
        ConnectionAction::Connect => opt_bool(args, "force_reconnect"),
        // Status never tears a cached handle down.
        ConnectionAction::Status => false,
    };
    let override_url = opt_str(args, "provider_url");

    let handle = state
        .connections
        .ensure(network, environment, override_url, force_reconnect)
        .await?;
    Ok(handle.status())
}
