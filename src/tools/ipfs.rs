//! IPFS tool: gateway reads, local-node writes.

use std::time::Duration;

use serde_json::{json, Value};

use crate::blockchain::models::{ToolError, ToolResult};
use crate::blockchain::retry::with_backoff;
use crate::blockchain::services::ipfs;
use crate::utils::{opt_bool, opt_str, required_str, required_value};
use crate::AppState;

enum IpfsAction {
    Get,
    Add,
    Pin,
}

impl IpfsAction {
    fn parse(args: &Value) -> Result<Self, ToolError> {
        match opt_str(args, "action").unwrap_or("get") {
            "get" => Ok(Self::Get),
            "add" => Ok(Self::Add),
            "pin" => Ok(Self::Pin),
            other => Err(ToolError::UnsupportedAction(other.to_string())),
        }
    }
}

pub async fn execute(state: &AppState, args: &Value) -> Value {
    super::finish(run(state, args).await)
}

async fn run(state: &AppState, args: &Value) -> ToolResult {
    match IpfsAction::parse(args)? {
        IpfsAction::Get => get(state, args).await,
        IpfsAction::Add => add(state, args).await,
        IpfsAction::Pin => pin(state, args).await,
    }
}

/// cid accepts a bare CID, an ipfs:// URI or a gateway URL.
fn required_cid(args: &Value) -> Result<(String, String), ToolError> {
    let raw = required_str(args, "cid")?;
    let (cid, mut path) = ipfs::extract_cid(raw).ok_or_else(|| {
        ToolError::invalid("cid", format!("'{}' is not a CID or IPFS URI", raw))
    })?;
    if let Some(extra) = opt_str(args, "path") {
        path = if extra.starts_with('/') {
            extra.to_string()
        } else {
            format!("/{}", extra)
        };
    }
    Ok((cid, path))
}

async fn get(state: &AppState, args: &Value) -> ToolResult {
    let (cid, path) = required_cid(args)?;

    let cache_key = format!("{}{}", cid, path);
    if !opt_bool(args, "force_refresh") {
        if let Some(cached) = state.caches.ipfs.get(&cache_key) {
            return Ok(cached.clone());
        }
    }

    let http = state.connections.http();
    let gateway = state.config.ipfs_gateway_url.clone();
    // Public gateways shed load with transient 5xx; a couple of retries
    // rides that out.
    let payload = with_backoff(2, Duration::from_millis(500), 2, || {
        ipfs::gateway_fetch(http, &gateway, &cid, &path)
    })
    .await
    .map_err(|e| ToolError::fetch(format!("Failed to get IPFS content: {}", e)))?;

    state.caches.ipfs.insert(cache_key, payload.clone());
    Ok(payload)
}

async fn add(state: &AppState, args: &Value) -> ToolResult {
    let data = required_value(args, "data")?;
    let Some(api_url) = state.config.ipfs_api_url.as_deref() else {
        return Err(ToolError::fetch(
            "Adding content requires a local IPFS node (set IPFS_API_URL)",
        ));
    };

    let content = match data {
        Value::String(s) => s.clone().into_bytes(),
        other => serde_json::to_vec(other)
            .map_err(|e| ToolError::invalid("data", e.to_string()))?,
    };
    let size = content.len();

    let cid = ipfs::node_add(state.connections.http(), api_url, content)
        .await
        .map_err(|e| ToolError::fetch(format!("Failed to add content to IPFS: {}", e)))?;

    Ok(json!({
        "cid": cid,
        "size": size,
        "gateway_url": ipfs::to_gateway_url(&state.config.ipfs_gateway_url, &cid, ""),
    }))
}

async fn pin(state: &AppState, args: &Value) -> ToolResult {
    let (cid, _) = required_cid(args)?;
    let Some(api_url) = state.config.ipfs_api_url.as_deref() else {
        return Err(ToolError::fetch(
            "Pinning content requires a local IPFS node (set IPFS_API_URL)",
        ));
    };

    ipfs::node_pin(state.connections.http(), api_url, &cid)
        .await
        .map_err(|e| ToolError::fetch(format!("Failed to pin content: {}", e)))?;

    Ok(json!({
        "cid": cid,
        "status": "pinned",
        "gateway_url": ipfs::to_gateway_url(&state.config.ipfs_gateway_url, &cid, ""),
    }))
}
