//! ENS tool. Mainnet Ethereum only; resolutions and reverse lookups are
//! cached until force_refresh.

use ethers_core::types::Address;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::blockchain::convert::checksum_eth_address;
use crate::blockchain::models::{ToolError, ToolResult};
use crate::blockchain::services::ens;
use crate::blockchain::to_checksum;
use crate::utils::{network_params, opt_bool, opt_str, required_str};
use crate::AppState;

enum EnsAction {
    Resolve,
    Lookup,
    GetTextRecord,
    GetContentHash,
}

impl EnsAction {
    fn parse(args: &Value) -> Result<Self, ToolError> {
        match opt_str(args, "action").unwrap_or("resolve") {
            "resolve" => Ok(Self::Resolve),
            "lookup" => Ok(Self::Lookup),
            "get_text_record" => Ok(Self::GetTextRecord),
            "get_content_hash" => Ok(Self::GetContentHash),
            other => Err(ToolError::UnsupportedAction(other.to_string())),
        }
    }
}

pub async fn execute(state: &AppState, args: &Value) -> Value {
    super::finish(run(state, args).await)
}

async fn run(state: &AppState, args: &Value) -> ToolResult {
    let action = EnsAction::parse(args)?;
    let (network, environment) = network_params(args);
    if network != "ethereum" || environment != "mainnet" {
        return Err(ToolError::invalid(
            "network",
            "ENS operations are only supported on Ethereum mainnet",
        ));
    }

    match action {
        EnsAction::Resolve => resolve(state, args).await,
        EnsAction::Lookup => lookup(state, args).await,
        EnsAction::GetTextRecord => text_record(state, args).await,
        EnsAction::GetContentHash => content_hash(state, args).await,
    }
}

fn required_name(args: &Value) -> Result<String, ToolError> {
    let name = required_str(args, "name")?.to_lowercase();
    if !ens::is_ens_name(&name) {
        return Err(ToolError::invalid(
            "name",
            format!("'{}' is not a valid ENS name", name),
        ));
    }
    Ok(name)
}

async fn resolve(state: &AppState, args: &Value) -> ToolResult {
    let name = required_name(args)?;

    let cache_key = format!("resolve:{}", name);
    if !opt_bool(args, "force_refresh") {
        if let Some(cached) = state.caches.ens.get(&cache_key) {
            return Ok(cached.clone());
        }
    }

    let handle = super::connect(state, "ethereum", "mainnet").await?;
    let resolved = ens::resolve_name(state.connections.http(), handle.rpc_url(), &name)
        .await
        .map_err(|e| ToolError::chain(format!("ENS resolution failed: {}", e)))?;

    let Some(address) = resolved else {
        return Err(ToolError::chain(format!(
            "Could not resolve ENS name: {}",
            name
        )));
    };

    let result = json!({
        "name": name,
        "address": to_checksum(&address, None),
        "network": "ethereum",
    });
    state.caches.ens.insert(cache_key, result.clone());
    Ok(result)
}

async fn lookup(state: &AppState, args: &Value) -> ToolResult {
    let address = checksum_eth_address(required_str(args, "address")?)?;

    let cache_key = format!("lookup:{}", address);
    if !opt_bool(args, "force_refresh") {
        if let Some(cached) = state.caches.ens.get(&cache_key) {
            return Ok(cached.clone());
        }
    }

    let handle = super::connect(state, "ethereum", "mainnet").await?;
    let parsed =
        Address::from_str(&address).map_err(|e| ToolError::invalid("address", e.to_string()))?;
    let name = ens::lookup_address(state.connections.http(), handle.rpc_url(), parsed)
        .await
        .map_err(|e| ToolError::chain(format!("ENS lookup failed: {}", e)))?;

    let Some(name) = name else {
        return Err(ToolError::chain(format!(
            "No ENS name found for address: {}",
            address
        )));
    };

    let result = json!({
        "address": address,
        "name": name,
        "network": "ethereum",
    });
    state.caches.ens.insert(cache_key, result.clone());
    Ok(result)
}

async fn text_record(state: &AppState, args: &Value) -> ToolResult {
    let name = required_name(args)?;
    let key = required_str(args, "key")?;

    let handle = super::connect(state, "ethereum", "mainnet").await?;
    let value = ens::text_record(state.connections.http(), handle.rpc_url(), &name, key)
        .await
        .map_err(|e| ToolError::chain(format!("Failed to get text record: {}", e)))?;

    let Some(value) = value else {
        return Err(ToolError::chain(format!(
            "No text record found for {} on {}",
            key, name
        )));
    };

    Ok(json!({
        "name": name,
        "key": key,
        "value": value,
        "network": "ethereum",
    }))
}

async fn content_hash(state: &AppState, args: &Value) -> ToolResult {
    let name = required_name(args)?;

    let handle = super::connect(state, "ethereum", "mainnet").await?;
    let hash = ens::content_hash(state.connections.http(), handle.rpc_url(), &name)
        .await
        .map_err(|e| ToolError::chain(format!("Failed to get content hash: {}", e)))?;

    let Some(hash) = hash else {
        return Err(ToolError::chain(format!(
            "No content hash set for {}",
            name
        )));
    };

    Ok(json!({
        "name": name,
        "content_hash": hash,
        "network": "ethereum",
    }))
}
