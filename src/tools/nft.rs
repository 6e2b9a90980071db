//! NFT tool: metadata, ownership and transfers for ERC-721 and ERC-1155.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ethers_core::types::{Address, TransactionRequest, U256};
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::warn;

use crate::blockchain::convert::checksum_eth_address;
use crate::blockchain::models::{ToolError, ToolResult};
use crate::blockchain::services::{eth, ipfs};
use crate::utils::{network_params, opt_bool, opt_str, opt_u64, required_str};
use crate::AppState;

enum NftAction {
    GetMetadata,
    GetOwner,
    Transfer,
    OwnedBy,
}

impl NftAction {
    fn parse(args: &Value) -> Result<Self, ToolError> {
        match opt_str(args, "action").unwrap_or("get_metadata") {
            "get_metadata" => Ok(Self::GetMetadata),
            "get_owner" => Ok(Self::GetOwner),
            "transfer" => Ok(Self::Transfer),
            "owned_by" => Ok(Self::OwnedBy),
            other => Err(ToolError::UnsupportedAction(other.to_string())),
        }
    }
}

pub async fn execute(state: &AppState, args: &Value) -> Value {
    super::finish(run(state, args).await)
}

async fn run(state: &AppState, args: &Value) -> ToolResult {
    let action = NftAction::parse(args)?;
    let (network, environment) = network_params(args);
    if network != "ethereum" {
        return Err(ToolError::chain(format!(
            "NFT operations for {} not implemented",
            network
        )));
    }

    match action {
        NftAction::GetMetadata => get_metadata(state, args, environment).await,
        NftAction::GetOwner => get_owner(state, args, environment).await,
        NftAction::Transfer => transfer(state, args, environment).await,
        NftAction::OwnedBy => owned_by(state, args, environment).await,
    }
}

/// token_id arrives as a decimal string or a JSON number.
fn required_token_id(args: &Value) -> Result<U256, ToolError> {
    let raw = match args.get("token_id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(ToolError::MissingParam("token_id")),
    };
    U256::from_dec_str(&raw)
        .map_err(|e| ToolError::invalid("token_id", format!("'{}': {}", raw, e)))
}

async fn get_metadata(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let contract_address = checksum_eth_address(required_str(args, "contract_address")?)?;
    let token_id = required_token_id(args)?;
    let force_refresh = opt_bool(args, "force_refresh");

    let cache_key = format!("ethereum:{}:{}", contract_address, token_id);
    if !force_refresh {
        if let Some(cached) = state.caches.nft_metadata.get(&cache_key) {
            return Ok(cached.clone());
        }
    }

    let handle = super::connect(state, "ethereum", environment).await?;
    let http = state.connections.http();
    let rpc_url = handle.rpc_url();

    // ERC-721 first; contracts that revert tokenURI get the ERC-1155 probe.
    let mut uri = eth::eth_call(
        http,
        rpc_url,
        &contract_address,
        eth::erc721_token_uri_data(token_id),
    )
    .await
    .ok()
    .and_then(|v| eth::decode_string(&v));
    if uri.is_none() {
        uri = eth::eth_call(
            http,
            rpc_url,
            &contract_address,
            eth::erc1155_uri_data(token_id),
        )
        .await
        .ok()
        .and_then(|v| eth::decode_string(&v));
    }

    let owner = eth::eth_call(
        http,
        rpc_url,
        &contract_address,
        eth::erc721_owner_of_data(token_id),
    )
    .await
    .ok()
    .and_then(|v| eth::decode_address(&v));

    let mut payload = json!({
        "contract_address": contract_address,
        "token_id": token_id.to_string(),
        "token_standard": if owner.is_some() { "ERC721" } else { "ERC1155" },
        "network": "ethereum",
    });
    let map = payload.as_object_mut().expect("payload is an object");
    if let Some(owner) = owner {
        map.insert("owner".to_string(), json!(format!("{:?}", owner)));
    }
    if let Some(token_uri) = uri {
        map.insert("token_uri".to_string(), json!(token_uri));
        if let Some(metadata) =
            fetch_metadata(http, &state.config.ipfs_gateway_url, &token_uri, token_id).await
        {
            map.insert("metadata".to_string(), metadata);
        }
    }

    state
        .caches
        .nft_metadata
        .insert(cache_key, payload.clone());
    Ok(payload)
}

/// Resolve a token URI to metadata JSON, handling the usual URI zoo:
/// ERC-1155 `{id}` substitution, ipfs://, ar:// and base64 data URIs.
async fn fetch_metadata(
    http: &reqwest::Client,
    gateway: &str,
    token_uri: &str,
    token_id: U256,
) -> Option<Value> {
    let mut uri = token_uri.to_string();

    if uri.contains("{id}") {
        // ERC-1155 metadata URIs take the id as zero-padded lowercase hex.
        let hex_id = format!("{:064x}", token_id);
        uri = uri.replace("{id}", &hex_id);
    }

    if let Some(encoded) = uri.strip_prefix("data:application/json;base64,") {
        return match BASE64.decode(encoded) {
            Ok(bytes) => serde_json::from_slice(&bytes).ok(),
            Err(e) => {
                warn!("bad base64 data URI: {}", e);
                None
            }
        };
    }

    if let Some((cid, path)) = uri
        .starts_with("ipfs://")
        .then(|| ipfs::extract_cid(&uri))
        .flatten()
    {
        uri = ipfs::to_gateway_url(gateway, &cid, &path);
    } else if let Some(ar_id) = uri.strip_prefix("ar://") {
        uri = format!("https://arweave.net/{}", ar_id);
    }

    match http.get(&uri).send().await {
        Ok(response) if response.status().is_success() => {
            let text = response.text().await.ok()?;
            serde_json::from_str(&text)
                .ok()
                .or(Some(json!({ "raw_content": text })))
        }
        Ok(response) => {
            warn!("metadata fetch from {} returned HTTP {}", uri, response.status());
            None
        }
        Err(e) => {
            warn!("metadata fetch from {} failed: {}", uri, e);
            None
        }
    }
}

async fn get_owner(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let contract_address = checksum_eth_address(required_str(args, "contract_address")?)?;
    let token_id = required_token_id(args)?;

    let handle = super::connect(state, "ethereum", environment).await?;
    let raw = eth::eth_call(
        state.connections.http(),
        handle.rpc_url(),
        &contract_address,
        eth::erc721_owner_of_data(token_id),
    )
    .await
    .map_err(|e| ToolError::chain(format!("Failed to get NFT owner: {}", e)))?;
    let owner = eth::decode_address(&raw)
        .ok_or_else(|| ToolError::chain("Failed to decode NFT owner"))?;

    Ok(json!({
        "contract_address": contract_address,
        "token_id": token_id.to_string(),
        "owner": format!("{:?}", owner),
        "network": "ethereum",
    }))
}

async fn transfer(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let contract_address = checksum_eth_address(required_str(args, "contract_address")?)?;
    let to_address = checksum_eth_address(required_str(args, "to_address")?)?;
    let from_address = checksum_eth_address(required_str(args, "address")?)?;
    let private_key = required_str(args, "private_key")?;
    let token_id = required_token_id(args)?;
    let token_standard = opt_str(args, "token_standard").unwrap_or("ERC721");

    let from = Address::from_str(&from_address)
        .map_err(|e| ToolError::invalid("address", e.to_string()))?;
    let to = Address::from_str(&to_address)
        .map_err(|e| ToolError::invalid("to_address", e.to_string()))?;
    let contract = Address::from_str(&contract_address)
        .map_err(|e| ToolError::invalid("contract_address", e.to_string()))?;

    let data = match token_standard.to_ascii_uppercase().as_str() {
        "ERC721" => eth::erc721_transfer_from_data(from, to, token_id),
        "ERC1155" => {
            let amount = U256::from(opt_u64(args, "amount").unwrap_or(1));
            eth::erc1155_safe_transfer_from_data(from, to, token_id, amount)
        }
        other => {
            return Err(ToolError::invalid(
                "token_standard",
                format!("unsupported token standard: {}", other),
            ))
        }
    };

    let handle = super::connect(state, "ethereum", environment).await?;
    let mut tx = TransactionRequest::new().to(contract).data(data);
    if let Some(gas) = opt_u64(args, "gas") {
        tx = tx.gas(gas);
    }
    if let Some(gas_price) = opt_u64(args, "gas_price") {
        tx = tx.gas_price(gas_price);
    }

    let tx_hash = eth::send_transaction(
        state.connections.http(),
        handle.rpc_url(),
        private_key,
        tx,
    )
    .await
    .map_err(|e| ToolError::chain(format!("NFT transfer failed: {}", e)))?;

    Ok(json!({
        "transaction_hash": tx_hash,
        "status": "pending",
        "from": from_address,
        "to": to_address,
        "contract_address": contract_address,
        "token_id": token_id.to_string(),
        "token_standard": token_standard.to_ascii_uppercase(),
        "network": "ethereum",
    }))
}

async fn owned_by(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let address = checksum_eth_address(required_str(args, "address")?)?;
    let contract_address = checksum_eth_address(required_str(args, "contract_address")?)?;

    let handle = super::connect(state, "ethereum", environment).await?;
    let owner = Address::from_str(&address)
        .map_err(|e| ToolError::invalid("address", e.to_string()))?;
    let raw = eth::eth_call(
        state.connections.http(),
        handle.rpc_url(),
        &contract_address,
        eth::erc20_balance_of_data(owner),
    )
    .await
    .map_err(|e| ToolError::chain(format!("Failed to get owned tokens: {}", e)))?;
    let balance = eth::decode_u256(&raw)
        .ok_or_else(|| ToolError::chain("Failed to decode token balance"))?;

    Ok(json!({
        "address": address,
        "contract_address": contract_address,
        "token_balance": balance.to_string(),
        "network": "ethereum",
        "note": "Token enumeration is not supported directly through the contract. Use an indexer service for a complete token list.",
    }))
}
