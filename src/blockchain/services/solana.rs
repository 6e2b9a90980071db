// src/blockchain/services/solana.rs

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{json, Value};

/// One Solana JSON-RPC round-trip.
pub async fn rpc_call(client: &Client, rpc_url: &str, method: &str, params: Value) -> Result<Value> {
    let payload = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let resp = client.post(rpc_url).json(&payload).send().await?;
    let v: Value = resp.json().await?;
    if let Some(err) = v.get("error") {
        return Err(anyhow!("{} error: {}", method, err));
    }
    Ok(v["result"].clone())
}

pub async fn get_block_height(client: &Client, rpc_url: &str) -> Result<u64> {
    let result = rpc_call(client, rpc_url, "getBlockHeight", json!([])).await?;
    result
        .as_u64()
        .ok_or_else(|| anyhow!("getBlockHeight result not a number"))
}

/// "ok" when the node considers itself healthy.
pub async fn get_health(client: &Client, rpc_url: &str) -> Result<bool> {
    let result = rpc_call(client, rpc_url, "getHealth", json!([])).await?;
    Ok(result.as_str() == Some("ok"))
}

/// Balance in lamports for a base58 pubkey.
pub async fn get_balance(client: &Client, rpc_url: &str, pubkey: &str) -> Result<u64> {
    let result = rpc_call(client, rpc_url, "getBalance", json!([pubkey])).await?;
    result["value"]
        .as_u64()
        .ok_or_else(|| anyhow!("getBalance result missing numeric value"))
}
