//! ENS registry and resolver calls, built on the raw eth_call codec.
//!
//! Resolution is the two-step registry walk: `resolver(node)` on the
//! registry, then `addr(node)` / `name(node)` / `text(node, key)` /
//! `contenthash(node)` on the returned resolver.

use anyhow::Result;
use ethers_core::abi::Token;
use ethers_core::types::Address;
use ethers_core::utils::keccak256;
use reqwest::Client;
use serde_json::Value;

use super::eth::{decode_address, decode_string, encode_call, eth_call, hex_to_bytes};

/// The ENS registry, same address on mainnet since 2019.
pub const ENS_REGISTRY: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

/// EIP-137 namehash.
pub fn namehash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let label_hash = keccak256(label.as_bytes());
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(&node);
        buf[32..].copy_from_slice(&label_hash);
        node = keccak256(buf);
    }
    node
}

/// Node of the reverse record `<addr-hex>.addr.reverse`.
pub fn reverse_node(address: Address) -> [u8; 32] {
    namehash(&format!("{}.addr.reverse", hex::encode(address.as_bytes())))
}

/// Loose shape check before hitting the registry: at least one dot-separated
/// label and an alphabetic TLD.
pub fn is_ens_name(name: &str) -> bool {
    let labels: Vec<&str> = name.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|l| !l.is_empty())
        && labels
            .last()
            .map(|tld| tld.chars().all(|c| c.is_ascii_alphabetic()))
            .unwrap_or(false)
}

async fn call_node(
    client: &Client,
    rpc_url: &str,
    contract: &str,
    sig: &str,
    node: [u8; 32],
) -> Result<Value> {
    let data = encode_call(sig, vec![Token::FixedBytes(node.to_vec())]);
    eth_call(client, rpc_url, contract, data).await
}

/// Resolver contract registered for a node, if any.
pub async fn resolver(client: &Client, rpc_url: &str, node: [u8; 32]) -> Result<Option<Address>> {
    let raw = call_node(client, rpc_url, ENS_REGISTRY, "resolver(bytes32)", node).await?;
    Ok(decode_address(&raw).filter(|a| !a.is_zero()))
}

/// Forward-resolve a name to an address. None when unregistered or unset.
pub async fn resolve_name(client: &Client, rpc_url: &str, name: &str) -> Result<Option<Address>> {
    let node = namehash(name);
    let Some(resolver_addr) = resolver(client, rpc_url, node).await? else {
        return Ok(None);
    };
    let raw = call_node(
        client,
        rpc_url,
        &format!("{:?}", resolver_addr),
        "addr(bytes32)",
        node,
    )
    .await?;
    Ok(decode_address(&raw).filter(|a| !a.is_zero()))
}

/// Reverse-resolve an address via its `addr.reverse` record.
pub async fn lookup_address(
    client: &Client,
    rpc_url: &str,
    address: Address,
) -> Result<Option<String>> {
    let node = reverse_node(address);
    let Some(resolver_addr) = resolver(client, rpc_url, node).await? else {
        return Ok(None);
    };
    let raw = call_node(
        client,
        rpc_url,
        &format!("{:?}", resolver_addr),
        "name(bytes32)",
        node,
    )
    .await?;
    Ok(decode_string(&raw).filter(|s| !s.is_empty()))
}

/// EIP-634 text record, e.g. key "url" or "com.twitter".
pub async fn text_record(
    client: &Client,
    rpc_url: &str,
    name: &str,
    key: &str,
) -> Result<Option<String>> {
    let node = namehash(name);
    let Some(resolver_addr) = resolver(client, rpc_url, node).await? else {
        return Ok(None);
    };
    let data = encode_call(
        "text(bytes32,string)",
        vec![
            Token::FixedBytes(node.to_vec()),
            Token::String(key.to_string()),
        ],
    );
    let raw = eth_call(client, rpc_url, &format!("{:?}", resolver_addr), data).await?;
    Ok(decode_string(&raw).filter(|s| !s.is_empty()))
}

/// EIP-1577 contenthash, returned as 0x-prefixed hex of the raw bytes.
pub async fn content_hash(client: &Client, rpc_url: &str, name: &str) -> Result<Option<String>> {
    let node = namehash(name);
    let Some(resolver_addr) = resolver(client, rpc_url, node).await? else {
        return Ok(None);
    };
    let raw = call_node(
        client,
        rpc_url,
        &format!("{:?}", resolver_addr),
        "contenthash(bytes32)",
        node,
    )
    .await?;
    let bytes = hex_to_bytes(&raw)?;
    // ABI layout: offset word, length word, payload
    if bytes.len() < 64 {
        return Ok(None);
    }
    let len = ethers_core::types::U256::from_big_endian(&bytes[32..64]).as_usize();
    if len == 0 || bytes.len() < 64 + len {
        return Ok(None);
    }
    Ok(Some(format!("0x{}", hex::encode(&bytes[64..64 + len]))))
}
