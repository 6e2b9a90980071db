// src/blockchain/services/eth.rs

use anyhow::{anyhow, Context, Result};
use ethers_core::abi::{decode, encode, ParamType, Token};
use ethers_core::types::{Address, Bytes, TransactionRequest, U256, U64};
use ethers_core::utils::keccak256;
use ethers_signers::{LocalWallet, Signer};
use reqwest::Client;
use serde_json::{json, Value};
use std::str::FromStr;

pub fn selector(sig: &str) -> [u8; 4] {
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&keccak256(sig.as_bytes())[0..4]);
    sel
}

pub fn encode_call(sig: &str, tokens: Vec<Token>) -> Bytes {
    let mut out = selector(sig).to_vec();
    let mut tail = encode(&tokens);
    out.append(&mut tail);
    Bytes::from(out)
}

pub fn hex_to_bytes(v: &Value) -> Result<Vec<u8>> {
    let s = v.as_str().ok_or_else(|| anyhow!("RPC result not a string"))?;
    let s = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(s)?)
}

pub fn decode_string(v: &Value) -> Option<String> {
    // Try standard ABI string
    if let Ok(bytes) = hex_to_bytes(v) {
        if let Ok(tokens) = decode(&[ParamType::String], &bytes) {
            if let Some(Token::String(s)) = tokens.first() {
                return Some(s.clone());
            }
        }
        // Fallback: bytes32 to string (strip zeros)
        if let Ok(tokens) = decode(&[ParamType::FixedBytes(32)], &bytes) {
            if let Some(Token::FixedBytes(b)) = tokens.first() {
                let s = String::from_utf8(
                    b.clone().into_iter().take_while(|c| *c != 0u8).collect(),
                )
                .ok();
                if s.is_some() {
                    return s;
                }
            }
        }
    }
    None
}

pub fn decode_u256(v: &Value) -> Option<U256> {
    if let Ok(bytes) = hex_to_bytes(v) {
        if let Ok(tokens) = decode(&[ParamType::Uint(256)], &bytes) {
            if let Some(Token::Uint(n)) = tokens.first() {
                return Some(*n);
            }
        }
    }
    None
}

pub fn decode_address(v: &Value) -> Option<Address> {
    if let Ok(bytes) = hex_to_bytes(v) {
        if let Ok(tokens) = decode(&[ParamType::Address], &bytes) {
            if let Some(Token::Address(a)) = tokens.first() {
                return Some(*a);
            }
        }
    }
    None
}

/// One JSON-RPC round-trip. Returns the `result` field or the node's error.
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

pub async fn eth_call(client: &Client, rpc_url: &str, to: &str, data: Bytes) -> Result<Value> {
    rpc_call(
        client,
        rpc_url,
        "eth_call",
        json!([{"to": to, "data": format!("0x{}", hex::encode(data))}, "latest"]),
    )
    .await
}

pub async fn get_balance(client: &Client, rpc_url: &str, address: &str) -> Result<U256> {
    let result = rpc_call(client, rpc_url, "eth_getBalance", json!([address, "latest"])).await?;
    let hex_balance = result
        .as_str()
        .ok_or_else(|| anyhow!("eth_getBalance result not a string"))?;
    Ok(U256::from_str_radix(hex_balance.trim_start_matches("0x"), 16)?)
}

pub async fn get_transaction_count(client: &Client, rpc_url: &str, address: &str) -> Result<U256> {
    let result = rpc_call(
        client,
        rpc_url,
        "eth_getTransactionCount",
        json!([address, "latest"]),
    )
    .await?;
    let nonce_hex = result
        .as_str()
        .context("eth_getTransactionCount result not a string")?;
    Ok(U256::from_str_radix(nonce_hex.trim_start_matches("0x"), 16)?)
}

pub async fn gas_price(client: &Client, rpc_url: &str) -> Result<U256> {
    let result = rpc_call(client, rpc_url, "eth_gasPrice", json!([])).await?;
    let gp_hex = result.as_str().context("eth_gasPrice result not a string")?;
    Ok(U256::from_str_radix(gp_hex.trim_start_matches("0x"), 16)?)
}

pub async fn is_contract(client: &Client, rpc_url: &str, address: &str) -> Result<bool> {
    let result = rpc_call(client, rpc_url, "eth_getCode", json!([address, "latest"])).await?;
    let code = result.as_str().unwrap_or("0x");
    Ok(code != "0x" && code != "0x0")
}

// --- ERC-20 / ERC-721 / ERC-1155 calldata builders ---

pub fn erc20_balance_of_data(owner: Address) -> Bytes {
    encode_call("balanceOf(address)", vec![Token::Address(owner)])
}

pub fn erc20_transfer_data(to: Address, amount: U256) -> Bytes {
    encode_call(
        "transfer(address,uint256)",
        vec![Token::Address(to), Token::Uint(amount)],
    )
}

pub fn erc20_approve_data(spender: Address, amount: U256) -> Bytes {
    encode_call(
        "approve(address,uint256)",
        vec![Token::Address(spender), Token::Uint(amount)],
    )
}

pub fn erc20_allowance_data(owner: Address, spender: Address) -> Bytes {
    encode_call(
        "allowance(address,address)",
        vec![Token::Address(owner), Token::Address(spender)],
    )
}

pub fn erc721_token_uri_data(token_id: U256) -> Bytes {
    encode_call("tokenURI(uint256)", vec![Token::Uint(token_id)])
}

pub fn erc721_owner_of_data(token_id: U256) -> Bytes {
    encode_call("ownerOf(uint256)", vec![Token::Uint(token_id)])
}

pub fn erc721_transfer_from_data(from: Address, to: Address, token_id: U256) -> Bytes {
    encode_call(
        "transferFrom(address,address,uint256)",
        vec![Token::Address(from), Token::Address(to), Token::Uint(token_id)],
    )
}

pub fn erc1155_uri_data(token_id: U256) -> Bytes {
    encode_call("uri(uint256)", vec![Token::Uint(token_id)])
}

pub fn erc1155_safe_transfer_from_data(
    from: Address,
    to: Address,
    token_id: U256,
    amount: U256,
) -> Bytes {
    encode_call(
        "safeTransferFrom(address,address,uint256,uint256,bytes)",
        vec![
            Token::Address(from),
            Token::Address(to),
            Token::Uint(token_id),
            Token::Uint(amount),
            Token::Bytes(Vec::new()),
        ],
    )
}

// --- Transaction pipeline ---

/// Fill in chain id, nonce and gas defaults, sign locally and submit.
/// Returns the transaction hash; does not wait for confirmation.
pub async fn send_transaction(
    client: &Client,
    rpc_url: &str,
    private_key: &str,
    mut tx: TransactionRequest,
) -> Result<String> {
    let wallet = LocalWallet::from_str(private_key.trim_start_matches("0x"))
        .map_err(|e| anyhow!("Invalid private key: {}", e))?;
    let from_address = wallet.address();

    let chain_id_result = rpc_call(client, rpc_url, "eth_chainId", json!([])).await?;
    let chain_id_hex = chain_id_result
        .as_str()
        .context("Failed to get chain id from RPC")?;
    let chain_id = U64::from_str_radix(chain_id_hex.trim_start_matches("0x"), 16)?;

    if tx.nonce.is_none() {
        let nonce = get_transaction_count(client, rpc_url, &format!("{:?}", from_address)).await?;
        tx = tx.nonce(nonce);
    }

    tx = tx.from(from_address).chain_id(chain_id.as_u64());

    // If gas is not provided, estimate it via eth_estimateGas
    if tx.gas.is_none() {
        let call_obj = serde_json::to_value(&tx)?;
        let result = rpc_call(client, rpc_url, "eth_estimateGas", json!([call_obj])).await?;
        let gas_hex = result.as_str().context("Failed to get gas estimate")?;
        let gas = U256::from_str_radix(gas_hex.trim_start_matches("0x"), 16)?;
        tx = tx.gas(gas);
    }

    // If gas price not provided, fetch eth_gasPrice and use legacy pricing
    if tx.gas_price.is_none() {
        let gp = gas_price(client, rpc_url).await?;
        tx = tx.gas_price(gp);
    }

    // Sign the transaction locally
    let signature = wallet
        .sign_transaction(&tx.clone().into())
        .await
        .map_err(|e| anyhow!("Signing failed: {}", e))?;
    let raw_tx = tx.rlp_signed(&signature);

    // Submit the raw transaction
    let result = rpc_call(
        client,
        rpc_url,
        "eth_sendRawTransaction",
        json!([format!("0x{}", hex::encode(raw_tx))]),
    )
    .await?;

    let tx_hash = result
        .as_str()
        .ok_or_else(|| anyhow!("Failed to extract transaction hash from response"))?;
    Ok(tx_hash.to_string())
}

/// Address derived from a private key, for sender validation.
pub fn wallet_address(private_key: &str) -> Result<Address> {
    let wallet = LocalWallet::from_str(private_key.trim_start_matches("0x"))
        .map_err(|e| anyhow!("Invalid private key: {}", e))?;
    Ok(wallet.address())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_known_erc20_signatures() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector("decimals()")), "313ce567");
    }

    #[test]
    fn balance_of_calldata_embeds_owner() {
        let owner = Address::from_str("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045").unwrap();
        let data = erc20_balance_of_data(owner);
        let encoded = hex::encode(&data);
        assert!(encoded.starts_with("70a08231"));
        assert!(encoded.ends_with("d8da6bf26964af9d7eed9e03e53415d37aa96045"));
        assert_eq!(data.len(), 4 + 32);
    }

    #[test]
    fn decode_u256_reads_padded_word() {
        let v = Value::String(format!("0x{:064x}", 1_500_000u64));
        assert_eq!(decode_u256(&v), Some(U256::from(1_500_000u64)));
    }

    #[test]
    fn decode_string_handles_bytes32_symbols() {
        // "MKR" as a right-padded bytes32, the pre-standard symbol() shape.
        let mut word = [0u8; 32];
        word[..3].copy_from_slice(b"MKR");
        let v = Value::String(format!("0x{}", hex::encode(word)));
        assert_eq!(decode_string(&v), Some("MKR".to_string()));
    }
}
