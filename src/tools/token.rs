//! Token tool: native and ERC-20 balances, metadata, transfers, approvals.

use ethers_core::types::{Address, TransactionRequest, U256};
use serde_json::{json, Value};
use std::str::FromStr;

use crate::blockchain::convert::{
    checksum_eth_address, from_base_units, is_sol_address, lamports_to_sol, to_base_units, to_f64,
    wei_to_eth, ETH_DECIMALS,
};
use crate::blockchain::models::{TokenMetadata, ToolError, ToolResult};
use crate::blockchain::services::{eth, solana};
use crate::utils::{network_params, opt_bool, opt_u64, required_str};
use crate::AppState;

enum TokenAction {
    NativeBalance,
    TokenBalance,
    TokenInfo,
    Transfer,
    Approve,
    Allowance,
}

impl TokenAction {
    fn parse(args: &Value) -> Result<Self, ToolError> {
        match crate::utils::opt_str(args, "action").unwrap_or("native_balance") {
            "native_balance" => Ok(Self::NativeBalance),
            "token_balance" => Ok(Self::TokenBalance),
            "token_info" => Ok(Self::TokenInfo),
            "transfer" => Ok(Self::Transfer),
            "approve" => Ok(Self::Approve),
            "allowance" => Ok(Self::Allowance),
            other => Err(ToolError::UnsupportedAction(other.to_string())),
        }
    }
}

pub async fn execute(state: &AppState, args: &Value) -> Value {
    super::finish(run(state, args).await)
}

async fn run(state: &AppState, args: &Value) -> ToolResult {
    let action = TokenAction::parse(args)?;
    let (network, environment) = network_params(args);

    match network {
        "ethereum" => match action {
            TokenAction::NativeBalance => eth_native_balance(state, args, environment).await,
            TokenAction::TokenBalance => eth_token_balance(state, args, environment).await,
            TokenAction::TokenInfo => eth_token_info(state, args, environment).await,
            TokenAction::Transfer => eth_transfer(state, args, environment).await,
            TokenAction::Approve => eth_approve(state, args, environment).await,
            TokenAction::Allowance => eth_allowance(state, args, environment).await,
        },
        "solana" => match action {
            TokenAction::NativeBalance => sol_native_balance(state, args, environment).await,
            _ => Err(ToolError::chain(
                "Only native_balance is implemented for Solana",
            )),
        },
        other => Err(ToolError::UnsupportedNetwork(other.to_string())),
    }
}

/// ERC-20 metadata, memoized per network+contract until force_refresh.
/// Missing fields fall back like the exchanges do: "???", "Unknown Token", 18.
pub(crate) async fn token_metadata(
    state: &AppState,
    rpc_url: &str,
    network: &str,
    token_address: &str,
    force_refresh: bool,
) -> Result<TokenMetadata, ToolError> {
    let key = format!("{}:{}", network, token_address);
    if !force_refresh {
        if let Some(cached) = state.caches.tokens.get(&key) {
            return Ok(cached.clone());
        }
    }

    let http = state.connections.http();
    let symbol_raw = eth::eth_call(
        http,
        rpc_url,
        token_address,
        eth::encode_call("symbol()", vec![]),
    )
    .await
    .unwrap_or(Value::Null);
    let name_raw = eth::eth_call(
        http,
        rpc_url,
        token_address,
        eth::encode_call("name()", vec![]),
    )
    .await
    .unwrap_or(Value::Null);
    let decimals_raw = eth::eth_call(
        http,
        rpc_url,
        token_address,
        eth::encode_call("decimals()", vec![]),
    )
    .await
    .unwrap_or(Value::Null);

    let metadata = TokenMetadata {
        address: token_address.to_string(),
        symbol: eth::decode_string(&symbol_raw).unwrap_or_else(|| "???".to_string()),
        name: eth::decode_string(&name_raw).unwrap_or_else(|| "Unknown Token".to_string()),
        decimals: eth::decode_u256(&decimals_raw)
            .map(|n| n.as_u32())
            .unwrap_or(ETH_DECIMALS),
    };
    state.caches.tokens.insert(key, metadata.clone());
    Ok(metadata)
}

async fn eth_native_balance(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let address = checksum_eth_address(required_str(args, "address")?)?;

    let handle = super::connect(state, "ethereum", environment).await?;
    let wei = eth::get_balance(state.connections.http(), handle.rpc_url(), &address)
        .await
        .map_err(|e| ToolError::chain(format!("Failed to get ETH balance: {}", e)))?;

    let balance = wei_to_eth(wei);
    Ok(json!({
        "address": address,
        "balance": to_f64(&balance),
        "balance_wei": wei.to_string(),
        "symbol": "ETH",
        "network": "ethereum",
    }))
}

async fn eth_token_balance(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let address = checksum_eth_address(required_str(args, "address")?)?;
    let token_address = checksum_eth_address(required_str(args, "token_address")?)?;

    let handle = super::connect(state, "ethereum", environment).await?;
    let info = token_metadata(
        state,
        handle.rpc_url(),
        "ethereum",
        &token_address,
        opt_bool(args, "force_refresh"),
    )
    .await?;

    let owner = Address::from_str(&address).map_err(|e| ToolError::invalid("address", e.to_string()))?;
    let raw_value = eth::eth_call(
        state.connections.http(),
        handle.rpc_url(),
        &token_address,
        eth::erc20_balance_of_data(owner),
    )
    .await
    .map_err(|e| ToolError::chain(format!("Failed to get token balance: {}", e)))?;
    let raw = eth::decode_u256(&raw_value)
        .ok_or_else(|| ToolError::chain("Failed to decode token balance"))?;

    let balance = from_base_units(raw, info.decimals);
    Ok(json!({
        "address": address,
        "token_address": token_address,
        "token_name": info.name,
        "token_symbol": info.symbol,
        "balance": to_f64(&balance),
        "balance_raw": raw.to_string(),
        "decimals": info.decimals,
        "network": "ethereum",
    }))
}

async fn eth_token_info(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let token_address = checksum_eth_address(required_str(args, "token_address")?)?;

    let handle = super::connect(state, "ethereum", environment).await?;
    let info = token_metadata(
        state,
        handle.rpc_url(),
        "ethereum",
        &token_address,
        opt_bool(args, "force_refresh"),
    )
    .await?;

    let mut payload = json!({
        "address": info.address,
        "symbol": info.symbol,
        "name": info.name,
        "decimals": info.decimals,
        "network": "ethereum",
    });

    // Total supply is optional; tokens without it still report metadata.
    let supply_raw = eth::eth_call(
        state.connections.http(),
        handle.rpc_url(),
        &token_address,
        eth::encode_call("totalSupply()", vec![]),
    )
    .await
    .ok()
    .and_then(|v| eth::decode_u256(&v));
    if let Some(raw) = supply_raw {
        let map = payload.as_object_mut().expect("payload is an object");
        map.insert(
            "total_supply".to_string(),
            json!(to_f64(&from_base_units(raw, info.decimals))),
        );
        map.insert("total_supply_raw".to_string(), json!(raw.to_string()));
    }

    Ok(payload)
}

/// Shared write-path plumbing: sender check plus gas overrides from args.
fn write_tx_params(args: &Value) -> Result<(String, Address), ToolError> {
    let private_key = required_str(args, "private_key")?.to_string();
    let from = checksum_eth_address(required_str(args, "address")?)?;
    let derived = eth::wallet_address(&private_key)
        .map_err(|e| ToolError::invalid("private_key", e.to_string()))?;
    let declared =
        Address::from_str(&from).map_err(|e| ToolError::invalid("address", e.to_string()))?;
    if derived != declared {
        return Err(ToolError::invalid(
            "address",
            "does not match the address derived from private_key",
        ));
    }
    Ok((private_key, declared))
}

fn apply_gas_overrides(mut tx: TransactionRequest, args: &Value) -> TransactionRequest {
    if let Some(gas) = opt_u64(args, "gas") {
        tx = tx.gas(gas);
    }
    if let Some(gas_price) = opt_u64(args, "gas_price") {
        tx = tx.gas_price(gas_price);
    }
    tx
}

async fn eth_transfer(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let to_address = checksum_eth_address(required_str(args, "to_address")?)?;
    let amount = required_str(args, "amount")?;
    let (private_key, from) = write_tx_params(args)?;
    let to = Address::from_str(&to_address)
        .map_err(|e| ToolError::invalid("to_address", e.to_string()))?;

    let handle = super::connect(state, "ethereum", environment).await?;
    let http = state.connections.http();

    if let Some(token_address) = crate::utils::opt_str(args, "token_address") {
        // ERC-20 transfer
        let token_address = checksum_eth_address(token_address)?;
        let info =
            token_metadata(state, handle.rpc_url(), "ethereum", &token_address, false).await?;
        let amount_units = to_base_units(amount, info.decimals)?;

        let contract = Address::from_str(&token_address)
            .map_err(|e| ToolError::invalid("token_address", e.to_string()))?;
        let tx = TransactionRequest::new()
            .to(contract)
            .data(eth::erc20_transfer_data(to, amount_units));
        let tx = apply_gas_overrides(tx, args);

        let tx_hash = eth::send_transaction(http, handle.rpc_url(), &private_key, tx)
            .await
            .map_err(|e| ToolError::chain(format!("Transfer failed: {}", e)))?;

        Ok(json!({
            "transaction_hash": tx_hash,
            "status": "pending",
            "from": format!("{:?}", from),
            "to": to_address,
            "amount": amount,
            "amount_raw": amount_units.to_string(),
            "token_address": token_address,
            "symbol": info.symbol,
            "network": "ethereum",
        }))
    } else {
        // Native ETH transfer
        let amount_wei = to_base_units(amount, ETH_DECIMALS)?;
        let tx = TransactionRequest::new()
            .to(to)
            .value(amount_wei)
            // Plain value transfers always cost 21000 gas.
            .gas(21000u64);
        let tx = apply_gas_overrides(tx, args);

        let tx_hash = eth::send_transaction(http, handle.rpc_url(), &private_key, tx)
            .await
            .map_err(|e| ToolError::chain(format!("Transfer failed: {}", e)))?;

        Ok(json!({
            "transaction_hash": tx_hash,
            "status": "pending",
            "from": format!("{:?}", from),
            "to": to_address,
            "amount": amount,
            "amount_wei": amount_wei.to_string(),
            "symbol": "ETH",
            "network": "ethereum",
        }))
    }
}

async fn eth_approve(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let spender_address = checksum_eth_address(required_str(args, "spender_address")?)?;
    let token_address = checksum_eth_address(required_str(args, "token_address")?)?;
    let amount = required_str(args, "amount")?;
    let (private_key, from) = write_tx_params(args)?;

    let handle = super::connect(state, "ethereum", environment).await?;
    let info = token_metadata(state, handle.rpc_url(), "ethereum", &token_address, false).await?;

    let unlimited = amount.eq_ignore_ascii_case("unlimited") || amount.eq_ignore_ascii_case("infinite");
    let amount_units = if unlimited {
        U256::MAX
    } else {
        to_base_units(amount, info.decimals)?
    };

    let spender = Address::from_str(&spender_address)
        .map_err(|e| ToolError::invalid("spender_address", e.to_string()))?;
    let contract = Address::from_str(&token_address)
        .map_err(|e| ToolError::invalid("token_address", e.to_string()))?;
    let tx = TransactionRequest::new()
        .to(contract)
        .data(eth::erc20_approve_data(spender, amount_units));
    let tx = apply_gas_overrides(tx, args);

    let tx_hash = eth::send_transaction(
        state.connections.http(),
        handle.rpc_url(),
        &private_key,
        tx,
    )
    .await
    .map_err(|e| ToolError::chain(format!("Approval failed: {}", e)))?;

    Ok(json!({
        "transaction_hash": tx_hash,
        "status": "pending",
        "from": format!("{:?}", from),
        "spender": spender_address,
        "token_address": token_address,
        "symbol": info.symbol,
        "amount": if unlimited { json!("unlimited") } else { json!(amount) },
        "amount_raw": amount_units.to_string(),
        "network": "ethereum",
    }))
}

async fn eth_allowance(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let owner_address = checksum_eth_address(required_str(args, "address")?)?;
    let spender_address = checksum_eth_address(required_str(args, "spender_address")?)?;
    let token_address = checksum_eth_address(required_str(args, "token_address")?)?;

    let handle = super::connect(state, "ethereum", environment).await?;
    let info = token_metadata(state, handle.rpc_url(), "ethereum", &token_address, false).await?;

    let owner = Address::from_str(&owner_address)
        .map_err(|e| ToolError::invalid("address", e.to_string()))?;
    let spender = Address::from_str(&spender_address)
        .map_err(|e| ToolError::invalid("spender_address", e.to_string()))?;
    let raw_value = eth::eth_call(
        state.connections.http(),
        handle.rpc_url(),
        &token_address,
        eth::erc20_allowance_data(owner, spender),
    )
    .await
    .map_err(|e| ToolError::chain(format!("Failed to check allowance: {}", e)))?;
    let raw = eth::decode_u256(&raw_value)
        .ok_or_else(|| ToolError::chain("Failed to decode allowance"))?;

    // Anything near max uint256 is an "unlimited" approval in practice.
    let is_unlimited = raw > U256::from(2u8).pow(U256::from(250u32));
    let allowance = from_base_units(raw, info.decimals);
    Ok(json!({
        "owner": owner_address,
        "spender": spender_address,
        "token_address": token_address,
        "token_symbol": info.symbol,
        "allowance": if is_unlimited { json!("Unlimited") } else { json!(to_f64(&allowance)) },
        "allowance_raw": raw.to_string(),
        "unlimited": is_unlimited,
        "network": "ethereum",
    }))
}

async fn sol_native_balance(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let address = required_str(args, "address")?;
    if !is_sol_address(address) {
        return Err(ToolError::invalid(
            "address",
            format!("'{}' is not a valid Solana address", address),
        ));
    }

    let handle = super::connect(state, "solana", environment).await?;
    let lamports = solana::get_balance(state.connections.http(), handle.rpc_url(), address)
        .await
        .map_err(|e| ToolError::chain(format!("Failed to get SOL balance: {}", e)))?;

    let balance = lamports_to_sol(lamports);
    Ok(json!({
        "address": address,
        "balance": to_f64(&balance),
        "balance_lamports": lamports,
        "symbol": "SOL",
        "network": "solana",
    }))
}
