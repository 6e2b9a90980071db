//! DeFi tool (Uniswap V2 family).
//!
//! Quote and reserve figures here are INDICATIVE ONLY: pair reserves are not
//! queried and no constant-product math runs. Every payload containing such
//! a figure carries `"approximate": true` and a note saying so. The swap
//! action builds and submits a real router transaction, using the indicative
//! quote solely to derive the slippage-bounded minimum output.

use ethers_core::types::{Address, TransactionRequest, U256};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::blockchain::convert::{to_base_units, ETH_DECIMALS};
use crate::blockchain::models::{ToolError, ToolResult};
use crate::blockchain::services::eth;
use crate::utils::{network_params, opt_f64, opt_str, opt_u64, required_str};
use crate::AppState;

const UNISWAP_V2_ROUTER: &str = "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D";
const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

const QUOTE_NOTE: &str =
    "indicative quote only; constant-product pool math is not evaluated";

enum DefiAction {
    Swap,
    GetSwapQuote,
    AddLiquidity,
    GetReserves,
    Supply,
    Borrow,
    GetUserData,
}

impl DefiAction {
    fn parse(args: &Value) -> Result<Self, ToolError> {
        match required_str(args, "action")? {
            "swap" => Ok(Self::Swap),
            "get_swap_quote" => Ok(Self::GetSwapQuote),
            "add_liquidity" => Ok(Self::AddLiquidity),
            "get_reserves" => Ok(Self::GetReserves),
            "supply" => Ok(Self::Supply),
            "borrow" => Ok(Self::Borrow),
            "get_user_data" => Ok(Self::GetUserData),
            other => Err(ToolError::UnsupportedAction(other.to_string())),
        }
    }
}

pub async fn execute(state: &AppState, args: &Value) -> Value {
    super::finish(run(state, args).await)
}

async fn run(state: &AppState, args: &Value) -> ToolResult {
    let action = DefiAction::parse(args)?;
    let (network, environment) = network_params(args);
    if network != "ethereum" {
        return Err(ToolError::chain(format!(
            "DeFi operations for {} not implemented",
            network
        )));
    }
    let protocol = opt_str(args, "protocol").unwrap_or("uniswap_v2");

    match (action, protocol) {
        (DefiAction::Swap, "uniswap_v2") => swap(state, args, environment).await,
        (DefiAction::GetSwapQuote, "uniswap_v2") => quote_envelope(state, args, environment).await,
        (DefiAction::GetReserves, "uniswap_v2") => reserves(state, args, environment).await,
        (DefiAction::AddLiquidity, "uniswap_v2") => {
            Err(ToolError::chain("Liquidity provision not implemented"))
        }
        (DefiAction::GetUserData, "aave") => aave_user_data(state, args, environment).await,
        (DefiAction::Supply, "aave") | (DefiAction::Borrow, "aave") => {
            Err(ToolError::chain("Aave lending actions not implemented"))
        }
        (_, other) => Err(ToolError::invalid(
            "protocol",
            format!("unsupported protocol '{}' for this action", other),
        )),
    }
}

/// The indicative quote: a flat 2% haircut on the input amount, denominated
/// with 18 decimals. Not pool math; see module docs.
fn indicative_quote(amount_in: f64) -> Result<(f64, U256), ToolError> {
    let amount =
        Decimal::from_f64(amount_in).ok_or_else(|| ToolError::invalid("amount_in", "not finite"))?;
    if amount.is_sign_negative() {
        return Err(ToolError::invalid("amount_in", "amount must not be negative"));
    }
    let out = amount * Decimal::new(98, 2);
    let out_units = to_base_units(&out.to_string(), ETH_DECIMALS)?;
    let out_f64 = out.to_string().parse().unwrap_or(0.0);
    Ok((out_f64, out_units))
}

fn required_amount_in(args: &Value) -> Result<f64, ToolError> {
    match args.get("amount_in") {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ToolError::invalid("amount_in", "not finite")),
        Some(Value::String(s)) if !s.is_empty() => s
            .parse()
            .map_err(|_| ToolError::invalid("amount_in", format!("'{}' is not a number", s))),
        _ => Err(ToolError::MissingParam("amount_in")),
    }
}

async fn quote_envelope(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let token_in = required_str(args, "token_in")?;
    let token_out = required_str(args, "token_out")?;
    let amount_in = required_amount_in(args)?;

    super::connect(state, "ethereum", environment).await?;
    let (amount_out, amount_out_units) = indicative_quote(amount_in)?;

    Ok(json!({
        "token_in": token_in,
        "token_out": token_out,
        "amount_in": amount_in,
        "amount_out": amount_out,
        "amount_out_units": amount_out_units.to_string(),
        "price_impact": "2.00%",
        "fee": "0.30%",
        "route": [token_in, token_out],
        "approximate": true,
        "note": QUOTE_NOTE,
        "network": "ethereum",
    }))
}

async fn reserves(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let token_a = required_str(args, "token_a")?;
    let token_b = required_str(args, "token_b")?;

    super::connect(state, "ethereum", environment).await?;

    Ok(json!({
        "token_a": token_a,
        "token_b": token_b,
        "reserve_a": 1000000,
        "reserve_b": 500000,
        "price_a_in_b": 0.5,
        "price_b_in_a": 2.0,
        "approximate": true,
        "note": "indicative reserves only; the pair contract is not queried",
        "network": "ethereum",
    }))
}

async fn aave_user_data(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let address = required_str(args, "address")?;

    super::connect(state, "ethereum", environment).await?;

    Ok(json!({
        "address": address,
        "total_collateral_eth": 10.5,
        "total_debt_eth": 5.2,
        "available_borrows_eth": 3.1,
        "current_liquidation_threshold": 80,
        "ltv": 65,
        "health_factor": 2.0,
        "approximate": true,
        "note": "indicative account data only; the protocol data provider is not queried",
        "network": "ethereum",
    }))
}

async fn swap(state: &AppState, args: &Value, environment: &str) -> ToolResult {
    let from_address = required_str(args, "address")?;
    let private_key = required_str(args, "private_key")?;
    let token_in = required_str(args, "token_in")?;
    let token_out = required_str(args, "token_out")?;
    let amount_in = required_amount_in(args)?;
    let slippage = opt_f64(args, "slippage").unwrap_or(0.5);
    let deadline_mins = opt_u64(args, "deadline_mins").unwrap_or(20);

    let recipient = Address::from_str(from_address)
        .map_err(|e| ToolError::invalid("address", e.to_string()))?;
    let router = Address::from_str(UNISWAP_V2_ROUTER).expect("router address is valid");
    let weth = Address::from_str(WETH).expect("weth address is valid");

    let is_eth_in = token_in.eq_ignore_ascii_case("eth") || token_in.eq_ignore_ascii_case("weth");
    let is_eth_out = token_out.eq_ignore_ascii_case("eth") || token_out.eq_ignore_ascii_case("weth");
    let token_in_addr = if is_eth_in {
        weth
    } else {
        Address::from_str(token_in).map_err(|e| ToolError::invalid("token_in", e.to_string()))?
    };
    let token_out_addr = if is_eth_out {
        weth
    } else {
        Address::from_str(token_out).map_err(|e| ToolError::invalid("token_out", e.to_string()))?
    };
    let path = vec![token_in_addr, token_out_addr];

    let handle = super::connect(state, "ethereum", environment).await?;
    let http = state.connections.http();
    let rpc_url = handle.rpc_url().to_string();

    // Input decimals: 18 for ETH, otherwise from cached token metadata.
    let decimals_in = if is_eth_in {
        ETH_DECIMALS
    } else {
        super::token::token_metadata(
            state,
            &rpc_url,
            "ethereum",
            &format!("{:?}", token_in_addr),
            false,
        )
        .await?
        .decimals
    };
    let amount_in_units = to_base_units(&format_amount(amount_in), decimals_in)?;

    let (expected_out, expected_out_units) = indicative_quote(amount_in)?;
    let min_out_units = apply_slippage(expected_out_units, slippage)?;
    let deadline = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        + deadline_mins * 60;

    // Token inputs need a router allowance before the swap itself.
    let approval_tx = if !is_eth_in {
        let approve = TransactionRequest::new()
            .to(token_in_addr)
            .data(eth::erc20_approve_data(router, amount_in_units));
        let hash = eth::send_transaction(http, &rpc_url, private_key, approve)
            .await
            .map_err(|e| ToolError::chain(format!("Router approval failed: {}", e)))?;
        Some(hash)
    } else {
        None
    };

    let path_tokens = ethers_core::abi::Token::Array(
        path.iter()
            .map(|a| ethers_core::abi::Token::Address(*a))
            .collect(),
    );
    let (data, value) = if is_eth_in {
        (
            eth::encode_call(
                "swapExactETHForTokens(uint256,address[],address,uint256)",
                vec![
                    ethers_core::abi::Token::Uint(min_out_units),
                    path_tokens,
                    ethers_core::abi::Token::Address(recipient),
                    ethers_core::abi::Token::Uint(U256::from(deadline)),
                ],
            ),
            Some(amount_in_units),
        )
    } else if is_eth_out {
        (
            eth::encode_call(
                "swapExactTokensForETH(uint256,uint256,address[],address,uint256)",
                vec![
                    ethers_core::abi::Token::Uint(amount_in_units),
                    ethers_core::abi::Token::Uint(min_out_units),
                    path_tokens,
                    ethers_core::abi::Token::Address(recipient),
                    ethers_core::abi::Token::Uint(U256::from(deadline)),
                ],
            ),
            None,
        )
    } else {
        (
            eth::encode_call(
                "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)",
                vec![
                    ethers_core::abi::Token::Uint(amount_in_units),
                    ethers_core::abi::Token::Uint(min_out_units),
                    path_tokens,
                    ethers_core::abi::Token::Address(recipient),
                    ethers_core::abi::Token::Uint(U256::from(deadline)),
                ],
            ),
            None,
        )
    };

    let mut tx = TransactionRequest::new().to(router).data(data);
    if let Some(value) = value {
        tx = tx.value(value);
    }
    if let Some(gas) = opt_u64(args, "gas") {
        tx = tx.gas(gas);
    } else {
        tx = tx.gas(state.config.default_gas_limit);
    }
    if let Some(gas_price) = opt_u64(args, "gas_price") {
        tx = tx.gas_price(gas_price);
    }

    let tx_hash = eth::send_transaction(http, &rpc_url, private_key, tx)
        .await
        .map_err(|e| ToolError::chain(format!("Uniswap swap failed: {}", e)))?;

    let mut payload = json!({
        "transaction_hash": tx_hash,
        "status": "pending",
        "from": from_address,
        "token_in": if is_eth_in { "ETH" } else { token_in },
        "token_out": if is_eth_out { "ETH" } else { token_out },
        "amount_in": amount_in,
        "expected_out": expected_out,
        "min_amount_out_units": min_out_units.to_string(),
        "slippage": slippage,
        "deadline": deadline,
        "approximate": true,
        "note": QUOTE_NOTE,
        "network": "ethereum",
    });
    if let Some(hash) = approval_tx {
        payload
            .as_object_mut()
            .expect("payload is an object")
            .insert("approval_tx".to_string(), json!(hash));
    }
    Ok(payload)
}

fn apply_slippage(units: U256, slippage_percent: f64) -> Result<U256, ToolError> {
    if !(0.0..=100.0).contains(&slippage_percent) {
        return Err(ToolError::invalid(
            "slippage",
            "must be between 0 and 100 percent",
        ));
    }
    // Basis points keep this in integer math.
    let bps = (slippage_percent * 100.0).round() as u64;
    Ok(units * U256::from(10_000 - bps) / U256::from(10_000u64))
}

fn format_amount(amount: f64) -> String {
    let dec = Decimal::from_f64(amount).unwrap_or_default();
    dec.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicative_quote_takes_a_two_percent_haircut() {
        let (out, units) = indicative_quote(100.0).unwrap();
        assert!((out - 98.0).abs() < 1e-9);
        assert_eq!(units, U256::from_dec_str("98000000000000000000").unwrap());
    }

    #[test]
    fn slippage_bounds_the_minimum_output() {
        let units = U256::from(1_000_000u64);
        assert_eq!(apply_slippage(units, 0.5).unwrap(), U256::from(995_000u64));
        assert_eq!(apply_slippage(units, 0.0).unwrap(), units);
        assert!(apply_slippage(units, 101.0).is_err());
    }
}
