//! Contract invocation adapter: JSON in, ABI-encoded call out, JSON back.
//!
//! Read mode decodes outputs into JSON-compatible values (addresses and
//! bytes as 0x-hex strings, integers as decimal strings, tuples and arrays
//! as JSON arrays). Write mode signs locally and submits, returning the
//! transaction hash with a "pending" status; it never waits for inclusion.

use ethers_core::abi::{Abi, Function, ParamType, Token};
use ethers_core::types::{Address, Bytes, TransactionRequest, I256, U256};
use reqwest::Client;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::blockchain::models::{ToolError, ToolResult};
use crate::blockchain::services::eth;

/// Accepts the ABI either as a JSON array or as a JSON-encoded string.
pub fn parse_abi(raw: &Value) -> Result<Abi, ToolError> {
    let result = match raw {
        Value::String(s) => serde_json::from_str::<Abi>(s),
        other => serde_json::from_value::<Abi>(other.clone()),
    };
    result.map_err(|e| ToolError::invalid("contract_abi", e.to_string()))
}

fn find_function<'a>(abi: &'a Abi, method: &str) -> Result<&'a Function, ToolError> {
    abi.functions()
        .find(|f| f.name == method)
        .ok_or_else(|| {
            ToolError::invalid(
                "method_name",
                format!("function '{}' not found in ABI", method),
            )
        })
}

fn coerce_token(ty: &ParamType, val: &Value) -> Result<Token, ToolError> {
    let tok = match ty {
        ParamType::Address => {
            let s = val
                .as_str()
                .ok_or_else(|| ToolError::invalid("args", "address argument must be a string"))?;
            Token::Address(
                Address::from_str(s)
                    .map_err(|e| ToolError::invalid("args", format!("bad address '{}': {}", s, e)))?,
            )
        }
        ParamType::Uint(_) => {
            let n = match val {
                Value::String(s) => U256::from_dec_str(s)
                    .map_err(|e| ToolError::invalid("args", format!("bad uint '{}': {}", s, e)))?,
                Value::Number(n) => U256::from(
                    n.as_u64()
                        .ok_or_else(|| ToolError::invalid("args", "uint must be non-negative"))?,
                ),
                _ => {
                    return Err(ToolError::invalid(
                        "args",
                        "uint argument must be a decimal string or number",
                    ))
                }
            };
            Token::Uint(n)
        }
        ParamType::Int(_) => {
            let s = match val {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => {
                    return Err(ToolError::invalid(
                        "args",
                        "int argument must be a decimal string or number",
                    ))
                }
            };
            let n = I256::from_dec_str(&s)
                .map_err(|e| ToolError::invalid("args", format!("bad int '{}': {}", s, e)))?;
            Token::Int(n.into_raw())
        }
        ParamType::Bool => Token::Bool(
            val.as_bool()
                .ok_or_else(|| ToolError::invalid("args", "bool argument must be a boolean"))?,
        ),
        ParamType::String => Token::String(val.as_str().unwrap_or("").to_string()),
        ParamType::Bytes => {
            let s = val.as_str().unwrap_or("");
            let bytes = if let Some(stripped) = s.strip_prefix("0x") {
                hex::decode(stripped)
                    .map_err(|e| ToolError::invalid("args", format!("bad hex bytes: {}", e)))?
            } else {
                s.as_bytes().to_vec()
            };
            Token::Bytes(bytes)
        }
        ParamType::FixedBytes(size) => {
            let s = val
                .as_str()
                .ok_or_else(|| ToolError::invalid("args", "fixed bytes must be a hex string"))?;
            let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
                .map_err(|e| ToolError::invalid("args", format!("bad hex bytes: {}", e)))?;
            if bytes.len() != *size {
                return Err(ToolError::invalid(
                    "args",
                    format!("expected bytes{}, got {} bytes", size, bytes.len()),
                ));
            }
            Token::FixedBytes(bytes)
        }
        ParamType::Array(inner) => {
            let items = val
                .as_array()
                .ok_or_else(|| ToolError::invalid("args", "array argument must be a JSON array"))?;
            let tokens = items
                .iter()
                .map(|item| coerce_token(inner, item))
                .collect::<Result<Vec<_>, _>>()?;
            Token::Array(tokens)
        }
        other => {
            return Err(ToolError::invalid(
                "args",
                format!("unsupported ABI param type: {:?}", other),
            ))
        }
    };
    Ok(tok)
}

fn coerce_tokens(func: &Function, args: &[Value]) -> Result<Vec<Token>, ToolError> {
    if func.inputs.len() != args.len() {
        return Err(ToolError::invalid(
            "args",
            format!(
                "arg count mismatch: expected {}, got {}",
                func.inputs.len(),
                args.len()
            ),
        ));
    }
    func.inputs
        .iter()
        .zip(args)
        .map(|(param, val)| coerce_token(&param.kind, val))
        .collect()
}

/// Decoded ABI value as JSON: everything an agent can round-trip losslessly.
pub fn token_to_json(token: &Token) -> Value {
    match token {
        Token::Address(a) => json!(format!("{:?}", a)),
        Token::Uint(n) => json!(n.to_string()),
        Token::Int(n) => json!(I256::from_raw(*n).to_string()),
        Token::Bool(b) => json!(b),
        Token::String(s) => json!(s),
        Token::Bytes(b) | Token::FixedBytes(b) => json!(format!("0x{}", hex::encode(b))),
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            Value::Array(items.iter().map(token_to_json).collect())
        }
    }
}

fn encode_input(abi: &Abi, method: &str, args: &[Value]) -> Result<Bytes, ToolError> {
    let func = find_function(abi, method)?;
    let tokens = coerce_tokens(func, args)?;
    let data = func
        .encode_input(&tokens)
        .map_err(|e| ToolError::invalid("args", e.to_string()))?;
    Ok(Bytes::from(data))
}

/// Read mode: eth_call the view method and decode its outputs.
pub async fn read(
    client: &Client,
    rpc_url: &str,
    contract_address: &str,
    abi: &Abi,
    method: &str,
    args: &[Value],
) -> ToolResult {
    let func = find_function(abi, method)?;
    let tokens = coerce_tokens(func, args)?;
    let data = func
        .encode_input(&tokens)
        .map_err(|e| ToolError::invalid("args", e.to_string()))?;

    let raw = eth::eth_call(client, rpc_url, contract_address, Bytes::from(data))
        .await
        .map_err(|e| ToolError::chain(format!("Contract read failed: {}", e)))?;
    let bytes = eth::hex_to_bytes(&raw)
        .map_err(|e| ToolError::chain(format!("Contract read returned no data: {}", e)))?;
    let outputs = func
        .decode_output(&bytes)
        .map_err(|e| ToolError::chain(format!("Failed to decode result: {}", e)))?;

    // A single output is unwrapped, multiple outputs become an array.
    let decoded = match outputs.len() {
        0 => Value::Null,
        1 => token_to_json(&outputs[0]),
        _ => Value::Array(outputs.iter().map(token_to_json).collect()),
    };
    Ok(json!({ "result": decoded }))
}

/// Options for write mode; gas and nonce default from the node when None.
pub struct WriteOptions {
    pub private_key: String,
    pub from_address: String,
    pub gas: Option<U256>,
    pub gas_price: Option<U256>,
    pub value: Option<U256>,
    pub nonce: Option<U256>,
}

/// Write mode: encode, sign locally, submit, report the pending hash.
pub async fn write(
    client: &Client,
    rpc_url: &str,
    contract_address: &str,
    abi: &Abi,
    method: &str,
    args: &[Value],
    opts: &WriteOptions,
) -> ToolResult {
    let data = encode_input(abi, method, args)?;

    let from = eth::wallet_address(&opts.private_key)
        .map_err(|e| ToolError::invalid("private_key", e.to_string()))?;
    let declared = Address::from_str(&opts.from_address)
        .map_err(|e| ToolError::invalid("from_address", e.to_string()))?;
    if from != declared {
        return Err(ToolError::invalid(
            "from_address",
            "does not match the address derived from private_key",
        ));
    }

    let contract = Address::from_str(contract_address)
        .map_err(|e| ToolError::invalid("contract_address", e.to_string()))?;

    let mut tx = TransactionRequest::new().to(contract).data(data);
    if let Some(gas) = opts.gas {
        tx = tx.gas(gas);
    }
    if let Some(gas_price) = opts.gas_price {
        tx = tx.gas_price(gas_price);
    }
    if let Some(value) = opts.value {
        tx = tx.value(value);
    }
    if let Some(nonce) = opts.nonce {
        tx = tx.nonce(nonce);
    }

    let tx_hash = eth::send_transaction(client, rpc_url, &opts.private_key, tx)
        .await
        .map_err(|e| ToolError::chain(format!("Transaction submission failed: {}", e)))?;

    Ok(json!({
        "transaction_hash": tx_hash,
        "status": "pending",
        "from": format!("{:?}", from),
        "contract_address": contract_address,
        "method": method,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn erc20_abi() -> Abi {
        parse_abi(&json!([
            {
                "constant": true,
                "inputs": [{"name": "_owner", "type": "address"}],
                "name": "balanceOf",
                "outputs": [{"name": "balance", "type": "uint256"}],
                "type": "function"
            },
            {
                "constant": false,
                "inputs": [
                    {"name": "_to", "type": "address"},
                    {"name": "_value", "type": "uint256"}
                ],
                "name": "transfer",
                "outputs": [{"name": "", "type": "bool"}],
                "type": "function"
            }
        ]))
        .unwrap()
    }

    #[test]
    fn parses_abi_from_string_or_array() {
        let as_array = erc20_abi();
        let as_string = parse_abi(&json!(
            r#"[{"constant":true,"inputs":[],"name":"decimals","outputs":[{"name":"","type":"uint8"}],"type":"function"}]"#
        ))
        .unwrap();
        assert!(as_array.functions().any(|f| f.name == "balanceOf"));
        assert!(as_string.functions().any(|f| f.name == "decimals"));
    }

    #[test]
    fn unknown_method_is_a_parameter_error() {
        let abi = erc20_abi();
        let err = find_function(&abi, "mint").unwrap_err();
        assert!(err.to_string().contains("mint"));
    }

    #[test]
    fn arg_count_mismatch_is_reported() {
        let abi = erc20_abi();
        let func = find_function(&abi, "transfer").unwrap();
        let err = coerce_tokens(func, &[json!("0x0000000000000000000000000000000000000001")])
            .unwrap_err();
        assert!(err.to_string().contains("expected 2, got 1"));
    }

    #[test]
    fn coerces_uints_from_strings_and_numbers() {
        let from_str = coerce_token(&ParamType::Uint(256), &json!("1000000000000000000")).unwrap();
        let from_num = coerce_token(&ParamType::Uint(256), &json!(42)).unwrap();
        assert_eq!(from_str, Token::Uint(U256::exp10(18)));
        assert_eq!(from_num, Token::Uint(U256::from(42u64)));
    }

    #[test]
    fn coerces_address_arrays() {
        let tok = coerce_token(
            &ParamType::Array(Box::new(ParamType::Address)),
            &json!([
                "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
                "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"
            ]),
        )
        .unwrap();
        match tok {
            Token::Array(items) => assert_eq!(items.len(), 2),
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn json_rendering_is_lossless_for_large_uints() {
        let n = U256::from_dec_str("115792089237316195423570985008687907853").unwrap();
        assert_eq!(
            token_to_json(&Token::Uint(n)),
            json!("115792089237316195423570985008687907853")
        );
        assert_eq!(
            token_to_json(&Token::Bytes(vec![0xde, 0xad])),
            json!("0xdead")
        );
    }
}
