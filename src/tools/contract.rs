// src/tools/contract.rs

use ethers_core::types::U256;
use serde_json::{json, Value};

use crate::blockchain::contract::{self, WriteOptions};
use crate::blockchain::convert::is_eth_address;
use crate::blockchain::models::{ToolError, ToolResult};
use crate::utils::{network_params, opt_str, opt_u64, required_str, required_value};
use crate::AppState;

enum ContractAction {
    Read,
    Write,
}

impl ContractAction {
    fn parse(args: &Value) -> Result<Self, ToolError> {
        match opt_str(args, "action").unwrap_or("read") {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(ToolError::UnsupportedAction(other.to_string())),
        }
    }
}

pub async fn execute(state: &AppState, args: &Value) -> Value {
    super::finish(run(state, args).await)
}

async fn run(state: &AppState, args: &Value) -> ToolResult {
    let action = ContractAction::parse(args)?;
    let (network, environment) = network_params(args);

    let contract_address = required_str(args, "contract_address")?;
    let abi_raw = required_value(args, "contract_abi")?;
    let method_name = required_str(args, "method_name")?;

    if network != "ethereum" {
        return Err(ToolError::chain(format!(
            "Smart contract support for {} not implemented",
            network
        )));
    }
    if !is_eth_address(contract_address) {
        return Err(ToolError::invalid(
            "contract_address",
            format!("'{}' is not a valid Ethereum address", contract_address),
        ));
    }

    let abi = contract::parse_abi(abi_raw)?;
    let empty_args = Vec::new();
    let call_args = args
        .get("args")
        .and_then(|v| v.as_array())
        .unwrap_or(&empty_args);

    let handle = super::connect(state, network, environment).await?;
    let http = state.connections.http();

    match action {
        ContractAction::Read => {
            let mut payload = contract::read(
                http,
                handle.rpc_url(),
                contract_address,
                &abi,
                method_name,
                call_args,
            )
            .await?;
            merge_network(&mut payload, network, environment);
            Ok(payload)
        }
        ContractAction::Write => {
            let private_key = required_str(args, "private_key")?;
            let from_address = required_str(args, "from_address")?;
            let opts = WriteOptions {
                private_key: private_key.to_string(),
                from_address: from_address.to_string(),
                gas: opt_u64(args, "gas").map(U256::from),
                gas_price: opt_u64(args, "gas_price").map(U256::from),
                value: opt_u64(args, "value").map(U256::from),
                nonce: opt_u64(args, "nonce").map(U256::from),
            };
            let mut payload = contract::write(
                http,
                handle.rpc_url(),
                contract_address,
                &abi,
                method_name,
                call_args,
                &opts,
            )
            .await?;
            merge_network(&mut payload, network, environment);
            Ok(payload)
        }
    }
}

fn merge_network(payload: &mut Value, network: &str, environment: &str) {
    if let Some(map) = payload.as_object_mut() {
        map.insert("network".to_string(), json!(network));
        map.insert("environment".to_string(), json!(environment));
    }
}
