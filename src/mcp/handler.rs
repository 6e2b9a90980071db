//! # MCP Handler Module
//!
//! Dispatches incoming MCP requests to the Web3 domain tools.
//!
//! ## Supported Tools
//!
//! - `web3_connection` - connect to a blockchain network and report status
//! - `smart_contract` - read from and write to contracts via ABI
//! - `token` - native/ERC-20 balances, metadata, transfers, approvals
//! - `nft` - ERC-721/ERC-1155 metadata, ownership and transfers
//! - `defi` - Uniswap V2 swaps plus indicative quotes and reserves
//! - `ens` - forward/reverse ENS resolution, text records, content hashes
//! - `ipfs` - gateway reads, local-node add and pin
//!
//! Tool-level failures come back as the `{"error": ...}` envelope inside a
//! successful JSON-RPC response; JSON-RPC error objects are reserved for
//! protocol-level problems (parse errors, missing params, unknown methods).

use serde_json::json;
use tracing::info;

use crate::mcp::protocol::{error_codes, Request, Response};
use crate::{tools, AppState};

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, state: AppState) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "tools/list" => handle_tools_list(&req),
        "tools/call" => handle_tool_call(req, state).await,
        // Convenience aliases so clients can call tools as plain methods.
        // They are rewritten into tools/call internally to reuse the same logic.
        method if tools::TOOL_NAMES.contains(&method) => {
            let name = req.method.clone();
            let wrapped = Request {
                jsonrpc: req.jsonrpc.clone(),
                id: req.id.clone(),
                method: "tools/call".to_string(),
                params: Some(json!({
                    "name": name,
                    "arguments": req.params.clone().unwrap_or_else(|| json!({}))
                })),
            };
            handle_tool_call(wrapped, state).await
        }
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

/// Handles a 'tools/call' request by dispatching it to the correct tool.
async fn handle_tool_call(req: Request, state: AppState) -> Response {
    let params = match req.params.as_ref() {
        Some(p) => p,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };

    let tool_name = match params.get("name").and_then(|n| n.as_str()) {
        Some(name) => name,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'name' field in params".into(),
            )
        }
    };

    let empty_args = json!({});
    let args = params.get("arguments").unwrap_or(&empty_args);

    match tools::dispatch(tool_name, &state, args).await {
        Some(envelope) => Response::success(req.id, envelope),
        None => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Unknown tool: {}", tool_name),
        ),
    }
}

/// Handles the 'initialize' request.
fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": "web3_mcp",
        "version": env!("CARGO_PKG_VERSION")
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions = "Web3 MCP server exposing blockchain balance queries, contract calls, \
        token and NFT operations, DEX swaps, ENS resolution and IPFS fetches.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": "2025-06-18",
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

/// Handles the 'tools/list' request by returning a JSON definition of all
/// available tools. Each tool takes an `action` plus action-specific fields;
/// network selection defaults to Ethereum mainnet.
fn handle_tools_list(req: &Request) -> Response {
    let tools = json!([
        {
            "name": "web3_connection",
            "description": "Connect to a blockchain network and report block height and (masked) provider.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["connect", "status"], "description": "Defaults to 'connect'."},
                    "network": {"type": "string", "description": "Target network: 'ethereum' (default) or 'solana'."},
                    "environment": {"type": "string", "description": "Endpoint environment, e.g. 'mainnet' (default), 'sepolia', 'devnet'."},
                    "provider_url": {"type": "string", "description": "Per-call endpoint override."},
                    "force_reconnect": {"type": "boolean"}
                },
                "additionalProperties": true
            }
        },
        {
            "name": "smart_contract",
            "description": "Read from or write to a contract through its ABI.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["read", "write"], "description": "Defaults to 'read'."},
                    "contract_address": {"type": "string"},
                    "contract_abi": {"description": "ABI as a JSON array or JSON-encoded string."},
                    "method_name": {"type": "string"},
                    "args": {"type": "array", "description": "Positional arguments matching the method inputs."},
                    "from_address": {"type": "string", "description": "Required for write."},
                    "private_key": {"type": "string", "description": "Required for write; used only to sign locally."},
                    "gas": {"type": "string"},
                    "gas_price": {"type": "string"},
                    "value": {"type": "string"},
                    "nonce": {"type": "string"}
                },
                "required": ["contract_address", "contract_abi", "method_name"],
                "additionalProperties": true
            }
        },
        {
            "name": "token",
            "description": "Token operations: balances, metadata, transfers, approvals, allowances.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["native_balance", "token_balance", "token_info", "transfer", "approve", "allowance"], "description": "Defaults to 'native_balance'."},
                    "address": {"type": "string"},
                    "token_address": {"type": "string", "description": "ERC-20 contract; omit for native transfers/balances."},
                    "to_address": {"type": "string"},
                    "spender_address": {"type": "string"},
                    "amount": {"type": "string", "description": "Human units; 'unlimited' allowed for approve."},
                    "private_key": {"type": "string"},
                    "force_refresh": {"type": "boolean"}
                },
                "required": ["address"],
                "additionalProperties": true
            }
        },
        {
            "name": "nft",
            "description": "NFT operations: metadata, ownership, transfers.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["get_metadata", "get_owner", "transfer", "owned_by"], "description": "Defaults to 'get_metadata'."},
                    "contract_address": {"type": "string"},
                    "token_id": {"type": "string"},
                    "address": {"type": "string"},
                    "to_address": {"type": "string"},
                    "token_standard": {"type": "string", "enum": ["ERC721", "ERC1155"]},
                    "private_key": {"type": "string"},
                    "force_refresh": {"type": "boolean"}
                },
                "additionalProperties": true
            }
        },
        {
            "name": "defi",
            "description": "Uniswap V2 swaps; quote and reserve figures are indicative only and flagged approximate.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["swap", "get_swap_quote", "get_reserves", "add_liquidity", "supply", "borrow", "get_user_data"]},
                    "protocol": {"type": "string", "description": "Defaults to 'uniswap_v2'; 'aave' for get_user_data."},
                    "token_in": {"type": "string"},
                    "token_out": {"type": "string"},
                    "amount_in": {"type": "number"},
                    "token_a": {"type": "string"},
                    "token_b": {"type": "string"},
                    "address": {"type": "string"},
                    "private_key": {"type": "string"},
                    "slippage": {"type": "number", "description": "Percent, default 0.5."},
                    "deadline_mins": {"type": "integer", "description": "Default 20."}
                },
                "required": ["action"],
                "additionalProperties": true
            }
        },
        {
            "name": "ens",
            "description": "ENS resolution on Ethereum mainnet.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["resolve", "lookup", "get_text_record", "get_content_hash"], "description": "Defaults to 'resolve'."},
                    "name": {"type": "string", "description": "ENS name, e.g. 'vitalik.eth'."},
                    "address": {"type": "string", "description": "For reverse lookup."},
                    "key": {"type": "string", "description": "Text record key, e.g. 'url'."},
                    "force_refresh": {"type": "boolean"}
                },
                "additionalProperties": true
            }
        },
        {
            "name": "ipfs",
            "description": "IPFS content retrieval via gateway; add and pin via a local node.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["get", "add", "pin"], "description": "Defaults to 'get'."},
                    "cid": {"type": "string", "description": "CID, ipfs:// URI or gateway URL."},
                    "path": {"type": "string"},
                    "data": {"description": "Content to add: string or JSON value."},
                    "force_refresh": {"type": "boolean"}
                },
                "additionalProperties": true
            }
        }
    ]);

    Response::success(req.id.clone(), json!({ "tools": tools }))
}
