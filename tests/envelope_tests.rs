//! Every tool action with a missing documented parameter must come back as
//! an error envelope naming that parameter, validated before any connection
//! attempt.

use serde_json::{json, Value};

use web3_mcp_server::{config::Config, tools, AppState};

fn test_state() -> AppState {
    AppState::new(Config::with_single_endpoint("http://127.0.0.1:9"))
}

async fn call(name: &str, args: Value) -> Value {
    tools::dispatch(name, &test_state(), &args)
        .await
        .expect("known tool")
}

fn error_of(envelope: &Value) -> &str {
    envelope["error"].as_str().expect("error envelope")
}

#[tokio::test]
async fn token_requires_address() {
    let envelope = call("token", json!({})).await;
    assert!(error_of(&envelope).contains("address"));
}

#[tokio::test]
async fn token_balance_requires_token_address() {
    let envelope = call(
        "token",
        json!({
            "action": "token_balance",
            "address": "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"
        }),
    )
    .await;
    assert!(error_of(&envelope).contains("token_address"));
}

#[tokio::test]
async fn token_rejects_unknown_actions() {
    let envelope = call(
        "token",
        json!({"action": "burn", "address": "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"}),
    )
    .await;
    assert!(error_of(&envelope).contains("Unsupported action"));
}

#[tokio::test]
async fn token_rejects_malformed_addresses() {
    let envelope = call(
        "token",
        json!({"address": "not-an-address"}),
    )
    .await;
    assert!(error_of(&envelope).contains("not-an-address"));
    assert_eq!(envelope["details"]["parameter"], "address");
}

#[tokio::test]
async fn transfer_requires_private_key() {
    let envelope = call(
        "token",
        json!({
            "action": "transfer",
            "address": "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045",
            "to_address": "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
            "amount": "1.0"
        }),
    )
    .await;
    assert!(error_of(&envelope).contains("private_key"));
}

#[tokio::test]
async fn smart_contract_requires_abi_and_method() {
    let envelope = call(
        "smart_contract",
        json!({"contract_address": "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"}),
    )
    .await;
    assert!(error_of(&envelope).contains("contract_abi"));

    let envelope = call(
        "smart_contract",
        json!({
            "contract_address": "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
            "contract_abi": []
        }),
    )
    .await;
    assert!(error_of(&envelope).contains("method_name"));
}

#[tokio::test]
async fn ens_requires_a_name_and_mainnet() {
    let envelope = call("ens", json!({})).await;
    assert!(error_of(&envelope).contains("name"));

    let envelope = call(
        "ens",
        json!({"name": "vitalik.eth", "environment": "sepolia"}),
    )
    .await;
    assert!(error_of(&envelope).contains("mainnet"));
}

#[tokio::test]
async fn ens_rejects_malformed_names() {
    let envelope = call("ens", json!({"name": "nodotshere"})).await;
    assert!(error_of(&envelope).contains("nodotshere"));
}

#[tokio::test]
async fn nft_requires_token_id() {
    let envelope = call(
        "nft",
        json!({"contract_address": "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"}),
    )
    .await;
    assert!(error_of(&envelope).contains("token_id"));
}

#[tokio::test]
async fn defi_requires_an_action_and_quote_inputs() {
    let envelope = call("defi", json!({})).await;
    assert!(error_of(&envelope).contains("action"));

    let envelope = call(
        "defi",
        json!({"action": "get_swap_quote", "token_in": "ETH"}),
    )
    .await;
    assert!(error_of(&envelope).contains("token_out"));
}

#[tokio::test]
async fn ipfs_requires_cid_and_local_node_for_writes() {
    let envelope = call("ipfs", json!({})).await;
    assert!(error_of(&envelope).contains("cid"));

    let envelope = call("ipfs", json!({"action": "add", "data": "hello"})).await;
    assert!(error_of(&envelope).contains("local IPFS node"));

    let envelope = call(
        "ipfs",
        json!({"action": "pin", "cid": "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"}),
    )
    .await;
    assert!(error_of(&envelope).contains("local IPFS node"));
}

#[tokio::test]
async fn connection_rejects_unknown_networks() {
    let envelope = call("web3_connection", json!({"network": "nearprotocol"})).await;
    assert!(error_of(&envelope).contains("nearprotocol"));
}

#[tokio::test]
async fn connection_rejects_unknown_environments_with_alternatives() {
    let envelope = call(
        "web3_connection",
        json!({"network": "ethereum", "environment": "holesky"}),
    )
    .await;
    assert!(error_of(&envelope).contains("holesky"));
    assert!(error_of(&envelope).contains("mainnet"));
}

#[tokio::test]
async fn error_messages_are_strings_not_structures() {
    for (tool, args) in [
        ("token", json!({})),
        ("ens", json!({})),
        ("ipfs", json!({})),
        ("defi", json!({})),
        ("smart_contract", json!({})),
    ] {
        let envelope = call(tool, args).await;
        assert!(envelope["error"].is_string(), "{} error must be a string", tool);
    }
}
