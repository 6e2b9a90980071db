//! Tool tests against a mock JSON-RPC endpoint.
//!
//! mockito's server is process-global, so these tests serialize on a mutex
//! and reset the mock registry at the start of each test.

use std::sync::Mutex;

use mockito::{mock, reset, server_url, Matcher};
use serde_json::json;

use web3_mcp_server::{config::Config, tools, AppState};

static TEST_MUTEX: Mutex<()> = Mutex::new(());

fn lock() -> std::sync::MutexGuard<'static, ()> {
    TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
}

fn rpc_mock(method_fragment: &str, result: &str) -> mockito::Mock {
    mock("POST", "/")
        .match_body(Matcher::Regex(method_fragment.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"jsonrpc":"2.0","id":1,"result":"{}"}}"#,
            result
        ))
        .create()
}

fn test_state() -> AppState {
    AppState::new(Config::with_single_endpoint(&server_url()))
}

#[tokio::test]
async fn native_balance_returns_numeric_eth() {
    let _guard = lock();
    reset();
    let _live = rpc_mock("eth_blockNumber", "0x10");
    // 2 ETH in wei
    let _balance = rpc_mock("eth_getBalance", "0x1bc16d674ec80000");

    let state = test_state();
    let envelope = tools::dispatch(
        "token",
        &state,
        &json!({"address": "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"}),
    )
    .await
    .unwrap();

    assert!(envelope.get("error").is_none(), "unexpected: {}", envelope);
    assert_eq!(envelope["symbol"], "ETH");
    assert_eq!(envelope["balance"], json!(2.0));
    assert_eq!(envelope["balance_wei"], "2000000000000000000");
    assert_eq!(envelope["network"], "ethereum");
}

#[tokio::test]
async fn ens_resolve_returns_address_or_error_never_neither() {
    let _guard = lock();
    reset();
    let _live = rpc_mock("eth_blockNumber", "0x10");
    // registry.resolver(node) -> the public resolver
    let _resolver = rpc_mock(
        "0178b8bf",
        "0x0000000000000000000000004976fb03c32e5b8cfe2b6ccb31c09ba78ebaba41",
    );
    // resolver.addr(node) -> the target address
    let _addr = rpc_mock(
        "3b3b57de",
        "0x000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045",
    );

    let state = test_state();
    let envelope = tools::dispatch("ens", &state, &json!({"name": "vitalik.eth"}))
        .await
        .unwrap();

    let has_address = envelope.get("address").is_some();
    let has_error = envelope.get("error").is_some();
    assert!(has_address ^ has_error, "exactly one of address/error");
    assert_eq!(
        envelope["address"], "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045",
        "resolved address is checksummed"
    );

    // Second resolve is served from the cache even if the chain goes away.
    reset();
    let cached = tools::dispatch("ens", &state, &json!({"name": "vitalik.eth"}))
        .await
        .unwrap();
    assert_eq!(cached["address"], envelope["address"]);
}

#[tokio::test]
async fn ens_resolution_failure_is_an_error_envelope() {
    let _guard = lock();
    reset();
    let _live = rpc_mock("eth_blockNumber", "0x10");
    // registry.resolver(node) -> zero address: name is unregistered
    let _resolver = rpc_mock(
        "0178b8bf",
        "0x0000000000000000000000000000000000000000000000000000000000000000",
    );

    let envelope = tools::dispatch("ens", &test_state(), &json!({"name": "unregistered.eth"}))
        .await
        .unwrap();
    assert!(envelope.get("address").is_none());
    assert!(envelope["error"]
        .as_str()
        .unwrap()
        .contains("unregistered.eth"));
}

#[tokio::test]
async fn connections_are_cached_within_the_staleness_window() {
    let _guard = lock();
    reset();
    let _live = rpc_mock("eth_blockNumber", "0x10");

    let state = test_state();
    let first = state
        .connections
        .get_connection("ethereum", "mainnet")
        .await
        .expect("first connection");
    assert_eq!(first.block_height, 16);

    // Swap the endpoint's answer; a cached handle never sees it.
    reset();
    let _live = rpc_mock("eth_blockNumber", "0x20");
    let second = state
        .connections
        .get_connection("ethereum", "mainnet")
        .await
        .expect("cached connection");
    assert_eq!(second.block_height, 16);
    assert_eq!(second.connected_at, first.connected_at);
}

#[tokio::test]
async fn expired_connections_revalidate() {
    let _guard = lock();
    reset();
    let _live = rpc_mock("eth_blockNumber", "0x10");

    let mut config = Config::with_single_endpoint(&server_url());
    config.connection_staleness_secs = 0;
    let state = AppState::new(config);

    let first = state
        .connections
        .get_connection("ethereum", "mainnet")
        .await
        .expect("first connection");
    assert_eq!(first.block_height, 16);

    reset();
    let _live = rpc_mock("eth_blockNumber", "0x20");
    let second = state
        .connections
        .get_connection("ethereum", "mainnet")
        .await
        .expect("revalidated connection");
    assert_eq!(second.block_height, 32);
}

#[tokio::test]
async fn force_reconnect_redials_inside_the_window() {
    let _guard = lock();
    reset();
    let _live = rpc_mock("eth_blockNumber", "0x10");

    let state = test_state();
    state
        .connections
        .ensure("ethereum", "mainnet", None, false)
        .await
        .expect("first connection");

    reset();
    let _live = rpc_mock("eth_blockNumber", "0x20");
    let forced = state
        .connections
        .ensure("ethereum", "mainnet", None, true)
        .await
        .expect("forced reconnection");
    assert_eq!(forced.block_height, 32);
}

#[tokio::test]
async fn failed_connections_are_not_cached() {
    let _guard = lock();
    reset();
    // No mock registered: every request fails.
    let state = test_state();
    assert!(state
        .connections
        .get_connection("ethereum", "mainnet")
        .await
        .is_none());

    // Once the endpoint recovers the next call succeeds immediately,
    // proving no dead handle was left behind.
    let _live = rpc_mock("eth_blockNumber", "0x10");
    let handle = state
        .connections
        .get_connection("ethereum", "mainnet")
        .await
        .expect("recovered connection");
    assert_eq!(handle.block_height, 16);
}

#[tokio::test]
async fn solana_native_balance_uses_lamports() {
    let _guard = lock();
    reset();
    let _live = mock("POST", "/")
        .match_body(Matcher::Regex("getBlockHeight".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":250000000}"#)
        .create();
    let _balance = mock("POST", "/")
        .match_body(Matcher::Regex("getBalance".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":1},"value":2000000001}}"#)
        .create();

    let envelope = tools::dispatch(
        "token",
        &test_state(),
        &json!({"network": "solana", "address": "11111111111111111111111111111111"}),
    )
    .await
    .unwrap();

    assert!(envelope.get("error").is_none(), "unexpected: {}", envelope);
    assert_eq!(envelope["symbol"], "SOL");
    assert_eq!(envelope["balance_lamports"], 2000000001u64);
    assert_eq!(envelope["balance"], json!(2.000000001));
}

#[tokio::test]
async fn defi_quotes_are_flagged_approximate() {
    let _guard = lock();
    reset();
    let _live = rpc_mock("eth_blockNumber", "0x10");

    let envelope = tools::dispatch(
        "defi",
        &test_state(),
        &json!({
            "action": "get_swap_quote",
            "token_in": "ETH",
            "token_out": "0x6B175474E89094C44Da98b954EedeAC495271d0F",
            "amount_in": 100
        }),
    )
    .await
    .unwrap();

    assert!(envelope.get("error").is_none(), "unexpected: {}", envelope);
    assert_eq!(envelope["approximate"], true);
    assert_eq!(envelope["amount_out"], json!(98.0));
    assert!(envelope["note"].as_str().unwrap().contains("indicative"));
}

#[tokio::test]
async fn token_metadata_is_memoized() {
    let _guard = lock();
    reset();
    let _live = rpc_mock("eth_blockNumber", "0x10");
    // symbol()/name() revert on this mock: metadata falls back to defaults,
    // decimals() -> 6
    let _decimals = rpc_mock("313ce567", &format!("0x{:064x}", 6));
    // balanceOf -> 1.5 units at 6 decimals
    let _balance = rpc_mock("70a08231", &format!("0x{:064x}", 1_500_000u64));

    let state = test_state();
    let args = json!({
        "action": "token_balance",
        "address": "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045",
        "token_address": "0x6B175474E89094C44Da98b954EedeAC495271d0F"
    });
    let first = tools::dispatch("token", &state, &args).await.unwrap();
    assert!(first.get("error").is_none(), "unexpected: {}", first);
    assert_eq!(first["decimals"], 6);
    assert_eq!(first["balance"], json!(1.5));

    // Metadata for the contract is now cached on the state.
    assert_eq!(state.caches.tokens.len(), 1);
    let second = tools::dispatch("token", &state, &args).await.unwrap();
    assert_eq!(second["decimals"], 6);
    assert_eq!(state.caches.tokens.len(), 1);
}
