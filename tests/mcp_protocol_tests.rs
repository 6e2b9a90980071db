//! Tests for the MCP dispatcher: protocol-level behavior that needs no
//! network access.

use axum::{routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use web3_mcp_server::{
    api::health::health_handler,
    config::Config,
    mcp::{
        handler::handle_mcp_request,
        protocol::{error_codes, Request},
    },
    AppState,
};

fn test_state() -> AppState {
    // Port 9 (discard) is never listening; these tests fail before dialing.
    AppState::new(Config::with_single_endpoint("http://127.0.0.1:9"))
}

fn request(method: &str, params: Value) -> Request {
    Request {
        jsonrpc: "2.0".to_string(),
        id: json!(1),
        method: method.to_string(),
        params: Some(params),
    }
}

#[tokio::test]
async fn initialize_reports_server_info() {
    let resp = handle_mcp_request(request("initialize", json!({})), test_state())
        .await
        .expect("initialize always answers");
    let result = resp.result.expect("success");
    assert_eq!(result["serverInfo"]["name"], "web3_mcp");
    assert!(result["protocolVersion"].is_string());
}

#[tokio::test]
async fn tools_list_contains_every_tool() {
    let resp = handle_mcp_request(request("tools/list", json!({})), test_state())
        .await
        .unwrap();
    let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
    let names: Vec<&str> = tools
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    for expected in [
        "web3_connection",
        "smart_contract",
        "token",
        "nft",
        "defi",
        "ens",
        "ipfs",
    ] {
        assert!(names.contains(&expected), "missing tool {}", expected);
    }
}

#[tokio::test]
async fn unknown_method_is_a_protocol_error() {
    let resp = handle_mcp_request(request("no_such_method", json!({})), test_state())
        .await
        .unwrap();
    let error = resp.error.expect("protocol error");
    assert_eq!(error.code, error_codes::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn unknown_tool_is_a_protocol_error() {
    let resp = handle_mcp_request(
        request("tools/call", json!({"name": "teleport", "arguments": {}})),
        test_state(),
    )
    .await
    .unwrap();
    let error = resp.error.expect("protocol error");
    assert_eq!(error.code, error_codes::METHOD_NOT_FOUND);
    assert!(error.message.contains("teleport"));
}

#[tokio::test]
async fn notifications_get_no_response() {
    let req = Request {
        jsonrpc: "2.0".to_string(),
        id: Value::Null,
        method: "tools/list".to_string(),
        params: None,
    };
    assert!(handle_mcp_request(req, test_state()).await.is_none());
}

#[tokio::test]
async fn tool_alias_is_rewritten_into_tools_call() {
    // Calling "ens" directly behaves like tools/call; a missing name comes
    // back as the tool's error envelope inside a successful response.
    let resp = handle_mcp_request(request("ens", json!({})), test_state())
        .await
        .unwrap();
    assert!(resp.error.is_none());
    let envelope = resp.result.unwrap();
    assert!(envelope["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn tool_error_envelopes_ride_in_successful_responses() {
    let resp = handle_mcp_request(
        request("tools/call", json!({"name": "token", "arguments": {}})),
        test_state(),
    )
    .await
    .unwrap();
    assert!(resp.error.is_none());
    let envelope = resp.result.unwrap();
    // The envelope names the missing parameter and is the only error shape.
    assert!(envelope["error"].as_str().unwrap().contains("address"));
}

#[tokio::test]
async fn health_endpoint_answers_ok() {
    let app = Router::new().route("/health", get(health_handler));
    let response = app
        .oneshot(
            axum::http::Request::builder()
                .uri("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}
