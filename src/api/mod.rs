//! # API Module
//!
//! HTTP surface of the server. The tool surface itself is JSON-RPC:
//!
//! - `GET /api/health` - liveness probe
//! - `POST /api/rpc` - same MCP requests as the stdio transport

pub mod health;
