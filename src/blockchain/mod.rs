// src/blockchain/mod.rs

pub mod connection;
pub mod contract;
pub mod convert;
pub mod models;
pub mod retry;
pub mod services;

pub use connection::{ConnectionHandle, ConnectionManager};
pub use models::{ToolCaches, ToolError, ToolResult};

// Re-export commonly used types
pub use ethers::{
    types::{Address, H256, U256, U64},
    utils::to_checksum,
};
