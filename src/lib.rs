// src/lib.rs

use std::sync::Arc;

// Re-export commonly used types
pub use ethers::types::{Address, H160, H256, U256, U64};

// Re-export modules
pub mod api;
pub mod blockchain;
pub mod config;
pub mod mcp;
pub mod tools;
pub mod utils;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: config::Config,
    /// Memoized RPC connections keyed by (network, environment)
    pub connections: Arc<blockchain::ConnectionManager>,
    /// Process-scoped caches used by the domain tools
    pub caches: Arc<blockchain::ToolCaches>,
}

impl AppState {
    pub fn new(config: config::Config) -> Self {
        Self {
            connections: Arc::new(blockchain::ConnectionManager::new(config.clone())),
            caches: Arc::new(blockchain::ToolCaches::default()),
            config,
        }
    }
}
