//! Connection manager for blockchain RPC endpoints.
//!
//! Handles are memoized per (network, environment). A cached handle is
//! returned as long as its last liveness check is younger than the staleness
//! window; after that the endpoint is re-dialed and verified with one
//! lightweight RPC (block height). A failed attempt removes the cache entry
//! instead of leaving a dead handle behind.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ethers_providers::{Http, Middleware, Provider};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::blockchain::models::ToolError;
use crate::blockchain::services::solana;
use crate::config::Config;

/// The live client behind a handle.
#[derive(Clone)]
pub enum ChainClient {
    Evm(Arc<Provider<Http>>),
    Solana,
}

#[derive(Clone)]
pub struct ConnectionHandle {
    pub network: String,
    pub environment: String,
    pub endpoint: String,
    pub client: ChainClient,
    pub live: bool,
    pub block_height: u64,
    pub connected_at: DateTime<Utc>,
    checked_at: Instant,
}

impl ConnectionHandle {
    fn is_fresh(&self, staleness: Duration) -> bool {
        self.live && self.checked_at.elapsed() < staleness
    }

    pub fn rpc_url(&self) -> &str {
        &self.endpoint
    }

    pub fn is_evm(&self) -> bool {
        matches!(self.client, ChainClient::Evm(_))
    }

    /// Status payload for the connection tool. The endpoint is masked so
    /// credential-bearing URLs never leak into agent-visible output.
    pub fn status(&self) -> Value {
        json!({
            "status": "connected",
            "network": self.network,
            "environment": self.environment,
            "block_height": self.block_height,
            "provider": mask_provider_url(&self.endpoint),
            "connected_at": self.connected_at.to_rfc3339(),
        })
    }
}

pub struct ConnectionManager {
    config: Config,
    handles: DashMap<(String, String), ConnectionHandle>,
    http: Client,
}

impl ConnectionManager {
    pub fn new(config: Config) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            config,
            handles: DashMap::new(),
            http,
        }
    }

    /// Shared HTTP client for raw JSON-RPC and content fetches.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// The caller-facing contract: a live handle or None. Tools must treat
    /// None as "operation unavailable" and return the error envelope.
    pub async fn get_connection(
        &self,
        network: &str,
        environment: &str,
    ) -> Option<ConnectionHandle> {
        match self.ensure(network, environment, None, false).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("connection to {} {} failed: {}", network, environment, e);
                None
            }
        }
    }

    /// Full-fidelity variant used by the connection tool: supports a per-call
    /// endpoint override and forced reconnection, and reports typed errors.
    pub async fn ensure(
        &self,
        network: &str,
        environment: &str,
        override_url: Option<&str>,
        force_reconnect: bool,
    ) -> Result<ConnectionHandle, ToolError> {
        if !self.config.is_network_supported(network) {
            return Err(ToolError::UnsupportedNetwork(network.to_string()));
        }
        let endpoint = match override_url {
            Some(url) => url.to_string(),
            None => self
                .config
                .endpoint(network, environment)
                .cloned()
                .ok_or_else(|| {
                    ToolError::invalid(
                        "environment",
                        format!(
                            "'{}' not available for {}. Available: {}",
                            environment,
                            network,
                            self.config.environments(network).join(", ")
                        ),
                    )
                })?,
        };

        let key = (network.to_string(), environment.to_string());
        if !force_reconnect {
            if let Some(handle) = self.handles.get(&key) {
                let staleness = Duration::from_secs(self.config.connection_staleness_secs);
                if handle.is_fresh(staleness) && handle.endpoint == endpoint {
                    debug!("reusing cached connection for {} {}", network, environment);
                    return Ok(handle.clone());
                }
            }
        }

        match self.establish(network, environment, &endpoint).await {
            Ok(handle) => {
                self.handles.insert(key, handle.clone());
                Ok(handle)
            }
            Err(e) => {
                // Never leave a stale entry behind a failed attempt.
                self.handles.remove(&key);
                warn!(
                    "failed to connect to {} {} at {}: {}",
                    network,
                    environment,
                    mask_provider_url(&endpoint),
                    e
                );
                Err(ToolError::Connection {
                    network: network.to_string(),
                    environment: environment.to_string(),
                })
            }
        }
    }

    /// Dial the endpoint and verify liveness with one block-height call.
    async fn establish(
        &self,
        network: &str,
        environment: &str,
        endpoint: &str,
    ) -> anyhow::Result<ConnectionHandle> {
        let (client, block_height) = match network {
            "ethereum" => {
                let provider = Provider::<Http>::try_from(endpoint)?;
                let block_number = provider.get_block_number().await?;
                (ChainClient::Evm(Arc::new(provider)), block_number.as_u64())
            }
            "solana" => {
                let height = solana::get_block_height(&self.http, endpoint).await?;
                (ChainClient::Solana, height)
            }
            other => anyhow::bail!("network {} implementation not available", other),
        };

        Ok(ConnectionHandle {
            network: network.to_string(),
            environment: environment.to_string(),
            endpoint: endpoint.to_string(),
            client,
            live: true,
            block_height,
            connected_at: Utc::now(),
            checked_at: Instant::now(),
        })
    }
}

/// Mask credentials in provider URLs before they appear in any diagnostic
/// field: key-ish query parameters and opaque project-key path segments.
pub fn mask_provider_url(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return raw.to_string();
    };

    let has_key_query = parsed.query_pairs().any(|(k, _)| {
        let k = k.to_ascii_lowercase();
        k.contains("key") || k.contains("token") || k.contains("secret")
    });

    let masked_segments: Vec<String> = parsed
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(|s| {
                    let opaque = s.len() > 16
                        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
                    if opaque {
                        format!("{}...{}", &s[..3], &s[s.len() - 2..])
                    } else {
                        s.to_string()
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let mut out = format!(
        "{}://{}",
        parsed.scheme(),
        parsed.host_str().unwrap_or_default()
    );
    if let Some(port) = parsed.port() {
        out.push_str(&format!(":{}", port));
    }
    if !masked_segments.is_empty() {
        out.push('/');
        out.push_str(&masked_segments.join("/"));
    }
    if has_key_query {
        out.push_str("?...API_KEY_HIDDEN...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_key_query_parameters() {
        let masked = mask_provider_url("https://rpc.example.com/?apikey=supersecret123");
        assert!(!masked.contains("supersecret123"));
        assert!(masked.contains("API_KEY_HIDDEN"));
    }

    #[test]
    fn masks_opaque_path_segments() {
        let masked = mask_provider_url(
            "https://eth-mainnet.g.alchemy.com/v2/AbCdEfGhIjKlMnOpQrStUv123456",
        );
        assert!(!masked.contains("AbCdEfGhIjKlMnOpQrStUv123456"));
        assert!(masked.contains("v2"));
        assert!(masked.starts_with("https://eth-mainnet.g.alchemy.com/"));
    }

    #[test]
    fn leaves_plain_urls_alone() {
        assert_eq!(
            mask_provider_url("https://api.mainnet-beta.solana.com"),
            "https://api.mainnet-beta.solana.com"
        );
    }

    #[test]
    fn keeps_ports_visible() {
        assert_eq!(
            mask_provider_url("http://127.0.0.1:8545"),
            "http://127.0.0.1:8545"
        );
    }
}
