// src/config.rs

use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};
use lazy_static::lazy_static;

lazy_static! {
    /// Public fallback endpoints, keyed network -> environment -> URL.
    /// Rate-limited; deployments should override via WEB3_PROVIDERS.
    pub static ref DEFAULT_PROVIDERS: HashMap<&'static str, HashMap<&'static str, &'static str>> = {
        let mut providers = HashMap::new();

        let mut ethereum = HashMap::new();
        ethereum.insert("mainnet", "https://eth-mainnet.public.blastapi.io");
        ethereum.insert("sepolia", "https://ethereum-sepolia.publicnode.com");
        providers.insert("ethereum", ethereum);

        let mut solana = HashMap::new();
        solana.insert("mainnet", "https://api.mainnet-beta.solana.com");
        solana.insert("devnet", "https://api.devnet.solana.com");
        providers.insert("solana", solana);

        providers
    };
}

// A struct to hold all configuration, loaded once at startup from the .env file.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    /// Provider endpoints keyed by network ("ethereum", "solana") and
    /// environment ("mainnet", "sepolia", "devnet", custom testnets).
    pub providers: HashMap<String, HashMap<String, String>>,

    // Connection settings
    pub connection_staleness_secs: u64,
    pub http_timeout_secs: u64,

    // IPFS settings
    pub ipfs_gateway_url: String,
    /// Local node API (e.g. http://127.0.0.1:5001); add/pin need this.
    pub ipfs_api_url: Option<String>,

    // Transaction settings
    pub default_gas_limit: u64,
}

impl Config {
    /// Returns the configured networks.
    pub fn supported_networks(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn is_network_supported(&self, network: &str) -> bool {
        self.providers.contains_key(network)
    }

    /// Endpoint URL for a (network, environment) pair, if configured.
    pub fn endpoint(&self, network: &str, environment: &str) -> Option<&String> {
        self.providers.get(network).and_then(|envs| envs.get(environment))
    }

    /// Environments configured for a network, for error messages.
    pub fn environments(&self, network: &str) -> Vec<String> {
        self.providers
            .get(network)
            .map(|envs| envs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        // Start from the built-in public endpoints and merge WEB3_PROVIDERS on top.
        let mut providers: HashMap<String, HashMap<String, String>> = DEFAULT_PROVIDERS
            .iter()
            .map(|(network, envs)| {
                (
                    network.to_string(),
                    envs.iter()
                        .map(|(env_name, url)| (env_name.to_string(), url.to_string()))
                        .collect(),
                )
            })
            .collect();

        if let Ok(overrides_str) = env::var("WEB3_PROVIDERS") {
            let overrides: HashMap<String, HashMap<String, String>> =
                serde_json::from_str(&overrides_str)
                    .context("WEB3_PROVIDERS must be a JSON map of network -> environment -> URL")?;
            for (network, envs) in overrides {
                providers.entry(network).or_default().extend(envs);
            }
        }

        Ok(Config {
            // Server settings
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,

            providers,

            // Connection settings
            connection_staleness_secs: env::var("CONNECTION_STALENESS_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("CONNECTION_STALENESS_SECS must be a valid number")?,
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("HTTP_TIMEOUT_SECS must be a valid number")?,

            // IPFS settings
            ipfs_gateway_url: env::var("IPFS_GATEWAY_URL")
                .unwrap_or_else(|_| "https://ipfs.io/ipfs/".to_string()),
            ipfs_api_url: env::var("IPFS_API_URL").ok(),

            // Transaction settings
            default_gas_limit: env::var("DEFAULT_GAS_LIMIT")
                .unwrap_or_else(|_| "250000".to_string())
                .parse()
                .context("DEFAULT_GAS_LIMIT must be a valid number")?,
        })
    }

    /// A config pointing every configured network at one endpoint. Test helper.
    pub fn with_single_endpoint(url: &str) -> Self {
        let mut providers = HashMap::new();
        let mut ethereum = HashMap::new();
        ethereum.insert("mainnet".to_string(), url.to_string());
        ethereum.insert("sepolia".to_string(), url.to_string());
        providers.insert("ethereum".to_string(), ethereum);
        let mut solana = HashMap::new();
        solana.insert("mainnet".to_string(), url.to_string());
        providers.insert("solana".to_string(), solana);

        Config {
            port: 0,
            providers,
            connection_staleness_secs: 60,
            http_timeout_secs: 5,
            ipfs_gateway_url: format!("{}/ipfs/", url.trim_end_matches('/')),
            ipfs_api_url: None,
            default_gas_limit: 250000,
        }
    }
}
