//! Client configuration.
//!
//! Read once from the environment at startup:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `COUNTER_RPC_URL` | Preferred custom RPC endpoint |
//! | `COUNTER_HELIUS_API_KEY` | Helius devnet endpoint, as a bare key or a full URL |
//! | `COUNTER_WS_URL` | WebSocket endpoint (default `wss://api.devnet.solana.com`) |
//! | `COUNTER_PROGRAM_ID` | Counter program override |
//! | `COUNTER_KEYPAIR` | Keypair file of the paying wallet |

use log::info;
use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::client::CounterClient;
use crate::confirm::PollConfig;
use crate::endpoints::{Endpoint, EndpointError, EndpointRegistry};
use crate::governor::{GovernorConfig, RequestGovernor};
use crate::program::{CounterProgram, COUNTER_PROGRAM_ID};
use crate::retry::RetryPolicy;
use crate::rpc::{ResilientRpc, SolanaRpc};

/// Public devnet JSON-RPC endpoint; also the fallback faucet.
pub const SOLANA_DEVNET_URL: &str = "https://api.devnet.solana.com";

/// The cluster's default devnet URL.
pub const CLUSTER_DEVNET_URL: &str = "https://api.devnet.solana.com";

pub const DEFAULT_WS_URL: &str = "wss://api.devnet.solana.com";

const HELIUS_DEVNET_URL: &str = "https://devnet.helius-rpc.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid program id {0:?}")]
    InvalidProgramId(String),
    #[error(transparent)]
    Endpoints(#[from] EndpointError),
}

/// Everything needed to build the client stack.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub rpc_url: Option<String>,
    pub helius_api_key: Option<String>,
    pub ws_url: String,
    pub program_id: Pubkey,
    pub keypair_path: Option<PathBuf>,
    pub governor: GovernorConfig,
    pub retry: RetryPolicy,
    pub poll: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            helius_api_key: None,
            ws_url: DEFAULT_WS_URL.to_string(),
            program_id: COUNTER_PROGRAM_ID,
            keypair_path: None,
            governor: GovernorConfig::default(),
            retry: RetryPolicy::default(),
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let program_id = match var("COUNTER_PROGRAM_ID") {
            Some(id) => Pubkey::from_str(&id).map_err(|_| ConfigError::InvalidProgramId(id))?,
            None => COUNTER_PROGRAM_ID,
        };

        Ok(Self {
            rpc_url: var("COUNTER_RPC_URL"),
            helius_api_key: var("COUNTER_HELIUS_API_KEY"),
            ws_url: var("COUNTER_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string()),
            program_id,
            keypair_path: var("COUNTER_KEYPAIR").map(PathBuf::from),
            ..Self::default()
        })
    }

    /// Endpoint list in priority order: custom, Helius, public devnet and
    /// the cluster default.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints = Vec::new();
        if let Some(url) = &self.rpc_url {
            endpoints.push(Endpoint::new(url, "Custom RPC", 0));
        }
        if let Some(key) = &self.helius_api_key {
            endpoints.push(Endpoint::new(helius_url(key), "Helius", 1));
        }
        endpoints.push(Endpoint::new(SOLANA_DEVNET_URL, "Solana Labs Devnet", 2));
        endpoints.push(Endpoint::new(CLUSTER_DEVNET_URL, "Default Devnet", 3));
        endpoints
    }

    /// Keypair file to pay with; defaults to the Solana CLI wallet.
    pub fn keypair_path(&self) -> PathBuf {
        self.keypair_path.clone().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/solana/id.json")
        })
    }

    /// Builds the resilient RPC stack with the public faucet as airdrop fallback.
    pub fn connect(&self) -> Result<ResilientRpc, ConfigError> {
        let registry = EndpointRegistry::new(self.endpoints())?;
        let governor = Arc::new(RequestGovernor::new(self.governor.clone()));

        let rpc = ResilientRpc::connect(registry, governor, self.retry.clone())
            .with_faucet_fallback(Arc::new(SolanaRpc::new(SOLANA_DEVNET_URL)));
        let status = rpc.endpoint_status();
        info!(
            "RPC stack ready: {} endpoints, using {}",
            status.total, status.current
        );
        Ok(rpc)
    }

    /// Builds a [`CounterClient`] on top of [`connect`](Self::connect).
    pub fn counter_client(&self) -> Result<(CounterClient, Arc<ResilientRpc>), ConfigError> {
        let rpc = Arc::new(self.connect()?);
        let client = CounterClient::new(
            rpc.clone(),
            CounterProgram::new(self.program_id),
            self.poll.clone(),
        );
        Ok((client, rpc))
    }
}

/// Expands a Helius API key into the devnet URL; full URLs pass through.
pub fn helius_url(key_or_url: &str) -> String {
    if key_or_url.starts_with("http://") || key_or_url.starts_with("https://") {
        key_or_url.to_string()
    } else {
        format!("{}/?api-key={}", HELIUS_DEVNET_URL, key_or_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.program_id, COUNTER_PROGRAM_ID);
        assert_eq!(config.ws_url, DEFAULT_WS_URL);

        let mut registry = EndpointRegistry::new(config.endpoints()).unwrap();
        assert_eq!(registry.endpoints().len(), 1);
        assert_eq!(registry.current().name, "Solana Labs Devnet");
    }

    #[test]
    fn test_full_endpoint_list() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("COUNTER_RPC_URL", "https://rpc.example"),
            ("COUNTER_HELIUS_API_KEY", "abc123"),
        ]))
        .unwrap();

        let registry = EndpointRegistry::new(config.endpoints()).unwrap();
        let urls: Vec<&str> = registry.endpoints().iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://rpc.example",
                "https://devnet.helius-rpc.com/?api-key=abc123",
                SOLANA_DEVNET_URL,
            ]
        );
    }

    #[test]
    fn test_helius_full_url_passes_through() {
        assert_eq!(
            helius_url("https://mainnet.helius-rpc.com/?api-key=k"),
            "https://mainnet.helius-rpc.com/?api-key=k"
        );
        assert_eq!(helius_url("k"), "https://devnet.helius-rpc.com/?api-key=k");
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("COUNTER_RPC_URL", "  "),
            ("COUNTER_WS_URL", ""),
        ]))
        .unwrap();
        assert_eq!(config.rpc_url, None);
        assert_eq!(config.ws_url, DEFAULT_WS_URL);
    }

    #[test]
    fn test_invalid_program_id() {
        let result = ClientConfig::from_lookup(lookup(&[("COUNTER_PROGRAM_ID", "nope")]));
        assert!(matches!(result, Err(ConfigError::InvalidProgramId(_))));
    }

    #[test]
    fn test_keypair_override() {
        let config =
            ClientConfig::from_lookup(lookup(&[("COUNTER_KEYPAIR", "/tmp/wallet.json")])).unwrap();
        assert_eq!(config.keypair_path(), PathBuf::from("/tmp/wallet.json"));
    }
}
