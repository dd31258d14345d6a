//! Gateway configuration from flags and environment.

use clap::Parser;

pub const DEFAULT_UPSTREAM: &str = "https://api.devnet.solana.com";

/// Command line and environment configuration of the gateway.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "counter-gateway",
    about = "JSON-RPC proxy and Actions server for the counter program"
)]
pub struct GatewayConfig {
    /// JSON-RPC endpoint that proxied requests are forwarded to.
    #[arg(long, env = "RPC_UPSTREAM", default_value = DEFAULT_UPSTREAM)]
    pub rpc_upstream: String,

    /// Helius API key appended to the upstream URL.
    #[arg(long, env = "HELIUS_API_KEY")]
    pub helius_api_key: Option<String>,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8787)]
    pub port: u16,
}

impl GatewayConfig {
    /// URL the proxy posts to: the upstream without a trailing slash, plus
    /// the API key query when one is configured.
    pub fn upstream_target(&self) -> String {
        let upstream = self.rpc_upstream.strip_suffix('/').unwrap_or(&self.rpc_upstream);
        match self.helius_api_key.as_deref().filter(|key| !key.is_empty()) {
            Some(key) => format!("{}/?api-key={}", upstream, key),
            None => upstream.to_string(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(upstream: &str, key: Option<&str>) -> GatewayConfig {
        GatewayConfig {
            rpc_upstream: upstream.to_string(),
            helius_api_key: key.map(str::to_string),
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }

    #[test]
    fn test_upstream_target() {
        assert_eq!(
            config("https://api.devnet.solana.com/", None).upstream_target(),
            "https://api.devnet.solana.com"
        );
        assert_eq!(
            config("https://devnet.helius-rpc.com/", Some("k")).upstream_target(),
            "https://devnet.helius-rpc.com/?api-key=k"
        );
        assert_eq!(
            config("https://rpc.example", Some("")).upstream_target(),
            "https://rpc.example"
        );
    }

    #[test]
    fn test_flags() {
        let config = GatewayConfig::parse_from([
            "counter-gateway",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--rpc-upstream",
            "https://rpc.example/",
        ]);
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert!(config.upstream_target().starts_with("https://rpc.example"));
    }
}
