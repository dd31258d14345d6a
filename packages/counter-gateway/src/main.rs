//! counter-gateway binary.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use counter_client::{ClientConfig, CounterProgram};
use counter_gateway::{serve, AppState, GatewayConfig, ProxyPolicy, RpcProxy};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = GatewayConfig::parse();
    let target = config.upstream_target();
    info!("Proxying JSON-RPC to {}", config.rpc_upstream);

    // Action transactions fetch blockhashes through the client's RPC stack
    let client_config = ClientConfig::from_env().context("Invalid client configuration")?;
    let rpc = Arc::new(client_config.connect().context("Failed to build RPC client")?);
    rpc.health_check().await;

    let state = AppState {
        proxy: RpcProxy::new(target, ProxyPolicy::default())
            .context("Failed to create HTTP client")?,
        rpc,
        program: CounterProgram::new(client_config.program_id),
    };

    let (_, handle) = serve(&config.bind_addr(), state, CancellationToken::new())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    handle.shutdown().await
}
