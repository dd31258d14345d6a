//! HTTP server: routes, shared state and lifecycle.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{any, get};
use axum::Router;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use counter_client::{CounterProgram, CounterRpc};

use crate::actions;
use crate::proxy::{ProxyResponse, RpcProxy};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub proxy: RpcProxy,
    /// RPC used to fetch blockhashes for action transactions.
    pub rpc: Arc<dyn CounterRpc>,
    pub program: CounterProgram,
}

/// Builds the router with permissive CORS on every route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(method_not_allowed).post(proxy_rpc))
        .route("/api/solana", get(method_not_allowed).post(proxy_rpc))
        .route("/action/counter", get(actions::get_metadata))
        .route("/action/counter/tx", any(actions::build_transaction))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn proxy_rpc(State(state): State<AppState>, body: Bytes) -> ProxyResponse {
    state.proxy.forward(body).await
}

async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

/// Handle for managing the HTTP server lifecycle.
pub struct ServerHandle {
    shutdown_token: CancellationToken,
    task_handle: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Stops accepting connections, waits for in-flight requests and returns
    /// once the server has stopped.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        info!("Initiating server graceful shutdown");
        self.shutdown_token.cancel();
        self.task_handle.await??;
        Ok(())
    }

    /// Waits for the server to exit without asking it to stop.
    pub async fn wait(self) -> anyhow::Result<()> {
        self.task_handle.await??;
        Ok(())
    }
}

/// Binds `addr` and serves the gateway in a background task.
///
/// # Returns
///
/// The bound address (useful with port 0) and the lifecycle handle.
///
/// # Errors
///
/// Fails if the address cannot be bound.
pub async fn serve(
    addr: &str,
    state: AppState,
    shutdown_token: CancellationToken,
) -> anyhow::Result<(SocketAddr, ServerHandle)> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    let app = router(state);
    let server_token = shutdown_token.clone();
    let task_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(server_token.cancelled_owned())
            .await
    });

    info!("Gateway listening on http://{}", local_addr);
    Ok((
        local_addr,
        ServerHandle {
            shutdown_token,
            task_handle,
        },
    ))
}
