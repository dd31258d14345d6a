//! counter-gateway
//!
//! HTTP gateway for the counter program:
//!
//! - `POST /` and `POST /api/solana` proxy JSON-RPC to the upstream with
//!   retries on `503` and transport errors
//! - `GET /action/counter` and `/action/counter/tx` serve the increment
//!   action and its unsigned transaction

#![deny(clippy::all)]

pub mod actions;
pub mod config;
pub mod proxy;
pub mod server;

pub use config::GatewayConfig;
pub use proxy::{ProxyPolicy, ProxyResponse, RpcProxy};
pub use server::{router, serve, AppState, ServerHandle};
