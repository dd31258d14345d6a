//! counter-client
//!
//! Rate-limited Solana RPC client for the devnet counter program.
//!
//! ## Features
//!
//! - Prioritized RPC endpoints with automatic failover
//! - Bounded-concurrency, paced FIFO request governor
//! - Exponential backoff for rate-limited calls
//! - Confirmation polling bounded by blockhash expiry
//! - Counter program instructions and account decoding
//!
//! ## Usage
//!
//! ```no_run
//! use counter_client::{ClientConfig, KeypairWallet};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let (client, _rpc) = config.counter_client()?;
//! let wallet = KeypairWallet::from_file(config.keypair_path())?;
//!
//! let counter = client.initialize(&wallet, &CancellationToken::new()).await?;
//! println!("value: {}", client.read(&counter.address).await?);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]

pub mod account;
mod client;
pub mod config;
pub mod confirm;
pub mod endpoints;
mod errors;
pub mod governor;
pub mod program;
pub mod retry;
pub mod rpc;
pub mod session;
pub mod submit;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types
pub use account::{decode_counter, CounterAccount, DecodeError};
pub use client::{CounterClient, CounterError, InitializedCounter, LAMPORTS_PER_SOL};
pub use config::{ClientConfig, ConfigError};
pub use confirm::{ConfirmationPoller, ConfirmationState, PollConfig};
pub use endpoints::{Endpoint, EndpointRegistry, EndpointStatus};
pub use errors::{classify_message, RpcError, RpcErrorCode};
pub use governor::{GovernorConfig, RequestGovernor};
pub use program::{CounterProgram, COUNTER_PROGRAM_ID};
pub use retry::RetryPolicy;
pub use rpc::{Commitment, CounterRpc, ResilientRpc, SolanaRpc};
pub use session::CounterSession;
pub use submit::{build_unsigned, SubmitError, SubmitReceipt, TransactionSubmitter};
pub use wallet::{KeypairWallet, WalletError, WalletSigner};
