//! RPC access for the counter client.
//!
//! [`CounterRpc`] is the seam every component talks to:
//!
//! - [`SolanaRpc`] talks to a single JSON-RPC endpoint via `solana-client`
//!   and classifies its failures into [`RpcError`].
//! - [`ResilientRpc`] routes each call through the request governor and the
//!   retry policy, and fails over between endpoints.

mod resilient;
mod solana;

pub use resilient::{ResilientRpc, RpcConnector};
pub use solana::SolanaRpc;

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::fmt;
use std::str::FromStr;

use crate::errors::RpcError;

/// Finality tier of a transaction or a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }

    /// Whether a status at this level satisfies a `target` level.
    pub fn satisfies(&self, target: Commitment) -> bool {
        *self >= target
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(format!("unknown commitment level: {}", other)),
        }
    }
}

/// Status of a submitted transaction as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    /// Highest commitment level the transaction has reached.
    pub commitment: Commitment,
    /// On-chain execution error, if the transaction failed.
    pub err: Option<String>,
}

/// Outcome of a transaction simulation, kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

/// The RPC methods the counter client needs.
#[async_trait]
pub trait CounterRpc: Send + Sync {
    /// Returns a recent blockhash and the last block height at which it is valid.
    async fn latest_blockhash(&self, commitment: Commitment) -> Result<(Hash, u64), RpcError>;

    async fn block_height(&self, commitment: Commitment) -> Result<u64, RpcError>;

    /// Returns `None` while the node has not seen the signature.
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError>;

    /// Returns the raw account data, or `None` if the account does not exist.
    async fn account_data(
        &self,
        pubkey: &Pubkey,
        commitment: Commitment,
    ) -> Result<Option<Vec<u8>>, RpcError>;

    async fn request_airdrop(&self, pubkey: &Pubkey, lamports: u64) -> Result<Signature, RpcError>;

    /// Submits a signed transaction without waiting for confirmation.
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError>;

    async fn simulate_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<SimulationReport, RpcError>;

    /// Returns the node's software version.
    async fn version(&self) -> Result<String, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_ordering() {
        assert!(Commitment::Finalized.satisfies(Commitment::Confirmed));
        assert!(Commitment::Confirmed.satisfies(Commitment::Confirmed));
        assert!(!Commitment::Processed.satisfies(Commitment::Confirmed));
        assert!(!Commitment::Confirmed.satisfies(Commitment::Finalized));
    }

    #[test]
    fn test_commitment_parse() {
        assert_eq!("Finalized".parse::<Commitment>(), Ok(Commitment::Finalized));
        assert!("recent".parse::<Commitment>().is_err());
    }
}
