//! Wallet signing seam.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::Transaction;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("wallet not connected")]
    NotConnected,
    #[error("user rejected the request")]
    Rejected,
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("invalid keypair: {0}")]
    InvalidKeypair(String),
}

/// A wallet that can pay for and sign transactions.
///
/// The transaction handed to [`sign_transaction`](WalletSigner::sign_transaction)
/// already carries its blockhash, fee payer and any extra signatures.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    async fn sign_transaction(&self, transaction: Transaction) -> Result<Transaction, WalletError>;
}

/// Wallet backed by a local keypair.
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Loads a keypair file in the Solana CLI format (a JSON array of 64 bytes).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        read_keypair_file(path).map(Self::new)
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_transaction(
        &self,
        mut transaction: Transaction,
    ) -> Result<Transaction, WalletError> {
        let blockhash = transaction.message.recent_blockhash;
        transaction
            .try_partial_sign(&[&self.keypair], blockhash)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        Ok(transaction)
    }
}

impl std::fmt::Debug for KeypairWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairWallet")
            .field("pubkey", &self.keypair.pubkey())
            .finish()
    }
}

/// Reads a Solana CLI keypair file.
pub fn read_keypair_file(path: impl AsRef<Path>) -> Result<Keypair, WalletError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| WalletError::InvalidKeypair(format!("{}: {}", path.display(), e)))?;
    parse_keypair_json(&contents)
}

fn parse_keypair_json(contents: &str) -> Result<Keypair, WalletError> {
    let bytes: Vec<u8> = serde_json::from_str(contents)
        .map_err(|e| WalletError::InvalidKeypair(e.to_string()))?;
    Keypair::try_from(bytes.as_slice()).map_err(|e| WalletError::InvalidKeypair(e.to_string()))
}
