//! CounterClient - high-level operations on counter accounts.
//!
//! Bundles the RPC stack, the program handle and the transaction submitter
//! so callers deal in counters and wallets instead of instructions.

use log::info;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::account::{decode_counter, DecodeError};
use crate::confirm::{confirm_signature, PollConfig};
use crate::errors::RpcError;
use crate::program::CounterProgram;
use crate::rpc::{Commitment, CounterRpc};
use crate::submit::{receipt_for, SubmitError, SubmitReceipt, TransactionSubmitter};
use crate::wallet::{WalletError, WalletSigner};

/// One SOL in lamports.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CounterError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("counter account {0} not found")]
    NotFound(Pubkey),
    #[error("no counter selected")]
    NoCounter,
}

/// A newly created counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializedCounter {
    pub address: Pubkey,
    pub receipt: SubmitReceipt,
}

/// High-level client for the counter program.
#[derive(Clone)]
pub struct CounterClient {
    /// RPC stack every call goes through.
    rpc: Arc<dyn CounterRpc>,
    /// Program deployment the instructions target.
    program: CounterProgram,
    /// Sends and confirms transactions.
    submitter: TransactionSubmitter,
    /// Commitment used when reading counters.
    read_commitment: Commitment,
}

impl CounterClient {
    /// Creates a client.
    ///
    /// # Arguments
    ///
    /// * `rpc` - RPC stack, usually a [`ResilientRpc`](crate::rpc::ResilientRpc)
    /// * `program` - Counter program deployment
    /// * `poll` - Confirmation parameters; its commitment is also used for reads
    pub fn new(rpc: Arc<dyn CounterRpc>, program: CounterProgram, poll: PollConfig) -> Self {
        let read_commitment = poll.commitment;
        Self {
            submitter: TransactionSubmitter::new(rpc.clone(), poll),
            rpc,
            program,
            read_commitment,
        }
    }

    pub fn rpc(&self) -> &Arc<dyn CounterRpc> {
        &self.rpc
    }

    pub fn program(&self) -> &CounterProgram {
        &self.program
    }

    /// Creates a counter at a fresh keypair address.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::Submit`] if the transaction is not confirmed.
    pub async fn initialize(
        &self,
        wallet: &dyn WalletSigner,
        cancel: &CancellationToken,
    ) -> Result<InitializedCounter, CounterError> {
        let counter = Keypair::new();
        let address = counter.pubkey();
        info!("Initializing counter {}", address);

        let ix = self.program.initialize(&address, &wallet.pubkey());
        let receipt = self
            .submitter
            .submit(&[ix], wallet, &[&counter], cancel)
            .await?;

        info!("Counter {} initialized in {}", address, receipt.signature);
        Ok(InitializedCounter { address, receipt })
    }

    /// Creates the program-derived counter.
    ///
    /// # Errors
    ///
    /// Fails on-chain if the derived counter already exists.
    pub async fn initialize_pda(
        &self,
        wallet: &dyn WalletSigner,
        cancel: &CancellationToken,
    ) -> Result<InitializedCounter, CounterError> {
        let (address, _) = self.program.counter_pda();
        info!("Initializing derived counter {}", address);

        let ix = self.program.initialize_pda(&wallet.pubkey());
        let receipt = self.submitter.submit(&[ix], wallet, &[], cancel).await?;
        Ok(InitializedCounter { address, receipt })
    }

    /// Increments `counter`; any wallet can pay.
    pub async fn increment(
        &self,
        wallet: &dyn WalletSigner,
        counter: &Pubkey,
        cancel: &CancellationToken,
    ) -> Result<SubmitReceipt, CounterError> {
        let ix = self.program.increment(counter);
        let receipt = self.submitter.submit(&[ix], wallet, &[], cancel).await?;
        info!("Counter {} incremented in {}", counter, receipt.signature);
        Ok(receipt)
    }

    /// Reads the current value of `counter`.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::NotFound`] if the account does not exist and
    /// [`CounterError::Decode`] if it is not a counter account.
    pub async fn read(&self, counter: &Pubkey) -> Result<u64, CounterError> {
        let data = self
            .rpc
            .account_data(counter, self.read_commitment)
            .await?
            .ok_or(CounterError::NotFound(*counter))?;
        Ok(decode_counter(&data)?)
    }

    /// Requests an airdrop to `recipient` and waits until it lands.
    pub async fn airdrop(
        &self,
        recipient: &Pubkey,
        lamports: u64,
        cancel: &CancellationToken,
    ) -> Result<Signature, CounterError> {
        info!("Requesting airdrop of {} lamports to {}", lamports, recipient);
        let signature = self.rpc.request_airdrop(recipient, lamports).await?;

        let state = confirm_signature(
            self.rpc.clone(),
            signature,
            self.submitter.poll_config().clone(),
            cancel,
        )
        .await?;
        Ok(receipt_for(signature, state)?.signature)
    }
}

impl std::fmt::Debug for CounterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterClient")
            .field("program", &self.program.program_id())
            .field("read_commitment", &self.read_commitment)
            .finish()
    }
}
