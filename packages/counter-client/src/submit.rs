//! Transaction submission.
//!
//! A submission fetches a blockhash, lets the extra signers and the wallet
//! sign, sends the raw transaction and waits for it with a
//! [`ConfirmationPoller`] bounded by the blockhash's last valid block height.

use log::{error, info, warn};
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::confirm::{ConfirmationPoller, ConfirmationState, PollConfig};
use crate::errors::RpcError;
use crate::rpc::{Commitment, CounterRpc};
use crate::wallet::{WalletError, WalletSigner};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("transaction {signature} failed: {error}")]
    Failed { signature: Signature, error: String },
    #[error("transaction {signature} expired at block height {block_height}")]
    Expired {
        signature: Signature,
        block_height: u64,
    },
    #[error("transaction {signature} was not confirmed in time")]
    TimedOut { signature: Signature },
    #[error("confirmation of {signature} was cancelled")]
    Cancelled { signature: Signature },
}

impl SubmitError {
    /// Signature of the sent transaction, if it got that far.
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            SubmitError::Failed { signature, .. }
            | SubmitError::Expired { signature, .. }
            | SubmitError::TimedOut { signature }
            | SubmitError::Cancelled { signature } => Some(signature),
            _ => None,
        }
    }
}

/// A confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub signature: Signature,
    pub slot: u64,
}

/// Builds, signs, sends and confirms transactions.
#[derive(Clone)]
pub struct TransactionSubmitter {
    rpc: Arc<dyn CounterRpc>,
    poll: PollConfig,
}

impl TransactionSubmitter {
    pub fn new(rpc: Arc<dyn CounterRpc>, poll: PollConfig) -> Self {
        Self { rpc, poll }
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Submits `instructions` paid for by `wallet` and waits for confirmation.
    ///
    /// # Arguments
    ///
    /// * `instructions` - Instructions in execution order
    /// * `wallet` - Fee payer; signs last
    /// * `extra_signers` - Signers other than the wallet, such as a fresh
    ///   counter account
    /// * `cancel` - Stops the confirmation wait
    ///
    /// # Errors
    ///
    /// RPC and wallet errors before the send are returned as is. Once sent,
    /// every non-confirmed outcome carries the signature.
    pub async fn submit(
        &self,
        instructions: &[Instruction],
        wallet: &dyn WalletSigner,
        extra_signers: &[&dyn Signer],
        cancel: &CancellationToken,
    ) -> Result<SubmitReceipt, SubmitError> {
        let (blockhash, last_valid_block_height) =
            self.rpc.latest_blockhash(self.poll.commitment).await?;

        let payer = wallet.pubkey();
        let message = Message::new_with_blockhash(instructions, Some(&payer), &blockhash);
        let mut transaction = Transaction::new_unsigned(message);

        if !extra_signers.is_empty() {
            transaction
                .try_partial_sign(extra_signers, blockhash)
                .map_err(|e| SubmitError::Signing(e.to_string()))?;
        }

        let transaction = wallet.sign_transaction(transaction).await?;
        if !transaction.is_signed() {
            return Err(SubmitError::Signing(
                "transaction is missing required signatures".to_string(),
            ));
        }

        let signature = match self.rpc.send_transaction(&transaction).await {
            Ok(signature) => signature,
            Err(e) => {
                error!("Send failed: {}", e);
                self.log_simulation(&transaction).await;
                return Err(e.into());
            }
        };
        info!(
            "Sent {} (valid until block height {})",
            signature, last_valid_block_height
        );

        let mut poller = ConfirmationPoller::new(
            self.rpc.clone(),
            signature,
            Some(last_valid_block_height),
            self.poll.clone(),
        );
        let state = poller.run(cancel).await?;
        receipt_for(signature, state)
    }

    /// Re-simulates a transaction whose send failed and logs what the node says.
    async fn log_simulation(&self, transaction: &Transaction) {
        match self.rpc.simulate_transaction(transaction).await {
            Ok(report) => {
                error!(
                    "Simulation error: {}",
                    report.err.as_deref().unwrap_or("none")
                );
                for line in &report.logs {
                    error!("  {}", line);
                }
            }
            Err(e) => warn!("Simulation failed as well: {}", e),
        }
    }
}

/// Maps the poller's final state for `signature` onto a submission result.
pub(crate) fn receipt_for(
    signature: Signature,
    state: ConfirmationState,
) -> Result<SubmitReceipt, SubmitError> {
    match state {
        ConfirmationState::Confirmed { slot } => Ok(SubmitReceipt { signature, slot }),
        ConfirmationState::Failed { error } => Err(SubmitError::Failed { signature, error }),
        ConfirmationState::Expired { block_height } => Err(SubmitError::Expired {
            signature,
            block_height,
        }),
        ConfirmationState::Cancelled => Err(SubmitError::Cancelled { signature }),
        ConfirmationState::TimedOut | ConfirmationState::Pending => {
            Err(SubmitError::TimedOut { signature })
        }
    }
}

impl std::fmt::Debug for TransactionSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSubmitter")
            .field("poll", &self.poll)
            .finish()
    }
}

/// Builds an unsigned transaction around `instruction` for an external wallet.
///
/// Without a fee payer the message has no payer and requires no signatures;
/// the signing wallet has to set itself as payer before the transaction can
/// be sent.
pub async fn build_unsigned(
    rpc: &dyn CounterRpc,
    instruction: Instruction,
    fee_payer: Option<Pubkey>,
) -> Result<Transaction, RpcError> {
    let (blockhash, _) = rpc.latest_blockhash(Commitment::Confirmed).await?;
    let message = Message::new_with_blockhash(&[instruction], fee_payer.as_ref(), &blockhash);
    Ok(Transaction::new_unsigned(message))
}
