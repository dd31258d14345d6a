//! Single-endpoint backend built on `solana-client`.

use async_trait::async_trait;
use log::debug;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::RpcError as ClientRpcError;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::time::Duration;

use super::{Commitment, CounterRpc, SignatureStatus, SimulationReport};
use crate::errors::RpcError;

/// HTTP request timeout for a single RPC call.
const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl From<Commitment> for CommitmentConfig {
    fn from(commitment: Commitment) -> Self {
        match commitment {
            Commitment::Processed => CommitmentConfig::processed(),
            Commitment::Confirmed => CommitmentConfig::confirmed(),
            Commitment::Finalized => CommitmentConfig::finalized(),
        }
    }
}

/// Classify a `solana-client` error into an [`RpcError`].
///
/// Status codes and JSON-RPC codes are used when present; the message is
/// only consulted for errors that carry nothing else.
pub(crate) fn classify_client_error(err: ClientError) -> RpcError {
    let message = err.to_string();
    match err.kind() {
        ClientErrorKind::Reqwest(e) => {
            if let Some(status) = e.status() {
                RpcError::from_http_status(status.as_u16(), message)
            } else if e.is_timeout() {
                RpcError::Timeout(message)
            } else if e.is_connect() {
                RpcError::Transport(message)
            } else {
                RpcError::from_message(message)
            }
        }
        ClientErrorKind::Io(_) => RpcError::Transport(message),
        ClientErrorKind::RpcError(ClientRpcError::RpcResponseError {
            code,
            message: rpc_message,
            ..
        }) => RpcError::from_rpc_code(*code, rpc_message.clone()),
        ClientErrorKind::TransactionError(e) => RpcError::Transaction(format!("{:?}", e)),
        _ => RpcError::from_message(message),
    }
}

/// RPC backend bound to one endpoint URL.
pub struct SolanaRpc {
    url: String,
    client: RpcClient,
}

impl SolanaRpc {
    /// Creates a backend for `url` with `confirmed` as the default commitment.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let client = RpcClient::new_with_timeout_and_commitment(
            url.clone(),
            RPC_REQUEST_TIMEOUT,
            CommitmentConfig::confirmed(),
        );
        Self { url, client }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CounterRpc for SolanaRpc {
    async fn latest_blockhash(&self, commitment: Commitment) -> Result<(Hash, u64), RpcError> {
        self.client
            .get_latest_blockhash_with_commitment(commitment.into())
            .await
            .map_err(classify_client_error)
    }

    async fn block_height(&self, commitment: Commitment) -> Result<u64, RpcError> {
        self.client
            .get_block_height_with_commitment(commitment.into())
            .await
            .map_err(classify_client_error)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(classify_client_error)?;

        let status = response.value.into_iter().next().flatten().map(|status| {
            let commitment = if status.satisfies_commitment(CommitmentConfig::finalized()) {
                Commitment::Finalized
            } else if status.satisfies_commitment(CommitmentConfig::confirmed()) {
                Commitment::Confirmed
            } else {
                Commitment::Processed
            };
            SignatureStatus {
                slot: status.slot,
                commitment,
                err: status.err.as_ref().map(|e| format!("{:?}", e)),
            }
        });

        debug!("Signature {} status on {}: {:?}", signature, self.url, status);
        Ok(status)
    }

    async fn account_data(
        &self,
        pubkey: &Pubkey,
        commitment: Commitment,
    ) -> Result<Option<Vec<u8>>, RpcError> {
        let response = self
            .client
            .get_account_with_commitment(pubkey, commitment.into())
            .await
            .map_err(classify_client_error)?;
        Ok(response.value.map(|account| account.data))
    }

    async fn request_airdrop(&self, pubkey: &Pubkey, lamports: u64) -> Result<Signature, RpcError> {
        self.client
            .request_airdrop(pubkey, lamports)
            .await
            .map_err(classify_client_error)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        self.client
            .send_transaction(transaction)
            .await
            .map_err(classify_client_error)
    }

    async fn simulate_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<SimulationReport, RpcError> {
        let response = self
            .client
            .simulate_transaction(transaction)
            .await
            .map_err(classify_client_error)?;

        Ok(SimulationReport {
            err: response.value.err.as_ref().map(|e| format!("{:?}", e)),
            logs: response.value.logs.unwrap_or_default(),
            units_consumed: response.value.units_consumed,
        })
    }

    async fn version(&self) -> Result<String, RpcError> {
        self.client
            .get_version()
            .await
            .map(|v| v.solana_core)
            .map_err(classify_client_error)
    }
}

impl std::fmt::Debug for SolanaRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRpc").field("url", &self.url).finish()
    }
}
