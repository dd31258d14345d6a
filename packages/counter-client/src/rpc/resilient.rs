//! Governor + retry + failover composition over per-endpoint backends.

use async_trait::async_trait;
use log::{info, warn};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Commitment, CounterRpc, SignatureStatus, SimulationReport, SolanaRpc};
use crate::endpoints::{Endpoint, EndpointRegistry, EndpointStatus};
use crate::errors::{RpcError, RpcErrorCode};
use crate::governor::RequestGovernor;
use crate::retry::RetryPolicy;

/// Builds the backend for one endpoint.
pub type RpcConnector = dyn Fn(&Endpoint) -> Arc<dyn CounterRpc>;

/// RPC client that sends every call through the request governor and the
/// retry policy, against the registry's current endpoint.
///
/// When a call fails in a way that implicates the endpoint (rate limited
/// past the retry budget, unavailable, unreachable), the endpoint is marked
/// failed and later calls move on to the next one.
pub struct ResilientRpc {
    registry: Mutex<EndpointRegistry>,
    /// Backend per endpoint URL.
    backends: HashMap<String, Arc<dyn CounterRpc>>,
    governor: Arc<RequestGovernor>,
    retry: RetryPolicy,
    /// Faucet used when the primary airdrop hits a project quota.
    faucet_fallback: Option<Arc<dyn CounterRpc>>,
}

impl ResilientRpc {
    /// Creates a client with one backend per registry endpoint.
    ///
    /// # Arguments
    ///
    /// * `registry` - Endpoints to fail over between
    /// * `connect` - Builds the backend for an endpoint
    /// * `governor` - Shared admission control for all calls
    /// * `retry` - Backoff policy for rate-limited calls
    pub fn new(
        registry: EndpointRegistry,
        connect: &RpcConnector,
        governor: Arc<RequestGovernor>,
        retry: RetryPolicy,
    ) -> Self {
        let backends = registry
            .endpoints()
            .iter()
            .map(|endpoint| (endpoint.url.clone(), connect(endpoint)))
            .collect();

        Self {
            registry: Mutex::new(registry),
            backends,
            governor,
            retry,
            faucet_fallback: None,
        }
    }

    /// Creates a client backed by [`SolanaRpc`] for every endpoint.
    pub fn connect(
        registry: EndpointRegistry,
        governor: Arc<RequestGovernor>,
        retry: RetryPolicy,
    ) -> Self {
        Self::new(
            registry,
            &|endpoint: &Endpoint| -> Arc<dyn CounterRpc> { Arc::new(SolanaRpc::new(&endpoint.url)) },
            governor,
            retry,
        )
    }

    /// Sets the faucet to use when airdrops on the current endpoint hit a quota.
    pub fn with_faucet_fallback(mut self, faucet: Arc<dyn CounterRpc>) -> Self {
        self.faucet_fallback = Some(faucet);
        self
    }

    pub fn governor(&self) -> &Arc<RequestGovernor> {
        &self.governor
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn endpoint_status(&self) -> EndpointStatus {
        self.registry().status()
    }

    /// Returns the endpoint the next call will use.
    pub fn current_endpoint(&self) -> Endpoint {
        self.registry().current().clone()
    }

    pub fn reset_endpoints(&self) {
        self.registry().reset();
    }

    /// Calls `getVersion` on the current endpoint and logs the result.
    ///
    /// Never fails; returns whether the endpoint answered.
    pub async fn health_check(&self) -> bool {
        let endpoint = self.current_endpoint();
        match self.version().await {
            Ok(version) => {
                info!(
                    "RPC endpoint {} ({}) is healthy, solana-core {}",
                    endpoint.name, endpoint.url, version
                );
                true
            }
            Err(e) => {
                warn!("RPC health check failed for {}: {}", endpoint.url, e);
                false
            }
        }
    }

    fn registry(&self) -> MutexGuard<'_, EndpointRegistry> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn select(&self) -> (String, Arc<dyn CounterRpc>) {
        let mut registry = self.registry();
        let url = registry.current().url.clone();
        let backend = self.backends[&url].clone();
        (url, backend)
    }

    /// Runs `op` against `backend` inside the governor, with retries.
    async fn run_on<T, F, Fut>(&self, backend: &Arc<dyn CounterRpc>, op: &F) -> Result<T, RpcError>
    where
        F: Fn(Arc<dyn CounterRpc>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, RpcError>> + Send,
        T: Send,
    {
        self.governor
            .submit(|| self.retry.run(|| op(backend.clone())))
            .await
    }

    /// Runs `op` against the current endpoint and updates failure marks.
    async fn call<T, F, Fut>(&self, method: &'static str, op: F) -> Result<T, RpcError>
    where
        F: Fn(Arc<dyn CounterRpc>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, RpcError>> + Send,
        T: Send,
    {
        let (url, backend) = self.select();
        let result = self.run_on(&backend, &op).await;

        if let Err(err) = &result {
            if err.code().marks_endpoint_failed() {
                warn!("{} failed on {} ({}): {}", method, url, err.code(), err);
                self.registry().mark_failed(&url);
            }
        }
        result
    }
}

#[async_trait]
impl CounterRpc for ResilientRpc {
    async fn latest_blockhash(&self, commitment: Commitment) -> Result<(Hash, u64), RpcError> {
        self.call("getLatestBlockhash", move |rpc| async move {
            rpc.latest_blockhash(commitment).await
        })
        .await
    }

    async fn block_height(&self, commitment: Commitment) -> Result<u64, RpcError> {
        self.call("getBlockHeight", move |rpc| async move {
            rpc.block_height(commitment).await
        })
        .await
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let signature = *signature;
        self.call("getSignatureStatuses", move |rpc| async move {
            rpc.signature_status(&signature).await
        })
        .await
    }

    async fn account_data(
        &self,
        pubkey: &Pubkey,
        commitment: Commitment,
    ) -> Result<Option<Vec<u8>>, RpcError> {
        let pubkey = *pubkey;
        self.call("getAccountInfo", move |rpc| async move {
            rpc.account_data(&pubkey, commitment).await
        })
        .await
    }

    async fn request_airdrop(&self, pubkey: &Pubkey, lamports: u64) -> Result<Signature, RpcError> {
        let pubkey = *pubkey;
        let op = move |rpc: Arc<dyn CounterRpc>| async move {
            rpc.request_airdrop(&pubkey, lamports).await
        };

        let primary = self.call("requestAirdrop", op).await;
        let primary_err = match primary {
            Err(err) if err.code() == RpcErrorCode::QuotaExceeded => err,
            other => return other,
        };
        let Some(faucet) = &self.faucet_fallback else {
            return Err(primary_err);
        };

        info!("Airdrop quota exceeded ({}), trying fallback faucet", primary_err);
        match self.run_on(faucet, &op).await {
            Ok(signature) => Ok(signature),
            Err(fallback_err) => {
                warn!("Fallback faucet failed as well: {}", fallback_err);
                Err(primary_err)
            }
        }
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        let transaction = transaction.clone();
        self.call("sendTransaction", move |rpc| {
            let transaction = transaction.clone();
            async move { rpc.send_transaction(&transaction).await }
        })
        .await
    }

    async fn simulate_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<SimulationReport, RpcError> {
        let transaction = transaction.clone();
        self.call("simulateTransaction", move |rpc| {
            let transaction = transaction.clone();
            async move { rpc.simulate_transaction(&transaction).await }
        })
        .await
    }

    async fn version(&self) -> Result<String, RpcError> {
        self.call("getVersion", |rpc| async move { rpc.version().await })
            .await
    }
}

impl std::fmt::Debug for ResilientRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientRpc")
            .field("endpoints", &self.backends.len())
            .field("governor", &self.governor)
            .field("retry", &self.retry)
            .finish()
    }
}
