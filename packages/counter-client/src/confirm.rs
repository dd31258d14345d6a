//! Confirmation poller.
//!
//! Waits for a submitted transaction to reach a target commitment by polling
//! its signature status, while watching the block height so a transaction
//! whose blockhash has expired is reported as such instead of being polled
//! until the wall-clock timeout.

use log::{debug, warn};
use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::RpcError;
use crate::rpc::{Commitment, CounterRpc};

/// Polling parameters.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Gap between two status queries.
    pub poll_interval: Duration,
    /// Minimum gap between two block height queries.
    pub block_height_check_interval: Duration,
    /// Wall-clock budget for the whole wait.
    pub timeout: Duration,
    /// Commitment the transaction must reach.
    pub commitment: Commitment,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            block_height_check_interval: Duration::from_millis(3000),
            timeout: Duration::from_secs(180),
            commitment: Commitment::Confirmed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationState {
    Pending,
    Confirmed { slot: u64 },
    /// Landed with an on-chain execution error.
    Failed { error: String },
    /// The chain moved past the blockhash's last valid height.
    Expired { block_height: u64 },
    TimedOut,
    Cancelled,
}

impl ConfirmationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConfirmationState::Pending)
    }
}

/// Poll state machine for one signature.
///
/// [`step`](Self::step) performs one tick; [`run`](Self::run) drives ticks
/// until a terminal state or cancellation.
pub struct ConfirmationPoller {
    rpc: Arc<dyn CounterRpc>,
    signature: Signature,
    last_valid_block_height: Option<u64>,
    config: PollConfig,
    started: Instant,
    last_height_check: Option<Instant>,
    state: ConfirmationState,
}

impl ConfirmationPoller {
    /// Creates a poller; the timeout clock starts now.
    ///
    /// Without `last_valid_block_height` the expiry check is skipped and only
    /// the timeout bounds the wait.
    pub fn new(
        rpc: Arc<dyn CounterRpc>,
        signature: Signature,
        last_valid_block_height: Option<u64>,
        config: PollConfig,
    ) -> Self {
        Self {
            rpc,
            signature,
            last_valid_block_height,
            config,
            started: Instant::now(),
            last_height_check: None,
            state: ConfirmationState::Pending,
        }
    }

    pub fn state(&self) -> &ConfirmationState {
        &self.state
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Performs one poll tick.
    ///
    /// # Errors
    ///
    /// Returns the query error when a status or block height query fails in a
    /// way that is not transient. Transient failures leave the state `Pending`.
    pub async fn step(&mut self) -> Result<ConfirmationState, RpcError> {
        if self.state.is_terminal() {
            return Ok(self.state.clone());
        }

        if let Some(block_height) = self.check_expiry().await? {
            return Ok(self.finish(ConfirmationState::Expired { block_height }));
        }

        match self.rpc.signature_status(&self.signature).await {
            Ok(Some(status)) => {
                if let Some(error) = status.err {
                    return Ok(self.finish(ConfirmationState::Failed { error }));
                }
                if status.commitment.satisfies(self.config.commitment) {
                    return Ok(self.finish(ConfirmationState::Confirmed { slot: status.slot }));
                }
                debug!(
                    "{} at {}, waiting for {}",
                    self.signature, status.commitment, self.config.commitment
                );
            }
            Ok(None) => debug!("{} not seen yet", self.signature),
            Err(e) if e.is_transient() => {
                warn!("Status query for {} failed, will poll again: {}", self.signature, e)
            }
            Err(e) => return Err(e),
        }

        if self.started.elapsed() > self.config.timeout {
            return Ok(self.finish(ConfirmationState::TimedOut));
        }
        Ok(ConfirmationState::Pending)
    }

    /// Polls until the transaction reaches a terminal state.
    ///
    /// Cancelling `cancel` interrupts both an in-flight tick and the wait
    /// between ticks, and yields [`ConfirmationState::Cancelled`].
    ///
    /// # Errors
    ///
    /// Propagates non-transient query errors from [`step`](Self::step).
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<ConfirmationState, RpcError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(self.finish(ConfirmationState::Cancelled));
            }

            let state = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                state = self.step() => Some(state?),
            };
            let state = match state {
                Some(state) => state,
                None => return Ok(self.finish(ConfirmationState::Cancelled)),
            };
            if state.is_terminal() {
                return Ok(state);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(self.finish(ConfirmationState::Cancelled)),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Returns the current block height if it is past the last valid one.
    async fn check_expiry(&mut self) -> Result<Option<u64>, RpcError> {
        let Some(last_valid) = self.last_valid_block_height else {
            return Ok(None);
        };
        let due = self
            .last_height_check
            .map_or(true, |at| at.elapsed() >= self.config.block_height_check_interval);
        if !due {
            return Ok(None);
        }

        self.last_height_check = Some(Instant::now());
        match self.rpc.block_height(self.config.commitment).await {
            Ok(height) if height > last_valid => Ok(Some(height)),
            Ok(_) => Ok(None),
            Err(e) if e.is_transient() => {
                warn!("Block height query failed, will check again: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn finish(&mut self, state: ConfirmationState) -> ConfirmationState {
        match &state {
            ConfirmationState::Confirmed { slot } => {
                debug!("{} confirmed in slot {}", self.signature, slot)
            }
            ConfirmationState::Cancelled => debug!("Confirmation of {} cancelled", self.signature),
            other => warn!("Confirmation of {} ended: {:?}", self.signature, other),
        }
        self.state = state.clone();
        state
    }
}

/// Waits for `signature` without a block height expiry check.
pub async fn confirm_signature(
    rpc: Arc<dyn CounterRpc>,
    signature: Signature,
    config: PollConfig,
    cancel: &CancellationToken,
) -> Result<ConfirmationState, RpcError> {
    ConfirmationPoller::new(rpc, signature, None, config)
        .run(cancel)
        .await
}

impl std::fmt::Debug for ConfirmationPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationPoller")
            .field("signature", &self.signature)
            .field("last_valid_block_height", &self.last_valid_block_height)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::SignatureStatus;
    use crate::testing::{FakeRpc, FAKE_LAST_VALID_BLOCK_HEIGHT};

    fn confirmed(slot: u64) -> Result<Option<SignatureStatus>, RpcError> {
        Ok(Some(SignatureStatus {
            slot,
            commitment: Commitment::Confirmed,
            err: None,
        }))
    }

    fn poller(rpc: &Arc<FakeRpc>, last_valid: Option<u64>, config: PollConfig) -> ConfirmationPoller {
        ConfirmationPoller::new(rpc.clone(), Signature::default(), last_valid, config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_on_third_poll() {
        let rpc = Arc::new(FakeRpc::new());
        rpc.push_status(Ok(None));
        rpc.push_status(Ok(None));
        rpc.push_status(confirmed(42));

        let started = Instant::now();
        let state = poller(&rpc, None, PollConfig::default())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state, ConfirmationState::Confirmed { slot: 42 });
        assert_eq!(rpc.calls("getSignatureStatuses"), 3);
        assert_eq!(rpc.calls("getBlockHeight"), 0);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_processed_is_not_enough() {
        let rpc = Arc::new(FakeRpc::new());
        rpc.push_status(Ok(Some(SignatureStatus {
            slot: 9,
            commitment: Commitment::Processed,
            err: None,
        })));
        rpc.push_status(confirmed(10));

        let mut poller = poller(&rpc, None, PollConfig::default());
        assert_eq!(poller.step().await.unwrap(), ConfirmationState::Pending);
        assert_eq!(
            poller.step().await.unwrap(),
            ConfirmationState::Confirmed { slot: 10 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_when_block_height_passes_last_valid() {
        let rpc = Arc::new(FakeRpc::new());
        rpc.push_block_height(101);

        let state = poller(&rpc, Some(100), PollConfig::default())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state, ConfirmationState::Expired { block_height: 101 });
        assert_eq!(rpc.calls("getSignatureStatuses"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_height_checks_are_throttled() {
        let rpc = Arc::new(FakeRpc::new());
        rpc.push_block_height(50);
        rpc.push_block_height(101);

        let state = poller(&rpc, Some(100), PollConfig::default())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        // Heights are checked at 0s and 3s; statuses at 0s, 1s and 2s.
        assert_eq!(state, ConfirmationState::Expired { block_height: 101 });
        assert_eq!(rpc.calls("getBlockHeight"), 2);
        assert_eq!(rpc.calls("getSignatureStatuses"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let rpc = Arc::new(FakeRpc::new());
        let config = PollConfig {
            timeout: Duration::from_millis(5500),
            ..PollConfig::default()
        };

        let state = poller(&rpc, None, config)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state, ConfirmationState::TimedOut);
        assert_eq!(rpc.calls("getSignatureStatuses"), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_chain_error_fails() {
        let rpc = Arc::new(FakeRpc::new());
        rpc.push_status(Ok(Some(SignatureStatus {
            slot: 7,
            commitment: Commitment::Confirmed,
            err: Some("InstructionError(0, Custom(1))".to_string()),
        })));

        let state = poller(&rpc, Some(FAKE_LAST_VALID_BLOCK_HEIGHT), PollConfig::default())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            state,
            ConfirmationState::Failed {
                error: "InstructionError(0, Custom(1))".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_query_error_keeps_polling() {
        let rpc = Arc::new(FakeRpc::new());
        rpc.push_status(Err(RpcError::Unavailable("503".to_string())));
        rpc.push_status(confirmed(3));

        let state = poller(&rpc, None, PollConfig::default())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state, ConfirmationState::Confirmed { slot: 3 });
        assert_eq!(rpc.calls("getSignatureStatuses"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_query_error_aborts() {
        let rpc = Arc::new(FakeRpc::new());
        let err = RpcError::Rpc {
            code: -32602,
            message: "invalid signature".to_string(),
        };
        rpc.push_status(Err(err.clone()));

        let result = poller(&rpc, None, PollConfig::default())
            .run(&CancellationToken::new())
            .await;

        assert_eq!(result, Err(err));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_the_loop() {
        let rpc = Arc::new(FakeRpc::new());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            canceller.cancel();
        });

        let mut poller = poller(&rpc, None, PollConfig::default());
        let state = poller.run(&cancel).await.unwrap();

        assert_eq!(state, ConfirmationState::Cancelled);
        assert_eq!(poller.state(), &ConfirmationState::Cancelled);
        assert_eq!(rpc.calls("getSignatureStatuses"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_token_makes_no_queries() {
        let rpc = Arc::new(FakeRpc::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let state = confirm_signature(
            rpc.clone(),
            Signature::default(),
            PollConfig::default(),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(state, ConfirmationState::Cancelled);
        assert_eq!(rpc.calls("getSignatureStatuses"), 0);
    }
}
