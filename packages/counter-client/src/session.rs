//! Headless counter session.
//!
//! Holds what a counter UI shows (connected wallet, active counter, its last
//! value) and reduces every outcome to a short status line.

use log::{error, info};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::client::{CounterClient, CounterError};
use crate::wallet::{WalletError, WalletSigner};

pub const STATUS_INITIALIZING: &str = "Creating new counter...";
pub const STATUS_INITIALIZED: &str = "Counter initialized!";
pub const STATUS_INCREMENTING: &str = "Incrementing counter...";
pub const STATUS_INCREMENTED: &str = "Counter incremented!";
pub const STATUS_AIRDROP_REQUESTED: &str = "Requesting airdrop on Devnet...";
pub const STATUS_AIRDROP_COMPLETE: &str = "Airdrop complete!";

pub struct CounterSession {
    client: CounterClient,
    wallet: Option<Arc<dyn WalletSigner>>,
    counter: Option<Pubkey>,
    value: Option<u64>,
    status: String,
    cancel: CancellationToken,
}

impl CounterSession {
    pub fn new(client: CounterClient) -> Self {
        Self {
            client,
            wallet: None,
            counter: None,
            value: None,
            status: String::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn connect(&mut self, wallet: Arc<dyn WalletSigner>) {
        info!("Wallet connected: {}", wallet.pubkey());
        self.wallet = Some(wallet);
    }

    pub fn disconnect(&mut self) {
        self.wallet = None;
    }

    pub fn wallet(&self) -> Option<Pubkey> {
        self.wallet.as_ref().map(|wallet| wallet.pubkey())
    }

    /// Address of the active counter.
    pub fn counter(&self) -> Option<Pubkey> {
        self.counter
    }

    /// Last value read for the active counter.
    pub fn value(&self) -> Option<u64> {
        self.value
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Token that aborts confirmation waits of this session.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Switches to an existing counter and reads its value.
    pub async fn open(&mut self, counter: Pubkey) -> Result<u64, CounterError> {
        self.counter = Some(counter);
        self.value = None;
        self.refresh().await
    }

    /// Creates a counter at a fresh address and makes it active.
    pub async fn initialize(&mut self) -> Result<Pubkey, CounterError> {
        let wallet = self.require_wallet()?;
        self.set_status(STATUS_INITIALIZING);

        let result = self.client.initialize(wallet.as_ref(), &self.cancel).await;
        let created = self.settle("Initialize", result)?;

        self.counter = Some(created.address);
        self.value = Some(0);
        self.set_status(STATUS_INITIALIZED);
        Ok(created.address)
    }

    /// Creates the program-derived counter and makes it active.
    pub async fn initialize_pda(&mut self) -> Result<Pubkey, CounterError> {
        let wallet = self.require_wallet()?;
        self.set_status(STATUS_INITIALIZING);

        let result = self
            .client
            .initialize_pda(wallet.as_ref(), &self.cancel)
            .await;
        let created = self.settle("Initialize", result)?;

        self.counter = Some(created.address);
        self.value = Some(0);
        self.set_status(STATUS_INITIALIZED);
        Ok(created.address)
    }

    /// Increments the active counter and reads back the new value.
    pub async fn increment(&mut self) -> Result<u64, CounterError> {
        let wallet = self.require_wallet()?;
        let Some(counter) = self.counter else {
            return self.settle("Increment", Err(CounterError::NoCounter));
        };
        self.set_status(STATUS_INCREMENTING);

        let result = self
            .client
            .increment(wallet.as_ref(), &counter, &self.cancel)
            .await;
        self.settle("Increment", result)?;

        let value = self.refresh().await?;
        self.set_status(STATUS_INCREMENTED);
        Ok(value)
    }

    /// Airdrops `lamports` to the connected wallet.
    pub async fn airdrop(&mut self, lamports: u64) -> Result<(), CounterError> {
        let wallet = self.require_wallet()?;
        self.set_status(STATUS_AIRDROP_REQUESTED);

        let result = self
            .client
            .airdrop(&wallet.pubkey(), lamports, &self.cancel)
            .await;
        self.settle("Airdrop", result)?;
        self.set_status(STATUS_AIRDROP_COMPLETE);
        Ok(())
    }

    /// Re-reads the active counter.
    pub async fn refresh(&mut self) -> Result<u64, CounterError> {
        let Some(counter) = self.counter else {
            return Err(CounterError::NoCounter);
        };
        let result = self.client.read(&counter).await;
        let value = self.settle("Read", result)?;
        self.value = Some(value);
        Ok(value)
    }

    fn require_wallet(&mut self) -> Result<Arc<dyn WalletSigner>, CounterError> {
        match &self.wallet {
            Some(wallet) => Ok(wallet.clone()),
            None => self.settle("Wallet", Err(WalletError::NotConnected.into())),
        }
    }

    /// Logs a failure and reduces it to the status line.
    fn settle<T>(&mut self, action: &str, result: Result<T, CounterError>) -> Result<T, CounterError> {
        if let Err(e) = &result {
            error!("{} error: {}", action, e);
            self.set_status(format!("Error: {}", e));
        }
        result
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        info!("{}", self.status);
    }
}

impl std::fmt::Debug for CounterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterSession")
            .field("wallet", &self.wallet())
            .field("counter", &self.counter)
            .field("value", &self.value)
            .field("status", &self.status)
            .finish()
    }
}
