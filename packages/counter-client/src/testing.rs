//! In-memory chain used by the unit tests.

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::account::CounterAccount;
use crate::errors::RpcError;
use crate::program::{COUNTER_PROGRAM_ID, INCREMENT_DISCRIMINATOR, INITIALIZE_DISCRIMINATOR};
use crate::rpc::{Commitment, CounterRpc, SignatureStatus, SimulationReport};

pub(crate) const FAKE_LAST_VALID_BLOCK_HEIGHT: u64 = 1_000;

struct FakeState {
    blockhash: Hash,
    last_valid_block_height: u64,
    block_height: u64,
    block_heights: VecDeque<u64>,
    blockhash_errors: VecDeque<RpcError>,
    statuses: VecDeque<Result<Option<SignatureStatus>, RpcError>>,
    landed: HashMap<Signature, SignatureStatus>,
    accounts: HashMap<Pubkey, Vec<u8>>,
    send_errors: VecDeque<RpcError>,
    airdrop_results: VecDeque<Result<Signature, RpcError>>,
    simulation: SimulationReport,
    sent: Vec<Transaction>,
    calls: HashMap<&'static str, usize>,
    auto_confirm: bool,
    slot: u64,
    seq: u64,
}

/// Fake node that executes the counter program on submitted transactions.
///
/// Sent transactions land immediately at `confirmed` unless auto-confirm is
/// turned off. Scripted responses are consumed before the default behavior.
pub(crate) struct FakeRpc {
    state: Mutex<FakeState>,
}

impl FakeRpc {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                blockhash: Hash::new_from_array([7u8; 32]),
                last_valid_block_height: FAKE_LAST_VALID_BLOCK_HEIGHT,
                block_height: 10,
                block_heights: VecDeque::new(),
                blockhash_errors: VecDeque::new(),
                statuses: VecDeque::new(),
                landed: HashMap::new(),
                accounts: HashMap::new(),
                send_errors: VecDeque::new(),
                airdrop_results: VecDeque::new(),
                simulation: SimulationReport::default(),
                sent: Vec::new(),
                calls: HashMap::new(),
                auto_confirm: true,
                slot: 100,
                seq: 0,
            }),
        }
    }

    pub fn blockhash(&self) -> Hash {
        self.state.lock().unwrap().blockhash
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().unwrap().calls.get(method).copied().unwrap_or(0)
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn set_auto_confirm(&self, auto_confirm: bool) {
        self.state.lock().unwrap().auto_confirm = auto_confirm;
    }

    pub fn set_last_valid_block_height(&self, height: u64) {
        self.state.lock().unwrap().last_valid_block_height = height;
    }

    pub fn set_simulation(&self, report: SimulationReport) {
        self.state.lock().unwrap().simulation = report;
    }

    pub fn set_account(&self, pubkey: Pubkey, data: Vec<u8>) {
        self.state.lock().unwrap().accounts.insert(pubkey, data);
    }

    pub fn push_block_height(&self, height: u64) {
        self.state.lock().unwrap().block_heights.push_back(height);
    }

    pub fn push_blockhash_error(&self, err: RpcError) {
        self.state.lock().unwrap().blockhash_errors.push_back(err);
    }

    pub fn push_status(&self, status: Result<Option<SignatureStatus>, RpcError>) {
        self.state.lock().unwrap().statuses.push_back(status);
    }

    pub fn push_send_error(&self, err: RpcError) {
        self.state.lock().unwrap().send_errors.push_back(err);
    }

    pub fn push_airdrop_result(&self, result: Result<Signature, RpcError>) {
        self.state.lock().unwrap().airdrop_results.push_back(result);
    }
}

impl FakeState {
    fn record(&mut self, method: &'static str) {
        *self.calls.entry(method).or_insert(0) += 1;
    }

    fn next_signature(&mut self) -> Signature {
        self.seq += 1;
        let mut bytes = [0u8; 64];
        bytes[..8].copy_from_slice(&self.seq.to_le_bytes());
        Signature::from(bytes)
    }

    fn land(&mut self, signature: Signature, err: Option<String>) {
        if !self.auto_confirm {
            return;
        }
        self.slot += 1;
        self.landed.insert(
            signature,
            SignatureStatus {
                slot: self.slot,
                commitment: Commitment::Confirmed,
                err,
            },
        );
    }

    /// Applies counter program instructions; returns the execution error.
    fn execute(&mut self, transaction: &Transaction) -> Option<String> {
        let keys = &transaction.message.account_keys;
        for ix in &transaction.message.instructions {
            if keys[ix.program_id_index as usize] != COUNTER_PROGRAM_ID {
                continue;
            }
            let counter = keys[ix.accounts[0] as usize];
            if ix.data == INITIALIZE_DISCRIMINATOR {
                if self.accounts.contains_key(&counter) {
                    return Some("AccountAlreadyInUse".to_string());
                }
                self.accounts
                    .insert(counter, CounterAccount { value: 0 }.encode());
            } else if ix.data == INCREMENT_DISCRIMINATOR {
                let Some(data) = self.accounts.get_mut(&counter) else {
                    return Some("AccountNotInitialized".to_string());
                };
                let Ok(account) = CounterAccount::decode(data) else {
                    return Some("AccountDiscriminatorMismatch".to_string());
                };
                *data = CounterAccount {
                    value: account.value + 1,
                }
                .encode();
            }
        }
        None
    }
}

#[async_trait]
impl CounterRpc for FakeRpc {
    async fn latest_blockhash(&self, _commitment: Commitment) -> Result<(Hash, u64), RpcError> {
        let mut state = self.state.lock().unwrap();
        state.record("getLatestBlockhash");
        if let Some(err) = state.blockhash_errors.pop_front() {
            return Err(err);
        }
        Ok((state.blockhash, state.last_valid_block_height))
    }

    async fn block_height(&self, _commitment: Commitment) -> Result<u64, RpcError> {
        let mut state = self.state.lock().unwrap();
        state.record("getBlockHeight");
        if let Some(height) = state.block_heights.pop_front() {
            state.block_height = height;
        }
        Ok(state.block_height)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let mut state = self.state.lock().unwrap();
        state.record("getSignatureStatuses");
        if let Some(status) = state.statuses.pop_front() {
            return status;
        }
        Ok(state.landed.get(signature).cloned())
    }

    async fn account_data(
        &self,
        pubkey: &Pubkey,
        _commitment: Commitment,
    ) -> Result<Option<Vec<u8>>, RpcError> {
        let mut state = self.state.lock().unwrap();
        state.record("getAccountInfo");
        Ok(state.accounts.get(pubkey).cloned())
    }

    async fn request_airdrop(&self, _pubkey: &Pubkey, _lamports: u64) -> Result<Signature, RpcError> {
        let mut state = self.state.lock().unwrap();
        state.record("requestAirdrop");
        let signature = match state.airdrop_results.pop_front() {
            Some(result) => result?,
            None => state.next_signature(),
        };
        state.land(signature, None);
        Ok(signature)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        let mut state = self.state.lock().unwrap();
        state.record("sendTransaction");
        if let Some(err) = state.send_errors.pop_front() {
            return Err(err);
        }
        state.sent.push(transaction.clone());

        let signature = transaction.signatures[0];
        let err = state.execute(transaction);
        state.land(signature, err);
        Ok(signature)
    }

    async fn simulate_transaction(
        &self,
        _transaction: &Transaction,
    ) -> Result<SimulationReport, RpcError> {
        let mut state = self.state.lock().unwrap();
        state.record("simulateTransaction");
        Ok(state.simulation.clone())
    }

    async fn version(&self) -> Result<String, RpcError> {
        self.state.lock().unwrap().record("getVersion");
        Ok("3.0.0".to_string())
    }
}
