//! Instructions for the on-chain counter program.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

/// Devnet deployment of the counter program.
pub const COUNTER_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("2esiwqpYjizvnSQBFcvo5cSNbgzpPVfTW2ew24YUiHj1");

/// System program (all-zero address).
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0u8; 32]);

/// Instruction data of `initialize`.
pub const INITIALIZE_DISCRIMINATOR: [u8; 8] = [175, 175, 109, 31, 13, 152, 155, 237];

/// Instruction data of `increment`.
pub const INCREMENT_DISCRIMINATOR: [u8; 8] = [11, 18, 104, 9, 104, 174, 59, 33];

/// Seed of the program-derived counter address.
pub const COUNTER_SEED: &[u8] = b"counter";

/// Handle on a deployment of the counter program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterProgram {
    program_id: Pubkey,
}

impl Default for CounterProgram {
    fn default() -> Self {
        Self::new(COUNTER_PROGRAM_ID)
    }
}

impl CounterProgram {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// Program-derived address of the singleton counter and its bump.
    pub fn counter_pda(&self) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[COUNTER_SEED], &self.program_id)
    }

    /// `initialize` for a counter account created from a fresh keypair.
    ///
    /// The counter must sign because the program creates it.
    pub fn initialize(&self, counter: &Pubkey, payer: &Pubkey) -> Instruction {
        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(*counter, true),
                AccountMeta::new(*payer, true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
            data: INITIALIZE_DISCRIMINATOR.to_vec(),
        }
    }

    /// `initialize` for the program-derived counter; only the payer signs.
    pub fn initialize_pda(&self, payer: &Pubkey) -> Instruction {
        let (counter, _) = self.counter_pda();
        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(counter, false),
                AccountMeta::new(*payer, true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
            data: INITIALIZE_DISCRIMINATOR.to_vec(),
        }
    }

    /// `increment` on an existing counter.
    pub fn increment(&self, counter: &Pubkey) -> Instruction {
        Instruction {
            program_id: self.program_id,
            accounts: vec![AccountMeta::new(*counter, false)],
            data: INCREMENT_DISCRIMINATOR.to_vec(),
        }
    }
}
