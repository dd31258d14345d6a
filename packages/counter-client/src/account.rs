//! Counter account layout.
//!
//! ```text
//! [0..8)   account discriminator
//! [8..16)  counter value, little-endian u64
//! ```

/// Discriminator of the program's `Counter` account type.
pub const COUNTER_ACCOUNT_DISCRIMINATOR: [u8; 8] = [255, 176, 4, 245, 188, 253, 124, 25];

/// Size of a counter account's data.
pub const COUNTER_ACCOUNT_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid counter account: expected at least {COUNTER_ACCOUNT_LEN} bytes, got {0}")]
    TooShort(usize),
    #[error("invalid counter account: discriminator mismatch")]
    DiscriminatorMismatch,
}

/// Decoded counter account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterAccount {
    pub value: u64,
}

impl CounterAccount {
    /// Decodes and validates raw account data.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < COUNTER_ACCOUNT_LEN {
            return Err(DecodeError::TooShort(data.len()));
        }
        if data[..8] != COUNTER_ACCOUNT_DISCRIMINATOR {
            return Err(DecodeError::DiscriminatorMismatch);
        }

        let mut value = [0u8; 8];
        value.copy_from_slice(&data[8..16]);
        Ok(Self {
            value: u64::from_le_bytes(value),
        })
    }

    /// Encodes the account the way the program lays it out on-chain.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(COUNTER_ACCOUNT_LEN);
        data.extend_from_slice(&COUNTER_ACCOUNT_DISCRIMINATOR);
        data.extend_from_slice(&self.value.to_le_bytes());
        data
    }
}

/// Reads the counter value out of raw account data.
pub fn decode_counter(data: &[u8]) -> Result<u64, DecodeError> {
    CounterAccount::decode(data).map(|account| account.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_value() {
        let data = CounterAccount { value: 42 }.encode();
        assert_eq!(decode_counter(&data), Ok(42));
    }

    #[test]
    fn test_decode_keeps_full_u64() {
        let data = CounterAccount { value: u64::MAX - 1 }.encode();
        assert_eq!(decode_counter(&data), Ok(u64::MAX - 1));
    }

    #[test]
    fn test_any_discriminator_flip_is_rejected() {
        let data = CounterAccount { value: 42 }.encode();
        for i in 0..8 {
            let mut corrupted = data.clone();
            corrupted[i] ^= 0xff;
            assert_eq!(
                decode_counter(&corrupted),
                Err(DecodeError::DiscriminatorMismatch)
            );
        }
    }

    #[test]
    fn test_short_data_is_rejected() {
        assert_eq!(decode_counter(&[]), Err(DecodeError::TooShort(0)));
        assert_eq!(
            decode_counter(&COUNTER_ACCOUNT_DISCRIMINATOR),
            Err(DecodeError::TooShort(8))
        );
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let mut data = CounterAccount { value: 7 }.encode();
        data.extend_from_slice(&[0xaa; 8]);
        assert_eq!(decode_counter(&data), Ok(7));
    }
}
