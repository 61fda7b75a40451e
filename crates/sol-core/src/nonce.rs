//! Durable nonces.

use crate::address::Address;
use crate::error::SolError;
use crate::hash::Hash;
use crate::instruction::Instruction;
use crate::programs::system;
use crate::short_vec::WireReader;

/// Size of a System Program nonce account.
pub const NONCE_ACCOUNT_LENGTH: usize = 80;

/// What a transaction needs to use a durable nonce in place of a recent
/// blockhash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceInformation {
    /// The nonce value stored in the account when the transaction was built.
    pub nonce: Hash,
    /// Must run first; compilation prepends it if it is missing.
    pub nonce_instruction: Instruction,
}

impl NonceInformation {
    pub fn new(nonce: Hash, nonce_instruction: Instruction) -> Self {
        Self {
            nonce,
            nonce_instruction,
        }
    }

    /// Nonce information whose instruction advances `nonce_account` under
    /// `authority`.
    pub fn advance(nonce: Hash, nonce_account: &Address, authority: &Address) -> Self {
        Self::new(nonce, system::advance_nonce_account(nonce_account, authority))
    }
}

/// Decoded contents of a nonce account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceAccount {
    pub version: u32,
    /// 0 = uninitialized, 1 = initialized.
    pub state: u32,
    pub authorized_pubkey: Address,
    pub nonce: Hash,
    pub lamports_per_signature: u64,
}

impl NonceAccount {
    pub fn from_account_data(data: &[u8]) -> Result<Self, SolError> {
        if data.len() < NONCE_ACCOUNT_LENGTH {
            return Err(SolError::InvalidNonceAccount(format!(
                "expected {NONCE_ACCOUNT_LENGTH} bytes, got {}",
                data.len()
            )));
        }

        let mut r = WireReader::new(data);
        Ok(Self {
            version: u32::from_le_bytes(r.read_array("nonce version")?),
            state: u32::from_le_bytes(r.read_array("nonce state")?),
            authorized_pubkey: Address::new(r.read_array("nonce authority")?),
            nonce: Hash::new(r.read_array("nonce value")?),
            lamports_per_signature: u64::from_le_bytes(r.read_array("nonce fee")?),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.state == 1
    }
}
