//! System Program instructions.
//!
//! # Wire format
//!
//! Instruction data is bincode: a u32 LE discriminant followed by the
//! variant's fields in declaration order. Integers are little-endian, keys are
//! raw 32 bytes and strings are a u64 LE length followed by UTF-8 bytes.

use crate::address::{Address, SYSTEM_PROGRAM_ID, SYSVAR_RECENT_BLOCKHASHES_ID, SYSVAR_RENT_ID};
use crate::error::SolError;
use crate::instruction::{AccountMeta, Instruction};
use crate::short_vec::WireReader;

/// Every System Program instruction, with its decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemInstruction {
    CreateAccount {
        lamports: u64,
        space: u64,
        owner: Address,
    },
    Assign {
        owner: Address,
    },
    Transfer {
        lamports: u64,
    },
    CreateAccountWithSeed {
        base: Address,
        seed: String,
        lamports: u64,
        space: u64,
        owner: Address,
    },
    AdvanceNonceAccount,
    WithdrawNonceAccount {
        lamports: u64,
    },
    InitializeNonceAccount {
        authority: Address,
    },
    AuthorizeNonceAccount {
        authority: Address,
    },
    Allocate {
        space: u64,
    },
    AllocateWithSeed {
        base: Address,
        seed: String,
        space: u64,
        owner: Address,
    },
    AssignWithSeed {
        base: Address,
        seed: String,
        owner: Address,
    },
    TransferWithSeed {
        lamports: u64,
        from_seed: String,
        from_owner: Address,
    },
    UpgradeNonceAccount,
}

impl SystemInstruction {
    pub fn discriminant(&self) -> u32 {
        match self {
            Self::CreateAccount { .. } => 0,
            Self::Assign { .. } => 1,
            Self::Transfer { .. } => 2,
            Self::CreateAccountWithSeed { .. } => 3,
            Self::AdvanceNonceAccount => 4,
            Self::WithdrawNonceAccount { .. } => 5,
            Self::InitializeNonceAccount { .. } => 6,
            Self::AuthorizeNonceAccount { .. } => 7,
            Self::Allocate { .. } => 8,
            Self::AllocateWithSeed { .. } => 9,
            Self::AssignWithSeed { .. } => 10,
            Self::TransferWithSeed { .. } => 11,
            Self::UpgradeNonceAccount => 12,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(52);
        data.extend_from_slice(&self.discriminant().to_le_bytes());
        match self {
            Self::CreateAccount {
                lamports,
                space,
                owner,
            } => {
                data.extend_from_slice(&lamports.to_le_bytes());
                data.extend_from_slice(&space.to_le_bytes());
                data.extend_from_slice(owner.as_bytes());
            }
            Self::Assign { owner } => data.extend_from_slice(owner.as_bytes()),
            Self::Transfer { lamports } | Self::WithdrawNonceAccount { lamports } => {
                data.extend_from_slice(&lamports.to_le_bytes());
            }
            Self::CreateAccountWithSeed {
                base,
                seed,
                lamports,
                space,
                owner,
            } => {
                data.extend_from_slice(base.as_bytes());
                put_string(&mut data, seed);
                data.extend_from_slice(&lamports.to_le_bytes());
                data.extend_from_slice(&space.to_le_bytes());
                data.extend_from_slice(owner.as_bytes());
            }
            Self::InitializeNonceAccount { authority }
            | Self::AuthorizeNonceAccount { authority } => {
                data.extend_from_slice(authority.as_bytes());
            }
            Self::Allocate { space } => data.extend_from_slice(&space.to_le_bytes()),
            Self::AllocateWithSeed {
                base,
                seed,
                space,
                owner,
            } => {
                data.extend_from_slice(base.as_bytes());
                put_string(&mut data, seed);
                data.extend_from_slice(&space.to_le_bytes());
                data.extend_from_slice(owner.as_bytes());
            }
            Self::AssignWithSeed { base, seed, owner } => {
                data.extend_from_slice(base.as_bytes());
                put_string(&mut data, seed);
                data.extend_from_slice(owner.as_bytes());
            }
            Self::TransferWithSeed {
                lamports,
                from_seed,
                from_owner,
            } => {
                data.extend_from_slice(&lamports.to_le_bytes());
                put_string(&mut data, from_seed);
                data.extend_from_slice(from_owner.as_bytes());
            }
            Self::AdvanceNonceAccount | Self::UpgradeNonceAccount => {}
        }
        data
    }

    pub fn decode(data: &[u8]) -> Result<Self, SolError> {
        let mut r = WireReader::new(data);
        let discriminant = u32::from_le_bytes(r.read_array("system instruction")?);
        let ix = match discriminant {
            0 => Self::CreateAccount {
                lamports: get_u64(&mut r)?,
                space: get_u64(&mut r)?,
                owner: get_address(&mut r)?,
            },
            1 => Self::Assign {
                owner: get_address(&mut r)?,
            },
            2 => Self::Transfer {
                lamports: get_u64(&mut r)?,
            },
            3 => Self::CreateAccountWithSeed {
                base: get_address(&mut r)?,
                seed: get_string(&mut r)?,
                lamports: get_u64(&mut r)?,
                space: get_u64(&mut r)?,
                owner: get_address(&mut r)?,
            },
            4 => Self::AdvanceNonceAccount,
            5 => Self::WithdrawNonceAccount {
                lamports: get_u64(&mut r)?,
            },
            6 => Self::InitializeNonceAccount {
                authority: get_address(&mut r)?,
            },
            7 => Self::AuthorizeNonceAccount {
                authority: get_address(&mut r)?,
            },
            8 => Self::Allocate {
                space: get_u64(&mut r)?,
            },
            9 => Self::AllocateWithSeed {
                base: get_address(&mut r)?,
                seed: get_string(&mut r)?,
                space: get_u64(&mut r)?,
                owner: get_address(&mut r)?,
            },
            10 => Self::AssignWithSeed {
                base: get_address(&mut r)?,
                seed: get_string(&mut r)?,
                owner: get_address(&mut r)?,
            },
            11 => Self::TransferWithSeed {
                lamports: get_u64(&mut r)?,
                from_seed: get_string(&mut r)?,
                from_owner: get_address(&mut r)?,
            },
            12 => Self::UpgradeNonceAccount,
            other => {
                return Err(SolError::InvalidInstructionData(format!(
                    "unknown system instruction {other}"
                )))
            }
        };
        Ok(ix)
    }
}

fn put_string(data: &mut Vec<u8>, s: &str) {
    data.extend_from_slice(&(s.len() as u64).to_le_bytes());
    data.extend_from_slice(s.as_bytes());
}

fn get_u64(r: &mut WireReader<'_>) -> Result<u64, SolError> {
    Ok(u64::from_le_bytes(r.read_array("u64 field")?))
}

fn get_address(r: &mut WireReader<'_>) -> Result<Address, SolError> {
    Ok(Address::new(r.read_array("address field")?))
}

fn get_string(r: &mut WireReader<'_>) -> Result<String, SolError> {
    let len = get_u64(r)?;
    let len = usize::try_from(len).map_err(|_| SolError::LengthOverflow)?;
    let bytes = r.read_bytes(len, "string field")?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| SolError::InvalidInstructionData(format!("seed is not UTF-8: {e}")))
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Move `lamports` from `from` (signer) to `to`.
pub fn transfer(from: &Address, to: &Address, lamports: u64) -> Instruction {
    Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        SystemInstruction::Transfer { lamports }.encode(),
    )
}

/// Fund and allocate `new_account`, owned by `owner`. Both accounts sign.
pub fn create_account(
    from: &Address,
    new_account: &Address,
    lamports: u64,
    space: u64,
    owner: &Address,
) -> Instruction {
    Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![
            AccountMeta::new(*from, true),
            AccountMeta::new(*new_account, true),
        ],
        SystemInstruction::CreateAccount {
            lamports,
            space,
            owner: *owner,
        }
        .encode(),
    )
}

/// Hand `account` over to program `owner`.
pub fn assign(account: &Address, owner: &Address) -> Instruction {
    Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![AccountMeta::new(*account, true)],
        SystemInstruction::Assign { owner: *owner }.encode(),
    )
}

pub fn allocate(account: &Address, space: u64) -> Instruction {
    Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![AccountMeta::new(*account, true)],
        SystemInstruction::Allocate { space }.encode(),
    )
}

/// Advance a durable nonce. Must be the first instruction of a nonce
/// transaction.
pub fn advance_nonce_account(nonce_account: &Address, authority: &Address) -> Instruction {
    Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![
            AccountMeta::new(*nonce_account, false),
            AccountMeta::new_readonly(SYSVAR_RECENT_BLOCKHASHES_ID, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        SystemInstruction::AdvanceNonceAccount.encode(),
    )
}

/// Initialize a freshly created nonce account under `authority`.
pub fn initialize_nonce_account(nonce_account: &Address, authority: &Address) -> Instruction {
    Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![
            AccountMeta::new(*nonce_account, false),
            AccountMeta::new_readonly(SYSVAR_RECENT_BLOCKHASHES_ID, false),
            AccountMeta::new_readonly(SYSVAR_RENT_ID, false),
        ],
        SystemInstruction::InitializeNonceAccount {
            authority: *authority,
        }
        .encode(),
    )
}
