//! Solana transaction construction without `solana-sdk`.
//!
//! This crate derives program addresses, compiles instructions into legacy
//! and v0 messages (including address lookup table extraction), signs and
//! verifies transactions, and reads and writes the network's compact binary
//! wire format. Everything here is synchronous and performs no I/O; talking
//! to a cluster lives in `sol-client`.
//!
//! Signing uses `ed25519-dalek`, hashing `sha2`, and text encoding `bs58`.

pub mod address;
pub mod compiled_keys;
pub mod error;
pub mod hash;
pub mod instruction;
pub mod lookup_table;
pub mod message;
pub mod nonce;
pub mod pda;
pub mod programs;
pub mod short_vec;
pub mod signature;
pub mod signer;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use address::{is_on_curve, validate_address, Address};
pub use compiled_keys::CompiledKeys;
pub use error::SolError;
pub use hash::{Blockhash, Hash};
pub use instruction::{AccountMeta, CompiledInstruction, Instruction};
pub use lookup_table::{AddressLookupTableAccount, AddressLookupTableState};
pub use message::{
    Message, MessageAddressTableLookup, MessageHeader, MessageV0, TransactionMessage,
    TransactionVersion, VersionedMessage,
};
pub use nonce::{NonceAccount, NonceInformation};
pub use pda::{create_program_address, create_with_seed, find_program_address, get_associated_token_address};
pub use programs::{ParsedInstruction, ProgramKind, ProgramRegistry};
pub use signature::Signature;
pub use signer::{Keypair, Signer};
pub use transaction::{SerializeConfig, Transaction, VersionedTransaction, PACKET_DATA_SIZE};
