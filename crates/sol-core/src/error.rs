use thiserror::Error;

use crate::address::Address;

/// Errors produced while building, compiling, signing and (de)serializing
/// Solana messages and transactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid blockhash: {0}")]
    InvalidBlockhash(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("signing error: {0}")]
    SigningError(String),

    // -- address derivation ------------------------------------------------
    #[error("max seed length exceeded: {len} > {max}")]
    MaxSeedLengthExceeded { len: usize, max: usize },

    #[error("max seeds exceeded: {len} > {max}")]
    MaxSeedsExceeded { len: usize, max: usize },

    #[error("invalid seeds, address must fall off the curve")]
    InvalidSeeds,

    #[error("unable to find a viable program address bump seed")]
    NoViableBump,

    // -- key table compilation ---------------------------------------------
    #[error("max static account keys length exceeded: {0} > 256")]
    TooManyAccountKeys(usize),

    #[error("expected at least one writable signer key")]
    NoWritableSigner,

    #[error("expected first writable signer key to be the fee payer")]
    PayerNotFirst,

    #[error("account index overflow encountered during compilation")]
    AccountIndexOverflow,

    #[error("max lookup table index exceeded: {0}")]
    LookupTableIndexOverflow(usize),

    #[error("encountered an unknown instruction account key during compilation: {0}")]
    UnknownInstructionKey(Address),

    // -- transaction ---------------------------------------------------------
    #[error("transaction fee payer required")]
    FeePayerRequired,

    #[error("transaction recent blockhash required")]
    RecentBlockhashRequired,

    #[error("unknown signer: {0}")]
    UnknownSigner(Address),

    #[error("transaction too large: {size} > {max}")]
    TransactionTooLarge { size: usize, max: usize },

    #[error("too many signatures: {0}")]
    TooManySignatures(usize),

    #[error("expected {expected} signatures, got {actual}")]
    SignatureCountMismatch { expected: usize, actual: usize },

    #[error("{}", signedness_message(.invalid, .missing))]
    SignatureVerificationFailed {
        invalid: Vec<Address>,
        missing: Vec<Address>,
    },

    // -- wire format ---------------------------------------------------------
    #[error("unexpected end of data while decoding {0}")]
    UnexpectedEof(&'static str),

    #[error("short-vec length overflow")]
    LengthOverflow,

    #[error("unsupported message version: {0}")]
    UnsupportedVersion(u8),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    // -- lookup tables -------------------------------------------------------
    #[error("failed to find address lookup table account for table key {0}")]
    LookupTableNotFound(Address),

    #[error("failed to find address for index {index} in address lookup table {table}")]
    LookupTableIndexOutOfRange { table: Address, index: u8 },

    #[error("invalid address lookup table: {0}")]
    InvalidLookupTable(String),

    // -- account data --------------------------------------------------------
    #[error("invalid nonce account: {0}")]
    InvalidNonceAccount(String),

    #[error("invalid instruction data: {0}")]
    InvalidInstructionData(String),
}

fn signedness_message(invalid: &[Address], missing: &[Address]) -> String {
    let mut message = String::from("Signature verification failed.");
    if !invalid.is_empty() {
        message.push_str(&format!(
            "\nInvalid signature for public key{} [`{}`].",
            plural_suffix(invalid.len()),
            join_base58(invalid)
        ));
    }
    if !missing.is_empty() {
        message.push_str(&format!(
            "\nMissing signature for public key{} [`{}`].",
            plural_suffix(missing.len()),
            join_base58(missing)
        ));
    }
    message
}

fn plural_suffix(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "(s)"
    }
}

fn join_base58(keys: &[Address]) -> String {
    keys.iter()
        .map(Address::to_string)
        .collect::<Vec<_>>()
        .join("`, `")
}
