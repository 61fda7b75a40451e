//! Compiled messages: the bytes every signer signs.
//!
//! ```text
//! Legacy message:
//!   num_required_sigs     u8
//!   num_readonly_signed   u8
//!   num_readonly_unsigned u8
//!   account_keys          short-vec of 32-byte keys
//!   recent_blockhash      32 bytes
//!   instructions          short-vec of:
//!     program_id_index      u8
//!     account_indexes       short-vec of u8
//!     data                  short-vec of u8
//!
//! V0 message:
//!   prefix                u8 (0x80 | version)
//!   ...legacy layout...
//!   address_table_lookups short-vec of:
//!     account_key           32 bytes
//!     writable_indexes      short-vec of u8
//!     readonly_indexes      short-vec of u8
//! ```
//!
//! A legacy message starts with its signature count, which never has the top
//! bit set: no legacy transaction can require 128 or more signatures, since
//! 128 signatures alone exceed the packet limit. A first byte with the top
//! bit set is therefore always a version prefix.

mod account_keys;
mod legacy;
mod transaction_message;
mod v0;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::Address;
use crate::error::SolError;
use crate::hash::Hash;
use crate::instruction::CompiledInstruction;
use crate::short_vec::{self, WireReader};

pub use account_keys::{GetAccountKeysArgs, LoadedAddresses, MessageAccountKeys};
pub use legacy::Message;
pub use transaction_message::TransactionMessage;
pub use v0::{MessageAddressTableLookup, MessageV0};

/// Top bit of the first message byte marks a versioned message.
pub const MESSAGE_VERSION_PREFIX: u8 = 0x80;

/// Mask that strips the version prefix bit.
pub const VERSION_PREFIX_MASK: u8 = 0x7f;

/// Signer and writability counts for a message's account keys.
///
/// Keys are laid out as: writable signers, readonly signers, writable
/// non-signers, readonly non-signers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

impl MessageHeader {
    /// Whether account `index` of `num_static_keys` static keys is writable.
    ///
    /// Indexes past the static keys are not covered here.
    pub(crate) fn is_static_writable(&self, index: usize, num_static_keys: usize) -> bool {
        let num_signed = usize::from(self.num_required_signatures);
        if index < num_signed {
            let num_writable_signed =
                num_signed.saturating_sub(usize::from(self.num_readonly_signed_accounts));
            index < num_writable_signed
        } else {
            let num_unsigned = num_static_keys.saturating_sub(num_signed);
            let num_writable_unsigned =
                num_unsigned.saturating_sub(usize::from(self.num_readonly_unsigned_accounts));
            index - num_signed < num_writable_unsigned
        }
    }
}

/// Which wire format a message or transaction uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionVersion {
    Legacy,
    Number(u8),
}

impl TransactionVersion {
    pub const V0: Self = Self::Number(0);
}

impl fmt::Display for TransactionVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

// The RPC reports the version as the string "legacy" or a bare number.
impl Serialize for TransactionVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Legacy => serializer.serialize_str("legacy"),
            Self::Number(n) => serializer.serialize_u8(*n),
        }
    }
}

impl<'de> Deserialize<'de> for TransactionVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u8),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) if s == "legacy" => Ok(Self::Legacy),
            Raw::Text(s) => Err(serde::de::Error::custom(format!(
                "unknown transaction version {s:?}"
            ))),
            Raw::Number(n) => Ok(Self::Number(n)),
        }
    }
}

/// A message in either wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionedMessage {
    Legacy(Message),
    V0(MessageV0),
}

impl VersionedMessage {
    pub fn version(&self) -> TransactionVersion {
        match self {
            Self::Legacy(_) => TransactionVersion::Legacy,
            Self::V0(_) => TransactionVersion::V0,
        }
    }

    pub fn header(&self) -> &MessageHeader {
        match self {
            Self::Legacy(m) => &m.header,
            Self::V0(m) => &m.header,
        }
    }

    pub fn static_account_keys(&self) -> &[Address] {
        match self {
            Self::Legacy(m) => &m.account_keys,
            Self::V0(m) => &m.static_account_keys,
        }
    }

    pub fn recent_blockhash(&self) -> &Hash {
        match self {
            Self::Legacy(m) => &m.recent_blockhash,
            Self::V0(m) => &m.recent_blockhash,
        }
    }

    pub fn set_recent_blockhash(&mut self, blockhash: Hash) {
        match self {
            Self::Legacy(m) => m.recent_blockhash = blockhash,
            Self::V0(m) => m.recent_blockhash = blockhash,
        }
    }

    pub fn instructions(&self) -> &[CompiledInstruction] {
        match self {
            Self::Legacy(m) => &m.instructions,
            Self::V0(m) => &m.instructions,
        }
    }

    pub fn address_table_lookups(&self) -> &[MessageAddressTableLookup] {
        match self {
            Self::Legacy(_) => &[],
            Self::V0(m) => &m.address_table_lookups,
        }
    }

    /// The addresses that must sign, in signature order.
    pub fn signer_keys(&self) -> &[Address] {
        let keys = self.static_account_keys();
        let n = usize::from(self.header().num_required_signatures).min(keys.len());
        &keys[..n]
    }

    pub fn is_account_signer(&self, index: usize) -> bool {
        index < usize::from(self.header().num_required_signatures)
    }

    pub fn is_account_writable(&self, index: usize) -> bool {
        match self {
            Self::Legacy(m) => m.is_account_writable(index),
            Self::V0(m) => m.is_account_writable(index),
        }
    }

    pub fn get_account_keys(&self, args: GetAccountKeysArgs<'_>) -> Result<MessageAccountKeys, SolError> {
        match self {
            Self::Legacy(m) => Ok(m.account_keys()),
            Self::V0(m) => m.get_account_keys(args),
        }
    }

    /// The bytes that signers sign.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Self::Legacy(m) => m.serialize(),
            Self::V0(m) => m.serialize(),
        }
    }

    /// Decode either wire format, dispatching on the first byte.
    pub fn deserialize(data: &[u8]) -> Result<Self, SolError> {
        let mut reader = WireReader::new(data);
        let message = Self::read(&mut reader)?;
        expect_end(&reader)?;
        Ok(message)
    }

    pub(crate) fn read(reader: &mut WireReader<'_>) -> Result<Self, SolError> {
        let prefix = reader.peek_u8("message prefix")?;
        let masked = prefix & VERSION_PREFIX_MASK;
        if masked == prefix {
            return Message::read(reader).map(Self::Legacy);
        }
        match masked {
            0 => MessageV0::read(reader).map(Self::V0),
            version => Err(SolError::UnsupportedVersion(version)),
        }
    }
}

impl From<Message> for VersionedMessage {
    fn from(message: Message) -> Self {
        Self::Legacy(message)
    }
}

impl From<MessageV0> for VersionedMessage {
    fn from(message: MessageV0) -> Self {
        Self::V0(message)
    }
}

// ---------------------------------------------------------------------------
// Shared wire helpers
// ---------------------------------------------------------------------------

pub(crate) fn write_header(buf: &mut Vec<u8>, header: &MessageHeader) {
    buf.push(header.num_required_signatures);
    buf.push(header.num_readonly_signed_accounts);
    buf.push(header.num_readonly_unsigned_accounts);
}

pub(crate) fn write_keys(buf: &mut Vec<u8>, keys: &[Address]) {
    short_vec::encode_length(buf, keys.len());
    for key in keys {
        buf.extend_from_slice(key.as_bytes());
    }
}

pub(crate) fn write_instructions(buf: &mut Vec<u8>, instructions: &[CompiledInstruction]) {
    short_vec::encode_length(buf, instructions.len());
    for ix in instructions {
        buf.push(ix.program_id_index);
        short_vec::encode_bytes(buf, &ix.accounts);
        short_vec::encode_bytes(buf, &ix.data);
    }
}

pub(crate) fn read_header(reader: &mut WireReader<'_>) -> Result<MessageHeader, SolError> {
    Ok(MessageHeader {
        num_required_signatures: reader.read_u8("message header")?,
        num_readonly_signed_accounts: reader.read_u8("message header")?,
        num_readonly_unsigned_accounts: reader.read_u8("message header")?,
    })
}

pub(crate) fn read_keys(reader: &mut WireReader<'_>) -> Result<Vec<Address>, SolError> {
    let len = reader.read_length("account keys")?;
    let mut keys = Vec::with_capacity(len.min(256));
    for _ in 0..len {
        keys.push(Address::new(reader.read_array("account key")?));
    }
    Ok(keys)
}

pub(crate) fn read_blockhash(reader: &mut WireReader<'_>) -> Result<Hash, SolError> {
    Ok(Hash::new(reader.read_array("recent blockhash")?))
}

pub(crate) fn read_instructions(
    reader: &mut WireReader<'_>,
) -> Result<Vec<CompiledInstruction>, SolError> {
    let len = reader.read_length("instructions")?;
    let mut instructions = Vec::with_capacity(len.min(256));
    for _ in 0..len {
        let program_id_index = reader.read_u8("program id index")?;
        let accounts = reader.read_vec("instruction accounts")?;
        let data = reader.read_vec("instruction data")?;
        instructions.push(CompiledInstruction {
            program_id_index,
            accounts,
            data,
        });
    }
    Ok(instructions)
}

/// Reject leftover bytes after a complete message.
pub(crate) fn expect_end(reader: &WireReader<'_>) -> Result<(), SolError> {
    if reader.is_empty() {
        Ok(())
    } else {
        Err(SolError::InvalidMessage(format!(
            "{} trailing bytes after message",
            reader.remaining().len()
        )))
    }
}

/// Check that a decoded message is internally consistent: the header fits the
/// key list and every instruction index points at a loadable key.
pub(crate) fn sanitize(
    header: &MessageHeader,
    num_static_keys: usize,
    num_total_keys: usize,
    instructions: &[CompiledInstruction],
) -> Result<(), SolError> {
    let num_signed = usize::from(header.num_required_signatures);
    if num_signed > num_static_keys {
        return Err(SolError::InvalidMessage(format!(
            "header requires {num_signed} signatures but only {num_static_keys} keys are present"
        )));
    }
    if header.num_readonly_signed_accounts >= header.num_required_signatures
        && header.num_required_signatures > 0
    {
        return Err(SolError::InvalidMessage(
            "message has no writable signer".into(),
        ));
    }
    if usize::from(header.num_readonly_unsigned_accounts) > num_static_keys - num_signed {
        return Err(SolError::InvalidMessage(
            "readonly unsigned count exceeds unsigned keys".into(),
        ));
    }
    for ix in instructions {
        let out_of_range = std::iter::once(&ix.program_id_index)
            .chain(ix.accounts.iter())
            .any(|i| usize::from(*i) >= num_total_keys);
        if out_of_range {
            return Err(SolError::InvalidMessage(format!(
                "instruction index out of range for {num_total_keys} account keys"
            )));
        }
    }
    Ok(())
}

/// Map from account index to program id for every invoked program.
pub(crate) fn index_program_ids(
    keys: &[Address],
    instructions: &[CompiledInstruction],
) -> HashMap<usize, Address> {
    instructions
        .iter()
        .filter_map(|ix| {
            let index = usize::from(ix.program_id_index);
            keys.get(index).map(|key| (index, *key))
        })
        .collect()
}
