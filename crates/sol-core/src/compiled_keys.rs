//! Account table compilation.
//!
//! Folds an instruction list into one entry per distinct address with merged
//! signer/writable flags, then lays the entries out in the order the wire
//! format requires:
//!
//!   1. writable signers   (fee payer first)
//!   2. read-only signers
//!   3. writable non-signers
//!   4. read-only non-signers
//!
//! Within a bucket keys are ordered by their base58 text so compilation is
//! deterministic.

use std::collections::HashMap;

use crate::address::Address;
use crate::error::SolError;
use crate::instruction::Instruction;
use crate::lookup_table::AddressLookupTableAccount;
use crate::message::{LoadedAddresses, MessageAddressTableLookup, MessageHeader};

/// Most account keys a message can address with a u8 index.
pub const MAX_ACCOUNT_KEYS: usize = 256;

/// Merged flags for one address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompiledKeyMeta {
    pub is_signer: bool,
    pub is_writable: bool,
    /// Referenced as an instruction's program id.
    pub is_invoked: bool,
}

#[derive(Debug, Clone)]
pub struct CompiledKeys {
    payer: Address,
    key_meta_map: HashMap<Address, CompiledKeyMeta>,
}

impl CompiledKeys {
    /// Build the key table for `instructions` paid for by `payer`.
    ///
    /// The payer is seeded as a writable signer. Flags only ever turn on.
    pub fn compile(instructions: &[Instruction], payer: Address) -> Self {
        let mut key_meta_map: HashMap<Address, CompiledKeyMeta> = HashMap::new();

        let payer_meta = key_meta_map.entry(payer).or_default();
        payer_meta.is_signer = true;
        payer_meta.is_writable = true;

        for ix in instructions {
            key_meta_map.entry(ix.program_id).or_default().is_invoked = true;
            for account in &ix.accounts {
                let meta = key_meta_map.entry(account.pubkey).or_default();
                meta.is_signer |= account.is_signer;
                meta.is_writable |= account.is_writable;
            }
        }

        Self {
            payer,
            key_meta_map,
        }
    }

    pub fn payer(&self) -> &Address {
        &self.payer
    }

    pub fn get(&self, key: &Address) -> Option<&CompiledKeyMeta> {
        self.key_meta_map.get(key)
    }

    pub fn len(&self) -> usize {
        self.key_meta_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_meta_map.is_empty()
    }

    /// Keys in base58 order, the payer first.
    fn ordered_keys(&self) -> Vec<(Address, CompiledKeyMeta)> {
        let mut entries: Vec<(Address, CompiledKeyMeta)> =
            self.key_meta_map.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by_cached_key(|(key, _)| (*key != self.payer, key.to_string()));
        entries
    }

    /// Produce the message header and the ordered static account keys.
    pub fn try_into_message_components(&self) -> Result<(MessageHeader, Vec<Address>), SolError> {
        if self.key_meta_map.len() > MAX_ACCOUNT_KEYS {
            return Err(SolError::TooManyAccountKeys(self.key_meta_map.len()));
        }

        let mut writable_signers = Vec::new();
        let mut readonly_signers = Vec::new();
        let mut writable_non_signers = Vec::new();
        let mut readonly_non_signers = Vec::new();
        for (key, meta) in self.ordered_keys() {
            match (meta.is_signer, meta.is_writable) {
                (true, true) => writable_signers.push(key),
                (true, false) => readonly_signers.push(key),
                (false, true) => writable_non_signers.push(key),
                (false, false) => readonly_non_signers.push(key),
            }
        }

        match writable_signers.first() {
            None => return Err(SolError::NoWritableSigner),
            Some(first) if *first != self.payer => return Err(SolError::PayerNotFirst),
            Some(_) => {}
        }

        let num_signers = writable_signers.len() + readonly_signers.len();
        let header = MessageHeader {
            num_required_signatures: count_u8(num_signers)?,
            num_readonly_signed_accounts: count_u8(readonly_signers.len())?,
            num_readonly_unsigned_accounts: count_u8(readonly_non_signers.len())?,
        };

        let mut keys = writable_signers;
        keys.extend(readonly_signers);
        keys.extend(writable_non_signers);
        keys.extend(readonly_non_signers);

        Ok((header, keys))
    }

    /// Move every key that `lookup_table` can supply out of the static table.
    ///
    /// Only non-signer keys that are never invoked as a program are eligible.
    /// Returns `None` when the table supplies nothing, so callers can skip an
    /// empty lookup entry.
    pub fn try_extract_table_lookup(
        &mut self,
        lookup_table: &AddressLookupTableAccount,
    ) -> Result<Option<(MessageAddressTableLookup, LoadedAddresses)>, SolError> {
        let (writable_indexes, drained_writable_keys) =
            self.try_drain_keys_found_in_lookup_table(lookup_table.addresses(), |meta| {
                !meta.is_signer && !meta.is_invoked && meta.is_writable
            })?;
        let (readonly_indexes, drained_readonly_keys) =
            self.try_drain_keys_found_in_lookup_table(lookup_table.addresses(), |meta| {
                !meta.is_signer && !meta.is_invoked && !meta.is_writable
            })?;

        if writable_indexes.is_empty() && readonly_indexes.is_empty() {
            return Ok(None);
        }

        Ok(Some((
            MessageAddressTableLookup {
                account_key: lookup_table.key,
                writable_indexes,
                readonly_indexes,
            },
            LoadedAddresses {
                writable: drained_writable_keys,
                readonly: drained_readonly_keys,
            },
        )))
    }

    fn try_drain_keys_found_in_lookup_table(
        &mut self,
        lookup_table_entries: &[Address],
        key_meta_filter: impl Fn(&CompiledKeyMeta) -> bool,
    ) -> Result<(Vec<u8>, Vec<Address>), SolError> {
        let mut lookup_table_indexes = Vec::new();
        let mut drained_keys = Vec::new();

        for (key, meta) in self.ordered_keys() {
            if !key_meta_filter(&meta) {
                continue;
            }
            let Some(index) = lookup_table_entries.iter().position(|entry| *entry == key) else {
                continue;
            };
            let index = u8::try_from(index).map_err(|_| SolError::LookupTableIndexOverflow(index))?;
            lookup_table_indexes.push(index);
            drained_keys.push(key);
            self.key_meta_map.remove(&key);
        }

        Ok((lookup_table_indexes, drained_keys))
    }
}

fn count_u8(n: usize) -> Result<u8, SolError> {
    u8::try_from(n).map_err(|_| SolError::TooManyAccountKeys(n))
}
