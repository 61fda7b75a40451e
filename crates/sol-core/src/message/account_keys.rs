use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::SolError;
use crate::instruction::{CompiledInstruction, Instruction};
use crate::lookup_table::AddressLookupTableAccount;

/// Addresses loaded from lookup tables, in the order a v0 message indexes
/// them: every writable key first, then every readonly key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedAddresses {
    pub writable: Vec<Address>,
    pub readonly: Vec<Address>,
}

impl LoadedAddresses {
    pub fn len(&self) -> usize {
        self.writable.len() + self.readonly.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where to find the keys a v0 message loads through lookups. Either the
/// already resolved addresses or the tables to resolve them from.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetAccountKeysArgs<'a> {
    pub account_keys_from_lookups: Option<&'a LoadedAddresses>,
    pub address_lookup_table_accounts: &'a [AddressLookupTableAccount],
}

/// The full account key list of a message: its static keys followed by any
/// keys loaded from lookup tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageAccountKeys {
    static_account_keys: Vec<Address>,
    account_keys_from_lookups: Option<LoadedAddresses>,
}

impl MessageAccountKeys {
    pub fn new(static_account_keys: Vec<Address>, account_keys_from_lookups: Option<LoadedAddresses>) -> Self {
        Self {
            static_account_keys,
            account_keys_from_lookups,
        }
    }

    pub fn static_account_keys(&self) -> &[Address] {
        &self.static_account_keys
    }

    pub fn account_keys_from_lookups(&self) -> Option<&LoadedAddresses> {
        self.account_keys_from_lookups.as_ref()
    }

    /// Static, writable-loaded and readonly-loaded segments, in index order.
    pub fn key_segments(&self) -> Vec<&[Address]> {
        let mut segments: Vec<&[Address]> = vec![&self.static_account_keys];
        if let Some(loaded) = &self.account_keys_from_lookups {
            segments.push(&loaded.writable);
            segments.push(&loaded.readonly);
        }
        segments
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.key_segments().into_iter().flatten()
    }

    pub fn get(&self, mut index: usize) -> Option<&Address> {
        for segment in self.key_segments() {
            if index < segment.len() {
                return segment.get(index);
            }
            index -= segment.len();
        }
        None
    }

    pub fn len(&self) -> usize {
        self.static_account_keys.len()
            + self
                .account_keys_from_lookups
                .as_ref()
                .map_or(0, LoadedAddresses::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace every address in `instructions` by its index in this key list.
    pub fn compile_instructions(
        &self,
        instructions: &[Instruction],
    ) -> Result<Vec<CompiledInstruction>, SolError> {
        // Every index must fit in a u8.
        if self.len() > usize::from(u8::MAX) + 1 {
            return Err(SolError::AccountIndexOverflow);
        }

        let mut key_index_map: HashMap<Address, u8> = HashMap::with_capacity(self.len());
        for (index, key) in self.iter().enumerate() {
            // Bounded by the length check above.
            key_index_map.entry(*key).or_insert(index as u8);
        }
        let find_key_index = |key: &Address| {
            key_index_map
                .get(key)
                .copied()
                .ok_or(SolError::UnknownInstructionKey(*key))
        };

        instructions
            .iter()
            .map(|ix| {
                Ok(CompiledInstruction {
                    program_id_index: find_key_index(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|meta| find_key_index(&meta.pubkey))
                        .collect::<Result<Vec<_>, _>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect()
    }
}
