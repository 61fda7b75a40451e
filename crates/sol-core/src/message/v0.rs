use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::compiled_keys::CompiledKeys;
use crate::error::SolError;
use crate::hash::Hash;
use crate::instruction::{CompiledInstruction, Instruction};
use crate::lookup_table::AddressLookupTableAccount;
use crate::short_vec::{self, WireReader};

use super::{
    expect_end, read_blockhash, read_header, read_instructions, read_keys, sanitize, write_header,
    write_instructions, write_keys, GetAccountKeysArgs, LoadedAddresses, MessageAccountKeys,
    MessageHeader, MESSAGE_VERSION_PREFIX, VERSION_PREFIX_MASK,
};

/// Accounts a v0 message loads from one lookup table, by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAddressTableLookup {
    pub account_key: Address,
    pub writable_indexes: Vec<u8>,
    pub readonly_indexes: Vec<u8>,
}

/// A version 0 message: a legacy layout plus address table lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageV0 {
    pub header: MessageHeader,
    #[serde(rename = "accountKeys")]
    pub static_account_keys: Vec<Address>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
    pub address_table_lookups: Vec<MessageAddressTableLookup>,
}

impl MessageV0 {
    /// Compile `instructions`, moving every eligible account into the given
    /// lookup tables.
    ///
    /// Tables are consulted in order; a key found in an earlier table is not
    /// looked up again.
    pub fn compile(
        payer: &Address,
        instructions: &[Instruction],
        recent_blockhash: Hash,
        address_lookup_table_accounts: &[AddressLookupTableAccount],
    ) -> Result<Self, SolError> {
        let mut compiled_keys = CompiledKeys::compile(instructions, *payer);

        let mut address_table_lookups = Vec::new();
        let mut account_keys_from_lookups = LoadedAddresses::default();
        for lookup_table in address_lookup_table_accounts {
            if let Some((lookup, loaded)) = compiled_keys.try_extract_table_lookup(lookup_table)? {
                address_table_lookups.push(lookup);
                account_keys_from_lookups.writable.extend(loaded.writable);
                account_keys_from_lookups.readonly.extend(loaded.readonly);
            }
        }

        let (header, static_account_keys) = compiled_keys.try_into_message_components()?;
        let account_keys =
            MessageAccountKeys::new(static_account_keys, Some(account_keys_from_lookups));
        let instructions = account_keys.compile_instructions(instructions)?;

        Ok(Self {
            header,
            static_account_keys: account_keys.static_account_keys().to_vec(),
            recent_blockhash,
            instructions,
            address_table_lookups,
        })
    }

    pub fn num_account_keys_from_lookups(&self) -> usize {
        self.address_table_lookups
            .iter()
            .map(|lookup| lookup.writable_indexes.len() + lookup.readonly_indexes.len())
            .sum()
    }

    pub fn is_account_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    /// Writability of account `index`, counting lookup-loaded keys: loaded
    /// writable keys come right after the static keys.
    pub fn is_account_writable(&self, index: usize) -> bool {
        let num_static = self.static_account_keys.len();
        if index >= num_static {
            let num_writable_loaded: usize = self
                .address_table_lookups
                .iter()
                .map(|lookup| lookup.writable_indexes.len())
                .sum();
            index - num_static < num_writable_loaded
        } else {
            self.header.is_static_writable(index, num_static)
        }
    }

    /// Resolve the full key list, from pre-resolved addresses or from tables.
    pub fn get_account_keys(&self, args: GetAccountKeysArgs<'_>) -> Result<MessageAccountKeys, SolError> {
        let account_keys_from_lookups = if let Some(loaded) = args.account_keys_from_lookups {
            if loaded.len() != self.num_account_keys_from_lookups() {
                return Err(SolError::InvalidMessage(format!(
                    "expected {} account keys from lookups, got {}",
                    self.num_account_keys_from_lookups(),
                    loaded.len()
                )));
            }
            Some(loaded.clone())
        } else if !args.address_lookup_table_accounts.is_empty() {
            Some(self.resolve_address_table_lookups(args.address_lookup_table_accounts)?)
        } else if !self.address_table_lookups.is_empty() {
            return Err(SolError::InvalidMessage(
                "address table lookups were not resolved".into(),
            ));
        } else {
            None
        };

        Ok(MessageAccountKeys::new(
            self.static_account_keys.clone(),
            account_keys_from_lookups,
        ))
    }

    /// Look up every indexed address in the supplied tables.
    pub fn resolve_address_table_lookups(
        &self,
        address_lookup_table_accounts: &[AddressLookupTableAccount],
    ) -> Result<LoadedAddresses, SolError> {
        let mut loaded = LoadedAddresses::default();
        for lookup in &self.address_table_lookups {
            let table = address_lookup_table_accounts
                .iter()
                .find(|table| table.key == lookup.account_key)
                .ok_or(SolError::LookupTableNotFound(lookup.account_key))?;

            for index in &lookup.writable_indexes {
                loaded.writable.push(table.get(*index)?);
            }
            for index in &lookup.readonly_indexes {
                loaded.readonly.push(table.get(*index)?);
            }
        }
        Ok(loaded)
    }

    /// The signing payload.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 1 + self.static_account_keys.len() * 32 + 32 + 64);
        buf.push(MESSAGE_VERSION_PREFIX);
        write_header(&mut buf, &self.header);
        write_keys(&mut buf, &self.static_account_keys);
        buf.extend_from_slice(self.recent_blockhash.as_bytes());
        write_instructions(&mut buf, &self.instructions);

        short_vec::encode_length(&mut buf, self.address_table_lookups.len());
        for lookup in &self.address_table_lookups {
            buf.extend_from_slice(lookup.account_key.as_bytes());
            short_vec::encode_bytes(&mut buf, &lookup.writable_indexes);
            short_vec::encode_bytes(&mut buf, &lookup.readonly_indexes);
        }
        buf
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, SolError> {
        let mut reader = WireReader::new(data);
        let message = Self::read(&mut reader)?;
        expect_end(&reader)?;
        Ok(message)
    }

    pub(crate) fn read(reader: &mut WireReader<'_>) -> Result<Self, SolError> {
        let prefix = reader.read_u8("message prefix")?;
        let version = prefix & VERSION_PREFIX_MASK;
        if version == prefix {
            return Err(SolError::InvalidMessage(
                "expected a versioned message but found a legacy message".into(),
            ));
        }
        if version != 0 {
            return Err(SolError::UnsupportedVersion(version));
        }

        let header = read_header(reader)?;
        let static_account_keys = read_keys(reader)?;
        let recent_blockhash = read_blockhash(reader)?;
        let instructions = read_instructions(reader)?;

        let num_lookups = reader.read_length("address table lookups")?;
        let mut address_table_lookups = Vec::with_capacity(num_lookups.min(64));
        for _ in 0..num_lookups {
            address_table_lookups.push(MessageAddressTableLookup {
                account_key: Address::new(reader.read_array("lookup table key")?),
                writable_indexes: reader.read_vec("writable indexes")?,
                readonly_indexes: reader.read_vec("readonly indexes")?,
            });
        }

        let message = Self {
            header,
            static_account_keys,
            recent_blockhash,
            instructions,
            address_table_lookups,
        };
        sanitize(
            &message.header,
            message.static_account_keys.len(),
            message.static_account_keys.len() + message.num_account_keys_from_lookups(),
            &message.instructions,
        )?;
        Ok(message)
    }
}
