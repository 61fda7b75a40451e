use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::compiled_keys::CompiledKeys;
use crate::error::SolError;
use crate::hash::Hash;
use crate::instruction::{CompiledInstruction, Instruction};
use crate::short_vec::WireReader;

use super::{
    expect_end, index_program_ids, read_blockhash, read_header, read_instructions, read_keys,
    sanitize, write_header, write_instructions, write_keys, MessageAccountKeys, MessageHeader,
};

/// A legacy (unversioned) message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Address>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile `instructions` into a message paid for by `payer`.
    pub fn compile(
        payer: &Address,
        instructions: &[Instruction],
        recent_blockhash: Hash,
    ) -> Result<Self, SolError> {
        let compiled_keys = CompiledKeys::compile(instructions, *payer);
        let (header, static_account_keys) = compiled_keys.try_into_message_components()?;
        let account_keys = MessageAccountKeys::new(static_account_keys, None);
        let instructions = account_keys.compile_instructions(instructions)?;

        Ok(Self {
            header,
            account_keys: account_keys.static_account_keys().to_vec(),
            recent_blockhash,
            instructions,
        })
    }

    pub fn account_keys(&self) -> MessageAccountKeys {
        MessageAccountKeys::new(self.account_keys.clone(), None)
    }

    pub fn is_account_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    pub fn is_account_writable(&self, index: usize) -> bool {
        index < self.account_keys.len()
            && self.header.is_static_writable(index, self.account_keys.len())
    }

    /// Whether account `index` is invoked as a program by any instruction.
    pub fn is_program_id(&self, index: usize) -> bool {
        self.instructions
            .iter()
            .any(|ix| usize::from(ix.program_id_index) == index)
    }

    /// Invoked program ids, in account-index order.
    pub fn program_ids(&self) -> Vec<Address> {
        let mut indexed: Vec<_> = index_program_ids(&self.account_keys, &self.instructions)
            .into_iter()
            .collect();
        indexed.sort_unstable_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, key)| key).collect()
    }

    /// Account keys that are not invoked as programs.
    pub fn non_program_ids(&self) -> Vec<Address> {
        let program_ids = index_program_ids(&self.account_keys, &self.instructions);
        self.account_keys
            .iter()
            .enumerate()
            .filter(|(index, _)| !program_ids.contains_key(index))
            .map(|(_, key)| *key)
            .collect()
    }

    /// The signing payload.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(3 + 1 + self.account_keys.len() * 32 + 32 + 64);
        write_header(&mut buf, &self.header);
        write_keys(&mut buf, &self.account_keys);
        buf.extend_from_slice(self.recent_blockhash.as_bytes());
        write_instructions(&mut buf, &self.instructions);
        buf
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, SolError> {
        let mut reader = WireReader::new(data);
        let message = Self::read(&mut reader)?;
        expect_end(&reader)?;
        Ok(message)
    }

    pub(crate) fn read(reader: &mut WireReader<'_>) -> Result<Self, SolError> {
        let header = read_header(reader)?;
        let account_keys = read_keys(reader)?;
        let recent_blockhash = read_blockhash(reader)?;
        let instructions = read_instructions(reader)?;
        sanitize(&header, account_keys.len(), account_keys.len(), &instructions)?;

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }
}
