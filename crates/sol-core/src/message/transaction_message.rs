use crate::address::Address;
use crate::error::SolError;
use crate::hash::Hash;
use crate::instruction::{AccountMeta, Instruction};
use crate::lookup_table::AddressLookupTableAccount;

use super::{GetAccountKeysArgs, Message, MessageV0, VersionedMessage};

/// An uncompiled message: payer, instructions and blockhash.
///
/// Decompiling a compiled message yields one of these, which can then be
/// recompiled to either wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMessage {
    pub payer_key: Address,
    pub instructions: Vec<Instruction>,
    pub recent_blockhash: Hash,
}

impl TransactionMessage {
    pub fn new(payer_key: Address, instructions: Vec<Instruction>, recent_blockhash: Hash) -> Self {
        Self {
            payer_key,
            instructions,
            recent_blockhash,
        }
    }

    /// Rebuild the payer and instructions a compiled message was made from.
    ///
    /// For v0 messages the lookup-loaded keys come from `args`.
    pub fn decompile(message: &VersionedMessage, args: GetAccountKeysArgs<'_>) -> Result<Self, SolError> {
        let header = message.header();
        let num_required_signatures = usize::from(header.num_required_signatures);
        let num_readonly_signed = usize::from(header.num_readonly_signed_accounts);
        let num_readonly_unsigned = usize::from(header.num_readonly_unsigned_accounts);
        let num_static = message.static_account_keys().len();

        let num_writable_signed = num_required_signatures
            .checked_sub(num_readonly_signed)
            .filter(|n| *n > 0)
            .ok_or_else(|| SolError::InvalidMessage("message header is invalid".into()))?;
        let num_writable_unsigned = num_static
            .checked_sub(num_required_signatures)
            .and_then(|n| n.checked_sub(num_readonly_unsigned))
            .ok_or_else(|| SolError::InvalidMessage("message header is invalid".into()))?;

        let account_keys = message.get_account_keys(args)?;
        let payer_key = *account_keys.get(0).ok_or_else(|| {
            SolError::InvalidMessage("no account keys found to decompile".into())
        })?;
        let num_writable_loaded = account_keys
            .account_keys_from_lookups()
            .map_or(0, |loaded| loaded.writable.len());

        let mut instructions = Vec::with_capacity(message.instructions().len());
        for compiled in message.instructions() {
            let mut accounts = Vec::with_capacity(compiled.accounts.len());
            for key_index in compiled.accounts.iter().map(|i| usize::from(*i)) {
                let pubkey = *account_keys.get(key_index).ok_or_else(|| {
                    SolError::InvalidMessage(format!(
                        "failed to find key for account key index {key_index}"
                    ))
                })?;
                let is_signer = key_index < num_required_signatures;
                let is_writable = if is_signer {
                    key_index < num_writable_signed
                } else if key_index < num_static {
                    key_index - num_required_signatures < num_writable_unsigned
                } else {
                    key_index - num_static < num_writable_loaded
                };
                accounts.push(AccountMeta {
                    pubkey,
                    is_signer,
                    is_writable,
                });
            }

            let program_id = *account_keys
                .get(usize::from(compiled.program_id_index))
                .ok_or_else(|| {
                    SolError::InvalidMessage(format!(
                        "failed to find program id for program id index {}",
                        compiled.program_id_index
                    ))
                })?;

            instructions.push(Instruction {
                program_id,
                accounts,
                data: compiled.data.clone(),
            });
        }

        Ok(Self {
            payer_key,
            instructions,
            recent_blockhash: *message.recent_blockhash(),
        })
    }

    pub fn compile_to_legacy_message(&self) -> Result<Message, SolError> {
        Message::compile(&self.payer_key, &self.instructions, self.recent_blockhash)
    }

    pub fn compile_to_v0_message(
        &self,
        address_lookup_table_accounts: &[AddressLookupTableAccount],
    ) -> Result<MessageV0, SolError> {
        MessageV0::compile(
            &self.payer_key,
            &self.instructions,
            self.recent_blockhash,
            address_lookup_table_accounts,
        )
    }
}
