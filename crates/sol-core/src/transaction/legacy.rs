use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::address::Address;
use crate::error::SolError;
use crate::hash::Hash;
use crate::instruction::{AccountMeta, Instruction};
use crate::message::{Message, MessageAccountKeys, MessageHeader, expect_end};
use crate::nonce::NonceInformation;
use crate::short_vec::WireReader;
use crate::signature::Signature;
use crate::signer::Signer;

use super::{encode_transaction, read_signatures};

/// A required signer and its signature, if it has signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignaturePubkeyPair {
    pub pubkey: Address,
    pub signature: Option<Signature>,
}

impl SignaturePubkeyPair {
    fn unsigned(pubkey: Address) -> Self {
        Self {
            pubkey,
            signature: None,
        }
    }
}

/// Checks run by [`Transaction::serialize_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeConfig {
    /// Fail if any required signer has not signed.
    pub require_all_signatures: bool,
    /// Fail if any present signature does not verify.
    pub verify_signatures: bool,
}

impl Default for SerializeConfig {
    fn default() -> Self {
        Self {
            require_all_signatures: true,
            verify_signatures: true,
        }
    }
}

/// A legacy transaction under construction.
///
/// Instructions are compiled into a [`Message`] on demand: every call that
/// needs the signing payload recompiles, keeping existing signatures only
/// when the required-signer prefix is unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    signatures: Vec<SignaturePubkeyPair>,
    instructions: Vec<Instruction>,
    fee_payer: Option<Address>,

    /// Blockhash the transaction is valid under.
    pub recent_blockhash: Option<Hash>,
    /// Last block height at which `recent_blockhash` is accepted.
    pub last_valid_block_height: Option<u64>,
    /// Use a durable nonce instead of `recent_blockhash`.
    pub nonce_info: Option<NonceInformation>,
    /// Minimum slot to read the nonce account at while confirming.
    /// Guards against treating a stale read as an advanced nonce.
    pub min_nonce_context_slot: Option<u64>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blockhash(recent_blockhash: Hash, last_valid_block_height: u64) -> Self {
        Self {
            recent_blockhash: Some(recent_blockhash),
            last_valid_block_height: Some(last_valid_block_height),
            ..Self::default()
        }
    }

    pub fn with_nonce(nonce_info: NonceInformation, min_nonce_context_slot: u64) -> Self {
        Self {
            nonce_info: Some(nonce_info),
            min_nonce_context_slot: Some(min_nonce_context_slot),
            ..Self::default()
        }
    }

    pub fn add_instruction(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    pub fn add_instructions(&mut self, instructions: impl IntoIterator<Item = Instruction>) -> &mut Self {
        self.instructions.extend(instructions);
        self
    }

    pub fn set_fee_payer(&mut self, fee_payer: Address) -> &mut Self {
        self.fee_payer = Some(fee_payer);
        self
    }

    /// The explicit fee payer, or else the first signer.
    pub fn fee_payer(&self) -> Option<Address> {
        self.fee_payer
            .or_else(|| self.signatures.first().map(|pair| pair.pubkey))
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn signatures(&self) -> &[SignaturePubkeyPair] {
        &self.signatures
    }

    /// The fee payer's signature, which identifies the transaction.
    pub fn signature(&self) -> Option<Signature> {
        self.signatures.first().and_then(|pair| pair.signature)
    }

    // -----------------------------------------------------------------------
    // Compilation
    // -----------------------------------------------------------------------

    /// Compile the instructions into a message without touching signatures.
    pub fn compile_message(&self) -> Result<Message, SolError> {
        let mut recent_blockhash = self.recent_blockhash;
        let mut instructions = self.instructions.clone();

        if let Some(nonce_info) = &self.nonce_info {
            recent_blockhash = Some(nonce_info.nonce);
            if instructions.first() != Some(&nonce_info.nonce_instruction) {
                instructions.insert(0, nonce_info.nonce_instruction.clone());
            }
        }
        let recent_blockhash = recent_blockhash.ok_or(SolError::RecentBlockhashRequired)?;
        if instructions.is_empty() {
            warn!("no instructions provided");
        }
        let fee_payer = self.fee_payer().ok_or(SolError::FeePayerRequired)?;

        // Merge metas per key, first-seen order. Program ids join as
        // read-only non-signers.
        let mut metas: Vec<AccountMeta> = Vec::new();
        let mut positions: HashMap<Address, usize> = HashMap::new();
        let mut merge = |meta: AccountMeta| match positions.get(&meta.pubkey) {
            Some(&i) => {
                metas[i].is_signer |= meta.is_signer;
                metas[i].is_writable |= meta.is_writable;
            }
            None => {
                positions.insert(meta.pubkey, metas.len());
                metas.push(meta);
            }
        };
        merge(AccountMeta::new(fee_payer, true));
        for ix in &instructions {
            for meta in &ix.accounts {
                merge(*meta);
            }
            merge(AccountMeta::new_readonly(ix.program_id, false));
        }

        // Every signature slot must name a key in the message. A key that
        // signs without an instruction asking for it is promoted to signer
        // before sorting, so it lands in the signer section.
        for pair in &self.signatures {
            let meta = metas
                .iter_mut()
                .find(|meta| meta.pubkey == pair.pubkey)
                .ok_or(SolError::UnknownSigner(pair.pubkey))?;
            if !meta.is_signer {
                warn!(
                    "transaction references an unnecessary signature for {}; only the fee payer and instruction signers should sign",
                    pair.pubkey
                );
                meta.is_signer = true;
            }
        }

        metas.sort_by(|a, b| {
            b.is_signer
                .cmp(&a.is_signer)
                .then(b.is_writable.cmp(&a.is_writable))
                .then_with(|| a.pubkey.cmp_base58(&b.pubkey))
        });
        if let Some(i) = metas.iter().position(|meta| meta.pubkey == fee_payer) {
            metas.remove(i);
        }
        metas.insert(0, AccountMeta::new(fee_payer, true));

        if metas.len() > usize::from(u8::MAX) + 1 {
            return Err(SolError::TooManyAccountKeys(metas.len()));
        }
        let header = header_for(&metas)?;
        let account_keys =
            MessageAccountKeys::new(metas.iter().map(|meta| meta.pubkey).collect(), None);
        let compiled = account_keys.compile_instructions(&instructions)?;

        Ok(Message {
            header,
            account_keys: account_keys.static_account_keys().to_vec(),
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// Compile and line the signature slots up with the message's signers.
    ///
    /// Signatures survive only if the signer prefix is unchanged, in order.
    pub fn compile(&mut self) -> Result<Message, SolError> {
        let message = self.compile_message()?;
        let num_signers = usize::from(message.header.num_required_signatures);
        let signed_keys = &message.account_keys[..num_signers];

        let unchanged = self.signatures.len() == signed_keys.len()
            && self
                .signatures
                .iter()
                .zip(signed_keys)
                .all(|(pair, key)| pair.pubkey == *key);
        if !unchanged {
            if self.signatures.iter().any(|pair| pair.signature.is_some()) {
                debug!("signer set changed, clearing existing signatures");
            }
            self.signatures = signed_keys
                .iter()
                .copied()
                .map(SignaturePubkeyPair::unsigned)
                .collect();
        }
        Ok(message)
    }

    /// The bytes signers sign.
    pub fn serialize_message(&mut self) -> Result<Vec<u8>, SolError> {
        Ok(self.compile()?.serialize())
    }

    // -----------------------------------------------------------------------
    // Signing
    // -----------------------------------------------------------------------

    /// Sign with every required signer, replacing all previous signatures.
    ///
    /// Signers are deduplicated by address, first occurrence wins. The first
    /// signer is the fee payer unless one was set explicitly.
    pub fn sign<S: Signer>(&mut self, signers: &[S]) -> Result<(), SolError> {
        let signers = dedup_signers(signers);
        self.signatures = signers
            .iter()
            .map(|signer| SignaturePubkeyPair::unsigned(signer.pubkey()))
            .collect();
        let message = self.compile()?;
        self.sign_compiled(&message, &signers)
    }

    /// Add signatures from `signers` without clearing the others.
    pub fn partial_sign<S: Signer>(&mut self, signers: &[S]) -> Result<(), SolError> {
        let signers = dedup_signers(signers);
        let message = self.compile()?;
        self.sign_compiled(&message, &signers)
    }

    /// Attach an externally produced signature.
    pub fn add_signature(&mut self, pubkey: &Address, signature: Signature) -> Result<(), SolError> {
        self.compile()?;
        self.set_signature(pubkey, signature)
    }

    fn sign_compiled<S: Signer>(&mut self, message: &Message, signers: &[&S]) -> Result<(), SolError> {
        let sign_data = message.serialize();
        for signer in signers {
            let signature = signer.try_sign_message(&sign_data)?;
            self.set_signature(&signer.pubkey(), signature)?;
        }
        Ok(())
    }

    fn set_signature(&mut self, pubkey: &Address, signature: Signature) -> Result<(), SolError> {
        let pair = self
            .signatures
            .iter_mut()
            .find(|pair| pair.pubkey == *pubkey)
            .ok_or(SolError::UnknownSigner(*pubkey))?;
        pair.signature = Some(signature);
        Ok(())
    }

    /// Whether every present signature verifies, and, if
    /// `require_all_signatures`, whether every required signer has signed.
    pub fn verify_signatures(&mut self, require_all_signatures: bool) -> Result<bool, SolError> {
        let sign_data = self.serialize_message()?;
        Ok(self
            .signedness_errors(&sign_data, require_all_signatures)
            .is_none())
    }

    fn signedness_errors(&self, sign_data: &[u8], require_all_signatures: bool) -> Option<SolError> {
        let mut invalid = Vec::new();
        let mut missing = Vec::new();
        for pair in &self.signatures {
            match &pair.signature {
                None => {
                    if require_all_signatures {
                        missing.push(pair.pubkey);
                    }
                }
                Some(signature) => {
                    if !pair.pubkey.verify(sign_data, signature) {
                        invalid.push(pair.pubkey);
                    }
                }
            }
        }
        if invalid.is_empty() && missing.is_empty() {
            None
        } else {
            Some(SolError::SignatureVerificationFailed { invalid, missing })
        }
    }

    // -----------------------------------------------------------------------
    // Wire format
    // -----------------------------------------------------------------------

    /// Serialize with every signature present and valid.
    pub fn serialize(&mut self) -> Result<Vec<u8>, SolError> {
        self.serialize_with(SerializeConfig::default())
    }

    pub fn serialize_with(&mut self, config: SerializeConfig) -> Result<Vec<u8>, SolError> {
        let sign_data = self.serialize_message()?;
        if config.verify_signatures {
            if let Some(err) = self.signedness_errors(&sign_data, config.require_all_signatures) {
                return Err(err);
            }
        } else if config.require_all_signatures {
            let missing: Vec<Address> = self
                .signatures
                .iter()
                .filter(|pair| pair.signature.is_none())
                .map(|pair| pair.pubkey)
                .collect();
            if !missing.is_empty() {
                return Err(SolError::SignatureVerificationFailed {
                    invalid: Vec::new(),
                    missing,
                });
            }
        }

        let placeholder = Signature::default();
        let signatures: Vec<&Signature> = self
            .signatures
            .iter()
            .map(|pair| pair.signature.as_ref().unwrap_or(&placeholder))
            .collect();
        encode_transaction(signatures.into_iter(), &sign_data)
    }

    /// Rebuild a transaction from a compiled message and its signatures.
    ///
    /// There must be one signature per required signer, paired positionally
    /// with the message's leading keys; an all-zero signature is an unsigned
    /// slot.
    pub fn populate(message: &Message, signatures: &[Signature]) -> Result<Self, SolError> {
        let expected = usize::from(message.header.num_required_signatures);
        if signatures.len() != expected {
            return Err(SolError::SignatureCountMismatch {
                expected,
                actual: signatures.len(),
            });
        }

        let mut tx = Self {
            recent_blockhash: Some(message.recent_blockhash),
            ..Self::default()
        };
        if message.header.num_required_signatures > 0 {
            tx.fee_payer = message.account_keys.first().copied();
        }
        tx.signatures = signatures
            .iter()
            .zip(&message.account_keys)
            .map(|(signature, pubkey)| SignaturePubkeyPair {
                pubkey: *pubkey,
                signature: (!signature.is_empty()).then_some(*signature),
            })
            .collect();
        let signed: HashSet<Address> = tx.signatures.iter().map(|pair| pair.pubkey).collect();

        let key_at = |index: usize| {
            message.account_keys.get(index).copied().ok_or_else(|| {
                SolError::InvalidMessage(format!("account index {index} out of range"))
            })
        };
        for compiled in &message.instructions {
            let accounts = compiled
                .accounts
                .iter()
                .map(|&index| {
                    let index = usize::from(index);
                    let pubkey = key_at(index)?;
                    Ok(AccountMeta {
                        pubkey,
                        is_signer: signed.contains(&pubkey) || message.is_account_signer(index),
                        is_writable: message.is_account_writable(index),
                    })
                })
                .collect::<Result<Vec<_>, SolError>>()?;
            tx.instructions.push(Instruction {
                program_id: key_at(usize::from(compiled.program_id_index))?,
                accounts,
                data: compiled.data.clone(),
            });
        }
        Ok(tx)
    }

    /// Decode a legacy transaction from wire bytes.
    pub fn from_wire(data: &[u8]) -> Result<Self, SolError> {
        let mut reader = WireReader::new(data);
        let signatures = read_signatures(&mut reader)?;
        let message = Message::read(&mut reader)?;
        expect_end(&reader)?;
        Self::populate(&message, &signatures)
    }
}

fn dedup_signers<S: Signer>(signers: &[S]) -> Vec<&S> {
    let mut seen = HashSet::with_capacity(signers.len());
    signers
        .iter()
        .filter(|signer| seen.insert(signer.pubkey()))
        .collect()
}

fn header_for(metas: &[AccountMeta]) -> Result<MessageHeader, SolError> {
    let count = |pred: fn(&AccountMeta) -> bool| {
        let n = metas.iter().filter(|meta| pred(meta)).count();
        u8::try_from(n).map_err(|_| SolError::TooManyAccountKeys(metas.len()))
    };
    Ok(MessageHeader {
        num_required_signatures: count(|meta| meta.is_signer)?,
        num_readonly_signed_accounts: count(|meta| meta.is_signer && !meta.is_writable)?,
        num_readonly_unsigned_accounts: count(|meta| !meta.is_signer && !meta.is_writable)?,
    })
}
