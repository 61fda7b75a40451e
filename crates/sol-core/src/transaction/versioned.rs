use crate::address::Address;
use crate::error::SolError;
use crate::message::{expect_end, TransactionVersion, VersionedMessage};
use crate::short_vec::WireReader;
use crate::signature::Signature;
use crate::signer::Signer;

use super::{encode_transaction, read_signatures};

/// A compiled message of either version plus one signature slot per
/// required signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedTransaction {
    pub signatures: Vec<Signature>,
    pub message: VersionedMessage,
}

impl VersionedTransaction {
    /// Wrap `message` with existing signatures.
    ///
    /// An empty `signatures` creates unsigned slots; otherwise there must be
    /// exactly one signature per required signer.
    pub fn new(message: VersionedMessage, signatures: Vec<Signature>) -> Result<Self, SolError> {
        let expected = usize::from(message.header().num_required_signatures);
        let signatures = if signatures.is_empty() {
            vec![Signature::default(); expected]
        } else if signatures.len() == expected {
            signatures
        } else {
            return Err(SolError::SignatureCountMismatch {
                expected,
                actual: signatures.len(),
            });
        };
        Ok(Self {
            signatures,
            message,
        })
    }

    /// Build and sign in one step.
    pub fn try_new<S: Signer>(message: VersionedMessage, signers: &[S]) -> Result<Self, SolError> {
        let mut tx = Self::new(message, Vec::new())?;
        tx.sign(signers)?;
        Ok(tx)
    }

    pub fn version(&self) -> TransactionVersion {
        self.message.version()
    }

    /// The fee payer's signature.
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first()
    }

    /// Sign with each of `signers`. Each must be one of the message's
    /// required signers.
    pub fn sign<S: Signer>(&mut self, signers: &[S]) -> Result<(), SolError> {
        let message_data = self.message.serialize();
        for signer in signers {
            let index = self.signer_index(&signer.pubkey())?;
            let signature = signer.try_sign_message(&message_data)?;
            self.signatures[index] = signature;
        }
        Ok(())
    }

    /// Attach an externally produced signature for `pubkey`.
    pub fn add_signature(&mut self, pubkey: &Address, signature: Signature) -> Result<(), SolError> {
        let index = self.signer_index(pubkey)?;
        self.signatures[index] = signature;
        Ok(())
    }

    fn signer_index(&self, pubkey: &Address) -> Result<usize, SolError> {
        let index = self
            .message
            .signer_keys()
            .iter()
            .position(|key| key == pubkey)
            .ok_or(SolError::UnknownSigner(*pubkey))?;
        if index >= self.signatures.len() {
            return Err(SolError::SignatureCountMismatch {
                expected: self.message.signer_keys().len(),
                actual: self.signatures.len(),
            });
        }
        Ok(index)
    }

    /// Check every signature against its signer. Unsigned slots count as
    /// missing.
    pub fn verify_signatures(&self) -> Result<(), SolError> {
        let message_data = self.message.serialize();
        let mut invalid = Vec::new();
        let mut missing = Vec::new();
        for (index, key) in self.message.signer_keys().iter().enumerate() {
            match self.signatures.get(index) {
                Some(signature) if !signature.is_empty() => {
                    if !key.verify(&message_data, signature) {
                        invalid.push(*key);
                    }
                }
                _ => missing.push(*key),
            }
        }
        if invalid.is_empty() && missing.is_empty() {
            Ok(())
        } else {
            Err(SolError::SignatureVerificationFailed { invalid, missing })
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, SolError> {
        encode_transaction(self.signatures.iter(), &self.message.serialize())
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, SolError> {
        let mut reader = WireReader::new(data);
        let signatures = read_signatures(&mut reader)?;
        let message = VersionedMessage::read(&mut reader)?;
        expect_end(&reader)?;

        let expected = usize::from(message.header().num_required_signatures);
        if signatures.len() != expected {
            return Err(SolError::SignatureCountMismatch {
                expected,
                actual: signatures.len(),
            });
        }
        Ok(Self {
            signatures,
            message,
        })
    }
}
