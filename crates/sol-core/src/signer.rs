//! Signing keys.

use std::fmt;

use ed25519_dalek::Signer as _;
use zeroize::Zeroize;

use crate::address::Address;
use crate::error::SolError;
use crate::signature::Signature;

/// Anything that can produce an Ed25519 signature for an address.
///
/// Implemented by [`Keypair`]; hardware or remote signers can implement it
/// too. Transactions only ever talk to this trait.
pub trait Signer {
    fn pubkey(&self) -> Address;

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SolError>;
}

impl<T: Signer + ?Sized> Signer for &T {
    fn pubkey(&self) -> Address {
        (**self).pubkey()
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SolError> {
        (**self).try_sign_message(message)
    }
}

impl<T: Signer + ?Sized> Signer for Box<T> {
    fn pubkey(&self) -> Address {
        (**self).pubkey()
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SolError> {
        (**self).try_sign_message(message)
    }
}

/// An in-memory Ed25519 keypair.
///
/// The secret lives inside `ed25519_dalek::SigningKey`, which zeroizes on
/// drop. Seeds handed to the constructors are wiped once the key is built.
pub struct Keypair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Generate a new random keypair from the OS RNG.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut rng),
        }
    }

    /// Build a keypair from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, SolError> {
        let mut seed: [u8; 32] = seed.try_into().map_err(|_| {
            SolError::InvalidPrivateKey(format!("seed must be 32 bytes, got {}", seed.len()))
        })?;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(Self { signing_key })
    }

    /// Build a keypair from the 64-byte `seed || public key` form used by
    /// wallet exports.
    ///
    /// The trailing public key must match the one derived from the seed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SolError> {
        let mut secret: [u8; 64] = bytes.try_into().map_err(|_| {
            SolError::InvalidPrivateKey(format!(
                "secret key must be 64 bytes, got {}",
                bytes.len()
            ))
        })?;
        let result = ed25519_dalek::SigningKey::from_keypair_bytes(&secret)
            .map(|signing_key| Self { signing_key })
            .map_err(|e| SolError::InvalidPrivateKey(format!("{e}")));
        secret.zeroize();
        result
    }

    /// Parse the base58 text form of the 64-byte secret.
    pub fn from_base58_string(s: &str) -> Result<Self, SolError> {
        let mut bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| SolError::InvalidPrivateKey(format!("base58 decode failed: {e}")))?;
        let result = Self::from_bytes(&bytes);
        bytes.zeroize();
        result
    }

    /// The 64-byte `seed || public key` form.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.signing_key.to_keypair_bytes()
    }

    pub fn to_base58_string(&self) -> String {
        let mut bytes = self.to_bytes();
        let out = bs58::encode(bytes).into_string();
        bytes.zeroize();
        out
    }
}

impl Signer for Keypair {
    fn pubkey(&self) -> Address {
        Address::from(self.signing_key.verifying_key())
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SolError> {
        Ok(Signature::from(self.signing_key.sign(message)))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_seed_matches_dalek() {
        let seed = [0x42u8; 32];
        let keypair = Keypair::from_seed(&seed).unwrap();
        let expected = ed25519_dalek::SigningKey::from_bytes(&seed).verifying_key();
        assert_eq!(keypair.pubkey(), Address::from(expected));
    }

    #[test]
    fn from_seed_rejects_wrong_length() {
        assert!(matches!(
            Keypair::from_seed(&[1u8; 31]),
            Err(SolError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn sixty_four_byte_form_roundtrips() {
        let keypair = Keypair::generate();
        let restored = Keypair::from_bytes(&keypair.to_bytes()).unwrap();
        assert_eq!(restored.pubkey(), keypair.pubkey());

        let text = keypair.to_base58_string();
        let from_text = Keypair::from_base58_string(&text).unwrap();
        assert_eq!(from_text.pubkey(), keypair.pubkey());
    }

    #[test]
    fn from_bytes_rejects_mismatched_public_half() {
        let mut bytes = Keypair::from_seed(&[7u8; 32]).unwrap().to_bytes();
        bytes[63] ^= 0xff;
        assert!(Keypair::from_bytes(&bytes).is_err());
    }

    #[test]
    fn signatures_verify_against_pubkey() {
        let keypair = Keypair::from_seed(&[9u8; 32]).unwrap();
        let sig = keypair.try_sign_message(b"message").unwrap();
        assert!(keypair.pubkey().verify(b"message", &sig));
    }

    #[test]
    fn signing_is_deterministic() {
        let keypair = Keypair::from_seed(&[9u8; 32]).unwrap();
        assert_eq!(
            keypair.try_sign_message(b"abc").unwrap(),
            keypair.try_sign_message(b"abc").unwrap()
        );
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let keypair = Keypair::from_seed(&[9u8; 32]).unwrap();
        let debug = format!("{:?}", keypair);
        assert!(debug.contains(&keypair.pubkey().to_string()));
        assert!(!debug.contains(&keypair.to_base58_string()));
    }

    #[test]
    fn signer_through_reference_and_box() {
        let keypair = Keypair::from_seed(&[3u8; 32]).unwrap();
        let boxed: Box<dyn Signer> = Box::new(Keypair::from_seed(&[3u8; 32]).unwrap());
        let by_ref: &dyn Signer = &keypair;
        assert_eq!(boxed.pubkey(), by_ref.pubkey());
    }
}
