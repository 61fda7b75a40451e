use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SolError;

pub const HASH_BYTES: usize = 32;

/// A 32-byte SHA-256 hash, used on the wire as the recent blockhash (or the
/// durable nonce value standing in for it).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; HASH_BYTES]);

/// Alias used wherever the hash is a ledger blockhash.
pub type Blockhash = Hash;

impl Hash {
    pub const fn new(bytes: [u8; HASH_BYTES]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; HASH_BYTES] {
        self.0
    }

    pub const fn as_bytes(&self) -> &[u8; HASH_BYTES] {
        &self.0
    }
}

impl From<[u8; HASH_BYTES]> for Hash {
    fn from(bytes: [u8; HASH_BYTES]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Hash {
    type Err = SolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| SolError::InvalidBlockhash(format!("base58 decode failed: {e}")))?;
        let arr: [u8; HASH_BYTES] = bytes.as_slice().try_into().map_err(|_| {
            SolError::InvalidBlockhash(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let text = "CktRuQ2mttgRGkXJtyksdKHjUdc2C4TgDzyB98oEzy8";
        let hash: Hash = text.parse().unwrap();
        assert_eq!(hash, Hash::new([3u8; 32]));
        assert_eq!(hash.to_string(), text);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(matches!(
            "1111".parse::<Hash>(),
            Err(SolError::InvalidBlockhash(_))
        ));
    }

    #[test]
    fn parse_rejects_non_base58() {
        assert!("0OIl".parse::<Hash>().is_err());
    }

    #[test]
    fn serde_roundtrip_as_string() {
        let hash = Hash::new([0xAA; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, "\"CVDFLCAjXhVWiPXH9nTCTpCgVzmDVoiPzNJYuccr1dqB\"");
        assert_eq!(serde_json::from_str::<Hash>(&json).unwrap(), hash);
    }
}
