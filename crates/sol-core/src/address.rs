//! Solana addresses.
//!
//! An address is a raw 32-byte value. For wallet accounts it is the Ed25519
//! public key itself (no hashing step, unlike Bitcoin or Ethereum); program
//! derived addresses are SHA-256 outputs that deliberately fall off the
//! curve. Callers see the Base58 text form, the wire carries the raw bytes.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::Verifier;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SolError;
use crate::signature::Signature;

/// Size of an address in bytes.
pub const ADDRESS_BYTES: usize = 32;

/// Longest Base58 string that can encode 32 bytes.
const MAX_BASE58_LEN: usize = 44;

/// A 32-byte account address. Equality is byte-exact.
///
/// `Ord` compares raw bytes and exists so addresses can key ordered maps;
/// the account table ordering uses [`Address::cmp_base58`] instead.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    /// Build an address from a slice that must be exactly 32 bytes long.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, SolError> {
        let arr: [u8; ADDRESS_BYTES] = bytes.try_into().map_err(|_| {
            SolError::InvalidAddress(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// A random address. Useful for tests and throwaway accounts; it is not
    /// backed by a keypair.
    pub fn new_unique() -> Self {
        Self(rand::random())
    }

    pub const fn to_bytes(self) -> [u8; ADDRESS_BYTES] {
        self.0
    }

    pub const fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    /// Whether these bytes decompress to a point on the Ed25519 curve.
    pub fn is_on_curve(&self) -> bool {
        is_on_curve(&self.0)
    }

    /// Whether this is the all-zero address (the System Program id).
    pub fn is_default(&self) -> bool {
        self.0 == [0u8; ADDRESS_BYTES]
    }

    /// Verify an Ed25519 signature over `message` made by this address.
    ///
    /// Returns `false` for off-curve addresses, which cannot sign.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        key.verify(message, &sig).is_ok()
    }

    /// Compare two addresses by their Base58 text.
    ///
    /// This is the tie-break used when ordering the account table; it differs
    /// from byte order (e.g. `[0x11; 32]` sorts before `[0x01; 32]`).
    pub fn cmp_base58(&self, other: &Self) -> std::cmp::Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl From<[u8; ADDRESS_BYTES]> for Address {
    fn from(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }
}

impl From<ed25519_dalek::VerifyingKey> for Address {
    fn from(key: ed25519_dalek::VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = SolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > MAX_BASE58_LEN {
            return Err(SolError::InvalidAddress(format!(
                "base58 string too long: {} chars",
                s.len()
            )));
        }
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| SolError::InvalidAddress(format!("base58 decode failed: {e}")))?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Validate a Solana address string.
///
/// A valid address is a Base58 string that decodes to exactly 32 bytes.
pub fn validate_address(address: &str) -> Result<bool, SolError> {
    address.parse::<Address>().map(|_| true)
}

/// Check if 32 bytes represent a valid Ed25519 curve point.
///
/// Uses `curve25519-dalek` to attempt decompression. If it succeeds, the
/// point is on the curve.
pub fn is_on_curve(bytes: &[u8; ADDRESS_BYTES]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}

// ---------------------------------------------------------------------------
// Well-known program ids
// ---------------------------------------------------------------------------

/// System Program: `11111111111111111111111111111111`.
pub const SYSTEM_PROGRAM_ID: Address = Address::new([0u8; 32]);

/// Compute Budget Program: `ComputeBudget111111111111111111111111111111`.
pub const COMPUTE_BUDGET_PROGRAM_ID: Address = Address::new([
    0x03, 0x06, 0x46, 0x6f, 0xe5, 0x21, 0x17, 0x32, 0xff, 0xec, 0xad, 0xba, 0x72, 0xc3, 0x9b,
    0xe7, 0xbc, 0x8c, 0xe5, 0xbb, 0xc5, 0xf7, 0x12, 0x6b, 0x2c, 0x43, 0x9b, 0x3a, 0x40, 0x00,
    0x00, 0x00,
]);

/// Memo Program v2: `MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr`.
pub const MEMO_PROGRAM_ID: Address = Address::new([
    0x05, 0x4a, 0x53, 0x5a, 0x99, 0x29, 0x21, 0x06, 0x4d, 0x24, 0xe8, 0x71, 0x60, 0xda, 0x38,
    0x7c, 0x7c, 0x35, 0xb5, 0xdd, 0xbc, 0x92, 0xbb, 0x81, 0xe4, 0x1f, 0xa8, 0x40, 0x41, 0x05,
    0x44, 0x8d,
]);

/// Address Lookup Table Program: `AddressLookupTab1e1111111111111111111111111`.
pub const ADDRESS_LOOKUP_TABLE_PROGRAM_ID: Address = Address::new([
    0x02, 0x77, 0xa6, 0xaf, 0x97, 0x33, 0x9b, 0x7a, 0xc8, 0x8d, 0x18, 0x92, 0xc9, 0x04, 0x46,
    0xf5, 0x00, 0x02, 0x30, 0x92, 0x66, 0xf6, 0x2e, 0x53, 0xc1, 0x18, 0x24, 0x49, 0x82, 0x00,
    0x00, 0x00,
]);

/// SPL Token Program: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`.
pub const TOKEN_PROGRAM_ID: Address = Address::new([
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79,
    0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff,
    0x00, 0xa9,
]);

/// Associated Token Account Program: `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Address = Address::new([
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e, 0x0d,
    0x83, 0x0b, 0x5a, 0x13, 0x99, 0xda, 0xff, 0x10, 0x84, 0x04, 0x8e, 0x7b, 0xd8, 0xdb, 0xe9,
    0xf8, 0x59,
]);

/// `SysvarRecentB1ockHashes11111111111111111111`, read by `AdvanceNonceAccount`.
pub const SYSVAR_RECENT_BLOCKHASHES_ID: Address = Address::new([
    0x06, 0xa7, 0xd5, 0x17, 0x19, 0x2c, 0x56, 0x8e, 0xe0, 0x8a, 0x84, 0x5f, 0x73, 0xd2, 0x97,
    0x88, 0xcf, 0x03, 0x5c, 0x31, 0x45, 0xb2, 0x1a, 0xb3, 0x44, 0xd8, 0x06, 0x2e, 0xa9, 0x40,
    0x00, 0x00,
]);

/// `SysvarRent111111111111111111111111111111111`.
pub const SYSVAR_RENT_ID: Address = Address::new([
    0x06, 0xa7, 0xd5, 0x17, 0x19, 0x2c, 0x5c, 0x51, 0x21, 0x8c, 0xc9, 0x4c, 0x3d, 0x4a, 0xf1,
    0x7f, 0x58, 0xda, 0xee, 0x08, 0x9b, 0xa1, 0xfd, 0x44, 0xe3, 0xdb, 0xd9, 0x8a, 0x00, 0x00,
    0x00, 0x00,
]);

#[cfg(test)]
mod tests {
    use super::*;

    /// The System Program address is 32 zero bytes, which encodes to
    /// "11111111111111111111111111111111" in Base58.
    #[test]
    fn system_program_address() {
        assert_eq!(
            SYSTEM_PROGRAM_ID.to_string(),
            "11111111111111111111111111111111"
        );
        assert!(SYSTEM_PROGRAM_ID.is_default());
    }

    #[test]
    fn roundtrip_encode_decode() {
        let address = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
        let parsed: Address = address.parse().unwrap();
        assert_eq!(parsed, TOKEN_PROGRAM_ID);
        assert_eq!(parsed.to_string(), address);
    }

    #[test]
    fn well_known_ids_match_their_base58() {
        let cases = [
            (COMPUTE_BUDGET_PROGRAM_ID, "ComputeBudget111111111111111111111111111111"),
            (MEMO_PROGRAM_ID, "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr"),
            (
                ADDRESS_LOOKUP_TABLE_PROGRAM_ID,
                "AddressLookupTab1e1111111111111111111111111",
            ),
            (
                ASSOCIATED_TOKEN_PROGRAM_ID,
                "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL",
            ),
            (
                SYSVAR_RECENT_BLOCKHASHES_ID,
                "SysvarRecentB1ockHashes11111111111111111111",
            ),
            (SYSVAR_RENT_ID, "SysvarRent111111111111111111111111111111111"),
        ];
        for (id, text) in cases {
            assert_eq!(id.to_string(), text);
        }
    }

    #[test]
    fn verifying_key_to_address_and_back() {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&[0x42u8; 32]);
        let address = Address::from(signing_key.verifying_key());
        let recovered: Address = address.to_string().parse().unwrap();
        assert_eq!(recovered.to_bytes(), signing_key.verifying_key().to_bytes());
    }

    #[test]
    fn validate_valid_address() {
        assert!(validate_address("11111111111111111111111111111111").unwrap());
        assert!(validate_address("MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr").unwrap());
    }

    #[test]
    fn validate_garbage_returns_error() {
        assert!(validate_address("not-a-valid-address!!!").is_err());
    }

    #[test]
    fn validate_too_short_returns_error() {
        // "1" decodes to a single zero byte, which is not 32 bytes.
        assert!(validate_address("1").is_err());
    }

    #[test]
    fn overlong_string_is_rejected_before_decoding() {
        let long = "1".repeat(45);
        assert!(matches!(
            long.parse::<Address>(),
            Err(SolError::InvalidAddress(_))
        ));
    }

    #[test]
    fn try_from_slice_checks_length() {
        assert!(Address::try_from_slice(&[0u8; 31]).is_err());
        assert_eq!(
            Address::try_from_slice(&[7u8; 32]).unwrap(),
            Address::new([7u8; 32])
        );
    }

    #[test]
    fn base58_order_differs_from_byte_order() {
        let low = Address::new([0x01; 32]);
        let high = Address::new([0x11; 32]);
        assert!(low < high);
        assert_eq!(high.cmp_base58(&low), std::cmp::Ordering::Less);
    }

    #[test]
    fn is_on_curve_accepts_basepoint() {
        // The Ed25519 basepoint (compressed form).
        let mut basepoint = [0x66u8; 32];
        basepoint[0] = 0x58;
        assert!(is_on_curve(&basepoint));
    }

    #[test]
    fn is_on_curve_rejects_off_curve_bytes() {
        // y = 0x0202..02 has no matching x coordinate.
        assert!(!Address::new([0x02; 32]).is_on_curve());
    }

    #[test]
    fn verify_checks_signature() {
        use ed25519_dalek::Signer;

        let signing_key = ed25519_dalek::SigningKey::from_bytes(&[0x55u8; 32]);
        let address = Address::from(signing_key.verifying_key());
        let sig = Signature::new(signing_key.sign(b"hello").to_bytes());
        assert!(address.verify(b"hello", &sig));
        assert!(!address.verify(b"hellp", &sig));
        assert!(!Address::new([0x02; 32]).verify(b"hello", &sig));
    }

    #[test]
    fn serde_uses_base58_strings() {
        let json = serde_json::to_string(&TOKEN_PROGRAM_ID).unwrap();
        assert_eq!(json, "\"TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TOKEN_PROGRAM_ID);
    }

    #[test]
    fn new_unique_is_unique() {
        assert_ne!(Address::new_unique(), Address::new_unique());
    }
}
