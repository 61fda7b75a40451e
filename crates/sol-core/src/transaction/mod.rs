//! Signed transactions.
//!
//! ```text
//! Transaction:
//!   signatures   short-vec of 64-byte signatures (all zeros = unsigned)
//!   message      legacy or v0 message bytes
//! ```

mod legacy;
mod versioned;

use crate::error::SolError;
use crate::short_vec::{self, WireReader};
use crate::signature::{Signature, SIGNATURE_BYTES};

pub use legacy::{SerializeConfig, SignaturePubkeyPair, Transaction};
pub use versioned::VersionedTransaction;

/// Largest transaction the network accepts: the IPv6 minimum MTU minus
/// headers.
pub const PACKET_DATA_SIZE: usize = 1280 - 40 - 8;

/// Frame `signatures` and `message` into wire bytes, enforcing the packet
/// size limit.
pub(crate) fn encode_transaction<'a>(
    signatures: impl ExactSizeIterator<Item = &'a Signature>,
    message: &[u8],
) -> Result<Vec<u8>, SolError> {
    let count = signatures.len();
    if count > usize::from(u8::MAX) {
        return Err(SolError::TooManySignatures(count));
    }

    let mut buf = Vec::with_capacity(3 + count * SIGNATURE_BYTES + message.len());
    short_vec::encode_length(&mut buf, count);
    for signature in signatures {
        buf.extend_from_slice(signature.as_bytes());
    }
    buf.extend_from_slice(message);

    if buf.len() > PACKET_DATA_SIZE {
        return Err(SolError::TransactionTooLarge {
            size: buf.len(),
            max: PACKET_DATA_SIZE,
        });
    }
    Ok(buf)
}

pub(crate) fn read_signatures(reader: &mut WireReader<'_>) -> Result<Vec<Signature>, SolError> {
    let count = reader.read_length("signatures")?;
    let mut signatures = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        signatures.push(Signature::new(reader.read_array("signature")?));
    }
    Ok(signatures)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_limit_is_1232() {
        assert_eq!(PACKET_DATA_SIZE, 1232);
    }

    #[test]
    fn frame_prefixes_signature_count() {
        let sigs = [Signature::new([1; 64]), Signature::default()];
        let bytes = encode_transaction(sigs.iter(), &[0xAB]).unwrap();
        assert_eq!(bytes.len(), 1 + 128 + 1);
        assert_eq!(bytes[0], 2);
        assert_eq!(&bytes[1..65], &[1; 64]);
        assert_eq!(&bytes[65..129], &[0; 64]);
        assert_eq!(bytes[129], 0xAB);
    }

    #[test]
    fn frame_rejects_oversized() {
        let message = vec![0u8; PACKET_DATA_SIZE];
        let err = encode_transaction(std::iter::empty(), &message).unwrap_err();
        assert_eq!(
            err,
            SolError::TransactionTooLarge {
                size: PACKET_DATA_SIZE + 1,
                max: PACKET_DATA_SIZE
            }
        );
    }

    #[test]
    fn frame_rejects_256_signatures() {
        let sigs = vec![Signature::default(); 256];
        assert_eq!(
            encode_transaction(sigs.iter(), &[]),
            Err(SolError::TooManySignatures(256))
        );
    }

    #[test]
    fn read_signatures_reports_truncation() {
        let mut data = vec![2u8];
        data.extend_from_slice(&[7; 64]);
        let mut reader = WireReader::new(&data);
        assert_eq!(
            read_signatures(&mut reader),
            Err(SolError::UnexpectedEof("signature"))
        );
    }
}
