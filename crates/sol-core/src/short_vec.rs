//! Short-vec length encoding.
//!
//! Every variable-length field on the wire (account keys, instructions,
//! signatures, instruction data, lookup indexes) is prefixed by its length
//! in 7-bit groups, least significant first, with the continuation bit set
//! on every byte except the last:
//!
//! - Values 0..0x7f       -> 1 byte
//! - Values 0x80..0x3fff  -> 2 bytes
//! - Values 0x4000..      -> 3 bytes (and so on)

use crate::error::SolError;

/// Longest accepted encoding. Five groups cover the whole `u32` range.
const MAX_ENCODING_LENGTH: usize = 5;

/// Append the short-vec encoding of `len` to `buf`.
pub fn encode_length(buf: &mut Vec<u8>, len: usize) {
    let mut rem = len;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

/// Decode a short-vec length from the front of `data`.
///
/// Returns `(value, bytes_consumed)`.
pub fn decode_length(data: &[u8]) -> Result<(usize, usize), SolError> {
    let mut value: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if i >= MAX_ENCODING_LENGTH {
            return Err(SolError::LengthOverflow);
        }
        value |= u64::from(byte & 0x7f) << (i * 7);
        if byte & 0x80 == 0 {
            let value = u32::try_from(value).map_err(|_| SolError::LengthOverflow)?;
            return Ok((value as usize, i + 1));
        }
    }
    Err(SolError::UnexpectedEof("short-vec length"))
}

/// Append `bytes` prefixed with its short-vec length.
pub fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_length(buf, bytes.len());
    buf.extend_from_slice(bytes);
}

/// Sequential reader over a wire buffer.
///
/// Every read is bounds-checked; running off the end yields
/// [`SolError::UnexpectedEof`] naming the field being read.
pub(crate) struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn peek_u8(&self, what: &'static str) -> Result<u8, SolError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(SolError::UnexpectedEof(what))
    }

    pub(crate) fn read_u8(&mut self, what: &'static str) -> Result<u8, SolError> {
        let byte = self.peek_u8(what)?;
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn read_bytes(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], SolError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(SolError::UnexpectedEof(what))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn read_array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], SolError> {
        let bytes = self.read_bytes(N, what)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub(crate) fn read_length(&mut self, what: &'static str) -> Result<usize, SolError> {
        let (len, consumed) = decode_length(self.remaining()).map_err(|e| match e {
            SolError::UnexpectedEof(_) => SolError::UnexpectedEof(what),
            other => other,
        })?;
        self.pos += consumed;
        Ok(len)
    }

    /// Read a short-vec prefixed byte string.
    pub(crate) fn read_vec(&mut self, what: &'static str) -> Result<Vec<u8>, SolError> {
        let len = self.read_length(what)?;
        Ok(self.read_bytes(len, what)?.to_vec())
    }
}
