//! Address lookup table accounts.
//!
//! ```text
//! AddressLookupTableState (account data):
//!   type_index              u32 LE
//!   deactivation_slot       u64 LE   (u64::MAX while active)
//!   last_extended_slot      u64 LE
//!   last_extended_start     u8
//!   has_authority           u8       (0 or 1)
//!   authority               32 bytes (zeroed when absent)
//!   padding                 2 bytes  (meta totals 56 bytes)
//!   addresses               32 bytes * n
//! ```

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::SolError;
use crate::short_vec::WireReader;

/// Size of the fixed header before the address list.
pub const LOOKUP_TABLE_META_SIZE: usize = 56;

/// Largest number of addresses a table can hold.
pub const LOOKUP_TABLE_MAX_ADDRESSES: usize = 256;

/// Decoded lookup table account data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressLookupTableState {
    pub type_index: u32,
    pub deactivation_slot: u64,
    pub last_extended_slot: u64,
    pub last_extended_slot_start_index: u8,
    pub authority: Option<Address>,
    pub addresses: Vec<Address>,
}

impl Default for AddressLookupTableState {
    fn default() -> Self {
        Self {
            type_index: 1,
            deactivation_slot: u64::MAX,
            last_extended_slot: 0,
            last_extended_slot_start_index: 0,
            authority: None,
            addresses: Vec::new(),
        }
    }
}

impl AddressLookupTableState {
    /// Decode the on-chain account data.
    pub fn decode(data: &[u8]) -> Result<Self, SolError> {
        if data.len() < LOOKUP_TABLE_META_SIZE {
            return Err(SolError::InvalidLookupTable(format!(
                "account data too short: {} < {LOOKUP_TABLE_META_SIZE}",
                data.len()
            )));
        }
        let addresses_len = data.len() - LOOKUP_TABLE_META_SIZE;
        if addresses_len % 32 != 0 {
            return Err(SolError::InvalidLookupTable(format!(
                "address region of {addresses_len} bytes is not a multiple of 32"
            )));
        }

        let mut reader = WireReader::new(data);
        let type_index = u32::from_le_bytes(reader.read_array("lookup table type")?);
        let deactivation_slot = u64::from_le_bytes(reader.read_array("deactivation slot")?);
        let last_extended_slot = u64::from_le_bytes(reader.read_array("last extended slot")?);
        let last_extended_slot_start_index = reader.read_u8("last extended start index")?;
        let authority = match reader.read_u8("authority option")? {
            0 => {
                reader.read_bytes(32, "authority")?;
                None
            }
            1 => Some(Address::new(reader.read_array("authority")?)),
            tag => {
                return Err(SolError::InvalidLookupTable(format!(
                    "invalid authority option tag {tag}"
                )))
            }
        };
        reader.read_bytes(2, "padding")?;

        let addresses = reader
            .remaining()
            .chunks_exact(32)
            .map(Address::try_from_slice)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            type_index,
            deactivation_slot,
            last_extended_slot,
            last_extended_slot_start_index,
            authority,
            addresses,
        })
    }

    /// Encode to the on-chain account data layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(LOOKUP_TABLE_META_SIZE + self.addresses.len() * 32);
        buf.extend_from_slice(&self.type_index.to_le_bytes());
        buf.extend_from_slice(&self.deactivation_slot.to_le_bytes());
        buf.extend_from_slice(&self.last_extended_slot.to_le_bytes());
        buf.push(self.last_extended_slot_start_index);
        match &self.authority {
            Some(authority) => {
                buf.push(1);
                buf.extend_from_slice(authority.as_bytes());
            }
            None => {
                buf.push(0);
                buf.extend_from_slice(&[0u8; 32]);
            }
        }
        buf.resize(LOOKUP_TABLE_META_SIZE, 0);
        for address in &self.addresses {
            buf.extend_from_slice(address.as_bytes());
        }
        buf
    }
}

/// A lookup table together with the address it lives at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressLookupTableAccount {
    pub key: Address,
    pub state: AddressLookupTableState,
}

impl AddressLookupTableAccount {
    pub fn new(key: Address, addresses: Vec<Address>) -> Self {
        Self {
            key,
            state: AddressLookupTableState {
                addresses,
                ..Default::default()
            },
        }
    }

    /// Decode a table from raw account data.
    pub fn from_account_data(key: Address, data: &[u8]) -> Result<Self, SolError> {
        Ok(Self {
            key,
            state: AddressLookupTableState::decode(data)?,
        })
    }

    /// A table is active until it has been deactivated.
    pub fn is_active(&self) -> bool {
        self.state.deactivation_slot == u64::MAX
    }

    pub fn addresses(&self) -> &[Address] {
        &self.state.addresses
    }

    /// Look up the address stored at `index`.
    pub fn get(&self, index: u8) -> Result<Address, SolError> {
        self.state
            .addresses
            .get(usize::from(index))
            .copied()
            .ok_or(SolError::LookupTableIndexOutOfRange {
                table: self.key,
                index,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> AddressLookupTableState {
        AddressLookupTableState {
            type_index: 1,
            deactivation_slot: u64::MAX,
            last_extended_slot: 123_456,
            last_extended_slot_start_index: 2,
            authority: Some(Address::new([0xAA; 32])),
            addresses: vec![
                Address::new([1; 32]),
                Address::new([2; 32]),
                Address::new([3; 32]),
            ],
        }
    }

    #[test]
    fn encode_layout_is_fixed() {
        let data = sample_state().encode();
        assert_eq!(data.len(), LOOKUP_TABLE_META_SIZE + 3 * 32);
        assert_eq!(&data[0..4], &1u32.to_le_bytes());
        assert_eq!(&data[4..12], &[0xff; 8]);
        assert_eq!(&data[12..20], &123_456u64.to_le_bytes());
        assert_eq!(data[20], 2);
        assert_eq!(data[21], 1);
        assert_eq!(&data[22..54], &[0xAA; 32]);
        assert_eq!(&data[54..56], &[0, 0]);
        assert_eq!(&data[56..88], &[1; 32]);
    }

    #[test]
    fn decode_inverts_encode() {
        let state = sample_state();
        assert_eq!(AddressLookupTableState::decode(&state.encode()).unwrap(), state);

        let no_authority = AddressLookupTableState {
            authority: None,
            ..sample_state()
        };
        let data = no_authority.encode();
        assert_eq!(data[21], 0);
        assert_eq!(AddressLookupTableState::decode(&data).unwrap(), no_authority);
    }

    #[test]
    fn decode_rejects_ragged_address_region() {
        let mut data = sample_state().encode();
        data.push(0);
        assert!(matches!(
            AddressLookupTableState::decode(&data),
            Err(SolError::InvalidLookupTable(_))
        ));
    }

    #[test]
    fn decode_rejects_short_meta() {
        assert!(AddressLookupTableState::decode(&[0u8; 40]).is_err());
    }

    #[test]
    fn decode_rejects_bad_authority_tag() {
        let mut data = sample_state().encode();
        data[21] = 7;
        assert!(AddressLookupTableState::decode(&data).is_err());
    }

    #[test]
    fn is_active_tracks_deactivation_slot() {
        let key = Address::new([9; 32]);
        let mut table = AddressLookupTableAccount::new(key, vec![]);
        assert!(table.is_active());
        table.state.deactivation_slot = 500;
        assert!(!table.is_active());
    }

    #[test]
    fn get_reports_out_of_range_index() {
        let key = Address::new([9; 32]);
        let table = AddressLookupTableAccount::new(key, vec![Address::new([1; 32])]);
        assert_eq!(table.get(0).unwrap(), Address::new([1; 32]));
        assert_eq!(
            table.get(1),
            Err(SolError::LookupTableIndexOutOfRange { table: key, index: 1 })
        );
    }
}
