//! Compute Budget Program instructions. Data is a one-byte tag followed by
//! little-endian fields.

use crate::address::COMPUTE_BUDGET_PROGRAM_ID;
use crate::error::SolError;
use crate::instruction::Instruction;
use crate::short_vec::WireReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeBudgetInstruction {
    /// Superseded by the unit limit and unit price instructions.
    RequestUnitsDeprecated { units: u32, additional_fee: u32 },
    RequestHeapFrame(u32),
    SetComputeUnitLimit(u32),
    /// Priority fee in micro-lamports per compute unit.
    SetComputeUnitPrice(u64),
    SetLoadedAccountsDataSizeLimit(u32),
}

impl ComputeBudgetInstruction {
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(9);
        match self {
            Self::RequestUnitsDeprecated {
                units,
                additional_fee,
            } => {
                data.push(0);
                data.extend_from_slice(&units.to_le_bytes());
                data.extend_from_slice(&additional_fee.to_le_bytes());
            }
            Self::RequestHeapFrame(bytes) => {
                data.push(1);
                data.extend_from_slice(&bytes.to_le_bytes());
            }
            Self::SetComputeUnitLimit(units) => {
                data.push(2);
                data.extend_from_slice(&units.to_le_bytes());
            }
            Self::SetComputeUnitPrice(micro_lamports) => {
                data.push(3);
                data.extend_from_slice(&micro_lamports.to_le_bytes());
            }
            Self::SetLoadedAccountsDataSizeLimit(bytes) => {
                data.push(4);
                data.extend_from_slice(&bytes.to_le_bytes());
            }
        }
        data
    }

    pub fn decode(data: &[u8]) -> Result<Self, SolError> {
        let mut r = WireReader::new(data);
        let tag = r.read_u8("compute budget instruction")?;
        match tag {
            0 => Ok(Self::RequestUnitsDeprecated {
                units: get_u32(&mut r)?,
                additional_fee: get_u32(&mut r)?,
            }),
            1 => Ok(Self::RequestHeapFrame(get_u32(&mut r)?)),
            2 => Ok(Self::SetComputeUnitLimit(get_u32(&mut r)?)),
            3 => Ok(Self::SetComputeUnitPrice(u64::from_le_bytes(
                r.read_array("u64 field")?,
            ))),
            4 => Ok(Self::SetLoadedAccountsDataSizeLimit(get_u32(&mut r)?)),
            other => Err(SolError::InvalidInstructionData(format!(
                "unknown compute budget instruction {other}"
            ))),
        }
    }
}

fn get_u32(r: &mut WireReader<'_>) -> Result<u32, SolError> {
    Ok(u32::from_le_bytes(r.read_array("u32 field")?))
}

pub fn set_compute_unit_limit(units: u32) -> Instruction {
    Instruction::new(
        COMPUTE_BUDGET_PROGRAM_ID,
        Vec::new(),
        ComputeBudgetInstruction::SetComputeUnitLimit(units).encode(),
    )
}

pub fn set_compute_unit_price(micro_lamports: u64) -> Instruction {
    Instruction::new(
        COMPUTE_BUDGET_PROGRAM_ID,
        Vec::new(),
        ComputeBudgetInstruction::SetComputeUnitPrice(micro_lamports).encode(),
    )
}

pub fn request_heap_frame(bytes: u32) -> Instruction {
    Instruction::new(
        COMPUTE_BUDGET_PROGRAM_ID,
        Vec::new(),
        ComputeBudgetInstruction::RequestHeapFrame(bytes).encode(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_limit_layout() {
        let ix = set_compute_unit_limit(200_000);
        assert_eq!(ix.program_id, COMPUTE_BUDGET_PROGRAM_ID);
        assert!(ix.accounts.is_empty());
        assert_eq!(ix.data, vec![2, 0x40, 0x0d, 0x03, 0x00]);
    }

    #[test]
    fn unit_price_layout() {
        let ix = set_compute_unit_price(1);
        assert_eq!(ix.data, vec![3, 1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn decode_every_variant() {
        let all = [
            ComputeBudgetInstruction::RequestUnitsDeprecated {
                units: 1,
                additional_fee: 2,
            },
            ComputeBudgetInstruction::RequestHeapFrame(32 * 1024),
            ComputeBudgetInstruction::SetComputeUnitLimit(1_400_000),
            ComputeBudgetInstruction::SetComputeUnitPrice(u64::MAX),
            ComputeBudgetInstruction::SetLoadedAccountsDataSizeLimit(64),
        ];
        for ix in all {
            assert_eq!(ComputeBudgetInstruction::decode(&ix.encode()).unwrap(), ix);
        }
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert!(ComputeBudgetInstruction::decode(&[]).is_err());
        assert!(ComputeBudgetInstruction::decode(&[2, 1]).is_err());
        assert!(matches!(
            ComputeBudgetInstruction::decode(&[9]),
            Err(SolError::InvalidInstructionData(_))
        ));
    }
}
