use crate::address::{Address, MEMO_PROGRAM_ID};
use crate::error::SolError;
use crate::instruction::{AccountMeta, Instruction};

/// Attach a UTF-8 memo. Every key in `signers` must sign the transaction.
pub fn memo(text: &str, signers: &[Address]) -> Instruction {
    Instruction::new(
        MEMO_PROGRAM_ID,
        signers
            .iter()
            .map(|signer| AccountMeta::new_readonly(*signer, true))
            .collect(),
        text.as_bytes().to_vec(),
    )
}

pub fn decode(data: &[u8]) -> Result<String, SolError> {
    String::from_utf8(data.to_vec())
        .map_err(|e| SolError::InvalidInstructionData(format!("memo is not UTF-8: {e}")))
}
