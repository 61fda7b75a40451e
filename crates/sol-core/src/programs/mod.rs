//! Built-in program instructions and decoding.
//!
//! A [`ProgramRegistry`] maps program ids to the decoder that understands
//! them. It is an ordinary value: build one with
//! [`ProgramRegistry::with_builtins`], register extra ids (a fork's memo
//! program, say) and hand it to whatever needs to inspect instructions.

pub mod compute_budget;
pub mod memo;
pub mod system;

use std::collections::HashMap;

use crate::address::{Address, COMPUTE_BUDGET_PROGRAM_ID, MEMO_PROGRAM_ID, SYSTEM_PROGRAM_ID};
use crate::error::SolError;
use crate::instruction::Instruction;

pub use compute_budget::ComputeBudgetInstruction;
pub use system::SystemInstruction;

/// Legacy memo program, still accepted by the runtime.
pub const MEMO_V1_PROGRAM_ID: Address = Address::new([
    0x05, 0x4a, 0x53, 0x50, 0xf8, 0x5d, 0xc8, 0x82, 0xd6, 0x14, 0xa5, 0x56, 0x72, 0x78, 0x8a, 0x29,
    0x6d, 0xdf, 0x1e, 0xab, 0xab, 0xd0, 0xa6, 0x06, 0x78, 0x88, 0x49, 0x32, 0xf4, 0xee, 0xf6, 0xa0,
]);

/// Which decoder handles a program's instruction data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    System,
    ComputeBudget,
    Memo,
}

/// An instruction decoded into its program's typed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInstruction {
    System(SystemInstruction),
    ComputeBudget(ComputeBudgetInstruction),
    Memo(String),
    /// The program id is not registered.
    Unknown { program_id: Address },
}

#[derive(Debug, Clone, Default)]
pub struct ProgramRegistry {
    programs: HashMap<Address, ProgramKind>,
}

impl ProgramRegistry {
    /// An empty registry. Every instruction parses as
    /// [`ParsedInstruction::Unknown`].
    pub fn new() -> Self {
        Self::default()
    }

    /// System, compute budget and both memo programs.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(SYSTEM_PROGRAM_ID, ProgramKind::System);
        registry.register(COMPUTE_BUDGET_PROGRAM_ID, ProgramKind::ComputeBudget);
        registry.register(MEMO_PROGRAM_ID, ProgramKind::Memo);
        registry.register(MEMO_V1_PROGRAM_ID, ProgramKind::Memo);
        registry
    }

    /// Route `program_id` to `kind`, replacing any earlier registration.
    pub fn register(&mut self, program_id: Address, kind: ProgramKind) -> Option<ProgramKind> {
        self.programs.insert(program_id, kind)
    }

    pub fn kind(&self, program_id: &Address) -> Option<ProgramKind> {
        self.programs.get(program_id).copied()
    }

    /// Decode `instruction` by its program id.
    ///
    /// Unregistered programs are not an error; malformed data for a
    /// registered program is.
    pub fn parse(&self, instruction: &Instruction) -> Result<ParsedInstruction, SolError> {
        let parsed = match self.kind(&instruction.program_id) {
            Some(ProgramKind::System) => {
                ParsedInstruction::System(SystemInstruction::decode(&instruction.data)?)
            }
            Some(ProgramKind::ComputeBudget) => ParsedInstruction::ComputeBudget(
                ComputeBudgetInstruction::decode(&instruction.data)?,
            ),
            Some(ProgramKind::Memo) => ParsedInstruction::Memo(memo::decode(&instruction.data)?),
            None => ParsedInstruction::Unknown {
                program_id: instruction.program_id,
            },
        };
        Ok(parsed)
    }
}
