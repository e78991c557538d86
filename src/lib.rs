pub mod decoder;
pub mod disasm;
pub mod error;
pub mod merge;
pub mod operands;
pub mod spec;
pub mod table;

pub mod isa {
    pub mod rv32; // RV32 I/M/F/Zicsr/C fragments
}

pub use decoder::{Decoded, Decoder, Instruction, Operand};
pub use error::{
    BuildError, ConflictError, InvalidLayout, LayoutFault, ParseError, ParseErrorKind,
    UnknownExtension, UnknownShape,
};
pub use isa::rv32::{Extensions, TableConfig};
pub use operands::{Field, OperandRegistry};
pub use spec::{parse_table, BitConstraint, OperandName, Spec};
pub use table::{compile, compile_text, DecisionTable};
