use serde::Serialize;

use crate::operands::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Operand {
    pub field: Field,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction<'t> {
    pub word: u32,
    pub operator: &'t str,
    pub operands: Vec<Operand>,
    pub len: u8, // 2 or 4
}

impl Instruction<'_> {
    pub fn operand(&self, field: Field) -> Option<i64> {
        self.operands.iter().find(|o| o.field == field).map(|o| o.value)
    }
}

/// Result of decoding one word; `Illegal` is an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Decoded<'t> {
    Instruction(Instruction<'t>),
    Illegal { word: u32 },
}

impl<'t> Decoded<'t> {
    pub fn instruction(&self) -> Option<&Instruction<'t>> {
        match self {
            Decoded::Instruction(insn) => Some(insn),
            Decoded::Illegal { .. } => None,
        }
    }

    pub fn operator(&self) -> Option<&'t str> {
        self.instruction().map(|insn| insn.operator)
    }

    pub fn is_illegal(&self) -> bool {
        matches!(self, Decoded::Illegal { .. })
    }

    pub fn word(&self) -> u32 {
        match self {
            Decoded::Instruction(insn) => insn.word,
            Decoded::Illegal { word } => *word,
        }
    }
}

pub trait Decoder {
    fn decode(&self, word: u32) -> Decoded<'_>;
}
