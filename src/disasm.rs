use crate::decoder::{Decoded, Instruction, Operand};
use crate::operands::Field;

pub fn fmt_decoded(d: &Decoded) -> String {
    match d {
        Decoded::Instruction(insn) => fmt_instruction(insn),
        Decoded::Illegal { word } => format!(".word {word:#010x}"),
    }
}

pub fn fmt_instruction(insn: &Instruction) -> String {
    if insn.operands.is_empty() {
        return insn.operator.to_string();
    }
    let ops: Vec<String> = insn.operands.iter().map(fmt_operand).collect();
    format!("{} {}", insn.operator, ops.join(", "))
}

fn fmt_operand(op: &Operand) -> String {
    match op.field {
        f if f.is_register() => format!("{}=x{}", f.as_str(), op.value),
        Field::Imm => format!("imm={}", op.value),
        Field::Csr => format!("csr={:#05x}", op.value),
        f => format!("{}={}", f.as_str(), op.value),
    }
}
