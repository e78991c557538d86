//! Operand shape resolver.
//!
//! Maps the operand names a rule declares to the exact rules for pulling their
//! values out of an encoded word. Split immediates are listed segment by
//! segment in the format's own bit order; `width` includes any implicit
//! low-order zeros so sign extension starts from the right bit.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{InvalidLayout, LayoutFault, UnknownShape};
use crate::spec::{OperandName, Spec};

/// The operand slot an extracted value fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Rd,
    Rs1,
    Rs2,
    Rs3,
    Rm,
    Fm,
    Pred,
    Succ,
    Shamt,
    Imm,
    Csr,
    Zimm,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Rd => "rd",
            Field::Rs1 => "rs1",
            Field::Rs2 => "rs2",
            Field::Rs3 => "rs3",
            Field::Rm => "rm",
            Field::Fm => "fm",
            Field::Pred => "pred",
            Field::Succ => "succ",
            Field::Shamt => "shamt",
            Field::Imm => "imm",
            Field::Csr => "csr",
            Field::Zimm => "zimm",
        }
    }

    pub fn is_register(self) -> bool {
        matches!(self, Field::Rd | Field::Rs1 | Field::Rs2 | Field::Rs3)
    }
}

/// How the reassembled bits become a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Extension {
    Signed,
    Zero,
    Register,
    /// 3-bit register field addressing x8..x15.
    CompressedRegister,
}

/// Word bits `hi..=lo` land at result bit `at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub hi: u32,
    pub lo: u32,
    pub at: u32,
}

pub const fn seg(hi: u32, lo: u32, at: u32) -> Segment {
    Segment { hi, lo, at }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldRule {
    pub field: Field,
    pub segments: &'static [Segment],
    pub width: u32,
    pub extension: Extension,
}

impl FieldRule {
    pub fn extract(&self, word: u32) -> i64 {
        let mut raw = 0u32;
        for s in self.segments {
            let bits = (word >> s.lo) & ones(s.hi - s.lo + 1);
            raw |= bits << s.at;
        }
        match self.extension {
            Extension::Signed => {
                let shift = 32 - self.width;
                i64::from(((raw << shift) as i32) >> shift)
            }
            Extension::Zero | Extension::Register => i64::from(raw),
            Extension::CompressedRegister => i64::from(raw) + 8,
        }
    }

    /// Rejects rules whose extraction would shift past the word.
    pub fn check(&self) -> Result<(), LayoutFault> {
        if !(1..=32).contains(&self.width) {
            return Err(LayoutFault::Width { width: self.width });
        }
        for s in self.segments {
            if s.hi < s.lo || s.hi >= 32 {
                return Err(LayoutFault::Segment { hi: s.hi, lo: s.lo });
            }
            let len = s.hi - s.lo + 1;
            if s.at > self.width || len > self.width - s.at {
                return Err(LayoutFault::Placement {
                    hi: s.hi,
                    lo: s.lo,
                    at: s.at,
                    width: self.width,
                });
            }
        }
        Ok(())
    }

    /// Word bits this rule reads.
    pub fn bits(&self) -> u32 {
        self.segments
            .iter()
            .fold(0, |m, s| m | (ones(s.hi - s.lo + 1) << s.lo))
    }
}

fn ones(width: u32) -> u32 {
    ((1u64 << width) - 1) as u32
}

pub type Layout = &'static [FieldRule];

/// Word bits read by every rule of a layout.
pub fn layout_bits(layout: Layout) -> u32 {
    layout.iter().fold(0, |m, r| m | r.bits())
}

/// Checks every rule of the layout `spec` resolved to.
pub fn check_layout(spec: &Spec, layout: Layout) -> Result<(), InvalidLayout> {
    for rule in layout {
        rule.check().map_err(|fault| InvalidLayout {
            operator: spec.operator.clone(),
            line: spec.line,
            field: rule.field.as_str().to_string(),
            fault,
        })?;
    }
    Ok(())
}

const fn reg(field: Field, segments: &'static [Segment]) -> FieldRule {
    FieldRule { field, segments, width: 5, extension: Extension::Register }
}

const fn creg(field: Field, segments: &'static [Segment]) -> FieldRule {
    FieldRule { field, segments, width: 3, extension: Extension::CompressedRegister }
}

const fn imm(segments: &'static [Segment], width: u32, extension: Extension) -> FieldRule {
    FieldRule { field: Field::Imm, segments, width, extension }
}

const fn uint(field: Field, segments: &'static [Segment], width: u32) -> FieldRule {
    FieldRule { field, segments, width, extension: Extension::Zero }
}

// 32-bit formats
const RD: FieldRule = reg(Field::Rd, &[seg(11, 7, 0)]);
const RS1: FieldRule = reg(Field::Rs1, &[seg(19, 15, 0)]);
const RS2: FieldRule = reg(Field::Rs2, &[seg(24, 20, 0)]);
const RS3: FieldRule = reg(Field::Rs3, &[seg(31, 27, 0)]);
const RM: FieldRule = uint(Field::Rm, &[seg(14, 12, 0)], 3);
const FM: FieldRule = uint(Field::Fm, &[seg(31, 28, 0)], 4);
const PRED: FieldRule = uint(Field::Pred, &[seg(27, 24, 0)], 4);
const SUCC: FieldRule = uint(Field::Succ, &[seg(23, 20, 0)], 4);
const SHAMT: FieldRule = uint(Field::Shamt, &[seg(24, 20, 0)], 5);
const CSR: FieldRule = uint(Field::Csr, &[seg(31, 20, 0)], 12);
const ZIMM: FieldRule = uint(Field::Zimm, &[seg(19, 15, 0)], 5);

const I_IMM: FieldRule = imm(&[seg(31, 20, 0)], 12, Extension::Signed);
const S_IMM: FieldRule = imm(&[seg(31, 25, 5), seg(11, 7, 0)], 12, Extension::Signed);
// offset[12|10:5] in 31..25, offset[4:1|11] in 11..7
const B_IMM: FieldRule = imm(
    &[seg(31, 31, 12), seg(7, 7, 11), seg(30, 25, 5), seg(11, 8, 1)],
    13,
    Extension::Signed,
);
const U_IMM: FieldRule = imm(&[seg(31, 12, 12)], 32, Extension::Signed);
// offset[20|10:1|11|19:12] in 31..12
const J_IMM: FieldRule = imm(
    &[seg(31, 31, 20), seg(19, 12, 12), seg(20, 20, 11), seg(30, 21, 1)],
    21,
    Extension::Signed,
);

// 16-bit formats
const C_RD: FieldRule = reg(Field::Rd, &[seg(11, 7, 0)]);
const C_RS1: FieldRule = reg(Field::Rs1, &[seg(11, 7, 0)]);
const C_RS2: FieldRule = reg(Field::Rs2, &[seg(6, 2, 0)]);
const C_RD_P: FieldRule = creg(Field::Rd, &[seg(4, 2, 0)]);
const C_RS2_P: FieldRule = creg(Field::Rs2, &[seg(4, 2, 0)]);
const C_RS1_P: FieldRule = creg(Field::Rs1, &[seg(9, 7, 0)]);
const C_RD_P_HI: FieldRule = creg(Field::Rd, &[seg(9, 7, 0)]);
const C_SHAMT: FieldRule = uint(Field::Shamt, &[seg(6, 2, 0)], 5);

// nzuimm[5:4|9:6|2|3] in 12..5
const C_ADDI4SPN_IMM: FieldRule = imm(
    &[seg(12, 11, 4), seg(10, 7, 6), seg(6, 6, 2), seg(5, 5, 3)],
    10,
    Extension::Zero,
);
// uimm[5:3] in 12..10, uimm[2|6] in 6..5
const C_WORD_IMM: FieldRule =
    imm(&[seg(12, 10, 3), seg(6, 6, 2), seg(5, 5, 6)], 7, Extension::Zero);
const C_IMM6: FieldRule = imm(&[seg(12, 12, 5), seg(6, 2, 0)], 6, Extension::Signed);
// nzimm[9] in 12, nzimm[4|6|8:7|5] in 6..2
const C_ADDI16SP_IMM: FieldRule = imm(
    &[seg(12, 12, 9), seg(6, 6, 4), seg(5, 5, 6), seg(4, 3, 7), seg(2, 2, 5)],
    10,
    Extension::Signed,
);
const C_LUI_IMM: FieldRule = imm(&[seg(12, 12, 17), seg(6, 2, 12)], 18, Extension::Signed);
// offset[11|4|9:8|10|6|7|3:1|5] in 12..2
const C_JUMP_IMM: FieldRule = imm(
    &[
        seg(12, 12, 11),
        seg(11, 11, 4),
        seg(10, 9, 8),
        seg(8, 8, 10),
        seg(7, 7, 6),
        seg(6, 6, 7),
        seg(5, 3, 1),
        seg(2, 2, 5),
    ],
    12,
    Extension::Signed,
);
// offset[8|4:3] in 12..10, offset[7:6|2:1|5] in 6..2
const C_BRANCH_IMM: FieldRule = imm(
    &[seg(12, 12, 8), seg(11, 10, 3), seg(6, 5, 6), seg(4, 3, 1), seg(2, 2, 5)],
    9,
    Extension::Signed,
);
// uimm[5] in 12, uimm[4:2|7:6] in 6..2
const C_LWSP_IMM: FieldRule =
    imm(&[seg(12, 12, 5), seg(6, 4, 2), seg(3, 2, 6)], 8, Extension::Zero);
// uimm[5:2|7:6] in 12..7
const C_SWSP_IMM: FieldRule = imm(&[seg(12, 9, 2), seg(8, 7, 6)], 8, Extension::Zero);

use OperandName as N;

const RISCV_LAYOUTS: &[(&[OperandName], Layout)] = &[
    (&[], &[]),
    (&[N::Rd, N::Rs1, N::Rs2], &[RD, RS1, RS2]),
    (&[N::Rd, N::Rs1, N::Imm12], &[RD, RS1, I_IMM]),
    (&[N::Rd, N::Rs1, N::Shamtw], &[RD, RS1, SHAMT]),
    (&[N::Imm12Hi, N::Imm12Lo, N::Rs1, N::Rs2], &[RS1, RS2, S_IMM]),
    (&[N::Bimm12Hi, N::Bimm12Lo, N::Rs1, N::Rs2], &[RS1, RS2, B_IMM]),
    (&[N::Rd, N::Imm20], &[RD, U_IMM]),
    (&[N::Rd, N::Jimm20], &[RD, J_IMM]),
    (&[N::Fm, N::Pred, N::Succ, N::Rd, N::Rs1], &[FM, PRED, SUCC, RD, RS1]),
    (&[N::Rd, N::Rs1], &[RD, RS1]),
    (&[N::Rd, N::Rs1, N::Rm], &[RD, RS1, RM]),
    (&[N::Rd, N::Rs1, N::Rs2, N::Rm], &[RD, RS1, RS2, RM]),
    (&[N::Rd, N::Rs1, N::Rs2, N::Rs3, N::Rm], &[RD, RS1, RS2, RS3, RM]),
    (&[N::Rd, N::Rs1, N::Csr], &[RD, RS1, CSR]),
    (&[N::Rd, N::Zimm, N::Csr], &[RD, ZIMM, CSR]),
    // CIW
    (&[N::RdP, N::CNzuimm10], &[C_RD_P, C_ADDI4SPN_IMM]),
    // CL / CS
    (&[N::RdP, N::Rs1P, N::CUimm7Lo, N::CUimm7Hi], &[C_RD_P, C_RS1_P, C_WORD_IMM]),
    (&[N::Rs1P, N::Rs2P, N::CUimm7Lo, N::CUimm7Hi], &[C_RS1_P, C_RS2_P, C_WORD_IMM]),
    // CI
    (&[N::RdRs1N0, N::CNzimm6Lo, N::CNzimm6Hi], &[C_RD, C_RS1, C_IMM6]),
    (&[N::Rd, N::CImm6Lo, N::CImm6Hi], &[C_RD, C_IMM6]),
    (&[N::CNzimm10Lo, N::CNzimm10Hi], &[C_ADDI16SP_IMM]),
    (&[N::RdN2, N::CNzimm18Lo, N::CNzimm18Hi], &[C_RD, C_LUI_IMM]),
    (&[N::RdRs1N0, N::CNzuimm6Lo], &[C_RD, C_RS1, C_SHAMT]),
    (&[N::RdN0, N::CUimm8SpLo, N::CUimm8SpHi], &[C_RD, C_LWSP_IMM]),
    (&[N::Rd, N::CUimm8SpLo, N::CUimm8SpHi], &[C_RD, C_LWSP_IMM]),
    // CB
    (&[N::RdRs1P, N::CNzuimm6Lo], &[C_RD_P_HI, C_RS1_P, C_SHAMT]),
    (&[N::RdRs1P, N::CImm6Lo, N::CImm6Hi], &[C_RD_P_HI, C_RS1_P, C_IMM6]),
    (&[N::Rs1P, N::CBimm9Lo, N::CBimm9Hi], &[C_RS1_P, C_BRANCH_IMM]),
    // CA
    (&[N::RdRs1P, N::Rs2P], &[C_RD_P_HI, C_RS1_P, C_RS2_P]),
    // CJ
    (&[N::CImm12], &[C_JUMP_IMM]),
    // CR
    (&[N::Rs1N0], &[C_RS1]),
    (&[N::CRs1N0], &[C_RS1]),
    (&[N::Rd, N::CRs2N0], &[C_RD, C_RS2]),
    (&[N::RdRs1, N::CRs2N0], &[C_RD, C_RS1, C_RS2]),
    // CSS
    (&[N::CRs2, N::CUimm8SpS], &[C_RS2, C_SWSP_IMM]),
];

/// Registry of operand tuples to extraction layouts.
///
/// Keys are canonical: the declared names sorted, so `rd rs1 imm12` and
/// `imm12 rd rs1` resolve to the same layout.
#[derive(Debug, Clone, Default)]
pub struct OperandRegistry {
    layouts: HashMap<Vec<OperandName>, Layout>,
}

impl OperandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every RV32 I/M/F/Zicsr/C format family.
    pub fn riscv() -> Self {
        let mut registry = Self::new();
        for &(names, layout) in RISCV_LAYOUTS {
            registry.register(names, layout);
        }
        registry
    }

    /// Registers (or replaces) the layout for an operand tuple.
    pub fn register(&mut self, names: &[OperandName], layout: Layout) -> &mut Self {
        self.layouts.insert(canonical(names), layout);
        self
    }

    pub fn get(&self, names: &[OperandName]) -> Option<Layout> {
        self.layouts.get(&canonical(names)).copied()
    }

    pub fn resolve(&self, spec: &Spec) -> Result<Layout, UnknownShape> {
        self.get(&spec.operands).ok_or_else(|| UnknownShape {
            operator: spec.operator.clone(),
            operands: spec.operands.iter().map(|n| n.as_str().to_string()).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

fn canonical(names: &[OperandName]) -> Vec<OperandName> {
    let mut key = names.to_vec();
    key.sort_unstable();
    key
}
