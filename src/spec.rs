//! Line-oriented encoding table parser.
//!
//! Each non-blank, non-comment line describes one instruction encoding:
//!
//! ```text
//! addi    rd rs1 imm12           14..12=0 6..2=0x04 1..0=3
//! ```
//!
//! The first token is the operator, tokens containing `=` constrain a bit range
//! (`hi..lo=value` or `bit=value`) and every other token names an operand.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use crate::error::{ParseError, ParseErrorKind};

/// Width of the machine word every table describes.
pub const WORD_BITS: u32 = 32;

pub const COMMENT: char = '#';

macro_rules! operand_names {
    ($($variant:ident => $name:literal,)*) => {
        /// The fixed operand-name vocabulary accepted by the parser.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum OperandName {
            $($variant,)*
        }

        impl OperandName {
            pub const ALL: &'static [OperandName] = &[$(OperandName::$variant,)*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(OperandName::$variant => $name,)*
                }
            }
        }

        impl FromStr for OperandName {
            type Err = ParseErrorKind;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(OperandName::$variant),)*
                    _ => Err(ParseErrorKind::UnknownOperand(s.to_string())),
                }
            }
        }
    };
}

operand_names! {
    Rd => "rd",
    Rs1 => "rs1",
    Rs2 => "rs2",
    Rs3 => "rs3",
    Rm => "rm",
    Fm => "fm",
    Pred => "pred",
    Succ => "succ",
    Shamtw => "shamtw",
    Imm12 => "imm12",
    Imm12Hi => "imm12hi",
    Imm12Lo => "imm12lo",
    Bimm12Hi => "bimm12hi",
    Bimm12Lo => "bimm12lo",
    Imm20 => "imm20",
    Jimm20 => "jimm20",
    Csr => "csr",
    Zimm => "zimm",
    // compressed
    RdP => "rd_p",
    Rs1P => "rs1_p",
    Rs2P => "rs2_p",
    RdRs1 => "rd_rs1",
    RdRs1P => "rd_rs1_p",
    RdRs1N0 => "rd_rs1_n0",
    RdN0 => "rd_n0",
    RdN2 => "rd_n2",
    Rs1N0 => "rs1_n0",
    CRs2 => "c_rs2",
    CRs2N0 => "c_rs2_n0",
    CRs1N0 => "c_rs1_n0",
    CNzuimm10 => "c_nzuimm10",
    CUimm7Lo => "c_uimm7lo",
    CUimm7Hi => "c_uimm7hi",
    CNzimm6Lo => "c_nzimm6lo",
    CNzimm6Hi => "c_nzimm6hi",
    CImm6Lo => "c_imm6lo",
    CImm6Hi => "c_imm6hi",
    CNzimm10Lo => "c_nzimm10lo",
    CNzimm10Hi => "c_nzimm10hi",
    CNzimm18Lo => "c_nzimm18lo",
    CNzimm18Hi => "c_nzimm18hi",
    CNzuimm6Lo => "c_nzuimm6lo",
    CImm12 => "c_imm12",
    CBimm9Lo => "c_bimm9lo",
    CBimm9Hi => "c_bimm9hi",
    CUimm8SpLo => "c_uimm8splo",
    CUimm8SpHi => "c_uimm8sphi",
    CUimm8SpS => "c_uimm8sp_s",
}

impl fmt::Display for OperandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `value` required in word bits `hi..=lo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BitConstraint {
    pub hi: u32,
    pub lo: u32,
    pub value: u32,
}

impl BitConstraint {
    pub fn width(&self) -> u32 {
        self.hi - self.lo + 1
    }

    pub fn mask(&self) -> u32 {
        (((1u64 << self.width()) - 1) as u32) << self.lo
    }

    pub fn pattern(&self) -> u32 {
        self.value << self.lo
    }
}

/// One instruction encoding rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Spec {
    pub operator: String,
    /// In declaration order.
    pub operands: Vec<OperandName>,
    pub constraints: Vec<BitConstraint>,
    /// 1-based line in the table text.
    pub line: usize,
}

impl Spec {
    pub fn mask(&self) -> u32 {
        self.constraints.iter().fold(0, |m, c| m | c.mask())
    }

    pub fn pattern(&self) -> u32 {
        self.constraints.iter().fold(0, |p, c| p | c.pattern())
    }

    pub fn specificity(&self) -> u32 {
        self.mask().count_ones()
    }

    /// Operands sorted by name, independent of declaration order.
    pub fn sorted_operands(&self) -> Vec<OperandName> {
        let mut names = self.operands.clone();
        names.sort_unstable();
        names
    }

    /// Same operator, operand set and encoding; source line and operand
    /// order are ignored.
    pub fn same_rule(&self, other: &Spec) -> bool {
        self.operator == other.operator
            && self.mask() == other.mask()
            && self.pattern() == other.pattern()
            && self.sorted_operands() == other.sorted_operands()
    }
}

/// Parse a whole table, failing on the first malformed line.
pub fn parse_table(text: &str) -> Result<Vec<Spec>, ParseError> {
    let mut specs = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(COMMENT) {
            continue;
        }
        let spec = parse_line(line, idx + 1).map_err(|kind| ParseError {
            line_no: idx + 1,
            line: line.to_string(),
            kind,
        })?;
        specs.push(spec);
    }
    debug!(specs = specs.len(), "parsed encoding table");
    Ok(specs)
}

fn parse_line(line: &str, line_no: usize) -> Result<Spec, ParseErrorKind> {
    let mut tokens = line.split_whitespace();
    // callers skip blank lines, so there is always a first token
    let operator = tokens.next().unwrap_or_default().to_string();

    let mut operands = Vec::new();
    let mut constraints: Vec<BitConstraint> = Vec::new();
    let mut covered = 0u32;
    for token in tokens {
        if let Some((range, value)) = token.split_once('=') {
            let c = parse_constraint(range, value)?;
            if covered & c.mask() != 0 {
                return Err(ParseErrorKind::OverlappingConstraints { hi: c.hi, lo: c.lo });
            }
            covered |= c.mask();
            constraints.push(c);
        } else {
            let name: OperandName = token.parse()?;
            if operands.contains(&name) {
                return Err(ParseErrorKind::DuplicateOperand(token.to_string()));
            }
            operands.push(name);
        }
    }
    if constraints.is_empty() {
        return Err(ParseErrorKind::NoConstraints);
    }

    Ok(Spec { operator, operands, constraints, line: line_no })
}

fn parse_constraint(range: &str, value: &str) -> Result<BitConstraint, ParseErrorKind> {
    let bit = |s: &str| {
        s.parse::<u32>()
            .map_err(|_| ParseErrorKind::MalformedRange(range.to_string()))
    };
    let (hi, lo) = match range.split_once("..") {
        Some((hi, lo)) => (bit(hi)?, bit(lo)?),
        None => {
            let n = bit(range)?;
            (n, n)
        }
    };
    if hi < lo {
        return Err(ParseErrorKind::InvertedRange { hi, lo });
    }
    if hi >= WORD_BITS {
        return Err(ParseErrorKind::RangeOutOfWord { hi });
    }

    let value = parse_int(value)?;
    let width = hi - lo + 1;
    if value >> width != 0 {
        return Err(ParseErrorKind::ValueTooWide { value, width });
    }
    Ok(BitConstraint { hi, lo, value: value as u32 })
}

/// Integer literal in decimal, `0x`, `0b` or `0o` form, `_` separators allowed.
pub fn parse_int(s: &str) -> Result<u64, ParseErrorKind> {
    let cleaned: String = s.chars().filter(|&c| c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (bin, 2)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        (oct, 8)
    } else {
        (lower.as_str(), 10)
    };
    u64::from_str_radix(digits, radix).map_err(|_| ParseErrorKind::MalformedValue(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bit_and_wide_ranges() {
        let specs = parse_table(
            "ebreak 31..20=1 19..15=0 14..12=0 11..7=0 6..2=0x1C 1..0=3\n\
             c.ebreak 12=1 1..0=0b10",
        )
        .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].mask(), 0xFFFF_FFFF);
        assert_eq!(specs[0].pattern(), 0x0010_0073);
        assert_eq!(specs[1].constraints[0], BitConstraint { hi: 12, lo: 12, value: 1 });
        assert_eq!(specs[1].line, 2);
    }

    #[test]
    fn literals() {
        assert_eq!(parse_int("0x1C").unwrap(), 0x1c);
        assert_eq!(parse_int("0b1_0").unwrap(), 2);
        assert_eq!(parse_int("0o17").unwrap(), 15);
        assert_eq!(parse_int("42").unwrap(), 42);
        assert!(parse_int("0xg").is_err());
    }

    #[test]
    fn vocabulary_round_trips() {
        for name in OperandName::ALL {
            assert_eq!(name.as_str().parse::<OperandName>().unwrap(), *name);
        }
    }
}
