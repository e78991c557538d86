use std::sync::OnceLock;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{BuildError, UnknownExtension};
use crate::operands::OperandRegistry;
use crate::table::{compile_text, DecisionTable};

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extensions: u32 {
const I = 1 << 0; // always included
const M = 1 << 1;
const F = 1 << 2;
const ZICSR = 1 << 3;
const C = 1 << 4;
const RV32G = Self::I.bits() | Self::M.bits() | Self::F.bits() | Self::ZICSR.bits();
const RV32GC = Self::RV32G.bits() | Self::C.bits();
}
}

/// Embedded table fragments, in concatenation order.
pub const FRAGMENTS: &[(Extensions, &str, &str)] = &[
    (Extensions::I, "rv32i", include_str!("../../tables/rv32i.opcodes")),
    (Extensions::M, "rv32m", include_str!("../../tables/rv32m.opcodes")),
    (Extensions::F, "rv32f", include_str!("../../tables/rv32f.opcodes")),
    (Extensions::ZICSR, "zicsr", include_str!("../../tables/zicsr.opcodes")),
    (Extensions::C, "rv32c", include_str!("../../tables/rv32c.opcodes")),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub extensions: Extensions,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            extensions: Extensions::RV32GC,
        }
    }
}

impl TableConfig {
    pub fn new(extensions: Extensions) -> Self {
        Self { extensions }
    }

    /// Concatenated text of the selected fragments.
    pub fn source(&self) -> String {
        let selected = self.extensions | Extensions::I;
        FRAGMENTS
            .iter()
            .filter(|(ext, _, _)| selected.contains(*ext))
            .map(|(_, _, text)| *text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parses a comma separated selection such as `i,m,zicsr,c` or `rv32gc`.
pub fn parse_extensions(list: &str) -> Result<Extensions, UnknownExtension> {
    let mut selected = Extensions::I;
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let flag = Extensions::from_name(&name.to_ascii_uppercase())
            .ok_or_else(|| UnknownExtension(name.to_string()))?;
        selected |= flag;
    }
    Ok(selected)
}

pub fn build(config: &TableConfig) -> Result<DecisionTable, BuildError> {
    compile_text(&config.source(), &OperandRegistry::riscv())
}

fn cached(
    cell: &'static OnceLock<Result<DecisionTable, BuildError>>,
    extensions: Extensions,
) -> Result<&'static DecisionTable, &'static BuildError> {
    cell.get_or_init(|| build(&TableConfig::new(extensions))).as_ref()
}

/// Shared RV32G table, built on first use.
pub fn rv32g() -> Result<&'static DecisionTable, &'static BuildError> {
    static TABLE: OnceLock<Result<DecisionTable, BuildError>> = OnceLock::new();
    cached(&TABLE, Extensions::RV32G)
}

/// Shared RV32GC table, built on first use.
pub fn rv32gc() -> Result<&'static DecisionTable, &'static BuildError> {
    static TABLE: OnceLock<Result<DecisionTable, BuildError>> = OnceLock::new();
    cached(&TABLE, Extensions::RV32GC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_is_always_selected() {
        let text = TableConfig::new(Extensions::M).source();
        assert!(text.contains("addi"));
        assert!(text.contains("mulhsu"));
        assert!(!text.contains("c.addi"));
    }

    #[test]
    fn shipped_fragments_compile_cleanly() {
        for ext in [Extensions::I, Extensions::RV32G, Extensions::RV32GC] {
            let table = build(&TableConfig::new(ext)).unwrap();
            assert!(table.ambiguities().is_empty(), "{ext:?}: {:?}", table.ambiguities());
        }
    }

    #[test]
    fn extension_lists() {
        assert_eq!(
            parse_extensions("m, c").unwrap(),
            Extensions::I | Extensions::M | Extensions::C
        );
        assert_eq!(parse_extensions("rv32gc").unwrap(), Extensions::RV32GC);
        assert_eq!(parse_extensions("").unwrap(), Extensions::I);
        assert_eq!(parse_extensions("m,v"), Err(UnknownExtension("v".into())));
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = TableConfig::new(Extensions::I | Extensions::C);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TableConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
