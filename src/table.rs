//! Bitmask grouping and priority compiler.
//!
//! Every shape becomes one [`Group`] holding a mask and the sorted patterns of
//! its rules. Groups are queried from most to least specific so a rule that
//! refines a coarser encoding always wins over it.

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::decoder::{Decoded, Decoder, Instruction, Operand};
use crate::error::BuildError;
use crate::merge::{merge, Shape};
use crate::operands::{check_layout, layout_bits, Layout, OperandRegistry};
use crate::spec::{parse_table, OperandName, Spec};

/// One rule inside a group.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub pattern: u32,
    pub operator: String,
    pub operands: Vec<OperandName>,
    #[serde(skip)]
    pub layout: Layout,
    /// Encoded length in bytes.
    pub len: u8,
    pub line: usize,
}

impl Entry {
    fn new(spec: &Spec, pattern: u32, layout: Layout) -> Self {
        let touched = spec.mask() | layout_bits(layout);
        Self {
            pattern,
            operator: spec.operator.clone(),
            operands: spec.operands.clone(),
            layout,
            len: if touched >> 16 == 0 { 2 } else { 4 },
            line: spec.line,
        }
    }

    pub fn instruction(&self, word: u32) -> Instruction<'_> {
        Instruction {
            word,
            operator: &self.operator,
            operands: self
                .layout
                .iter()
                .map(|rule| Operand { field: rule.field, value: rule.extract(word) })
                .collect(),
            len: self.len,
        }
    }
}

/// All rules sharing one shape.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub shape: Shape,
    /// Sorted by pattern, pairwise distinct.
    pub entries: Vec<Entry>,
}

impl Group {
    pub fn mask(&self) -> u32 {
        self.shape.mask()
    }

    pub fn specificity(&self) -> u32 {
        self.shape.specificity()
    }

    /// Entry whose pattern equals `word & mask`.
    pub fn find(&self, word: u32) -> Option<&Entry> {
        let masked = word & self.mask();
        self.entries
            .binary_search_by_key(&masked, |e| e.pattern)
            .ok()
            .map(|i| &self.entries[i])
    }
}

/// Two rules from unrelated shapes that can both match one word.
///
/// Neither shape refines the other, so specificity order alone picks the
/// winner; `winner` is the rule `decode` returns for `word`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ambiguity {
    pub winner: String,
    pub winner_line: usize,
    pub shadowed: String,
    pub shadowed_line: usize,
    pub word: u32,
}

/// Immutable, priority-ordered matching structure.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionTable {
    groups: Vec<Group>,
    ambiguities: Vec<Ambiguity>,
}

impl DecisionTable {
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn ambiguities(&self) -> &[Ambiguity] {
        &self.ambiguities
    }

    /// Number of distinct rules.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// First group (in priority order) with a matching entry.
    pub fn lookup(&self, word: u32) -> Option<(&Group, &Entry)> {
        self.groups
            .iter()
            .find_map(|g| g.find(word).map(|e| (g, e)))
    }
}

impl Decoder for DecisionTable {
    fn decode(&self, word: u32) -> Decoded<'_> {
        match self.lookup(word) {
            Some((_, entry)) => Decoded::Instruction(entry.instruction(word)),
            None => Decoded::Illegal { word },
        }
    }
}

/// Parses and compiles table text in one step.
pub fn compile_text(text: &str, registry: &OperandRegistry) -> Result<DecisionTable, BuildError> {
    let specs = parse_table(text)?;
    compile(&specs, registry)
}

/// Builds the decision table, or reports why the rules cannot form one.
///
/// All encoding conflicts are reported together; an unmapped operand tuple
/// or a layout that reads outside the word stops the build at the first
/// offending rule.
pub fn compile(specs: &[Spec], registry: &OperandRegistry) -> Result<DecisionTable, BuildError> {
    let merged = merge(specs);
    if !merged.conflicts.is_empty() {
        return Err(BuildError::Conflicts(merged.conflicts));
    }

    let mut groups = Vec::with_capacity(merged.trees.len());
    for (shape, root) in &merged.trees {
        let mut entries = Vec::new();
        for (pattern, idx) in root.leaves() {
            let spec = &specs[idx];
            let layout = registry.resolve(spec)?;
            check_layout(spec, layout)?;
            entries.push(Entry::new(spec, pattern, layout));
        }
        groups.push(Group { shape: *shape, entries });
    }
    // ties in specificity fall back to the mask so the order is reproducible
    groups.sort_by(|a, b| {
        b.specificity()
            .cmp(&a.specificity())
            .then_with(|| b.mask().cmp(&a.mask()))
    });
    for g in &groups {
        trace!(
            mask = format_args!("{:#010x}", g.mask()),
            specificity = g.specificity(),
            entries = g.entries.len(),
            "group"
        );
    }

    let ambiguities = find_ambiguities(&groups);
    for a in &ambiguities {
        warn!(
            winner = %a.winner,
            shadowed = %a.shadowed,
            word = format_args!("{:#010x}", a.word),
            "rules from unrelated shapes overlap"
        );
    }

    let table = DecisionTable { groups, ambiguities };
    debug!(groups = table.groups.len(), rules = table.len(), "compiled decision table");
    Ok(table)
}

fn find_ambiguities(groups: &[Group]) -> Vec<Ambiguity> {
    let mut out = Vec::new();
    for (i, first) in groups.iter().enumerate() {
        for second in &groups[i + 1..] {
            if first.shape.contains(&second.shape) || second.shape.contains(&first.shape) {
                continue;
            }
            let common = first.mask() & second.mask();
            for a in &first.entries {
                for b in &second.entries {
                    if (a.pattern ^ b.pattern) & common == 0 {
                        out.push(Ambiguity {
                            winner: a.operator.clone(),
                            winner_line: a.line,
                            shadowed: b.operator.clone(),
                            shadowed_line: b.line,
                            word: a.pattern | b.pattern,
                        });
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> OperandRegistry {
        OperandRegistry::riscv()
    }

    #[test]
    fn groups_sorted_by_specificity() {
        let table = compile_text(
            "addi rd rs1 imm12 14..12=0 6..2=0x04 1..0=3\n\
             slli rd rs1 shamtw 31..25=0 14..12=1 6..2=0x04 1..0=3\n\
             ecall 11..7=0 19..15=0 31..20=0 14..12=0 6..2=0x1C 1..0=3",
            &registry(),
        )
        .unwrap();
        let spec: Vec<u32> = table.groups().iter().map(Group::specificity).collect();
        assert_eq!(spec, vec![32, 17, 10]);
        assert!(table.ambiguities().is_empty());
    }

    #[test]
    fn partial_overlap_is_reported() {
        // bits 3..0 vs bits 5..2, both four wide, agreeing on 3..2
        let table = compile_text("left 3..0=0xC\nright 5..2=0x3", &registry()).unwrap();
        assert_eq!(table.ambiguities().len(), 1);
        let a = &table.ambiguities()[0];
        assert_eq!(a.word, 0xC);
        // equal specificity: the larger mask goes first
        assert_eq!(a.winner, "right");
        assert_eq!(table.decode(0xC).operator(), Some("right"));
    }

    #[test]
    fn lengths_follow_touched_bits() {
        let table = compile_text(
            "c.addi rd_rs1_n0 c_nzimm6lo c_nzimm6hi 1..0=1 15..13=0\n\
             lui rd imm20 6..2=0x0D 1..0=3",
            &registry(),
        )
        .unwrap();
        assert_eq!(table.decode(0x0001).instruction().map(|i| i.len), Some(2));
        assert_eq!(table.decode(0x0000_0037).instruction().map(|i| i.len), Some(4));
    }
}
