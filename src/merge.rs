//! Constraint merger and conflict detector.
//!
//! Rules are grouped by the exact set of bits they constrain (their [`Shape`]).
//! Within a shape every rule is inserted into a decision tree that switches on
//! the shape's bit runs, most significant first; two rules meeting at the same
//! leaf either are the same rule or conflict.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::ConflictError;
use crate::spec::Spec;

/// The set of bit positions a rule constrains, independent of their values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Shape {
    mask: u32,
}

impl Shape {
    pub fn of(spec: &Spec) -> Self {
        Self { mask: spec.mask() }
    }

    pub fn from_mask(mask: u32) -> Self {
        Self { mask }
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Number of constrained bits.
    pub fn specificity(&self) -> u32 {
        self.mask.count_ones()
    }

    pub fn contains(&self, other: &Shape) -> bool {
        self.mask & other.mask == other.mask
    }

    /// Maximal contiguous `(hi, lo)` runs, most significant first.
    pub fn ranges(&self) -> Vec<(u32, u32)> {
        let mut runs = Vec::new();
        let mut hi = None;
        for bit in (0..32u32).rev() {
            let set = (self.mask >> bit) & 1 == 1;
            match (set, hi) {
                (true, None) => hi = Some(bit),
                (false, Some(h)) => {
                    runs.push((h, bit + 1));
                    hi = None;
                }
                _ => {}
            }
        }
        if let Some(h) = hi {
            runs.push((h, 0));
        }
        runs
    }

    fn path(&self, pattern: u32) -> Vec<Step> {
        self.ranges()
            .into_iter()
            .map(|(hi, lo)| {
                let width = hi - lo + 1;
                let value = (pattern >> lo) & (((1u64 << width) - 1) as u32);
                Step { hi, lo, value }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Step {
    hi: u32,
    lo: u32,
    value: u32,
}

/// Decision tree node: either switch on another bit range or stop at a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Internal {
        hi: u32,
        lo: u32,
        children: BTreeMap<u32, Node>,
    },
    /// Index of the rule in the merged slice.
    Leaf(usize),
}

impl Node {
    fn chain(path: &[Step], leaf: usize) -> Node {
        match path.split_first() {
            None => Node::Leaf(leaf),
            Some((step, rest)) => Node::Internal {
                hi: step.hi,
                lo: step.lo,
                children: BTreeMap::from([(step.value, Node::chain(rest, leaf))]),
            },
        }
    }

    /// Inserts `leaf` along `path`; returns the rule already sitting there, if any.
    fn insert(&mut self, path: &[Step], leaf: usize) -> Option<usize> {
        match (self, path.split_first()) {
            (Node::Leaf(existing), None) => Some(*existing),
            (Node::Internal { hi, lo, children }, Some((step, rest)))
                if (*hi, *lo) == (step.hi, step.lo) =>
            {
                match children.entry(step.value) {
                    Entry::Vacant(slot) => {
                        slot.insert(Node::chain(rest, leaf));
                        None
                    }
                    Entry::Occupied(mut slot) => slot.get_mut().insert(rest, leaf),
                }
            }
            // paths of one shape always have the same runs
            (node, _) => Some(node.first_leaf()),
        }
    }

    fn first_leaf(&self) -> usize {
        match self {
            Node::Leaf(idx) => *idx,
            Node::Internal { children, .. } => children
                .values()
                .next()
                .map(Node::first_leaf)
                .unwrap_or_default(),
        }
    }

    /// `(pattern, rule index)` for every leaf, in ascending pattern order.
    pub fn leaves(&self) -> Vec<(u32, usize)> {
        let mut out = Vec::new();
        self.collect(0, &mut out);
        out.sort_unstable();
        out
    }

    fn collect(&self, prefix: u32, out: &mut Vec<(u32, usize)>) {
        match self {
            Node::Leaf(idx) => out.push((prefix, *idx)),
            Node::Internal { lo, children, .. } => {
                for (value, child) in children {
                    child.collect(prefix | (value << lo), out);
                }
            }
        }
    }

    /// Indented `hi..lo == value` listing of the tree.
    pub fn render(&self, specs: &[Spec]) -> String {
        let mut out = String::new();
        self.render_into(specs, 0, &mut out);
        out
    }

    fn render_into(&self, specs: &[Spec], depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match self {
            Node::Leaf(idx) => {
                let name = specs.get(*idx).map(|s| s.operator.as_str()).unwrap_or("?");
                let _ = writeln!(out, "{indent}=> {name}");
            }
            Node::Internal { hi, lo, children } => {
                for (value, child) in children {
                    let _ = writeln!(out, "{indent}{hi}..{lo} == {value:#x}");
                    child.render_into(specs, depth + 1, out);
                }
            }
        }
    }
}

/// Per-shape trees plus every conflict found while building them.
#[derive(Debug, Clone, Default)]
pub struct Merged {
    pub trees: BTreeMap<Shape, Node>,
    pub conflicts: Vec<ConflictError>,
    /// Rules dropped because an identical rule was already present.
    pub duplicates: usize,
}

/// Merges all rules, collecting conflicts instead of stopping at the first.
pub fn merge(specs: &[Spec]) -> Merged {
    let mut merged = Merged::default();
    for (idx, spec) in specs.iter().enumerate() {
        let shape = Shape::of(spec);
        let path = shape.path(spec.pattern());
        let occupant = match merged.trees.entry(shape) {
            Entry::Vacant(slot) => {
                slot.insert(Node::chain(&path, idx));
                None
            }
            Entry::Occupied(mut slot) => slot.get_mut().insert(&path, idx),
        };
        let Some(prev) = occupant else { continue };
        let first = &specs[prev];
        if first.same_rule(spec) {
            trace!(operator = %spec.operator, line = spec.line, "duplicate rule ignored");
            merged.duplicates += 1;
        } else {
            merged.conflicts.push(ConflictError {
                first: first.operator.clone(),
                first_line: first.line,
                second: spec.operator.clone(),
                second_line: spec.line,
                ranges: shape.ranges(),
                pattern: spec.pattern(),
            });
        }
    }
    debug!(
        shapes = merged.trees.len(),
        conflicts = merged.conflicts.len(),
        duplicates = merged.duplicates,
        "merged encoding rules"
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::parse_table;

    #[test]
    fn ranges_are_maximal_runs() {
        let shape = Shape::from_mask(0xFE00_707F);
        assert_eq!(shape.ranges(), vec![(31, 25), (14, 12), (6, 0)]);
        assert_eq!(shape.specificity(), 17);
        assert_eq!(Shape::from_mask(u32::MAX).ranges(), vec![(31, 0)]);
    }

    #[test]
    fn split_ranges_share_a_shape() {
        let specs = parse_table("a 3..2=1 1..0=3\nb 3..0=6").unwrap();
        let merged = merge(&specs);
        assert_eq!(merged.trees.len(), 1);
        let root = merged.trees.values().next().unwrap();
        assert_eq!(root.leaves(), vec![(0x6, 1), (0x7, 0)]);
    }

    #[test]
    fn tree_switches_on_runs() {
        let specs = parse_table(
            "add rd rs1 rs2 31..25=0 14..12=0 6..2=0x0C 1..0=3\n\
             sub rd rs1 rs2 31..25=32 14..12=0 6..2=0x0C 1..0=3",
        )
        .unwrap();
        let merged = merge(&specs);
        let root = merged.trees.values().next().unwrap();
        let Node::Internal { hi, lo, children } = root else { panic!("expected internal root") };
        assert_eq!((*hi, *lo), (31, 25));
        assert_eq!(children.keys().copied().collect::<Vec<_>>(), vec![0, 32]);
        assert!(root.render(&specs).contains("=> sub"));
    }
}
