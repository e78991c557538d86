use thiserror::Error;

/// Why a single table line was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("malformed bit range `{0}`")]
    MalformedRange(String),
    #[error("inverted bit range {hi}..{lo}")]
    InvertedRange { hi: u32, lo: u32 },
    #[error("bit {hi} lies outside the 32-bit word")]
    RangeOutOfWord { hi: u32 },
    #[error("malformed value `{0}`")]
    MalformedValue(String),
    #[error("value {value:#x} does not fit in {width} bit(s)")]
    ValueTooWide { value: u64, width: u32 },
    #[error("unknown operand `{0}`")]
    UnknownOperand(String),
    #[error("operand `{0}` declared twice")]
    DuplicateOperand(String),
    #[error("constraint {hi}..{lo} overlaps an earlier constraint")]
    OverlappingConstraints { hi: u32, lo: u32 },
    #[error("rule constrains no bits")]
    NoConstraints,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line_no}: {kind} in `{line}`")]
pub struct ParseError {
    pub line_no: usize,
    pub line: String,
    pub kind: ParseErrorKind,
}

/// An operand tuple with no registered extraction layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no operand layout for `{operator}` with operands ({})", operands.join(" "))]
pub struct UnknownShape {
    pub operator: String,
    pub operands: Vec<String>,
}

/// Why a registered extraction rule cannot be applied to a 32-bit word.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutFault {
    #[error("width {width} is outside 1..=32")]
    Width { width: u32 },
    #[error("segment {hi}..{lo} is inverted or outside the word")]
    Segment { hi: u32, lo: u32 },
    #[error("segment {hi}..{lo} placed at bit {at} overruns width {width}")]
    Placement { hi: u32, lo: u32, at: u32, width: u32 },
}

/// A rule resolved to a layout that would misread its operands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("operand layout for `{operator}` (line {line}), field `{field}`: {fault}")]
pub struct InvalidLayout {
    pub operator: String,
    pub line: usize,
    pub field: String,
    pub fault: LayoutFault,
}

/// An extension name outside the known set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown extension `{0}`")]
pub struct UnknownExtension(pub String);

/// Two rules claiming the same full encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "`{first}` (line {first_line}) and `{second}` (line {second_line}) \
     both encode {pattern:#010x} over bits {}",
    fmt_ranges(ranges)
)]
pub struct ConflictError {
    pub first: String,
    pub first_line: usize,
    pub second: String,
    pub second_line: usize,
    pub ranges: Vec<(u32, u32)>,
    pub pattern: u32,
}

fn fmt_ranges(ranges: &[(u32, u32)]) -> String {
    ranges
        .iter()
        .map(|&(hi, lo)| if hi == lo { format!("{hi}") } else { format!("{hi}..{lo}") })
        .collect::<Vec<_>>()
        .join(",")
}

/// Everything that can stop a decision table from being built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    UnknownShape(#[from] UnknownShape),
    #[error(transparent)]
    InvalidLayout(#[from] InvalidLayout),
    #[error("{} encoding conflict(s): {}", .0.len(), fmt_conflicts(.0))]
    Conflicts(Vec<ConflictError>),
}

fn fmt_conflicts(conflicts: &[ConflictError]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
