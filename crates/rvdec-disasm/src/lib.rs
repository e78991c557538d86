pub mod listing;
pub mod model;

pub use listing::{disasm_range, Line};
pub use model::{fetch, load_raw_bin, read_u16, read_u32, read_u8, Image, Segment};
