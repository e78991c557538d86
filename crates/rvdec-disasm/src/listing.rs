use serde::Serialize;
use std::fmt::Write as _;

use rvdec_rs::disasm::fmt_decoded;
use rvdec_rs::{Decoded, Decoder};

use crate::model::{fetch, read_u8, Image};

#[derive(Debug, Clone, Serialize)]
pub struct Line<'t> {
    pub addr: u32,
    pub bytes: Vec<u8>,
    pub decoded: Decoded<'t>,
}

impl Line<'_> {
    pub fn render(&self, show_bytes: bool) -> String {
        let mut s = format!("{:#010x}: ", self.addr);
        if show_bytes {
            for b in &self.bytes {
                let _ = write!(s, "{b:02x} ");
            }
            // pad compressed encodings to the width of a full word
            for _ in self.bytes.len()..4 {
                s.push_str("   ");
            }
            s.push(' ');
        }
        s.push_str(&fmt_decoded(&self.decoded));
        s
    }
}

/// Linear sweep over `[start, end)`, advancing by each decoded length.
///
/// Illegal words advance by `illegal_step` bytes.
pub fn disasm_range<'t, D: Decoder>(
    dec: &'t D,
    img: &Image,
    start: u32,
    end: u32,
    illegal_step: u32,
) -> Vec<Line<'t>> {
    let mut out = Vec::new();
    let mut pc = start;
    while pc < end {
        let Some(word) = fetch(img, pc) else { break };
        let decoded = dec.decode(word);
        let len = decoded
            .instruction()
            .map_or(illegal_step, |insn| u32::from(insn.len));
        let bytes = (0..len).filter_map(|i| read_u8(img, pc.wrapping_add(i))).collect();
        out.push(Line { addr: pc, bytes, decoded });
        pc = pc.wrapping_add(len);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvdec_rs::isa::rv32;

    #[test]
    fn mixed_width_sweep() {
        let table = rv32::rv32gc().unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x0050_0093u32.to_le_bytes()); // addi x1, x0, 5
        bytes.extend_from_slice(&0x0001u16.to_le_bytes()); // c.nop
        bytes.extend_from_slice(&0x8082u16.to_le_bytes()); // c.jr ra
        let img = Image::from_bytes(0x100, bytes);

        let lines = disasm_range(table, &img, 0x100, 0x108, 2);
        let addrs: Vec<u32> = lines.iter().map(|l| l.addr).collect();
        assert_eq!(addrs, vec![0x100, 0x104, 0x106]);
        let ops: Vec<Option<&str>> = lines.iter().map(|l| l.decoded.operator()).collect();
        assert_eq!(ops, vec![Some("addi"), Some("c.nop"), Some("c.jr")]);
        assert_eq!(lines[0].render(false), "0x00000100: addi rd=x1, rs1=x0, imm=5");
        assert!(lines[1].render(true).starts_with("0x00000104: 01 00"));
    }

    #[test]
    fn illegal_words_use_fixed_step() {
        let table = rv32::rv32g().unwrap();
        let img = Image::from_bytes(0, vec![0u8; 8]);
        let lines = disasm_range(table, &img, 0, 8, 4);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.decoded.is_illegal()));
        assert_eq!(lines[0].render(false), "0x00000000: .word 0x00000000");
    }
}
