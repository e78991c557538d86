use rvdec_rs::isa::rv32;
use rvdec_rs::{compile_text, Decoder, OperandRegistry};

const REFINED: &str = "\
base    rd rs1 rs2 14..12=0 6..0=0b0110011
variant rd rs1 rs2 30=1 14..12=0 6..0=0b0110011
";

// same rules, narrow one declared first
const REFINED_REVERSED: &str = "\
variant rd rs1 rs2 30=1 14..12=0 6..0=0b0110011
base    rd rs1 rs2 14..12=0 6..0=0b0110011
";

#[test]
fn narrower_rule_wins_over_the_one_it_refines() {
    for text in [REFINED, REFINED_REVERSED] {
        let table = compile_text(text, &OperandRegistry::riscv()).unwrap();
        let word = (3 << 20) | (2 << 15) | (1 << 7) | 0x33;
        assert_eq!(table.decode(word).operator(), Some("base"));
        assert_eq!(table.decode(word | (1 << 30)).operator(), Some("variant"));
        // bits the narrow rule does not care about stay free
        assert_eq!(table.decode(word | (1 << 30) | (1 << 31)).operator(), Some("variant"));
        assert_eq!(table.decode(word | (1 << 31)).operator(), Some("base"));
    }
}

#[test]
fn add_sub_and_mul_share_the_opcode() {
    let table = rv32::rv32g().unwrap();
    let r = |funct7: u32| (funct7 << 25) | (3 << 20) | (2 << 15) | (1 << 7) | 0x33;
    assert_eq!(table.decode(r(0x00)).operator(), Some("add"));
    assert_eq!(table.decode(r(0x20)).operator(), Some("sub"));
    assert_eq!(table.decode(r(0x01)).operator(), Some("mul"));
    // funct7 outside every rule
    assert!(table.decode(r(0x02)).is_illegal());
}

#[test]
fn compressed_register_forms() {
    let table = rv32::rv32gc().unwrap();
    // c.mv with rs2 = 0 is c.jr; c.add with rd = rs2 = 0 is c.ebreak
    assert_eq!(table.decode(0x8082).operator(), Some("c.jr"));
    assert_eq!(table.decode(0x8086).operator(), Some("c.mv"));
    assert_eq!(table.decode(0x9002).operator(), Some("c.ebreak"));
    assert_eq!(table.decode(0x9082).operator(), Some("c.jalr"));
    assert_eq!(table.decode(0x9086).operator(), Some("c.add"));
    // c.addi with everything zero is c.nop; x2 as c.lui target is c.addi16sp
    assert_eq!(table.decode(0x0001).operator(), Some("c.nop"));
    assert_eq!(table.decode(0x0085).operator(), Some("c.addi"));
    assert_eq!(table.decode(0x6141).operator(), Some("c.addi16sp"));
    assert_eq!(table.decode(0x6285).operator(), Some("c.lui"));
}

#[test]
fn system_instructions_outrank_csr_forms() {
    let table = rv32::rv32g().unwrap();
    assert_eq!(table.decode(0x0000_0073).operator(), Some("ecall"));
    assert_eq!(table.decode(0x0010_0073).operator(), Some("ebreak"));
    // csrrs x1, mstatus, x0
    assert_eq!(table.decode(0x3000_20F3).operator(), Some("csrrs"));
    // ecall with a nonzero rd is not an instruction
    assert!(table.decode(0x0000_00F3).is_illegal());
}

#[test]
fn illegal_words() {
    let base = rv32::rv32g().unwrap();
    assert!(base.decode(0).is_illegal());
    assert!(base.decode(u32::MAX).is_illegal());

    let full = rv32::rv32gc().unwrap();
    assert!(full.decode(u32::MAX).is_illegal());
    // c.addi4spn has no constraint excluding a zero immediate
    assert_eq!(full.decode(0).operator(), Some("c.addi4spn"));
}

#[test]
fn groups_are_in_descending_specificity() {
    let table = rv32::rv32gc().unwrap();
    let spec: Vec<u32> = table.groups().iter().map(|g| g.specificity()).collect();
    assert!(spec.windows(2).all(|w| w[0] >= w[1]), "{spec:?}");
    assert_eq!(spec.first(), Some(&32));
}
