use arch::mnemonic::Mnemonic;
use arch::segment::Segment;
use gblink::data::DataBlock;
use gblink::error::{ErrorKind, Pos};
use gblink::expr::Expr;
use gblink::inst::Instruction;
use gblink::label::Label;
use gblink::section::Section;
use gblink::source::SourceFile;

fn pos() -> Pos {
    Pos::default()
}

fn nop(index: usize) -> Instruction {
    Instruction::new(Mnemonic::Nop, vec![0x00], 4, index, pos())
}

#[test]
fn romx_default_bank_layout() {
    let section = Section::new("code", "ROMX", None, None, pos()).unwrap();
    assert_eq!(section.segment, Segment::ROMX);
    // banked segments default to bank 1
    assert_eq!(section.bank, 1);
    assert_eq!(section.offset, 0x4000 + 0x4000);
    assert_eq!(section.bank_offset, section.offset - 0x4000);
    assert_eq!(section.end_offset, section.offset + 0x7FFF);
    assert!(section.is_rom);
    assert!(!section.is_ram);
}

#[test]
fn romx_higher_bank_layout() {
    let section = Section::new("code", "ROMX", Some(4), None, pos()).unwrap();
    assert_eq!(section.offset, 0x4000 + 4 * 0x4000);
    assert_eq!(section.bank_offset, 4 * 0x4000);
}

#[test]
fn rom0_defaults() {
    let section = Section::new("boot", "ROM0", None, None, pos()).unwrap();
    assert_eq!(section.bank, 0);
    assert_eq!(section.offset, 0x0000);
    assert_eq!(section.bank_offset, 0);
    assert_eq!(section.end_offset, 0x7FFF);
}

#[test]
fn wramx_zero_bank_size() {
    // WRAMX banks alias the same window
    let section = Section::new("vars", "WRAMX", Some(3), None, pos()).unwrap();
    assert_eq!(section.offset, 0xD000);
    assert_eq!(section.bank_offset, 0);
    assert!(section.is_ram);
}

#[test]
fn explicit_offset_in_bank() {
    let section = Section::new("data", "ROMX", Some(2), Some(0xC100), pos()).unwrap();
    assert_eq!(section.offset, 0xC100);
    assert_eq!(section.bank_offset, 2 * 0x4000);
    assert_eq!(section.end_offset, 0xC000 + 0x7FFF);
}

#[test]
fn bank_on_unbanked_segment_rejected() {
    let err = Section::new("boot", "ROM0", Some(1), None, pos()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Address);
}

#[test]
fn bank_out_of_range_rejected() {
    let err = Section::new("code", "ROMX", Some(129), None, pos()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Address);
    assert!(Section::new("code", "ROMX", Some(128), None, pos()).is_ok());
}

#[test]
fn offset_out_of_range_rejected() {
    let err = Section::new("boot", "ROM0", None, Some(0x9000), pos()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Address);

    // below the bank base is just as invalid
    let err = Section::new("code", "ROMX", Some(2), Some(0x4000), pos()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Address);
}

#[test]
fn unknown_segment_rejected() {
    let err = Section::new("gfx", "VRAM", None, None, pos()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Declaration);
}

#[test]
fn label_addresses_are_segment_relative() {
    let mut file = SourceFile::new("main.gbs");
    let si = file.add_section(Section::new("code", "ROMX", Some(3), None, pos()).unwrap());

    let entry = file.add_label(si, Label::new("entry", 0, pos()));
    file.add_instruction(si, nop(1));
    let after = file.add_label(si, Label::new("after", 2, pos()));

    file.calculate_offsets();

    // a label at the start of any ROMX bank reads as the segment base
    assert_eq!(file.pool.labels[entry].offset, 0x4000);
    assert_eq!(file.pool.labels[after].offset, 0x4001);
}

#[test]
fn offsets_advance_past_entries() {
    let mut file = SourceFile::new("main.gbs");
    let si = file.add_section(Section::new("code", "ROM0", None, None, pos()).unwrap());

    let a = file.add_instruction(si, nop(0));
    let d = file.add_data(
        si,
        DataBlock::bytes(vec![Expr::Number(1), Expr::Number(2)], 1, pos()),
    );
    let b = file.add_instruction(si, nop(2));

    file.calculate_offsets();

    assert_eq!(file.pool.instructions[a].offset, 0);
    assert_eq!(file.pool.data[d].offset, 1);
    assert_eq!(file.pool.instructions[b].offset, 3);
}

#[test]
fn calculate_offsets_is_idempotent() {
    let mut file = SourceFile::new("main.gbs");
    let si = file.add_section(Section::new("code", "ROMX", None, None, pos()).unwrap());

    file.add_label(si, Label::new("entry", 0, pos()));
    file.add_instruction(si, nop(1));
    file.add_data(si, DataBlock::words(vec![Expr::Number(0xBEEF)], 2, pos()));
    file.add_instruction(si, nop(3));

    file.calculate_offsets();
    let first: Vec<usize> = file.pool.instructions.iter().map(|i| i.offset).collect();
    let labels: Vec<usize> = file.pool.labels.iter().map(|l| l.offset).collect();

    file.calculate_offsets();
    assert_eq!(
        first,
        file.pool
            .instructions
            .iter()
            .map(|i| i.offset)
            .collect::<Vec<_>>()
    );
    assert_eq!(
        labels,
        file.pool.labels.iter().map(|l| l.offset).collect::<Vec<_>>()
    );
}
