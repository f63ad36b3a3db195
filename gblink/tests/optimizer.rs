use arch::mnemonic::{Mnemonic, PREFIX};
use gblink::error::Pos;
use gblink::expr::Expr;
use gblink::inst::{InstrArg, InstrId, Instruction};
use gblink::label::Label;
use gblink::linker;
use gblink::section::Section;
use gblink::source::SourceFile;
use gblink::LinkContext;

fn pos() -> Pos {
    Pos::default()
}

fn nop(index: usize) -> Instruction {
    Instruction::new(Mnemonic::Nop, vec![0x00], 4, index, pos())
}

// ld a,[nn]
fn load_absolute(index: usize, address: i64) -> Instruction {
    Instruction::new(Mnemonic::Ld, vec![0xFA], 16, index, pos())
        .with_word_arg(InstrArg::Expr(Expr::Number(address)))
}

// ld [nn],a
fn store_absolute(index: usize, address: i64) -> Instruction {
    Instruction::new(Mnemonic::Ld, vec![0xEA], 16, index, pos())
        .with_word_arg(InstrArg::Expr(Expr::Number(address)))
}

fn rom0_file() -> (SourceFile, usize) {
    let mut file = SourceFile::new("main.gbs");
    let si = file.add_section(Section::new("code", "ROM0", None, None, pos()).unwrap());
    (file, si)
}

struct NoParser;

impl gblink::macros::MacroParser for NoParser {
    fn parse_tokens(
        &mut self,
        _tokens: Vec<gblink::expr::Token>,
        _cursor: &mut gblink::macros::SectionCursor<'_>,
    ) -> Result<(), gblink::Error> {
        Ok(())
    }
}

fn prepare(file: &mut SourceFile) {
    let ctx = LinkContext::new(".");
    linker::init(&ctx, file, &mut NoParser).unwrap();
    linker::link(&ctx, file).unwrap();
}

#[test]
fn high_page_load_rewritten() {
    let (mut file, si) = rom0_file();
    let id = file.add_instruction(si, load_absolute(0, 0xFF80));

    prepare(&mut file);
    linker::optimize(&mut file);

    let instr = &file.pool.instructions[id];
    assert_eq!(instr.mnemonic, Mnemonic::Ldh);
    assert_eq!(instr.raw, vec![0xF0]);
    assert_eq!(instr.size, 2);
    assert_eq!(instr.cycles, 12);
    assert_eq!(instr.resolved_arg, Some(0x80));
}

#[test]
fn high_page_store_rewritten() {
    let (mut file, si) = rom0_file();
    let id = file.add_instruction(si, store_absolute(0, 0xFFFF));

    prepare(&mut file);
    linker::optimize(&mut file);

    let instr = &file.pool.instructions[id];
    assert_eq!(instr.mnemonic, Mnemonic::Ldh);
    assert_eq!(instr.raw, vec![0xE0]);
    assert_eq!(instr.resolved_arg, Some(0xFF));
}

#[test]
fn low_address_left_alone() {
    let (mut file, si) = rom0_file();
    let id = file.add_instruction(si, load_absolute(0, 0xC000));

    prepare(&mut file);
    linker::optimize(&mut file);

    let instr = &file.pool.instructions[id];
    assert_eq!(instr.mnemonic, Mnemonic::Ld);
    assert_eq!(instr.raw, vec![0xFA]);
    assert_eq!(instr.size, 3);
}

#[test]
fn extended_opcode_excluded() {
    let (mut file, si) = rom0_file();
    let id = file.add_instruction(
        si,
        Instruction::new(Mnemonic::Bit, vec![PREFIX, 0x46], 12, 0, pos()),
    );

    prepare(&mut file);
    // even a high-page operand must not trigger a rewrite under the prefix
    file.pool.instructions[id].resolved_arg = Some(0xFF80);
    linker::optimize(&mut file);

    let instr = &file.pool.instructions[id];
    assert_eq!(instr.mnemonic, Mnemonic::Bit);
    assert_eq!(instr.raw, vec![PREFIX, 0x46]);
}

#[test]
fn rewrite_triggers_relayout() {
    let (mut file, si) = rom0_file();
    file.add_instruction(si, load_absolute(0, 0xFF80));
    let after = file.add_label(si, Label::new("after", 1, pos()));
    let tail = file.add_instruction(si, nop(2));

    prepare(&mut file);
    assert_eq!(file.pool.labels[after].offset, 3);

    linker::optimize(&mut file);

    // the shrunk load pulls everything behind it forward
    assert_eq!(file.pool.labels[after].offset, 2);
    assert_eq!(file.pool.instructions[tail].offset, 2);
}

#[test]
fn target_reference_survives_optimization() {
    let (mut file, si) = rom0_file();

    // jr over a load that will shrink
    let origin = file.add_instruction(
        si,
        Instruction::new(Mnemonic::Jr, vec![0x18], 12, 0, pos())
            .with_signed_arg(InstrArg::Offset(5)),
    );
    file.add_instruction(si, load_absolute(1, 0xFF80));
    let target = file.add_instruction(si, nop(2));

    let ctx = LinkContext::new(".");
    linker::init(&ctx, &mut file, &mut NoParser).unwrap();
    assert_eq!(
        file.pool.instructions[origin].arg,
        Some(InstrArg::Target(target))
    );

    linker::link(&ctx, &mut file).unwrap();
    assert_eq!(file.pool.instructions[origin].resolved_arg, Some(3));

    linker::optimize(&mut file);
    linker::link(&ctx, &mut file).unwrap();

    assert_eq!(file.pool.instructions[target].offset, 4);
    assert_eq!(file.pool.instructions[origin].resolved_arg, Some(2));
}

// Two consecutive nops fused into one; exercises the consumed-entry path.
fn fuse_nops(instructions: &mut [Instruction], order: &[InstrId], at: usize) -> usize {
    if at + 1 >= order.len() {
        return 0;
    }
    let (a, b) = (order[at], order[at + 1]);
    if instructions[a].mnemonic == Mnemonic::Nop && instructions[b].mnemonic == Mnemonic::Nop {
        2
    } else {
        0
    }
}

#[test]
fn dropped_instructions_recompact_and_relayout() {
    let (mut file, si) = rom0_file();

    file.add_label(si, Label::new("top", 0, pos()));
    file.add_instruction(si, nop(1));
    file.add_instruction(si, nop(2));
    file.add_instruction(si, nop(3));
    let origin = file.add_instruction(
        si,
        Instruction::new(Mnemonic::Jr, vec![0x18], 12, 4, pos()).with_signed_arg(InstrArg::Expr(
            Expr::Name {
                name: "top".into(),
                pos: pos(),
            },
        )),
    );

    let ctx = LinkContext::new(".");
    linker::init(&ctx, &mut file, &mut NoParser).unwrap();
    linker::link(&ctx, &mut file).unwrap();
    // 0 - 3 = -3, correction -2, twos complement
    assert_eq!(file.pool.instructions[origin].resolved_arg, Some(251));

    linker::optimize_with(&mut file, fuse_nops);

    // three nops collapse to one across passes, entries are compacted
    assert_eq!(file.sections[si].entries.len(), 3);
    assert_eq!(file.instructions.len(), 2);
    assert_eq!(file.pool.instructions[origin].offset, 1);

    linker::link(&ctx, &mut file).unwrap();
    assert_eq!(file.pool.instructions[origin].resolved_arg, Some(253));
}
