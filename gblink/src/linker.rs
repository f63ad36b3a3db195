use std::path::{Path, PathBuf};

use arch::mnemonic::Mnemonic;

use crate::binary::Binary;
use crate::error::{Error, Pos};
use crate::expr::{Expr, Value};
use crate::inst::{InstrArg, InstrId};
use crate::macros::{MacroArg, MacroParser, MacroRegistry, SectionCursor};
use crate::optimizer;
use crate::resolver::resolve_value;
use crate::source::{Entry, SourceFile};

/// Maximum nesting depth of macro expansions.
pub const MACRO_DEPTH_LIMIT: u32 = 32;

/// Compile-session state shared across source files: the macro registry and
/// the toolchain base directory for absolute-style include paths.
#[derive(Debug)]
pub struct LinkContext {
    pub macros: MacroRegistry,
    pub base: PathBuf,
}

impl LinkContext {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        LinkContext {
            macros: MacroRegistry::new(),
            base: base.into(),
        }
    }

    /// Stat a binary include, resolving its path against `including` or,
    /// for paths with a leading `/`, against the toolchain base directory.
    pub fn include_binary(
        &self,
        including: &Path,
        src: &str,
        pos: Pos,
    ) -> Result<Binary, Error> {
        Binary::new(&self.base, including, src, pos)
    }
}

/// First linking stage, run once per source file: expand macros, resolve
/// outstanding sizes, lay out all sections and pin down relative jump
/// targets so they survive optimization.
pub fn init(
    ctx: &LinkContext,
    file: &mut SourceFile,
    parser: &mut dyn MacroParser,
) -> Result<(), Error> {
    for section in 0..file.sections.len() {
        expand_macros(ctx, file, parser, section)?;
    }

    resolve_sizes(ctx, file)?;

    file.calculate_offsets();
    file.rebuild_instruction_index();

    patch_relative_jumps(file)?;
    verify_bounds(file)?;

    Ok(())
}

/// Second stage: resolve every instruction argument and data value to
/// concrete numbers, validating encoding ranges.
pub fn link(ctx: &LinkContext, file: &mut SourceFile) -> Result<(), Error> {
    resolve_instructions(ctx, file)?;
    resolve_data_blocks(ctx, file)
}

/// Repeatedly scan a section for unexpanded macro calls and expand them in
/// place until a pass makes no change. Expansions may contain further macro
/// calls; each inserted call carries its nesting depth and expansion stops
/// with a macro error once the cap is exceeded.
pub fn expand_macros(
    ctx: &LinkContext,
    file: &mut SourceFile,
    parser: &mut dyn MacroParser,
    section: usize,
) -> Result<(), Error> {
    loop {
        let mut expanded = false;
        let mut i = 0;

        while i < file.sections[section].entries.len() {
            // only well-formed calls expand; any other entry stays put
            if !matches!(
                file.sections[section].entries[i],
                Entry::MacroCall {
                    call: Expr::Call { .. },
                    ..
                }
            ) {
                i += 1;
                continue;
            }

            let Entry::MacroCall {
                call: Expr::Call { name, args, pos },
                depth,
            } = file.sections[section].entries.remove(i)
            else {
                unreachable!()
            };

            if ctx.macros.builtin(&name).is_some() {
                return Err(Error::ExpandBuiltinMacro { name, pos });
            }
            let Some(mac) = ctx.macros.get(&name) else {
                return Err(Error::UndefinedMacro { name, pos });
            };
            if mac.is_expression {
                return Err(Error::ExpandExpressionMacro { name, pos });
            }
            if depth >= MACRO_DEPTH_LIMIT {
                return Err(Error::MacroDepthExceeded { name, pos });
            }

            let margs = MacroArg::from_exprs(&args);
            let mut cursor = SectionCursor::new(file, section, i, depth + 1);
            mac.expand(&margs, &pos, parser, &mut cursor)?;
            expanded = true;
            // freshly inserted entries are scanned from the same position
        }

        if !expanded {
            return Ok(());
        }
    }
}

/// Resolve data declarations whose size is an expression. A textual result
/// contributes its length as the size.
fn resolve_sizes(ctx: &LinkContext, file: &mut SourceFile) -> Result<(), Error> {
    let ids = std::mem::take(&mut file.unresolved_sizes);
    for id in ids {
        let Some(expr) = file.pool.data[id].size_expr.clone() else {
            continue;
        };
        let (offset, index) = (file.pool.data[id].offset, file.pool.data[id].index);
        let size = match resolve_value(ctx, file, &expr, offset, index, false, &mut Vec::new())? {
            Value::String(s) => s.len(),
            Value::Number(n) => n.max(0) as usize,
        };
        let data = &mut file.pool.data[id];
        data.size = size;
        data.size_expr = None;
    }
    Ok(())
}

/// Convert raw numeric relative-jump targets into references to the
/// instruction occupying that address. Instruction sizes can still change
/// during optimization, a raw offset would become stale.
fn patch_relative_jumps(file: &mut SourceFile) -> Result<(), Error> {
    let ids = std::mem::take(&mut file.relative_jump_targets);
    for id in ids {
        let (address, offset, pos) = {
            let instr = &file.pool.instructions[id];
            match instr.arg {
                Some(InstrArg::Offset(offset)) => (instr.offset, offset, instr.pos.clone()),
                _ => continue,
            }
        };
        match find_instruction_by_offset(file, address, offset) {
            Some(target) => file.pool.instructions[id].arg = Some(InstrArg::Target(target)),
            None => return Err(Error::InvalidJumpTarget { pos }),
        }
    }
    Ok(())
}

/// Binary search the offset-sorted instruction list for `address + offset`.
/// Negative offsets originate at the instruction after the jump and need an
/// off-by-one correction.
pub fn find_instruction_by_offset(
    file: &SourceFile,
    address: usize,
    offset: i64,
) -> Option<InstrId> {
    let offset = if offset < 0 { offset - 1 } else { offset };
    let target = address as i64 + offset;

    file.instructions
        .binary_search_by(|&id| (file.pool.instructions[id].offset as i64).cmp(&target))
        .ok()
        .map(|i| file.instructions[i])
}

/// Entries must not run past the section's last addressable byte;
/// `end_offset` itself may still be occupied.
fn verify_bounds(file: &SourceFile) -> Result<(), Error> {
    for section in &file.sections {
        let end = section.end_cursor(&file.pool);
        if end > section.end_offset + 1 {
            return Err(Error::SectionOverflow {
                name: section.name.clone(),
                end: end - 1,
                limit: section.end_offset,
                pos: section.pos.clone(),
            });
        }
    }
    Ok(())
}

fn resolve_instructions(ctx: &LinkContext, file: &mut SourceFile) -> Result<(), Error> {
    for i in 0..file.instructions.len() {
        let id = file.instructions[i];
        let instr = &file.pool.instructions[id];
        if instr.removed {
            continue;
        }
        let Some(arg) = &instr.arg else {
            continue;
        };

        let mut value = match arg {
            // Relative jump: distance to the target instruction.
            InstrArg::Target(target) => {
                file.pool.instructions[*target].offset as i64 - instr.offset as i64
            }
            InstrArg::Offset(offset) => *offset,
            InstrArg::Expr(expr) => {
                let relative = instr.mnemonic == Mnemonic::Jr;
                match resolve_value(
                    ctx,
                    file,
                    expr,
                    instr.offset,
                    instr.index,
                    relative,
                    &mut Vec::new(),
                )? {
                    Value::Number(n) => n,
                    Value::String(_) => {
                        return Err(Error::UnexpectedString {
                            pos: instr.pos.clone(),
                        })
                    }
                }
            }
        };

        let pos = instr.pos.clone();
        let mnemonic = instr.mnemonic;
        let (bits, is_signed, is_bit) = (instr.bits, instr.is_signed, instr.is_bit);

        // Range validation, most specific width first.
        if is_signed && !(-127..=128).contains(&value) {
            return Err(if mnemonic == Mnemonic::Jr {
                Error::RelativeJumpRange { value, pos }
            } else {
                Error::SignedByteRange { value, pos }
            });
        } else if is_bit && !(0..=7).contains(&value) {
            return Err(Error::BitIndexRange { value, pos });
        } else if bits == 8 && !is_signed && !is_bit && !(-127..=255).contains(&value) {
            return Err(Error::ByteRange { value, pos });
        } else if bits == 16 && !(-32767..=65535).contains(&value) {
            return Err(if mnemonic.is_jump() {
                Error::JumpAddressRange { value, pos }
            } else {
                Error::WordRange { value, pos }
            });
        }

        // Twos complement conversion, with the relative-jump correction for
        // the 2 bytes the instruction pointer has already advanced.
        if value < 0 {
            if bits == 8 {
                if mnemonic == Mnemonic::Jr {
                    value -= 2;
                }
                value = 256 - value.abs();
            } else {
                value = 65536 - value.abs();
            }
        } else if mnemonic == Mnemonic::Jr && value > 0 {
            value -= 2;
        }

        file.pool.instructions[id].resolved_arg = Some(value);
    }
    Ok(())
}

fn resolve_data_blocks(ctx: &LinkContext, file: &mut SourceFile) -> Result<(), Error> {
    for id in 0..file.pool.data.len() {
        let data = &file.pool.data[id];
        if data.values.is_empty() {
            continue;
        }
        let (values, is_fixed, size, bits, offset, index, pos) = (
            data.values.clone(),
            data.is_fixed_size,
            data.size,
            data.bits,
            data.offset,
            data.index,
            data.pos.clone(),
        );

        if is_fixed {
            // Fixed storage holds string content only, zero-padded.
            let resolved =
                resolve_value(ctx, file, &values[0], offset, index, false, &mut Vec::new())?;
            let Value::String(text) = resolved else {
                return Err(Error::FixedDataNotString { pos });
            };
            if text.len() > size {
                return Err(Error::FixedDataOverflow {
                    len: text.len(),
                    size,
                    pos,
                });
            }
            let mut bytes = vec![0u16; size];
            for (i, byte) in text.bytes().enumerate() {
                bytes[i] = byte as u16;
            }
            file.pool.data[id].resolved_values = bytes;
        } else {
            let mut resolved_values = vec![0u16; values.len()];
            for (i, expr) in values.iter().enumerate() {
                let resolved =
                    resolve_value(ctx, file, expr, offset, index, false, &mut Vec::new())?;
                let Value::Number(mut value) = resolved else {
                    return Err(Error::UnexpectedString { pos });
                };

                if bits == 8 && !(-127..=255).contains(&value) {
                    return Err(Error::DataByteRange { value, pos });
                } else if bits == 16 && !(-32767..=65535).contains(&value) {
                    return Err(Error::DataWordRange { value, pos });
                }

                if value < 0 {
                    value = if bits == 8 {
                        256 - value.abs()
                    } else {
                        65536 - value.abs()
                    };
                }
                resolved_values[i] = value as u16;
            }
            file.pool.data[id].resolved_values = resolved_values;
        }
    }
    Ok(())
}

/// Run the peephole optimizer over the instruction stream until a pass makes
/// no change. Consumed instructions are marked removed and compacted; any
/// size change re-runs offset calculation across all sections, since
/// downstream addresses and jump distances are stale afterwards.
pub fn optimize(file: &mut SourceFile) {
    optimize_with(file, optimizer::apply)
}

pub fn optimize_with<F>(file: &mut SourceFile, rule: F)
where
    F: Fn(&mut [crate::inst::Instruction], &[InstrId], usize) -> usize,
{
    let mut dropped = 0;
    let mut rewritten = false;

    loop {
        let mut optimized = false;
        let mut i = 0;
        while i < file.instructions.len() {
            let consumed = rule(&mut file.pool.instructions, &file.instructions, i);
            if consumed > 0 {
                optimized = true;
                rewritten = true;
                if consumed > 1 {
                    let end = (i + consumed).min(file.instructions.len());
                    for id in file.instructions.drain(i + 1..end) {
                        file.pool.instructions[id].removed = true;
                        dropped += 1;
                    }
                }
            }
            i += 1;
        }
        if !optimized {
            break;
        }
    }

    if dropped > 0 {
        file.compact();
    }
    if rewritten {
        file.calculate_offsets();
        file.rebuild_instruction_index();
    }
}
