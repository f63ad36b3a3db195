use arch::mnemonic::{Mnemonic, PREFIX};

use crate::inst::{InstrId, Instruction};

/// Stateless peephole rule table, keyed by the leading opcode byte of the
/// instruction at `at`. Rules may inspect up to the 3 following instructions
/// through `order`. Returns the number of instructions consumed by a
/// rewrite, 0 when no rule matched; the linker splices out any consumed
/// beyond the first and re-runs layout.
pub fn apply(instructions: &mut [Instruction], order: &[InstrId], at: usize) -> usize {
    let id = order[at];
    let Some(&opcode) = instructions[id].raw.first() else {
        return 0;
    };

    match opcode {
        // ld a,[nn] -> ldh a,$XX for high-page addresses
        0xFA => high_page_rewrite(&mut instructions[id], 0xF0),

        // ld [nn],a -> ldh $XX,a for high-page addresses
        0xEA => high_page_rewrite(&mut instructions[id], 0xE0),

        // extended opcodes carry their operation in the second byte
        PREFIX => 0,

        _ => 0,
    }
}

/// Absolute memory accesses into `0xFF00-0xFFFF` fit the shorter high-page
/// encoding, keeping only the low byte of the address.
fn high_page_rewrite(instr: &mut Instruction, opcode: u8) -> usize {
    match instr.resolved_arg {
        Some(address) if (0xFF00..=0xFFFF).contains(&address) => {
            instr.rewrite(Mnemonic::Ldh, 12, vec![opcode], address & 0xFF);
            1
        }
        _ => 0,
    }
}
