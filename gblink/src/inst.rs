use arch::mnemonic::Mnemonic;

use crate::error::Pos;
use crate::expr::Expr;

pub type InstrId = usize;

/// Argument of an instruction. Raw relative-jump displacements are patched
/// into `Target` references before optimization, so that the target survives
/// instruction size changes.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrArg {
    Expr(Expr),
    Offset(i64),
    Target(InstrId),
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    /// Opcode bytes, excluding the encoded argument.
    pub raw: Vec<u8>,
    /// Total encoded size in bytes, argument included.
    pub size: usize,
    pub cycles: usize,
    pub offset: usize,
    /// Source order index within the file.
    pub index: usize,
    /// Encoding width of the argument: 0, 8 or 16.
    pub bits: u8,
    pub is_signed: bool,
    pub is_bit: bool,
    pub arg: Option<InstrArg>,
    pub resolved_arg: Option<i64>,
    /// Set when the optimizer consumes this instruction; compacted away
    /// after the pass.
    pub removed: bool,
    pub pos: Pos,
}

impl Instruction {
    pub fn new(mnemonic: Mnemonic, raw: Vec<u8>, cycles: usize, index: usize, pos: Pos) -> Self {
        Instruction {
            mnemonic,
            size: raw.len(),
            raw,
            cycles,
            offset: 0,
            index,
            bits: 0,
            is_signed: false,
            is_bit: false,
            arg: None,
            resolved_arg: None,
            removed: false,
            pos,
        }
    }

    pub fn with_byte_arg(mut self, arg: InstrArg) -> Self {
        self.bits = 8;
        self.size += 1;
        self.arg = Some(arg);
        self
    }

    pub fn with_signed_arg(mut self, arg: InstrArg) -> Self {
        self.is_signed = true;
        self.with_byte_arg(arg)
    }

    pub fn with_word_arg(mut self, arg: InstrArg) -> Self {
        self.bits = 16;
        self.size += 2;
        self.arg = Some(arg);
        self
    }

    /// Bit-index arguments are encoded inside the opcode itself and do not
    /// change the instruction size.
    pub fn with_bit_arg(mut self, arg: InstrArg) -> Self {
        self.bits = 8;
        self.is_bit = true;
        self.arg = Some(arg);
        self
    }

    /// Replace this instruction with a cheaper encoding carrying an already
    /// resolved one-byte argument.
    pub fn rewrite(&mut self, mnemonic: Mnemonic, cycles: usize, raw: Vec<u8>, value: i64) {
        self.mnemonic = mnemonic;
        self.cycles = cycles;
        self.size = raw.len() + 1;
        self.raw = raw;
        self.bits = 8;
        self.is_signed = false;
        self.is_bit = false;
        self.arg = None;
        self.resolved_arg = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        let pos = Pos::default();
        let nop = Instruction::new(Mnemonic::Nop, vec![0x00], 4, 0, pos.clone());
        assert_eq!(nop.size, 1);

        let jr = Instruction::new(Mnemonic::Jr, vec![0x18], 12, 1, pos.clone())
            .with_signed_arg(InstrArg::Offset(3));
        assert_eq!(jr.size, 2);
        assert!(jr.is_signed);

        let ld = Instruction::new(Mnemonic::Ld, vec![0xFA], 16, 2, pos.clone())
            .with_word_arg(InstrArg::Expr(Expr::Number(0xFF80)));
        assert_eq!(ld.size, 3);

        let bit = Instruction::new(Mnemonic::Bit, vec![0xCB, 0x40], 8, 3, pos)
            .with_bit_arg(InstrArg::Expr(Expr::Number(2)));
        assert_eq!(bit.size, 2);
    }

    #[test]
    fn rewrite_shrinks() {
        let pos = Pos::default();
        let mut ld = Instruction::new(Mnemonic::Ld, vec![0xFA], 16, 0, pos)
            .with_word_arg(InstrArg::Expr(Expr::Number(0xFF80)));
        ld.rewrite(Mnemonic::Ldh, 12, vec![0xF0], 0x80);
        assert_eq!(ld.size, 2);
        assert_eq!(ld.resolved_arg, Some(0x80));
        assert_eq!(ld.arg, None);
    }
}
