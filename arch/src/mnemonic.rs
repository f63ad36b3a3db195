use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opcode byte introducing the two-byte extended instruction set.
pub const PREFIX: u8 = 0xCB;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString, Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum Mnemonic {
    Adc,
    Add,
    And,
    Bit,
    Call,
    Ccf,
    Cp,
    Cpl,
    Daa,
    Dec,
    Di,
    Ei,
    Halt,
    Inc,
    Jp,
    Jr,
    Ld,
    Ldh,
    #[default]
    Nop,
    Or,
    Pop,
    Push,
    Res,
    Ret,
    Reti,
    Rl,
    Rla,
    Rlc,
    Rlca,
    Rr,
    Rra,
    Rrc,
    Rrca,
    Rst,
    Sbc,
    Scf,
    Set,
    Sla,
    Sra,
    Srl,
    Stop,
    Sub,
    Swap,
    Xor,
}

impl Mnemonic {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().parse::<Self>() {
            Ok(a) => Ok(a),
            Err(_) => Err(format!("Unknown mnemonic: {s}")),
        }
    }

    /// Mnemonics whose 16-bit argument is a code address.
    pub fn is_jump(&self) -> bool {
        matches!(self, Mnemonic::Jp | Mnemonic::Call)
    }
}

#[test]
fn test() {
    println!("{}", Mnemonic::Ldh);
    println!("{:?}", Mnemonic::parse("JR"));
    assert_eq!(Mnemonic::parse("jr"), Ok(Mnemonic::Jr));
    assert_eq!(Mnemonic::parse("LD"), Ok(Mnemonic::Ld));
    assert!(Mnemonic::Jp.is_jump());
    assert!(!Mnemonic::Jr.is_jump());
    assert!(Mnemonic::parse("mov").is_err());
}
