use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString, Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum Reg {
    #[default]
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    AF,
    BC,
    DE,
    HL,
    SP,
}

impl Reg {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().parse::<Self>() {
            Ok(a) => Ok(a),
            Err(_) => Err(format!("Unknown reg name: {s}")),
        }
    }

    /// 16-bit register pairs, as opposed to single 8-bit registers.
    pub fn is_pair(&self) -> bool {
        matches!(self, Reg::AF | Reg::BC | Reg::DE | Reg::HL | Reg::SP)
    }
}

#[test]
fn test() {
    println!("{}", Reg::HL);
    println!("{:?}", Reg::parse("a"));
    println!("{:?}", Reg::parse("hoge"));
    assert_eq!(Reg::parse("HL"), Ok(Reg::HL));
    assert!(Reg::HL.is_pair());
    assert!(!Reg::parse("b").unwrap().is_pair());
    assert!(Reg::parse("hoge").is_err());
}
