pub mod mnemonic;
pub mod reg;
pub mod segment;
