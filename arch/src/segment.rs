use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Memory segment classes of the target's address space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString, Display,
)]
pub enum Segment {
    HRAM,
    #[default]
    ROM0,
    ROMX,
    WRAM0,
    WRAMX,
}

impl Segment {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_ascii_uppercase().parse::<Self>() {
            Ok(a) => Ok(a),
            Err(_) => Err(format!("Unknown segment name: {s}")),
        }
    }

    pub fn info(&self) -> &'static SegmentInfo {
        &SEGMENTS[self]
    }

    pub fn names() -> Vec<String> {
        let mut names: Vec<String> = SEGMENTS.keys().map(|s| s.to_string()).collect();
        names.sort();
        names
    }
}

/// Static layout parameters of one segment class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub base_offset: usize,
    pub size: usize,
    pub bank_size: usize,
    pub max_bank: u32,
    pub is_ram: bool,
    pub is_rom: bool,
    pub is_banked: bool,
}

/// The target platform's memory map. Read-only, process-wide configuration.
pub static SEGMENTS: Lazy<IndexMap<Segment, SegmentInfo>> = Lazy::new(|| {
    IndexMap::from([
        (
            Segment::HRAM,
            SegmentInfo {
                base_offset: 0xFF00,
                size: 0xFF,
                bank_size: 0,
                max_bank: 0,
                is_ram: true,
                is_rom: false,
                is_banked: false,
            },
        ),
        (
            Segment::ROM0,
            SegmentInfo {
                base_offset: 0x0000,
                size: 0x7FFF,
                bank_size: 0,
                max_bank: 0,
                is_ram: false,
                is_rom: true,
                is_banked: false,
            },
        ),
        (
            Segment::ROMX,
            SegmentInfo {
                base_offset: 0x4000,
                size: 0x7FFF,
                bank_size: 0x4000,
                max_bank: 128,
                is_ram: false,
                is_rom: true,
                is_banked: true,
            },
        ),
        (
            Segment::WRAM0,
            SegmentInfo {
                base_offset: 0xC000,
                size: 0x0FFF,
                bank_size: 0,
                max_bank: 0,
                is_ram: true,
                is_rom: false,
                is_banked: false,
            },
        ),
        (
            Segment::WRAMX,
            SegmentInfo {
                base_offset: 0xD000,
                size: 0x0FFF,
                bank_size: 0x0000,
                max_bank: 8,
                is_ram: true,
                is_rom: false,
                is_banked: true,
            },
        ),
    ])
});

#[test]
fn test() {
    println!("{}", Segment::ROMX);
    println!("{:?}", Segment::parse("wram0"));
    println!("{:?}", Segment::parse("VRAM"));
    assert_eq!(Segment::parse("romx"), Ok(Segment::ROMX));
    assert_eq!(Segment::ROMX.info().bank_size, 0x4000);
    assert_eq!(Segment::HRAM.info().base_offset, 0xFF00);
    assert!(Segment::parse("VRAM").is_err());
}
