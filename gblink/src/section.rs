use arch::segment::Segment;

use crate::error::{Error, Pos};
use crate::source::{Entry, Pool};

/// One contiguous placement of entries inside a memory segment and bank.
///
/// `offset` is the physical bank-relative start, `bank_offset` the amount to
/// subtract from addresses to obtain the program-visible (bank-independent)
/// label address, `end_offset` the last address any entry may occupy.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub segment: Segment,
    pub bank: u32,
    pub offset: usize,
    pub bank_offset: usize,
    pub end_offset: usize,
    pub is_ram: bool,
    pub is_rom: bool,
    pub entries: Vec<Entry>,
    pub pos: Pos,
}

impl Section {
    pub fn new(
        name: impl Into<String>,
        segment: &str,
        bank: Option<u32>,
        offset: Option<usize>,
        pos: Pos,
    ) -> Result<Self, Error> {
        let segment = Segment::parse(segment).map_err(|_| Error::UnknownSegment {
            name: segment.into(),
            expected: Segment::names().join(", "),
            pos: pos.clone(),
        })?;
        let info = segment.info();

        let bank = match bank {
            Some(bank) => bank,
            None if info.is_banked => 1,
            None => 0,
        };

        if bank > 0 && !info.is_banked {
            return Err(Error::BankOnUnbankedSegment { segment, pos });
        }
        if info.is_banked && (bank < 1 || bank > info.max_bank) {
            return Err(Error::SectionBankRange {
                bank,
                max: info.max_bank,
                pos,
            });
        }

        let (offset, bank_offset, end_offset) = match offset {
            // Default placement: base of the segment, or base of the bank.
            None => {
                if bank == 0 {
                    (info.base_offset, 0, info.base_offset + info.size)
                } else {
                    let offset = info.base_offset + bank as usize * info.bank_size;
                    (offset, offset - info.base_offset, offset + info.size)
                }
            }
            // Explicit placement still needs banking correction.
            Some(offset) => {
                if bank == 0 {
                    let end = info.base_offset + info.size;
                    if offset < info.base_offset || offset > end {
                        return Err(Error::SectionOffsetRange {
                            offset,
                            min: info.base_offset,
                            max: end,
                            pos,
                        });
                    }
                    (offset, 0, end)
                } else {
                    let bank_base = info.base_offset + bank as usize * info.bank_size;
                    let end = bank_base + info.size;
                    if offset < bank_base || offset > end {
                        return Err(Error::SectionOffsetRange {
                            offset,
                            min: bank_base,
                            max: end,
                            pos,
                        });
                    }
                    (offset, bank_base - info.base_offset, end)
                }
            }
        };

        Ok(Section {
            name: name.into(),
            segment,
            bank,
            offset,
            bank_offset,
            end_offset,
            is_ram: info.is_ram,
            is_rom: info.is_rom,
            entries: Vec::new(),
            pos,
        })
    }

    /// Append-only. Bounds are verified by the linker once layout is known.
    pub fn add(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Walk the entries in order, assigning offsets. Labels receive the
    /// program-visible address (`cursor - bank_offset`) and do not advance
    /// the cursor. Idempotent for unchanged entry sizes.
    pub fn calculate_offsets(&self, pool: &mut Pool) {
        let mut cursor = self.offset;
        for entry in &self.entries {
            match *entry {
                Entry::Label(id) => {
                    pool.labels[id].offset = cursor - self.bank_offset;
                }
                Entry::Instruction(id) => {
                    let instr = &mut pool.instructions[id];
                    if instr.removed {
                        continue;
                    }
                    instr.offset = cursor;
                    cursor += instr.size;
                }
                Entry::Data(id) => {
                    let data = &mut pool.data[id];
                    data.offset = cursor;
                    cursor += data.size;
                }
                Entry::Binary(id) => {
                    let binary = &mut pool.binaries[id];
                    binary.offset = cursor;
                    cursor += binary.size;
                }
                Entry::MacroCall { .. } => {}
            }
        }
    }

    /// First address past the last placed entry, for bounds verification.
    pub fn end_cursor(&self, pool: &Pool) -> usize {
        let mut cursor = self.offset;
        for entry in &self.entries {
            match *entry {
                Entry::Label(_) | Entry::MacroCall { .. } => {}
                Entry::Instruction(id) => {
                    if !pool.instructions[id].removed {
                        cursor += pool.instructions[id].size;
                    }
                }
                Entry::Data(id) => cursor += pool.data[id].size,
                Entry::Binary(id) => cursor += pool.binaries[id].size,
            }
        }
        cursor
    }
}
