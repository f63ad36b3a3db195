use std::path::PathBuf;

use indexmap::IndexMap;

use crate::binary::{Binary, BinaryId};
use crate::data::{DataBlock, DataId};
use crate::expr::Expr;
use crate::inst::{InstrArg, Instruction, InstrId};
use crate::label::{Label, LabelId};
use crate::section::Section;

/// One placed element inside a section's ordered entry list. Entries index
/// into the owning file's pool so that the flat instruction list, the label
/// list and the section entries all refer to the same objects.
#[derive(Debug, Clone)]
pub enum Entry {
    Label(LabelId),
    Instruction(InstrId),
    Data(DataId),
    Binary(BinaryId),
    /// An unexpanded macro call, tagged with its expansion depth.
    MacroCall { call: Expr, depth: u32 },
}

/// Arena storage for all entries of one source file.
#[derive(Debug, Default)]
pub struct Pool {
    pub instructions: Vec<Instruction>,
    pub labels: Vec<Label>,
    pub data: Vec<DataBlock>,
    pub binaries: Vec<Binary>,
}

/// Everything the front end hands over for one source file, with the fields
/// the link pipeline populates: offsets, resolved arguments, resolved data
/// values and sizes.
#[derive(Debug, Default)]
pub struct SourceFile {
    pub path: PathBuf,
    pub sections: Vec<Section>,
    pub pool: Pool,
    /// Flat instruction list, offset-sorted after layout.
    pub instructions: Vec<InstrId>,
    pub unresolved_sizes: Vec<DataId>,
    pub relative_jump_targets: Vec<InstrId>,
    pub constants: IndexMap<String, Expr>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SourceFile {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn add_section(&mut self, section: Section) -> usize {
        self.sections.push(section);
        self.sections.len() - 1
    }

    pub fn add_constant(&mut self, name: impl Into<String>, expr: Expr) {
        self.constants.insert(name.into(), expr);
    }

    // Pool insertion. These register pipeline bookkeeping (relative jump
    // placeholders, unresolved sizes) but do not place the entry; placement
    // happens through `add_*` below or through a macro expansion cursor.

    pub fn push_label(&mut self, label: Label) -> LabelId {
        self.pool.labels.push(label);
        self.pool.labels.len() - 1
    }

    pub fn push_instruction(&mut self, instr: Instruction) -> InstrId {
        let id = self.pool.instructions.len();
        if matches!(instr.arg, Some(InstrArg::Offset(_))) {
            self.relative_jump_targets.push(id);
        }
        self.pool.instructions.push(instr);
        id
    }

    pub fn push_data(&mut self, data: DataBlock) -> DataId {
        let id = self.pool.data.len();
        if data.size_expr.is_some() {
            self.unresolved_sizes.push(id);
        }
        self.pool.data.push(data);
        id
    }

    pub fn push_binary(&mut self, binary: Binary) -> BinaryId {
        self.pool.binaries.push(binary);
        self.pool.binaries.len() - 1
    }

    // Append-to-section helpers used by the front end and tests.

    pub fn add_label(&mut self, section: usize, label: Label) -> LabelId {
        let id = self.push_label(label);
        self.sections[section].add(Entry::Label(id));
        id
    }

    /// Place a local label scoped under `parent`.
    pub fn add_local_label(&mut self, section: usize, label: Label, parent: LabelId) -> LabelId {
        let mut label = label;
        label.parent = Some(parent);
        let id = self.push_label(label);
        self.pool.labels[parent].children.push(id);
        self.sections[section].add(Entry::Label(id));
        id
    }

    pub fn add_instruction(&mut self, section: usize, instr: Instruction) -> InstrId {
        let id = self.push_instruction(instr);
        self.sections[section].add(Entry::Instruction(id));
        id
    }

    pub fn add_data(&mut self, section: usize, data: DataBlock) -> DataId {
        let id = self.push_data(data);
        self.sections[section].add(Entry::Data(id));
        id
    }

    pub fn add_binary(&mut self, section: usize, binary: Binary) -> BinaryId {
        let id = self.push_binary(binary);
        self.sections[section].add(Entry::Binary(id));
        id
    }

    pub fn add_macro_call(&mut self, section: usize, call: Expr) {
        self.sections[section].add(Entry::MacroCall { call, depth: 0 });
    }

    /// Recompute every section's offsets. Run after any change to entry
    /// sizes or ordering.
    pub fn calculate_offsets(&mut self) {
        let Self {
            sections, pool, ..
        } = self;
        for section in sections.iter() {
            section.calculate_offsets(pool);
        }
    }

    /// Rebuild the flat offset-sorted instruction list from the sections.
    pub fn rebuild_instruction_index(&mut self) {
        let mut ids: Vec<InstrId> = Vec::new();
        for section in &self.sections {
            for entry in &section.entries {
                if let Entry::Instruction(id) = *entry {
                    if !self.pool.instructions[id].removed {
                        ids.push(id);
                    }
                }
            }
        }
        ids.sort_by_key(|&id| self.pool.instructions[id].offset);
        self.instructions = ids;
    }

    /// Drop entries whose instruction was consumed by the optimizer.
    pub fn compact(&mut self) {
        let Self {
            sections, pool, ..
        } = self;
        for section in sections.iter_mut() {
            section.entries.retain(|entry| match *entry {
                Entry::Instruction(id) => !pool.instructions[id].removed,
                _ => true,
            });
        }
    }
}
