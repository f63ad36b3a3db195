use crate::error::Pos;

pub type LabelId = usize;

/// A code label. Labels with a `parent` are local labels scoped under the
/// nearest preceding global label.
#[derive(Debug, Clone)]
pub struct Label {
    pub name: String,
    /// Source order index within the file, used for local label scoping.
    pub index: usize,
    /// Program-visible address, assigned during offset calculation.
    pub offset: usize,
    pub parent: Option<LabelId>,
    pub children: Vec<LabelId>,
    pub pos: Pos,
}

impl Label {
    pub fn new(name: impl Into<String>, index: usize, pos: Pos) -> Self {
        Label {
            name: name.into(),
            index,
            offset: 0,
            parent: None,
            children: Vec::new(),
            pos,
        }
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }
}
