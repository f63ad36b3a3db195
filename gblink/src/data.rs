use crate::error::Pos;
use crate::expr::Expr;

pub type DataId = usize;

/// A data or variable declaration inside a section.
///
/// Fixed-size blocks reserve `size` bytes at declaration and may hold only
/// string content, zero-padded. Sized blocks store one 8- or 16-bit value per
/// entry in `values`.
#[derive(Debug, Clone)]
pub struct DataBlock {
    pub bits: u8,
    pub is_fixed_size: bool,
    pub size: usize,
    /// Set when the declared size is an expression that could not be
    /// evaluated at parse time; resolved during linking.
    pub size_expr: Option<Expr>,
    pub values: Vec<Expr>,
    pub resolved_values: Vec<u16>,
    pub offset: usize,
    /// Source order index within the file.
    pub index: usize,
    pub pos: Pos,
}

impl DataBlock {
    /// `DB` style declaration: one byte per value.
    pub fn bytes(values: Vec<Expr>, index: usize, pos: Pos) -> Self {
        let size = values.len();
        DataBlock {
            bits: 8,
            is_fixed_size: false,
            size,
            size_expr: None,
            values,
            resolved_values: Vec::new(),
            offset: 0,
            index,
            pos,
        }
    }

    /// `DW` style declaration: one word per value.
    pub fn words(values: Vec<Expr>, index: usize, pos: Pos) -> Self {
        let size = values.len() * 2;
        DataBlock {
            bits: 16,
            is_fixed_size: false,
            size,
            size_expr: None,
            values,
            resolved_values: Vec::new(),
            offset: 0,
            index,
            pos,
        }
    }

    /// `DS` style declaration with a known byte size. `values` holds at most
    /// one string expression to be expanded into the reserved storage.
    pub fn fixed(size: usize, values: Vec<Expr>, index: usize, pos: Pos) -> Self {
        DataBlock {
            bits: 8,
            is_fixed_size: true,
            size,
            size_expr: None,
            values,
            resolved_values: Vec::new(),
            offset: 0,
            index,
            pos,
        }
    }

    /// `DS` style declaration whose size is a yet unresolved expression.
    pub fn sized_by(size_expr: Expr, values: Vec<Expr>, index: usize, pos: Pos) -> Self {
        DataBlock {
            bits: 8,
            is_fixed_size: true,
            size: 0,
            size_expr: Some(size_expr),
            values,
            resolved_values: Vec::new(),
            offset: 0,
            index,
            pos,
        }
    }
}
