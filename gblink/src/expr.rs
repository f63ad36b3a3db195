use crate::error::{Error, Pos};

/// Kinds of source tokens the expansion layer inspects or produces. The
/// lexer owns the full token set; only the kinds that matter for macro
/// substitution are distinguished here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    String,
    Register,
    MacroArg,
    Expression,
    NewLine,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Number(i64),
    String(String),
    Name(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, value: TokenValue, pos: Pos) -> Self {
        Token { kind, value, pos }
    }
}

/// Expression tree handed over by the parser. Cloneable so that macro
/// templates can be expanded any number of times.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(i64),
    String(String),
    Name { name: String, pos: Pos },
    LocalName { name: String, pos: Pos },
    MacroArg { name: String, pos: Pos },
    Unary { op: UnaryOp, expr: Box<Expr>, pos: Pos },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr>, pos: Pos },
    Call { name: String, args: Vec<Expr>, pos: Pos },
}

impl Expr {
    pub fn pos(&self) -> Option<&Pos> {
        match self {
            Expr::Number(_) | Expr::String(_) => None,
            Expr::Name { pos, .. }
            | Expr::LocalName { pos, .. }
            | Expr::MacroArg { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Call { pos, .. } => Some(pos),
        }
    }
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(i64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }

    pub fn apply(&self, value: Value, pos: &Pos) -> Result<Value, Error> {
        match (self, value) {
            (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
            (UnaryOp::Not, Value::Number(n)) => Ok(Value::Number((n == 0) as i64)),
            (UnaryOp::BitNot, Value::Number(n)) => Ok(Value::Number(!n)),
            _ => Err(Error::InvalidOperands {
                op: self.symbol().into(),
                pos: pos.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }

    pub fn apply(&self, lhs: Value, rhs: Value, pos: &Pos) -> Result<Value, Error> {
        match (self, lhs, rhs) {
            // string concatenation
            (BinOp::Add, Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (op, Value::Number(a), Value::Number(b)) => op.apply_numbers(a, b, pos),
            _ => Err(Error::InvalidOperands {
                op: self.symbol().into(),
                pos: pos.clone(),
            }),
        }
    }

    fn apply_numbers(&self, a: i64, b: i64, pos: &Pos) -> Result<Value, Error> {
        let value = match self {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::Div | BinOp::Rem if b == 0 => {
                return Err(Error::DivisionByZero { pos: pos.clone() })
            }
            BinOp::Div => a.wrapping_div(b),
            BinOp::Rem => a.wrapping_rem(b),
            BinOp::And => a & b,
            BinOp::Or => a | b,
            BinOp::Xor => a ^ b,
            BinOp::Shl => a.wrapping_shl(b as u32),
            BinOp::Shr => a.wrapping_shr(b as u32),
        };
        Ok(Value::Number(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_ops() {
        let pos = Pos::default();
        assert_eq!(
            BinOp::Add
                .apply(Value::Number(2), Value::Number(3), &pos)
                .unwrap(),
            Value::Number(5)
        );
        assert_eq!(
            BinOp::Shl
                .apply(Value::Number(1), Value::Number(8), &pos)
                .unwrap(),
            Value::Number(256)
        );
        assert_eq!(
            BinOp::Add
                .apply(Value::String("ab".into()), Value::String("cd".into()), &pos)
                .unwrap(),
            Value::String("abcd".into())
        );
    }

    #[test]
    fn division_by_zero() {
        let pos = Pos::default();
        let err = BinOp::Div
            .apply(Value::Number(1), Value::Number(0), &pos)
            .unwrap_err();
        assert!(matches!(err, Error::DivisionByZero { .. }));
    }

    #[test]
    fn mixed_operands_rejected() {
        let pos = Pos::default();
        let err = BinOp::Mul
            .apply(Value::String("a".into()), Value::Number(2), &pos)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperands { .. }));
    }
}
