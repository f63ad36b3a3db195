use arch::reg::Reg;
use indexmap::IndexMap;

use crate::binary::Binary;
use crate::data::DataBlock;
use crate::error::{Error, Pos};
use crate::expr::{Expr, Token, TokenKind, TokenValue, Value};
use crate::inst::Instruction;
use crate::label::Label;
use crate::source::{Entry, SourceFile};

/// A declared macro parameter. All parameters are untyped at this layer;
/// the type is decided by the value actually substituted.
#[derive(Debug, Clone)]
pub struct MacroArgDef {
    pub name: String,
    pub pos: Pos,
}

impl MacroArgDef {
    pub fn new(name: impl Into<String>, pos: Pos) -> Self {
        MacroArgDef {
            name: name.into(),
            pos,
        }
    }
}

/// A value supplied at a macro call site.
#[derive(Debug, Clone)]
pub enum MacroArg {
    Number(i64),
    String(String),
    Register(Reg),
    Token(Token),
}

impl MacroArg {
    /// Classify call-site argument expressions the way the grammar hands
    /// them over: register names become register arguments, literals stay
    /// literals, everything else is carried as a source token.
    pub fn from_exprs(args: &[Expr]) -> Vec<MacroArg> {
        args.iter()
            .map(|arg| match arg {
                Expr::Number(n) => MacroArg::Number(*n),
                Expr::String(s) => MacroArg::String(s.clone()),
                Expr::Name { name, pos } => match Reg::parse(name) {
                    Ok(reg) => MacroArg::Register(reg),
                    Err(_) => MacroArg::Token(Token::new(
                        TokenKind::Name,
                        TokenValue::Name(name.clone()),
                        pos.clone(),
                    )),
                },
                other => MacroArg::Token(Token::new(
                    TokenKind::Expression,
                    TokenValue::Expr(other.clone()),
                    other.pos().cloned().unwrap_or_default(),
                )),
            })
            .collect()
    }
}

/// A named token template. Immutable after construction; every expansion
/// clones the body.
#[derive(Debug, Clone)]
pub struct Macro {
    pub name: String,
    pub args: Vec<MacroArgDef>,
    pub tokens: Vec<Token>,
    /// True iff the body is exactly one expression token, meaning the macro
    /// yields a value instead of emitting code.
    pub is_expression: bool,
    /// Source order index within the defining file.
    pub index: usize,
    pub pos: Pos,
}

impl Macro {
    pub fn new(
        name: impl Into<String>,
        args: Vec<MacroArgDef>,
        tokens: Vec<Token>,
        index: usize,
        pos: Pos,
    ) -> Result<Self, Error> {
        let mut seen: IndexMap<&str, &MacroArgDef> = IndexMap::new();
        for arg in &args {
            if seen.contains_key(arg.name.as_str()) {
                return Err(Error::DuplicateMacroArgument {
                    name: arg.name.clone(),
                    pos: arg.pos.clone(),
                });
            }
            seen.insert(&arg.name, arg);
        }

        let is_expression = tokens.len() == 1 && tokens[0].kind == TokenKind::Expression;

        Ok(Macro {
            name: name.into(),
            args,
            tokens,
            is_expression,
            index,
            pos,
        })
    }

    fn argument_map<'a>(
        &self,
        provided: &'a [MacroArg],
        pos: &Pos,
    ) -> Result<IndexMap<&str, &'a MacroArg>, Error> {
        if provided.len() != self.args.len() {
            return Err(Error::MacroArgumentCount {
                name: self.name.clone(),
                expected: self.args.len(),
                given: provided.len(),
                pos: pos.clone(),
            });
        }
        Ok(self
            .args
            .iter()
            .zip(provided)
            .map(|(def, arg)| (def.name.as_str(), arg))
            .collect())
    }

    /// For expression macros: the body expression with every argument
    /// reference substituted. Register arguments are rejected, the result
    /// must yield a value.
    pub fn expression_for_arguments(
        &self,
        args: &[MacroArg],
        pos: &Pos,
    ) -> Result<Expr, Error> {
        let map = self.argument_map(args, pos)?;
        match self.tokens.first().map(|t| &t.value) {
            Some(TokenValue::Expr(expr)) => substitute_expr(expr, &map, false),
            _ => Err(Error::NotAnExpressionMacro {
                name: self.name.clone(),
                pos: pos.clone(),
            }),
        }
    }

    /// Expand the body as statements: clone every token, substitute argument
    /// references (registers allowed here), then hand the stream back to the
    /// grammar, redirected into the target section at the cursor position.
    /// `call_pos` locates the call site for argument mismatch errors.
    pub fn expand(
        &self,
        args: &[MacroArg],
        call_pos: &Pos,
        parser: &mut dyn MacroParser,
        cursor: &mut SectionCursor<'_>,
    ) -> Result<(), Error> {
        let map = self.argument_map(args, call_pos)?;

        let mut tokens = Vec::with_capacity(self.tokens.len());
        for original in &self.tokens {
            let mut token = original.clone();
            if let TokenValue::Expr(expr) = &token.value {
                token.value = TokenValue::Expr(substitute_expr(expr, &map, true)?);
            } else if token.kind == TokenKind::MacroArg {
                substitute_token(&mut token, &map, true)?;
            }
            tokens.push(token);
        }

        parser.parse_tokens(tokens, cursor)
    }
}

/// Replace a direct macro-argument token with its supplied value.
fn substitute_token(
    token: &mut Token,
    map: &IndexMap<&str, &MacroArg>,
    allow_registers: bool,
) -> Result<(), Error> {
    let TokenValue::Name(name) = &token.value else {
        return Ok(());
    };
    let Some(arg) = map.get(name.as_str()) else {
        return Err(Error::UndefinedMacroArgument {
            name: name.clone(),
            pos: token.pos.clone(),
        });
    };
    match arg {
        MacroArg::Register(reg) => {
            if !allow_registers {
                return Err(Error::RegisterInExpressionMacro {
                    name: name.clone(),
                    pos: token.pos.clone(),
                });
            }
            token.value = TokenValue::Name(reg.to_string());
            token.kind = TokenKind::Name;
        }
        MacroArg::Token(src) => {
            token.value = src.value.clone();
            token.kind = src.kind;
        }
        MacroArg::Number(n) => {
            token.value = TokenValue::Number(*n);
            token.kind = TokenKind::Number;
        }
        MacroArg::String(s) => {
            token.value = TokenValue::String(s.clone());
            token.kind = TokenKind::String;
        }
    }
    Ok(())
}

/// Clone an expression tree substituting every macro-argument reference,
/// however deeply nested. Iterative traversal, substitution depth stays
/// independent of the host call stack.
pub fn substitute_expr(
    expr: &Expr,
    map: &IndexMap<&str, &MacroArg>,
    allow_registers: bool,
) -> Result<Expr, Error> {
    let mut cloned = expr.clone();
    let mut stack: Vec<&mut Expr> = vec![&mut cloned];

    while let Some(node) = stack.pop() {
        let replacement = match &*node {
            Expr::MacroArg { name, pos } => {
                let Some(arg) = map.get(name.as_str()) else {
                    return Err(Error::UndefinedMacroArgument {
                        name: name.clone(),
                        pos: pos.clone(),
                    });
                };
                Some(match arg {
                    MacroArg::Register(reg) => {
                        if !allow_registers {
                            return Err(Error::RegisterInExpressionMacro {
                                name: name.clone(),
                                pos: pos.clone(),
                            });
                        }
                        Expr::Name {
                            name: reg.to_string(),
                            pos: pos.clone(),
                        }
                    }
                    MacroArg::Token(token) => expr_from_token(token, pos),
                    MacroArg::Number(n) => Expr::Number(*n),
                    MacroArg::String(s) => Expr::String(s.clone()),
                })
            }
            _ => None,
        };

        if let Some(replacement) = replacement {
            *node = replacement;
            continue;
        }

        match node {
            Expr::Unary { expr, .. } => stack.push(expr),
            Expr::Binary { lhs, rhs, .. } => {
                stack.push(lhs);
                stack.push(rhs);
            }
            Expr::Call { args, .. } => stack.extend(args.iter_mut()),
            _ => {}
        }
    }

    Ok(cloned)
}

fn expr_from_token(token: &Token, pos: &Pos) -> Expr {
    match &token.value {
        TokenValue::Number(n) => Expr::Number(*n),
        TokenValue::String(s) => Expr::String(s.clone()),
        TokenValue::Name(n) => Expr::Name {
            name: n.clone(),
            pos: pos.clone(),
        },
        TokenValue::Expr(e) => e.clone(),
        TokenValue::None => Expr::Number(0),
    }
}

// Registry ------------------------------------------------------------------

type BuiltinFn = fn(&[Value], &Pos) -> Result<Value, Error>;

/// Per-session macro registry owned by the link context. Re-registration of
/// a name silently overrides the previous definition.
#[derive(Debug)]
pub struct MacroRegistry {
    macros: IndexMap<String, Macro>,
    builtins: IndexMap<&'static str, BuiltinFn>,
}

impl Default for MacroRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroRegistry {
    pub fn new() -> Self {
        let mut builtins: IndexMap<&'static str, BuiltinFn> = IndexMap::new();
        builtins.insert("MIN", builtin_min);
        builtins.insert("MAX", builtin_max);
        builtins.insert("ABS", builtin_abs);
        builtins.insert("STRLEN", builtin_strlen);
        builtins.insert("STRUPR", builtin_strupr);
        builtins.insert("STRLWR", builtin_strlwr);
        MacroRegistry {
            macros: IndexMap::new(),
            builtins,
        }
    }

    /// Last definition wins; the previous one is returned.
    pub fn define(&mut self, mac: Macro) -> Option<Macro> {
        self.macros.insert(mac.name.clone(), mac)
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn builtin(&self, name: &str) -> Option<BuiltinFn> {
        self.builtins.get(name.to_ascii_uppercase().as_str()).copied()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name) || self.builtin(name).is_some()
    }
}

fn number_arg(args: &[Value], at: usize, name: &'static str, pos: &Pos) -> Result<i64, Error> {
    match args.get(at) {
        Some(Value::Number(n)) => Ok(*n),
        Some(Value::String(_)) => Err(Error::UnexpectedString { pos: pos.clone() }),
        None => Err(Error::MacroArgumentCount {
            name: name.into(),
            expected: at + 1,
            given: args.len(),
            pos: pos.clone(),
        }),
    }
}

fn string_arg(args: &[Value], at: usize, name: &'static str, pos: &Pos) -> Result<String, Error> {
    match args.get(at) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(_)) => Err(Error::InvalidOperands {
            op: name.into(),
            pos: pos.clone(),
        }),
        None => Err(Error::MacroArgumentCount {
            name: name.into(),
            expected: at + 1,
            given: args.len(),
            pos: pos.clone(),
        }),
    }
}

fn builtin_min(args: &[Value], pos: &Pos) -> Result<Value, Error> {
    let a = number_arg(args, 0, "MIN", pos)?;
    let b = number_arg(args, 1, "MIN", pos)?;
    Ok(Value::Number(a.min(b)))
}

fn builtin_max(args: &[Value], pos: &Pos) -> Result<Value, Error> {
    let a = number_arg(args, 0, "MAX", pos)?;
    let b = number_arg(args, 1, "MAX", pos)?;
    Ok(Value::Number(a.max(b)))
}

fn builtin_abs(args: &[Value], pos: &Pos) -> Result<Value, Error> {
    let a = number_arg(args, 0, "ABS", pos)?;
    Ok(Value::Number(a.abs()))
}

fn builtin_strlen(args: &[Value], pos: &Pos) -> Result<Value, Error> {
    let s = string_arg(args, 0, "STRLEN", pos)?;
    Ok(Value::Number(s.len() as i64))
}

fn builtin_strupr(args: &[Value], pos: &Pos) -> Result<Value, Error> {
    let s = string_arg(args, 0, "STRUPR", pos)?;
    Ok(Value::String(s.to_uppercase()))
}

fn builtin_strlwr(args: &[Value], pos: &Pos) -> Result<Value, Error> {
    let s = string_arg(args, 0, "STRLWR", pos)?;
    Ok(Value::String(s.to_lowercase()))
}

// Expansion seam ------------------------------------------------------------

/// The grammar, seen from the expansion layer: turns a substituted token
/// stream back into placed entries through a cursor.
pub trait MacroParser {
    fn parse_tokens(
        &mut self,
        tokens: Vec<Token>,
        cursor: &mut SectionCursor<'_>,
    ) -> Result<(), Error>;
}

/// One parsed entity produced by the grammar during expansion.
#[derive(Debug)]
pub enum Item {
    Label(Label),
    Instruction(Instruction),
    Data(DataBlock),
    Binary(Binary),
    MacroCall(Expr),
}

/// Insertion adapter for a section: entries land sequentially at the macro
/// call site instead of at the end of the section. Declaring a section from
/// inside a macro body is rejected.
pub struct SectionCursor<'a> {
    file: &'a mut SourceFile,
    section: usize,
    at: usize,
    depth: u32,
}

impl<'a> SectionCursor<'a> {
    pub fn new(file: &'a mut SourceFile, section: usize, at: usize, depth: u32) -> Self {
        SectionCursor {
            file,
            section,
            at,
            depth,
        }
    }

    pub fn insert(&mut self, item: Item) -> Result<(), Error> {
        let entry = match item {
            Item::Label(label) => Entry::Label(self.file.push_label(label)),
            Item::Instruction(instr) => Entry::Instruction(self.file.push_instruction(instr)),
            Item::Data(data) => Entry::Data(self.file.push_data(data)),
            Item::Binary(binary) => Entry::Binary(self.file.push_binary(binary)),
            Item::MacroCall(call) => Entry::MacroCall {
                call,
                depth: self.depth,
            },
        };
        self.file.sections[self.section].entries.insert(self.at, entry);
        self.at += 1;
        Ok(())
    }

    pub fn declare_section(&mut self, pos: &Pos) -> Result<(), Error> {
        Err(Error::SectionInMacro { pos: pos.clone() })
    }
}
