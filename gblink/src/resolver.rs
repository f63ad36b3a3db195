use crate::error::{Error, Pos};
use crate::expr::{Expr, Value};
use crate::label::Label;
use crate::linker::LinkContext;
use crate::macros::MacroArg;
use crate::source::SourceFile;

/// Evaluate an expression to a concrete value.
///
/// `instr_offset` is the address of the referencing entry, `index` its source
/// order position (used for local label scoping). With `relative` set, label
/// addresses resolve to their distance from `instr_offset` instead of the
/// absolute address; the linker enables this for `jr` arguments.
///
/// `stack` tracks names currently being resolved, to reject circular
/// constant and expression-macro definitions.
pub fn resolve_value(
    ctx: &LinkContext,
    file: &SourceFile,
    expr: &Expr,
    instr_offset: usize,
    index: usize,
    relative: bool,
    stack: &mut Vec<String>,
) -> Result<Value, Error> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),

        Expr::Name { name, pos } => {
            if let Some(label) = find_global_label(file, name) {
                Ok(Value::Number(label_value(label, instr_offset, relative)))
            } else if let Some(constant) = file.constants.get(name) {
                if stack.iter().any(|n| n == name) {
                    return Err(Error::CircularReference {
                        name: name.clone(),
                        pos: pos.clone(),
                    });
                }
                stack.push(name.clone());
                let value = resolve_value(ctx, file, constant, instr_offset, index, false, stack)?;
                stack.pop();
                Ok(value)
            } else {
                Err(Error::UnresolvedSymbol {
                    name: name.clone(),
                    pos: pos.clone(),
                })
            }
        }

        Expr::LocalName { name, pos } => match resolve_local_label(file, name, index) {
            Some(label) => Ok(Value::Number(label_value(label, instr_offset, relative))),
            None => Err(Error::UnresolvedSymbol {
                name: format!(".{name}"),
                pos: pos.clone(),
            }),
        },

        // Argument references must have been substituted during expansion.
        Expr::MacroArg { name, pos } => Err(Error::UndefinedMacroArgument {
            name: name.clone(),
            pos: pos.clone(),
        }),

        Expr::Unary { op, expr, pos } => {
            let value = resolve_value(ctx, file, expr, instr_offset, index, relative, stack)?;
            op.apply(value, pos)
        }

        Expr::Binary { op, lhs, rhs, pos } => {
            let lhs = resolve_value(ctx, file, lhs, instr_offset, index, relative, stack)?;
            let rhs = resolve_value(ctx, file, rhs, instr_offset, index, relative, stack)?;
            op.apply(lhs, rhs, pos)
        }

        Expr::Call { name, args, pos } => {
            if let Some(builtin) = ctx.macros.builtin(name) {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(resolve_value(
                        ctx,
                        file,
                        arg,
                        instr_offset,
                        index,
                        false,
                        stack,
                    )?);
                }
                builtin(&values, pos)
            } else if let Some(mac) = ctx.macros.get(name) {
                if !mac.is_expression {
                    return Err(Error::NotAnExpressionMacro {
                        name: name.clone(),
                        pos: pos.clone(),
                    });
                }
                if stack.iter().any(|n| n == name) {
                    return Err(Error::CircularReference {
                        name: name.clone(),
                        pos: pos.clone(),
                    });
                }
                let margs = MacroArg::from_exprs(args);
                let body = mac.expression_for_arguments(&margs, pos)?;
                stack.push(name.clone());
                let value =
                    resolve_value(ctx, file, &body, instr_offset, index, relative, stack)?;
                stack.pop();
                Ok(value)
            } else {
                Err(Error::UndefinedMacro {
                    name: name.clone(),
                    pos: pos.clone(),
                })
            }
        }
    }
}

fn label_value(label: &Label, instr_offset: usize, relative: bool) -> i64 {
    let value = label.offset as i64;
    if relative {
        value - instr_offset as i64
    } else {
        value
    }
}

fn find_global_label<'a>(file: &'a SourceFile, name: &str) -> Option<&'a Label> {
    file.pool
        .labels
        .iter()
        .find(|label| label.is_global() && label.name == name)
}

/// Resolve a local label reference: find the nearest preceding global label
/// in file order, then match `name` against its direct children.
pub fn resolve_local_label<'a>(
    file: &'a SourceFile,
    name: &str,
    index: usize,
) -> Option<&'a Label> {
    let mut parent: Option<&Label> = None;
    for label in &file.pool.labels {
        if label.is_global() && label.index <= index {
            if parent.map_or(true, |p| label.index > p.index) {
                parent = Some(label);
            }
        }
    }

    parent?
        .children
        .iter()
        .map(|&id| &file.pool.labels[id])
        .find(|child| child.name == name)
}
