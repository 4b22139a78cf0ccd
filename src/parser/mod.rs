// Math Formula parser module

pub mod ast;
pub mod expr;
pub mod lexer;
pub mod stmt;

use crate::error::{Error, Span};
use nom::error::{VerboseError, VerboseErrorKind};

// Public API re-exports
pub use ast::{BinOp, Expr, ExprKind, FunctionDef, FunctionKind, Param, Program, Stmt, StmtKind, Target, UnaryOp};
pub use stmt::parse_program;

/// Recursive-descent parser over a single source text.
///
/// Every parse method receives a suffix of `src`, which lets spans be
/// computed from the length of the remaining input.
pub struct FormulaParser<'s> {
    src: &'s str,
}

impl<'s> FormulaParser<'s> {
    pub fn new(src: &'s str) -> Self {
        FormulaParser { src }
    }

    fn offset(&self, rest: &str) -> usize {
        self.src.len() - rest.len()
    }

    fn span(&self, start: usize, rest: &str) -> Span {
        Span::new(start, self.offset(rest))
    }

    /// Turn the deepest nom context into a located error
    fn to_error(&self, err: VerboseError<&str>) -> Error {
        let (rest, message) = err
            .errors
            .iter()
            .find_map(|(rest, kind)| match kind {
                VerboseErrorKind::Context(ctx) => Some((*rest, *ctx)),
                _ => None,
            })
            .unwrap_or_else(|| {
                let rest = err.errors.first().map(|(rest, _)| *rest).unwrap_or("");
                (rest, "invalid syntax")
            });

        let rest = rest.trim_start();
        let start = self.offset(rest);
        match rest.chars().next() {
            Some(c) => Error::new(
                format!("{message}, found '{c}'"),
                Span::new(start, start + c.len_utf8()),
            ),
            None => Error::new(
                format!("{message}, found end of input"),
                Span::new(start, start),
            ),
        }
    }
}
