// Statement and program parser for the Math Formula language

use super::ast::{FunctionDef, FunctionKind, Param, Program, Stmt, StmtKind, Target};
use super::lexer::{failure, identifier, keyword, lex, number_literal, sp, Number, PResult};
use super::FormulaParser;
use crate::error::{Error, Span};
use crate::types::DataType;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{cut, eof, map, not, opt, value},
    error::context,
    multi::{many0, separated_list0, separated_list1},
    sequence::{preceded, terminated},
};

/// Parse a complete formula source into a program.
///
/// Syntax errors are reported at the first position the grammar could
/// not continue from.
pub fn parse_program(src: &str) -> Result<Program, Error> {
    let parser = FormulaParser::new(src);
    match parser.program(src) {
        Ok((_, program)) => Ok(program),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(parser.to_error(e)),
        Err(nom::Err::Incomplete(_)) => Err(Error::new(
            "unexpected end of input",
            Span::new(src.len(), src.len()),
        )),
    }
}

/// `=` that is not the start of `==`
fn assign_eq(input: &str) -> PResult<'_, char> {
    terminated(char('='), not(char('=')))(input)
}

fn loop_bound(input: &str) -> PResult<'_, i64> {
    let (input, _) = sp(input)?;
    let (rest, negative) = opt(char('-'))(input)?;
    let (rest, number) = context("expected an integer loop bound", number_literal)(rest)?;
    match number {
        Number::Int(n) if negative.is_some() => Ok((rest, -n)),
        Number::Int(n) => Ok((rest, n)),
        Number::Float(_) => Err(failure(input, "loop bounds must be integers")),
    }
}

fn type_name(input: &str) -> PResult<'_, DataType> {
    let (rest, name) = cut(context("expected a type name", lex(identifier)))(input)?;
    match DataType::from_annotation(&name) {
        Some(dtype) => Ok((rest, dtype)),
        None => Err(failure(input, "unknown type name")),
    }
}

impl<'s> FormulaParser<'s> {
    fn program<'a>(&self, input: &'a str) -> PResult<'a, Program> {
        let (input, items) = many0(|i: &'a str| self.statement(i))(input)?;
        let (input, _) = context("expected a statement", lex(eof))(input)?;
        Ok((input, Program { items }))
    }

    pub fn statement<'a>(&self, input: &'a str) -> PResult<'a, Stmt> {
        let (input, _) = sp(input)?;
        let start = self.offset(input);
        let (rest, kind) = alt((
            map(|i: &'a str| self.function_def(i), StmtKind::Function),
            |i: &'a str| self.loop_stmt(i),
            |i: &'a str| self.repeat_stmt(i),
            |i: &'a str| self.simple_statement(i),
        ))(input)?;
        Ok((
            rest,
            Stmt {
                kind,
                span: self.span(start, rest),
            },
        ))
    }

    /// Assignments and expression statements, terminated by `;`
    fn simple_statement<'a>(&self, input: &'a str) -> PResult<'a, StmtKind> {
        let (input, kind) = alt((
            |i: &'a str| self.assignment(i),
            |i: &'a str| self.field_assignment(i),
            map(|i: &'a str| self.expr(i), StmtKind::Expr),
        ))(input)?;
        let (input, _) = cut(context("expected ';'", lex(char(';'))))(input)?;
        Ok((input, kind))
    }

    fn assignment<'a>(&self, input: &'a str) -> PResult<'a, StmtKind> {
        let (input, targets) = separated_list1(lex(char(',')), |i: &'a str| self.target(i))(input)?;
        let (input, _) = lex(assign_eq)(input)?;
        let (input, value) = cut(|i: &'a str| self.expr(i))(input)?;
        Ok((input, StmtKind::Assign { targets, value }))
    }

    fn target<'a>(&self, input: &'a str) -> PResult<'a, Target> {
        let (input, _) = sp(input)?;
        let start = self.offset(input);
        let (rest, name) = identifier(input)?;
        let span = self.span(start, rest);
        if name == "_" {
            Ok((rest, Target::Ignore(span)))
        } else {
            Ok((rest, Target::Name(name, span)))
        }
    }

    /// `v.x = e;`
    fn field_assignment<'a>(&self, input: &'a str) -> PResult<'a, StmtKind> {
        let (input, target) = lex(identifier)(input)?;
        let (input, _) = lex(char('.'))(input)?;
        let (input, field) = lex(identifier)(input)?;
        let (input, _) = lex(assign_eq)(input)?;
        let (input, value) = cut(|i: &'a str| self.expr(i))(input)?;
        Ok((
            input,
            StmtKind::FieldAssign {
                target,
                field,
                value,
            },
        ))
    }

    /// `fn name(a: float, b: vec3 = {0, 0, 1}) -> out: float { ... }`
    fn function_def<'a>(&self, input: &'a str) -> PResult<'a, FunctionDef> {
        let start = self.offset(input);
        let (input, kind) = alt((
            value(FunctionKind::Function, keyword("fn")),
            value(FunctionKind::NodeGroup, keyword("ng")),
        ))(input)?;
        let (input, name) = cut(context("expected a function name", lex(identifier)))(input)?;
        let (input, _) = cut(context("expected '('", lex(char('('))))(input)?;
        let (input, inputs) = separated_list0(lex(char(',')), |i: &'a str| self.param(i))(input)?;
        let (input, _) = cut(context("expected ')'", lex(char(')'))))(input)?;
        let (input, outputs) = opt(preceded(
            lex(tag("->")),
            cut(separated_list1(lex(char(',')), |i: &'a str| self.param(i))),
        ))(input)?;
        let (input, body) = cut(|i: &'a str| self.block(i))(input)?;
        Ok((
            input,
            FunctionDef {
                kind,
                name,
                inputs,
                outputs: outputs.unwrap_or_default(),
                body,
                span: self.span(start, input),
            },
        ))
    }

    fn param<'a>(&self, input: &'a str) -> PResult<'a, Param> {
        let (input, _) = sp(input)?;
        let start = self.offset(input);
        let (input, name) = context("expected a parameter name", identifier)(input)?;
        let (input, _) = cut(context("expected ':' and a type", lex(char(':'))))(input)?;
        let (input, dtype) = type_name(input)?;
        let (input, default) = opt(preceded(
            lex(assign_eq),
            cut(|i: &'a str| self.expr(i)),
        ))(input)?;
        Ok((
            input,
            Param {
                name,
                dtype,
                default,
                span: self.span(start, input),
            },
        ))
    }

    fn block<'a>(&self, input: &'a str) -> PResult<'a, Vec<Stmt>> {
        let (input, _) = context("expected '{'", lex(char('{')))(input)?;
        let (input, body) = many0(|i: &'a str| self.statement(i))(input)?;
        let (input, _) = cut(context("expected '}'", lex(char('}'))))(input)?;
        Ok((input, body))
    }

    /// `loop [name =] start -> end { ... }`
    fn loop_stmt<'a>(&self, input: &'a str) -> PResult<'a, StmtKind> {
        let (input, _) = keyword("loop")(input)?;
        let (input, var) = opt(terminated(lex(identifier), lex(assign_eq)))(input)?;
        let (input, start) = cut(loop_bound)(input)?;
        let (input, _) = cut(context("expected '->'", lex(tag("->"))))(input)?;
        let (input, end) = cut(loop_bound)(input)?;
        let (input, body) = cut(|i: &'a str| self.block(i))(input)?;
        Ok((
            input,
            StmtKind::Loop {
                var,
                start,
                end,
                body,
            },
        ))
    }

    fn repeat_stmt<'a>(&self, input: &'a str) -> PResult<'a, StmtKind> {
        let (input, _) = keyword("repeat")(input)?;
        let (input, iterations) = cut(|i: &'a str| self.expr(i))(input)?;
        let (input, body) = cut(|i: &'a str| self.block(i))(input)?;
        Ok((input, StmtKind::Repeat { iterations, body }))
    }
}
