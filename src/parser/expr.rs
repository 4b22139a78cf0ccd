// Expression parser for the Math Formula language

use super::ast::{BinOp, Expr, ExprKind, UnaryOp};
use super::lexer::{failure, identifier, keyword, lex, number_literal, sp, string_literal, Number, PResult};
use super::FormulaParser;
use crate::error::Span;
use nom::{
    branch::alt,
    character::complete::char,
    combinator::{cut, map, value},
    error::context,
    multi::{separated_list0, separated_list1},
};

type Level<'s, 'a> = fn(&FormulaParser<'s>, &'a str) -> PResult<'a, Expr>;

/// Operators of one precedence level, longest spelling first
const COMPARISON: &[(&str, BinOp)] = &[
    ("==", BinOp::Eq),
    ("!=", BinOp::Ne),
    ("<=", BinOp::Le),
    (">=", BinOp::Ge),
    ("<", BinOp::Lt),
    (">", BinOp::Gt),
];
const SUM: &[(&str, BinOp)] = &[("+", BinOp::Add), ("-", BinOp::Sub)];
const TERM: &[(&str, BinOp)] = &[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Mod)];

/// Match one operator of `table` after optional whitespace
fn operator<'a>(input: &'a str, table: &[(&'static str, BinOp)]) -> Option<(&'a str, BinOp)> {
    let (rest, _) = sp(input).ok()?;
    table.iter().find_map(|&(symbol, op)| {
        let after = rest.strip_prefix(symbol)?;
        // `**` is power and `->` introduces outputs
        let glued = match symbol {
            "*" => after.starts_with('*'),
            "-" => after.starts_with('>'),
            _ => false,
        };
        (!glued).then_some((after, op))
    })
}

impl<'s> FormulaParser<'s> {
    /// Parse a full expression (lowest precedence: `or`)
    pub fn expr<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        self.keyword_chain(input, "or", BinOp::Or, Self::and_expr)
    }

    fn and_expr<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        self.keyword_chain(input, "and", BinOp::And, Self::not_expr)
    }

    fn keyword_chain<'a>(
        &self,
        input: &'a str,
        word: &'static str,
        op: BinOp,
        next: Level<'s, 'a>,
    ) -> PResult<'a, Expr> {
        let (mut input, mut lhs) = next(self, input)?;
        while let Ok((rest, _)) = lex(keyword(word))(input) {
            let (rest, rhs) = cut(|i: &'a str| next(self, i))(rest)?;
            lhs = Expr::binary(op, lhs, rhs);
            input = rest;
        }
        Ok((input, lhs))
    }

    fn not_expr<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (input, _) = sp(input)?;
        let start = self.offset(input);
        if let Ok((rest, _)) = keyword("not")(input) {
            let (rest, operand) = cut(|i: &'a str| self.not_expr(i))(rest)?;
            let span = Span::new(start, operand.span.end);
            return Ok((rest, Expr::new(ExprKind::Unary(UnaryOp::Not, Box::new(operand)), span)));
        }
        self.comparison(input)
    }

    // Comparisons do not chain: `a < b < c` is a syntax error
    fn comparison<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (input, lhs) = self.sum(input)?;
        match operator(input, COMPARISON) {
            Some((rest, op)) => {
                let (rest, rhs) = cut(|i: &'a str| self.sum(i))(rest)?;
                Ok((rest, Expr::binary(op, lhs, rhs)))
            }
            None => Ok((input, lhs)),
        }
    }

    fn sum<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        self.operator_chain(input, SUM, Self::term)
    }

    fn term<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        self.operator_chain(input, TERM, Self::unary)
    }

    fn operator_chain<'a>(
        &self,
        input: &'a str,
        table: &[(&'static str, BinOp)],
        next: Level<'s, 'a>,
    ) -> PResult<'a, Expr> {
        let (mut input, mut lhs) = next(self, input)?;
        while let Some((rest, op)) = operator(input, table) {
            let (rest, rhs) = cut(|i: &'a str| next(self, i))(rest)?;
            lhs = Expr::binary(op, lhs, rhs);
            input = rest;
        }
        Ok((input, lhs))
    }

    fn unary<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (input, _) = sp(input)?;
        let start = self.offset(input);
        if let Some(rest) = input.strip_prefix('-') {
            let (rest, operand) = cut(|i: &'a str| self.unary(i))(rest)?;
            let span = Span::new(start, operand.span.end);
            return Ok((rest, Expr::new(ExprKind::Unary(UnaryOp::Neg, Box::new(operand)), span)));
        }
        self.power(input)
    }

    // Right associative: the exponent goes back through `unary`
    fn power<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (input, base) = self.postfix(input)?;
        let (rest, _) = sp(input)?;
        if let Some(rest) = rest.strip_prefix("**") {
            let (rest, exponent) = cut(|i: &'a str| self.unary(i))(rest)?;
            return Ok((rest, Expr::binary(BinOp::Pow, base, exponent)));
        }
        Ok((input, base))
    }

    /// Calls `name(args)` and attribute access `value.name`
    fn postfix<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (mut input, mut expr) = self.primary(input)?;
        loop {
            let (rest, _) = sp(input)?;
            let start = expr.span.start;
            if let Some(after) = rest.strip_prefix('(') {
                let name = match &expr.kind {
                    ExprKind::Name(name) => name.clone(),
                    _ => return Err(failure(rest, "only named functions can be called")),
                };
                let (after, args) = separated_list0(lex(char(',')), |i: &'a str| self.expr(i))(after)?;
                let (after, _) = cut(context("expected ')'", lex(char(')'))))(after)?;
                expr = Expr::new(ExprKind::Call { name, args }, self.span(start, after));
                input = after;
            } else if let Some(after) = rest.strip_prefix('.') {
                let (after, name) = cut(context("expected a field name", lex(identifier)))(after)?;
                let span = self.span(start, after);
                expr = Expr::new(
                    ExprKind::Attribute {
                        value: Box::new(expr),
                        name,
                    },
                    span,
                );
                input = after;
            } else {
                return Ok((input, expr));
            }
        }
    }

    fn primary<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (input, _) = sp(input)?;
        let start = self.offset(input);
        let (rest, kind) = context(
            "expected an expression",
            alt((
                map(number_literal, |n| match n {
                    Number::Int(i) => ExprKind::Int(i),
                    Number::Float(f) => ExprKind::Float(f),
                }),
                map(string_literal, ExprKind::Str),
                value(ExprKind::Bool(true), keyword("true")),
                value(ExprKind::Bool(false), keyword("false")),
                map(identifier, ExprKind::Name),
                |i: &'a str| self.vector_literal(i),
                |i: &'a str| self.parenthesized(i),
            )),
        )(input)?;
        Ok((rest, Expr::new(kind, self.span(start, rest))))
    }

    fn parenthesized<'a>(&self, input: &'a str) -> PResult<'a, ExprKind> {
        let (input, _) = char('(')(input)?;
        let (input, inner) = cut(|i: &'a str| self.expr(i))(input)?;
        let (input, _) = cut(context("expected ')'", lex(char(')'))))(input)?;
        Ok((input, inner.kind))
    }

    /// `{x, y, z}` or `{r, g, b, a}`
    fn vector_literal<'a>(&self, input: &'a str) -> PResult<'a, ExprKind> {
        let (input, _) = char('{')(input)?;
        let (rest, items) = cut(separated_list1(lex(char(',')), |i: &'a str| self.expr(i)))(input)?;
        let (rest, _) = cut(context("expected '}'", lex(char('}'))))(rest)?;
        if !(3..=4).contains(&items.len()) {
            return Err(failure(input, "vector literals need 3 or 4 components"));
        }
        Ok((rest, ExprKind::Vector(items)))
    }
}
