// Lexer utilities for the Math Formula language

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1, not_line_ending, one_of, satisfy},
    combinator::{not, opt, recognize, verify},
    error::{VerboseError, VerboseErrorKind},
    multi::many0_count,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

pub type PResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

/// Words that can never be used as identifiers
pub const KEYWORDS: &[&str] = &["fn", "ng", "loop", "repeat", "and", "or", "not", "true", "false"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// Skip whitespace and `#` comments
pub fn sp(input: &str) -> PResult<'_, &str> {
    recognize(many0_count(alt((
        multispace1,
        preceded(char('#'), not_line_ending),
    ))))(input)
}

/// Parse and consume surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    delimited(sp, inner, sp)
}

/// Skip leading whitespace only, so spans end at the last real character
pub fn lex<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    preceded(sp, inner)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse an identifier (variable, function or field name)
/// Format: [a-zA-Z_][a-zA-Z0-9_]*, keywords excluded
pub fn identifier(input: &str) -> PResult<'_, String> {
    let (input, ident) = verify(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
            take_while(is_ident_char),
        )),
        |s: &str| !KEYWORDS.contains(&s),
    )(input)?;

    Ok((input, ident.to_string()))
}

/// Match a keyword that is not the prefix of a longer identifier
pub fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    terminated(tag(word), not(satisfy(is_ident_char)))
}

/// Parse a string literal
/// Format: "..." (no escapes)
pub fn string_literal(input: &str) -> PResult<'_, String> {
    let (input, content) = delimited(char('"'), take_while(|c| c != '"'), char('"'))(input)?;

    Ok((input, content.to_string()))
}

/// Parse an unsigned number literal. Literals with a fraction or exponent
/// are floats, everything else is an int.
pub fn number_literal(input: &str) -> PResult<'_, Number> {
    let (rest, text) = recognize(tuple((
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;

    if text.contains(['.', 'e', 'E']) {
        let value = text
            .parse::<f64>()
            .map_err(|_| failure(input, "invalid number literal"))?;
        Ok((rest, Number::Float(value)))
    } else {
        let value = text
            .parse::<i64>()
            .map_err(|_| failure(input, "integer literal is too large"))?;
        Ok((rest, Number::Int(value)))
    }
}

/// Build an unrecoverable error carrying a message
pub fn failure<'a>(input: &'a str, message: &'static str) -> nom::Err<VerboseError<&'a str>> {
    nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(message))],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("foo"), Ok(("", "foo".to_string())));
        assert_eq!(identifier("foo123"), Ok(("", "foo123".to_string())));
        assert_eq!(identifier("_bar"), Ok(("", "_bar".to_string())));
        assert_eq!(identifier("foo_bar_123"), Ok(("", "foo_bar_123".to_string())));
        assert_eq!(identifier("x.y"), Ok((".y", "x".to_string())));
    }

    #[test]
    fn test_identifier_invalid_start_with_number() {
        // Identifiers cannot start with numbers
        assert!(identifier("123abc").is_err());
        assert!(identifier("1test").is_err());
    }

    #[test]
    fn test_identifier_is_ascii() {
        assert!(identifier("\u{e9}t\u{e9}").is_err());
        assert_eq!(identifier("a\u{e9}"), Ok(("\u{e9}", "a".to_string())));
    }

    #[test]
    fn test_identifier_rejects_keywords() {
        assert!(identifier("loop").is_err());
        assert!(identifier("and").is_err());
        // Keywords as a prefix are fine
        assert_eq!(identifier("android"), Ok(("", "android".to_string())));
        assert_eq!(identifier("format"), Ok(("", "format".to_string())));
    }

    #[test]
    fn test_keyword_boundary() {
        assert!(keyword("fn")("fn f").is_ok());
        assert!(keyword("fn")("fn(").is_ok());
        assert!(keyword("fn")("fnord").is_err());
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(string_literal(r#""hello""#), Ok(("", "hello".to_string())));
        assert_eq!(string_literal(r#""""#), Ok(("", String::new())));
    }

    #[test]
    fn test_string_literal_unclosed() {
        // Unclosed string literal should fail
        assert!(string_literal(r#""hello"#).is_err());
        assert!(string_literal(r#"hello""#).is_err());
    }

    #[test]
    fn test_number_literal() {
        assert_eq!(number_literal("42"), Ok(("", Number::Int(42))));
        assert_eq!(number_literal("3.5"), Ok(("", Number::Float(3.5))));
        assert_eq!(number_literal("1e3"), Ok(("", Number::Float(1000.0))));
        assert_eq!(number_literal("2.5E-1"), Ok(("", Number::Float(0.25))));
    }

    #[test]
    fn test_number_literal_followed_by_field() {
        // A dot without digits is not part of the number
        assert_eq!(number_literal("1.x"), Ok((".x", Number::Int(1))));
    }

    #[test]
    fn test_number_literal_overflow() {
        assert!(matches!(
            number_literal("99999999999999999999"),
            Err(nom::Err::Failure(_))
        ));
    }

    #[test]
    fn test_sp_skips_comments() {
        assert_eq!(sp("  # note\n  x"), Ok(("x", "  # note\n  ")));
        assert_eq!(sp("x"), Ok(("x", "")));
    }

    #[test]
    fn test_ws() {
        let mut parser = ws(tag("foo"));
        assert_eq!(parser("  foo  "), Ok(("", "foo")));
        assert_eq!(parser("foo"), Ok(("", "foo")));
        assert_eq!(parser("\n\tfoo\t\n"), Ok(("", "foo")));
    }
}
