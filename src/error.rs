// Source locations and user-facing diagnostics

use serde::Serialize;

/// Byte range into the formula source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Smallest span covering both
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// A syntax or type error pointing into the source
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    pub message: String,
    pub span: Span,
}

impl Error {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Error {
            message: message.into(),
            span,
        }
    }
}

/// 1-based line and column of a byte offset
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = clamp_to_char_boundary(source, offset);
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let col = source[line_start..offset].chars().count() + 1;
    (line, col)
}

/// Render an error the way the CLI prints it:
///
/// ```text
/// error: expected ';', found end of input
///  --> wave.mf:1:10
///   |
/// 1 | x = sin(t)
///   |           ^
/// ```
pub fn render_diagnostic(source: &str, file: &str, error: &Error) -> String {
    let start = clamp_to_char_boundary(source, error.span.start);
    let (line, col) = line_col(source, start);
    let line_start = source[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = source[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(source.len());
    let text = &source[line_start..line_end];
    let end = clamp_to_char_boundary(source, error.span.end.clamp(start, line_end));
    let width = source[start..end].chars().count().max(1);

    let gutter = line.to_string().len();
    let pad = " ".repeat(gutter);
    format!(
        "error: {}\n{pad}--> {file}:{line}:{col}\n{pad} |\n{line} | {text}\n{pad} | {}{}\n",
        error.message,
        " ".repeat(col - 1),
        "^".repeat(width),
    )
}

fn clamp_to_char_boundary(source: &str, offset: usize) -> usize {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
