// Ties the stages together: parse, check, compile, interpret, lay out

use crate::backends::{backend_for, TreeType};
use crate::error::{render_diagnostic, Error};
use crate::ir::{Op, TyStmt};
use crate::parser::parse_program;
use crate::tree::NodeGraph;
use crate::typecheck::TypeChecker;
use crate::{compiler, interpreter, layout};
use log::{debug, info};

/// A named piece of formula text
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub text: String,
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Source {
            name: name.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub tree_type: TreeType,
    /// Name of the main tree
    pub tree_name: String,
    /// Sources whose definitions are visible to the formula
    pub libraries: Vec<Source>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            tree_type: TreeType::Shader,
            tree_name: "Formula".to_string(),
            libraries: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Compilation {
    pub ops: Vec<Op>,
    pub graph: NodeGraph,
}

/// An error located in one of the sources
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub file: String,
    pub error: Error,
    /// The error printed with its source line
    pub rendered: String,
}

impl Diagnostic {
    fn new(source: &Source, error: Error) -> Self {
        Diagnostic {
            rendered: render_diagnostic(&source.text, &source.name, &error),
            file: source.name.clone(),
            error,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{}", error_count(.0.len()))]
    Diagnostics(Vec<Diagnostic>),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn error_count(n: usize) -> String {
    match n {
        1 => "could not compile formula due to 1 previous error".to_string(),
        n => format!("could not compile formula due to {n} previous errors"),
    }
}

fn diagnostics(source: &Source, errors: Vec<Error>) -> Vec<Diagnostic> {
    errors
        .into_iter()
        .map(|e| Diagnostic::new(source, e))
        .collect()
}

/// Parse and type check the libraries and then the formula
fn check(
    checker: &mut TypeChecker<'_>,
    source: &Source,
    options: &CompileOptions,
) -> Result<Vec<TyStmt>, CompileError> {
    let mut found = Vec::new();
    for library in &options.libraries {
        debug!("loading library `{}`", library.name);
        let result = parse_program(&library.text)
            .map_err(|e| vec![e])
            .and_then(|program| checker.add_library(&program));
        if let Err(errors) = result {
            found.extend(diagnostics(library, errors));
        }
    }
    if !found.is_empty() {
        return Err(CompileError::Diagnostics(found));
    }

    let program = parse_program(&source.text)
        .map_err(|e| CompileError::Diagnostics(vec![Diagnostic::new(source, e)]))?;
    checker
        .check(&program)
        .map_err(|errors| CompileError::Diagnostics(diagnostics(source, errors)))
}

/// Report every diagnostic without building anything
pub fn check_source(source: &Source, options: &CompileOptions) -> Result<(), CompileError> {
    let backend = backend_for(options.tree_type);
    let mut checker = TypeChecker::new(backend.as_ref());
    check(&mut checker, source, options).map(|_| ())
}

/// Compile a formula into a laid out node graph
pub fn compile_source(source: &Source, options: &CompileOptions) -> Result<Compilation, CompileError> {
    info!(
        "compiling `{}` into a {} tree",
        source.name, options.tree_type
    );
    let backend = backend_for(options.tree_type);
    let mut checker = TypeChecker::new(backend.as_ref());
    let stmts = check(&mut checker, source, options)?;

    let ops = compiler::compile(backend.as_ref(), &stmts)?;
    let mut graph = interpreter::run(options.tree_type, &options.tree_name, &ops)?;
    layout::layout_graph(&mut graph);
    Ok(Compilation { ops, graph })
}
