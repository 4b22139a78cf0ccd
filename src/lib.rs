// Library exports for mathformula

pub mod backends;
pub mod compiler;
pub mod driver;
pub mod error;
pub mod export;
pub mod interfaces;
pub mod interpreter;
pub mod ir;
pub mod layout;
pub mod parser;
pub mod render;
pub mod tree;
pub mod typecheck;
pub mod types;

pub use driver::{check_source, compile_source, CompileError, CompileOptions, Compilation, Source};
