pub mod ast;
pub mod lexer;
pub mod parser;
pub mod semantic;

pub use parser::parse;
pub use semantic::{analyze, Analysis, AnalysisError};
