//! SQL parsing. Statements are parsed with sqlparser and lowered into the
//! small AST in [`ast`] that the memory backend executes.
pub mod ast;
mod parser;

pub use parser::Parser;
