//! The SQL layer: the driver traits the scatter/gather executor talks to, and
//! the small SQL dialect the in-memory backend executes.
//!
//! Statements are parsed with sqlparser. The AST and aggregation follow toyDB
//! by Erik Grinaker:
//! (https://github.com/erikgrinaker/toydb), covered under Apache license.
pub mod engine;
pub mod execution;
pub mod parser;
