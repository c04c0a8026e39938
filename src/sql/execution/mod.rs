//! Executes parsed statements over in-memory rows.
mod aggregate;
mod expression;
mod select;

pub use expression::{evaluate, is_true, ConstantScope, RowScope, Scope};
pub use select::{select, ResultSet};
