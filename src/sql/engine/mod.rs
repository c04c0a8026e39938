#[allow(clippy::module_inception)]
mod engine;

pub use engine::{BulkLoad, Connection, Cursor, Query, Rows, Transaction};
