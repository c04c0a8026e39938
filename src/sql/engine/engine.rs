use crate::common::Result;
use crate::storage::tuple::Row;
use crate::types::field::Field;
use serde::{Deserialize, Serialize};

/// SQL text with positional arguments bound to `$1`, `$2`, ...
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub sql: String,
    pub args: Vec<Field>,
}

impl Query {
    pub fn new(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            args: Vec::new(),
        }
    }

    pub fn with_args(sql: &str, args: Vec<Field>) -> Self {
        Self {
            sql: sql.to_string(),
            args,
        }
    }
}

/// A result cursor. Column metadata is available before the first row is
/// read; rows are decoded lazily and may fail individually.
pub trait Cursor: Iterator<Item = Result<Row>> {
    /// The names of the result columns, in order.
    fn columns(&self) -> &[String];
}

/// A boxed result cursor, possibly borrowing the transaction it came from.
pub type Rows<'a> = Box<dyn Cursor + 'a>;

/// A connection to a relational database.
///
/// Partition workers share `&Connection` across threads, so connections must
/// be `Sync`. Each partition is still given its own connection.
pub trait Connection: Sync {
    /// The connection's transaction type. It does not outlive the connection.
    type Transaction<'a>: Transaction
    where
        Self: 'a;

    /// Runs a query outside of any explicit transaction.
    fn query(&self, query: &Query) -> Result<Rows<'_>>;

    /// Begins a read-write transaction.
    fn begin(&self) -> Result<Self::Transaction<'_>>;
}

/// A database transaction.
///
/// Dropping a transaction that was neither committed nor rolled back rolls it
/// back, so anything it created never outlives it.
pub trait Transaction {
    /// Executes a statement that returns no rows (e.g. DDL), returning the
    /// number of rows affected.
    fn execute(&self, statement: &str, args: &[Field]) -> Result<u64>;

    /// Runs a query inside the transaction. The cursor borrows the
    /// transaction, so it must be consumed before the transaction ends.
    fn query(&self, query: &Query) -> Result<Rows<'_>>;

    /// Opens a bulk load into `table`, with values supplied in `columns` order.
    fn bulk_load(&self, table: &str, columns: &[String]) -> Result<Box<dyn BulkLoad + '_>>;

    fn commit(self) -> Result<()>;

    fn rollback(self) -> Result<()>;
}

/// A streaming row load into one table, e.g. a COPY.
///
/// Appended rows are only guaranteed to be visible to the transaction once
/// `finish` returns.
pub trait BulkLoad {
    /// Appends one row, with values in the declared column order.
    fn append(&mut self, row: Row) -> Result<()>;

    /// Flushes the load, returning the number of rows loaded.
    fn finish(self: Box<Self>) -> Result<u64>;
}
