//! An in-memory relational backend implementing the `sql::engine` driver
//! traits. Used by the tests and the demo binary.
//!
//! Committed tables live in state shared by every connection, guarded by a
//! mutex. A transaction keeps its own writes (temporary tables, rows loaded
//! into committed tables) locally until it commits; rollback, or dropping the
//! transaction, discards them. Faults can be injected per connection to
//! exercise every failure point of a driver.
#[cfg(test)]
mod tests;

use crate::common::{Error, Result};
use crate::errinput;
use crate::sql::engine::{self, BulkLoad, Connection, Cursor, Query, Rows};
use crate::sql::execution::{self, ResultSet};
use crate::sql::parser::ast::{Select, Statement};
use crate::sql::parser::Parser;
use crate::storage::tuple::Row;
use crate::types::{Field, Table};
use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// A failure (or slowdown) injected into a connection.
#[derive(Clone, Debug, PartialEq)]
pub enum Fault {
    /// Running a query fails.
    Query(String),
    /// Iterating a query's rows fails after the given number of rows.
    AfterRows { rows: usize, message: String },
    /// Beginning a transaction fails.
    Begin(String),
    /// Executing a statement in a transaction fails.
    Execute(String),
    /// A bulk load fails when appending the row after the first `after` rows.
    BulkLoad { after: usize, message: String },
    /// Sleeps before producing each row.
    Delay(Duration),
}

/// A committed table.
#[derive(Clone, Debug)]
struct StoredTable {
    schema: Table,
    rows: Vec<Row>,
}

/// State shared by every connection to a database.
#[derive(Default)]
struct State {
    tables: BTreeMap<String, StoredTable>,
    next_transaction: u64,
    open_transactions: usize,
    live_temp_tables: usize,
    commits: u64,
    rollbacks: u64,
}

/// An in-memory database. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a connection without faults.
    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection {
            state: Arc::clone(&self.state),
            faults: Vec::new(),
        }
    }

    /// Creates a committed table. Errors if it already exists.
    pub fn create_table(&self, table: Table) -> Result<()> {
        let mut state = self.state.lock()?;
        let name = table.name().to_lowercase();
        if state.tables.contains_key(&name) {
            return errinput!("table {name} already exists");
        }
        debug!("creating table {table}");
        state.tables.insert(
            name,
            StoredTable {
                schema: table,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    /// Inserts rows into a committed table, coercing them to its schema.
    /// Either every row is inserted or none is.
    pub fn insert(&self, table: &str, rows: Vec<Row>) -> Result<()> {
        let mut state = self.state.lock()?;
        let Some(stored) = state.tables.get_mut(&table.to_lowercase()) else {
            return errinput!("table {table} does not exist");
        };
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|row| row.coerce(&stored.schema))
            .collect::<Result<_>>()?;
        stored.rows.extend(rows);
        Ok(())
    }

    /// Returns the committed rows of a table.
    pub fn table_rows(&self, table: &str) -> Result<Vec<Row>> {
        match self.state.lock()?.tables.get(&table.to_lowercase()) {
            Some(stored) => Ok(stored.rows.clone()),
            None => errinput!("table {table} does not exist"),
        }
    }

    /// The number of temporary tables held by open transactions.
    pub fn live_temp_tables(&self) -> usize {
        self.observe().live_temp_tables
    }

    pub fn open_transactions(&self) -> usize {
        self.observe().open_transactions
    }

    pub fn commits(&self) -> u64 {
        self.observe().commits
    }

    pub fn rollbacks(&self) -> u64 {
        self.observe().rollbacks
    }

    /// Locks the state for reading counters, even if a panicking thread
    /// poisoned the lock.
    fn observe(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A connection to a [`MemoryDatabase`], with optional injected faults.
#[derive(Clone)]
pub struct MemoryConnection {
    state: Arc<Mutex<State>>,
    faults: Vec<Fault>,
}

impl MemoryConnection {
    /// Adds a fault to the connection.
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Fails with a backend error if a matching fault is injected.
    fn inject(&self, matches: impl Fn(&Fault) -> Option<&String>) -> Result<()> {
        match self.faults.iter().find_map(matches) {
            Some(message) => {
                debug!("injecting fault: {message}");
                Err(Error::Backend(message.clone()))
            }
            None => Ok(()),
        }
    }

    /// Wraps a result set in a cursor that applies the row-level faults.
    fn cursor(&self, result: ResultSet) -> Rows<'static> {
        let mut cursor = MemoryCursor {
            columns: result.columns,
            rows: result.rows.into_iter(),
            produced: 0,
            fail_after: None,
            delay: None,
            failed: false,
        };
        for fault in &self.faults {
            match fault {
                Fault::AfterRows { rows, message } => {
                    cursor.fail_after = Some((*rows, message.clone()))
                }
                Fault::Delay(delay) => cursor.delay = Some(*delay),
                _ => {}
            }
        }
        Box::new(cursor)
    }
}

/// Parses a query, which must be a SELECT.
fn parse_select(query: &Query) -> Result<Select> {
    match Parser::parse(&query.sql)? {
        Statement::Select(select) => Ok(select),
        _ => errinput!("statement does not return rows: {}", query.sql),
    }
}

impl Connection for MemoryConnection {
    type Transaction<'a> = MemoryTransaction<'a>;

    fn query(&self, query: &Query) -> Result<Rows<'_>> {
        self.inject(|f| match f {
            Fault::Query(message) => Some(message),
            _ => None,
        })?;
        let select = parse_select(query)?;
        let state = self.state.lock()?;
        let Some(stored) = state.tables.get(&select.from.to_lowercase()) else {
            return errinput!("table {} does not exist", select.from);
        };
        let result = execution::select(&select, &stored.schema, &stored.rows, &query.args)?;
        trace!("query returned {} rows: {}", result.rows.len(), query.sql);
        Ok(self.cursor(result))
    }

    fn begin(&self) -> Result<MemoryTransaction<'_>> {
        self.inject(|f| match f {
            Fault::Begin(message) => Some(message),
            _ => None,
        })?;
        let mut state = self.state.lock()?;
        state.next_transaction += 1;
        state.open_transactions += 1;
        let id = state.next_transaction;
        debug!("began transaction {id}");
        Ok(MemoryTransaction {
            id,
            connection: self,
            local: RefCell::new(Local::default()),
            finished: Cell::new(false),
        })
    }
}

/// A table created inside a transaction.
struct LocalTable {
    stored: StoredTable,
    temporary: bool,
}

/// A transaction's uncommitted writes.
#[derive(Default)]
struct Local {
    /// Tables created by the transaction, temporary or not.
    tables: BTreeMap<String, LocalTable>,
    /// Rows loaded into committed tables.
    appended: BTreeMap<String, Vec<Row>>,
}

impl Local {
    fn temp_tables(&self) -> usize {
        self.tables.values().filter(|t| t.temporary).count()
    }
}

/// A transaction on a [`MemoryConnection`]. It sees committed tables plus
/// its own writes. Temporary tables never outlive it: the memory backend has
/// no sessions, so they're dropped at commit as well as at rollback.
pub struct MemoryTransaction<'a> {
    id: u64,
    connection: &'a MemoryConnection,
    local: RefCell<Local>,
    finished: Cell<bool>,
}

impl MemoryTransaction<'_> {
    /// Ends the transaction, publishing its writes if `commit` is true. The
    /// transaction ends even if publishing fails, as a rollback.
    fn end(&self, commit: bool) -> Result<()> {
        if self.finished.replace(true) {
            return Ok(());
        }
        let local = self.local.take();
        let mut state = self
            .connection
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        state.open_transactions -= 1;
        state.live_temp_tables -= local.temp_tables();

        let published = match commit {
            true => Self::publish(&mut state, local),
            false => Ok(()),
        };
        match (commit, &published) {
            (true, Ok(())) => {
                state.commits += 1;
                debug!("committed transaction {}", self.id);
            }
            _ => {
                state.rollbacks += 1;
                debug!("rolled back transaction {}", self.id);
            }
        }
        published
    }

    /// Applies a transaction's writes to the committed state. Checks
    /// everything before changing anything.
    fn publish(state: &mut State, local: Local) -> Result<()> {
        for name in local.appended.keys() {
            if !state.tables.contains_key(name) {
                return errinput!("table {name} was dropped concurrently");
            }
        }
        for (name, table) in &local.tables {
            if !table.temporary && state.tables.contains_key(name) {
                return errinput!("table {name} already exists");
            }
        }
        for (name, rows) in local.appended {
            if let Some(stored) = state.tables.get_mut(&name) {
                stored.rows.extend(rows);
            }
        }
        for (name, table) in local.tables {
            if !table.temporary {
                state.tables.insert(name, table.stored);
            }
        }
        Ok(())
    }

    /// Looks up a table as the transaction sees it, passing its schema and
    /// rows to the closure.
    fn with_table<T>(&self, name: &str, f: impl FnOnce(&Table, &[Row]) -> Result<T>) -> Result<T> {
        let name = name.to_lowercase();
        let local = self.local.borrow();
        if let Some(table) = local.tables.get(&name) {
            return f(&table.stored.schema, &table.stored.rows);
        }
        let state = self.connection.state.lock()?;
        let Some(stored) = state.tables.get(&name) else {
            return errinput!("table {name} does not exist");
        };
        match local.appended.get(&name) {
            Some(appended) => {
                let rows: Vec<Row> = stored.rows.iter().chain(appended).cloned().collect();
                f(&stored.schema, &rows)
            }
            None => f(&stored.schema, &stored.rows),
        }
    }

    fn create_table(&self, table: Table, temporary: bool) -> Result<()> {
        let name = table.name().to_lowercase();
        let mut local = self.local.borrow_mut();
        if local.tables.contains_key(&name) {
            return errinput!("table {name} already exists");
        }
        if !temporary && self.connection.state.lock()?.tables.contains_key(&name) {
            return errinput!("table {name} already exists");
        }
        if temporary {
            self.connection.state.lock()?.live_temp_tables += 1;
        }
        debug!("transaction {} created table {table}", self.id);
        local.tables.insert(
            name,
            LocalTable {
                stored: StoredTable {
                    schema: table,
                    rows: Vec::new(),
                },
                temporary,
            },
        );
        Ok(())
    }

    /// Stores rows loaded into a table.
    fn append(&self, table: &str, rows: Vec<Row>) {
        let name = table.to_lowercase();
        let mut local = self.local.borrow_mut();
        match local.tables.get_mut(&name) {
            Some(table) => table.stored.rows.extend(rows),
            None => local.appended.entry(name).or_default().extend(rows),
        }
    }
}

impl engine::Transaction for MemoryTransaction<'_> {
    fn execute(&self, statement: &str, args: &[Field]) -> Result<u64> {
        self.connection.inject(|f| match f {
            Fault::Execute(message) => Some(message),
            _ => None,
        })?;
        match Parser::parse(statement)? {
            Statement::CreateTable {
                name,
                columns,
                temporary,
                on_commit_drop: _,
            } => {
                let mut builder = Table::builder();
                builder.name(&name);
                for column in columns {
                    builder.column_from_definition(column);
                }
                self.create_table(builder.build()?, temporary)?;
                Ok(0)
            }
            Statement::Select(select) => {
                let result = self.with_table(&select.from, |schema, rows| {
                    execution::select(&select, schema, rows, args)
                })?;
                Ok(result.rows.len() as u64)
            }
        }
    }

    fn query(&self, query: &Query) -> Result<Rows<'_>> {
        self.connection.inject(|f| match f {
            Fault::Query(message) => Some(message),
            _ => None,
        })?;
        let select = parse_select(query)?;
        let result = self.with_table(&select.from, |schema, rows| {
            execution::select(&select, schema, rows, &query.args)
        })?;
        Ok(self.connection.cursor(result))
    }

    fn bulk_load(&self, table: &str, columns: &[String]) -> Result<Box<dyn BulkLoad + '_>> {
        let schema = self.with_table(table, |schema, _| Ok(schema.clone()))?;
        let positions = columns
            .iter()
            .map(|column| match schema.field_name_to_index(column) {
                Some(index) => Ok(index),
                None => errinput!("unknown column {column} in table {}", schema.name()),
            })
            .collect::<Result<Vec<_>>>()?;
        let fail_after = self.connection.faults.iter().find_map(|f| match f {
            Fault::BulkLoad { after, message } => Some((*after, message.clone())),
            _ => None,
        });
        Ok(Box::new(MemoryBulkLoad {
            transaction: self,
            schema,
            positions,
            rows: Vec::new(),
            fail_after,
        }))
    }

    fn commit(self) -> Result<()> {
        self.end(true)
    }

    fn rollback(self) -> Result<()> {
        self.end(false)
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished.get() {
            debug!("transaction {} dropped while open", self.id);
            // Rollback can't fail.
            let _ = self.end(false);
        }
    }
}

/// A bulk load into a table of a [`MemoryTransaction`]. Rows are buffered
/// and become visible to the transaction once the load finishes.
struct MemoryBulkLoad<'t> {
    transaction: &'t MemoryTransaction<'t>,
    schema: Table,
    /// The schema position of each loaded column.
    positions: Vec<usize>,
    rows: Vec<Row>,
    fail_after: Option<(usize, String)>,
}

impl BulkLoad for MemoryBulkLoad<'_> {
    fn append(&mut self, row: Row) -> Result<()> {
        if let Some((after, message)) = &self.fail_after {
            if self.rows.len() >= *after {
                return Err(Error::Backend(message.clone()));
            }
        }
        if row.size() != self.positions.len() {
            return Err(Error::ArityMismatch {
                table: self.schema.name().to_string(),
                expected: self.positions.len(),
                actual: row.size(),
            });
        }
        // Columns that aren't loaded are NULL.
        let mut values = vec![Field::Null; self.schema.col_count()];
        for (value, &position) in row.into_iter().zip(&self.positions) {
            values[position] = value;
        }
        self.rows.push(Row::from(values).coerce(&self.schema)?);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<u64> {
        let MemoryBulkLoad {
            transaction,
            schema,
            rows,
            ..
        } = *self;
        let count = rows.len() as u64;
        trace!("bulk load of {count} rows into {}", schema.name());
        transaction.append(schema.name(), rows);
        Ok(count)
    }
}

/// A cursor over a materialized result set.
struct MemoryCursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Row>,
    produced: usize,
    fail_after: Option<(usize, String)>,
    delay: Option<Duration>,
    failed: bool,
}

impl Iterator for MemoryCursor {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        if self.failed {
            return None;
        }
        if let Some((rows, message)) = &self.fail_after {
            if self.produced >= *rows {
                self.failed = true;
                return Some(Err(Error::Backend(message.clone())));
            }
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let row = self.rows.next()?;
        self.produced += 1;
        Some(Ok(row))
    }
}

impl Cursor for MemoryCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }
}
