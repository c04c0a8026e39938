//! Scatter/gather query execution.
//!
//! A [`Plan`] splits a query into sub-queries that run concurrently, one
//! thread per partition, each on its own connection. Their rows are streamed
//! into a temporary aggregation table inside a single transaction on the
//! aggregation connection, and the aggregation query then runs over that
//! table in the same transaction.
//!
//! ```text
//!  partition 0 ──┐
//!  partition 1 ──┼─▶ coordinator ─▶ COPY into temp table ─▶ aggregation query ─▶ callback
//!  partition N ──┘     (select)
//! ```
//!
//! The transaction is rolled back once the callback returns, so the
//! aggregation table never outlives the call and nothing is committed.
mod execution;
pub mod protocol;
mod worker;


use crate::common::constants::{
    EMPTY_AGG_TABLE_MSG, MISSING_AGG_CONNECTION_MSG, MISSING_AGG_QUERY_MSG, MISSING_AGG_TABLE_MSG,
};
use crate::common::{Error, Result};
use crate::config::config::DEFAULT_EXECUTOR_CONFIG;
use crate::config::ExecutorConfig;
use crate::sql::engine::{Connection, Rows};
use crate::types::Table;
use execution::Execution;

pub use crate::sql::engine::Query;

/// One partition of a plan: a query and the connection it runs on.
pub struct SubQuery<C: Connection> {
    pub connection: C,
    pub query: Query,
}

impl<C: Connection> SubQuery<C> {
    pub fn new(connection: C, query: Query) -> Self {
        Self { connection, query }
    }
}

/// A scatter/gather plan. Immutable input to every execution.
pub struct Plan<C: Connection> {
    /// The sub-queries, run concurrently. Every partition must return rows
    /// with the aggregation table's columns, in the same order.
    pub partitions: Vec<SubQuery<C>>,
    /// The connection owning the aggregation transaction.
    pub aggregation_connection: C,
    /// Created as a temporary table inside the aggregation transaction.
    pub aggregation_table: Table,
    /// Runs over the aggregation table once every partition has been loaded.
    pub aggregation_query: Query,
}

impl<C: Connection> Plan<C> {
    pub fn builder() -> PlanBuilder<C> {
        PlanBuilder::new()
    }

    /// Executes the plan, calling `callback` exactly once with either the
    /// aggregation query's rows or the first error raised anywhere.
    ///
    /// The rows borrow the aggregation transaction, which is rolled back as
    /// soon as the callback returns, so they must be consumed inside it.
    /// Each call is an independent execution; calls from several threads on
    /// the same plan are only safe if the backend allows its connections to
    /// be used concurrently.
    pub fn query<F, R>(&self, callback: F) -> R
    where
        F: FnOnce(Result<Rows<'_>>) -> R,
    {
        self.query_with(&DEFAULT_EXECUTOR_CONFIG, callback)
    }

    /// Like [`Plan::query`], with explicit executor settings.
    pub fn query_with<F, R>(&self, config: &ExecutorConfig, callback: F) -> R
    where
        F: FnOnce(Result<Rows<'_>>) -> R,
    {
        Execution::new(self, config).run(callback)
    }
}

pub struct PlanBuilder<C: Connection> {
    partitions: Vec<SubQuery<C>>,
    aggregation_connection: Option<C>,
    aggregation_table: Option<Table>,
    aggregation_query: Option<Query>,
}

impl<C: Connection> PlanBuilder<C> {
    fn new() -> Self {
        Self {
            partitions: Vec::new(),
            aggregation_connection: None,
            aggregation_table: None,
            aggregation_query: None,
        }
    }

    /// Adds a partition. Partitions are numbered in the order they're added.
    pub fn partition(mut self, connection: C, query: Query) -> Self {
        self.partitions.push(SubQuery::new(connection, query));
        self
    }

    pub fn aggregate_on(mut self, connection: C) -> Self {
        self.aggregation_connection = Some(connection);
        self
    }

    pub fn table(mut self, table: Table) -> Self {
        self.aggregation_table = Some(table);
        self
    }

    pub fn aggregate(mut self, query: Query) -> Self {
        self.aggregation_query = Some(query);
        self
    }

    pub fn build(self) -> Result<Plan<C>> {
        let aggregation_connection = self
            .aggregation_connection
            .ok_or_else(|| Error::InvalidInput(MISSING_AGG_CONNECTION_MSG.to_string()))?;
        let aggregation_table = self
            .aggregation_table
            .ok_or_else(|| Error::InvalidInput(MISSING_AGG_TABLE_MSG.to_string()))?;
        if aggregation_table.col_count() == 0 {
            return Err(Error::InvalidInput(EMPTY_AGG_TABLE_MSG.to_string()));
        }
        let aggregation_query = self
            .aggregation_query
            .ok_or_else(|| Error::InvalidInput(MISSING_AGG_QUERY_MSG.to_string()))?;
        Ok(Plan {
            partitions: self.partitions,
            aggregation_connection,
            aggregation_table,
            aggregation_query,
        })
    }
}
