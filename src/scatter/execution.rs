use crate::common::constants::WORKER_SPAWN_ERR_MSG;
use crate::common::{Error, Result};
use crate::config::ExecutorConfig;
use crate::scatter::protocol::{self, Consumer, Event};
use crate::scatter::{worker, Plan, SubQuery};
use crate::sql::engine::{Connection, Rows, Transaction};
use log::{debug, info, trace, warn};
use std::thread;
use std::time::Instant;

/// One run of a plan. Owns the channels between the partition workers and
/// the coordinator; nothing is shared between executions.
pub(super) struct Execution<'p, C: Connection> {
    plan: &'p Plan<C>,
    config: &'p ExecutorConfig,
}

impl<'p, C: Connection> Execution<'p, C> {
    pub(super) fn new(plan: &'p Plan<C>, config: &'p ExecutorConfig) -> Self {
        Self { plan, config }
    }

    /// Launches one worker per partition, then coordinates on the calling
    /// thread. Every worker has exited by the time this returns.
    pub(super) fn run<F, R>(self, callback: F) -> R
    where
        F: FnOnce(Result<Rows<'_>>) -> R,
    {
        let plan = self.plan;
        let started = Instant::now();
        thread::scope(|scope| {
            let mut consumer = protocol::channel(self.config.channel_capacity);
            let mut workers = Vec::with_capacity(plan.partitions.len());
            let mut launched = Ok(());
            for (index, partition) in plan.partitions.iter().enumerate() {
                match self.spawn(scope, &consumer, index, partition) {
                    Ok(handle) => workers.push(handle),
                    Err(error) => {
                        warn!("launching partition {index} failed: {error}");
                        launched = Err(error);
                        break;
                    }
                }
            }
            consumer.seal();
            debug!("launched {} partitions", workers.len());

            let output = match launched {
                Ok(()) => self.coordinate(&mut consumer, callback, started),
                Err(error) => {
                    consumer.finish();
                    callback(Err(error))
                }
            };

            consumer.finish();
            for (index, handle) in workers.into_iter().enumerate() {
                if handle.join().is_err() {
                    warn!("partition {index} worker panicked");
                }
            }
            output
        })
    }

    /// Starts the worker for one partition on its own named thread.
    fn spawn<'scope, 'env>(
        &self,
        scope: &'scope thread::Scope<'scope, 'env>,
        consumer: &Consumer,
        index: usize,
        partition: &'env SubQuery<C>,
    ) -> Result<thread::ScopedJoinHandle<'scope, ()>> {
        let producer = consumer.producer(index)?;
        self.worker_builder(index)
            .spawn_scoped(scope, move || {
                worker::run(&partition.connection, &partition.query, producer)
            })
            .map_err(|err| Error::IO(format!("{WORKER_SPAWN_ERR_MSG} {err}")))
    }

    fn worker_builder(&self, index: usize) -> thread::Builder {
        let builder =
            thread::Builder::new().name(format!("{}-{index}", self.config.worker_name_prefix));
        match self.config.worker_stack_size {
            Some(size) => builder.stack_size(size),
            None => builder,
        }
    }

    /// Opens the aggregation transaction, loads every partition's rows and
    /// hands the aggregation query's result to the callback. The transaction
    /// is always rolled back: before the callback on a load failure, after it
    /// otherwise.
    fn coordinate<F, R>(&self, consumer: &mut Consumer, callback: F, started: Instant) -> R
    where
        F: FnOnce(Result<Rows<'_>>) -> R,
    {
        let txn = match self.plan.aggregation_connection.begin() {
            Ok(txn) => txn,
            Err(error) => {
                debug!("beginning the aggregation transaction failed: {error}");
                consumer.finish();
                return callback(Err(error));
            }
        };

        let loaded = match self.load(&txn, consumer) {
            Ok(loaded) => loaded,
            Err(error) => {
                debug!("execution aborted: {error}");
                consumer.finish();
                rollback(txn);
                return callback(Err(error));
            }
        };

        debug!("running aggregation query over {loaded} rows");
        let output = callback(txn.query(&self.plan.aggregation_query));
        rollback(txn);
        info!(
            "scatter/gather over {} partitions loaded {loaded} rows in {:?}",
            self.plan.partitions.len(),
            started.elapsed()
        );
        output
    }

    /// Creates the aggregation table and bulk-loads rows into it as they
    /// arrive, until every partition has sent its end marker. Returns the
    /// number of rows loaded.
    fn load<T: Transaction>(&self, txn: &T, consumer: &mut Consumer) -> Result<u64> {
        let table = &self.plan.aggregation_table;
        let ddl = table.temporary_sql();
        debug!("creating aggregation table:\n{ddl}");
        txn.execute(&ddl, &[])?;

        let mut load = txn.bulk_load(table.name(), &table.column_names())?;
        let partitions = self.plan.partitions.len();
        let mut finished = 0;
        while finished < partitions {
            match consumer.recv()? {
                Event::Row { partition, row } => {
                    if row.size() != table.col_count() {
                        return Err(Error::ArityMismatch {
                            table: table.name().to_string(),
                            expected: table.col_count(),
                            actual: row.size(),
                        });
                    }
                    trace!("loading row from partition {partition}");
                    load.append(row)?;
                }
                Event::End { partition } => {
                    finished += 1;
                    debug!("partition {partition} done ({finished}/{partitions})");
                }
                Event::Failed { partition, error } => {
                    debug!("partition {partition} failed: {error}");
                    return Err(error);
                }
            }
        }
        consumer.finish();
        load.finish()
    }
}

/// Rolls back the aggregation transaction, dropping the aggregation table
/// with it. A failure here can't be reported to the callback, which has
/// either already run or is about to receive the original error.
fn rollback<T: Transaction>(txn: T) {
    if let Err(error) = txn.rollback() {
        warn!("rolling back the aggregation transaction failed: {error}");
    }
}
