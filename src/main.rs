use log::info;
use scatterdb::common::utility::{generate_transactions, transactions_table, USERS_PER_SCALE};
use scatterdb::common::{Error, Result};
use scatterdb::config::DemoConfig;
use scatterdb::scatter::{Plan, Query};
use scatterdb::sql::engine::{Connection, Rows};
use scatterdb::storage::MemoryDatabase;
use scatterdb::types::{DataType, Field, Table};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Finds the users with at least `min_transactions` transactions in
/// category 1, either directly or scattered over `concurrency` partitions
/// by user id. Takes an optional config file path.
fn main() -> Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = DemoConfig::load(path.as_deref())?;
    init_logging(&config.log_level)?;

    let db = MemoryDatabase::new();
    let table = transactions_table()?;
    let rows = generate_transactions(config.scale, config.seed);
    info!("loading {} transactions", rows.len());
    db.create_table(table)?;
    db.insert("transactions", rows)?;

    let start = Instant::now();
    let count = if config.concurrency == 0 {
        let query = Query::new(&users_query(config.min_transactions, false));
        let connection = db.connect();
        count_rows(connection.query(&query))?
    } else {
        let plan = build_plan(&db, &config)?;
        plan.query(count_rows)?
    };
    info!("{count} results in {:?}", start.elapsed());
    Ok(())
}

/// Installs a tracing subscriber on stderr, which also receives the `log`
/// records the library emits. `RUST_LOG` overrides the configured level.
fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|err| Error::Config(format!("invalid log level {level}: {err}")))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| Error::Config(err.to_string()))
}

/// Users in category 1 with at least `min` transactions. Partitioned
/// queries only look at users whose id modulo the user count falls in
/// [$1, $2].
fn users_query(min: usize, partitioned: bool) -> String {
    let range = match partitioned {
        true => format!(" AND user_id % {USERS_PER_SCALE} BETWEEN $1 AND $2"),
        false => String::new(),
    };
    format!(
        "SELECT user_id FROM transactions WHERE category_id = 1{range} \
         GROUP BY user_id HAVING count(*) >= {min}"
    )
}

fn build_plan(db: &MemoryDatabase, config: &DemoConfig) -> Result<Plan<impl Connection>> {
    let sql = users_query(config.min_transactions, true);
    let partitions = i64::try_from(config.concurrency)
        .map_err(|_| Error::Config(format!("concurrency {} is too large", config.concurrency)))?;
    let users = i64::try_from(USERS_PER_SCALE).map_err(|err| Error::Config(err.to_string()))?;
    let bucket = (users + partitions - 1) / partitions;

    let mut builder = Plan::builder();
    for i in 0..partitions {
        let (low, high) = (i * bucket, i * bucket + bucket - 1);
        builder = builder.partition(
            db.connect(),
            Query::with_args(&sql, vec![Field::from(low), Field::from(high)]),
        );
    }
    builder
        .aggregate_on(db.connect())
        .table(
            Table::builder()
                .name("results")
                .column("user_id", DataType::Int)
                .build()?,
        )
        .aggregate(Query::new("SELECT * FROM results"))
        .build()
}

fn count_rows(rows: Result<Rows<'_>>) -> Result<usize> {
    let mut count = 0;
    for row in rows? {
        row?;
        count += 1;
    }
    Ok(count)
}
