use super::*;
use crate::sql::engine::Transaction;
use crate::types::DataType;

fn users() -> Table {
    Table::builder()
        .name("users")
        .column("user_id", DataType::Int)
        .column("name", DataType::Text)
        .build()
        .unwrap()
}

fn database() -> MemoryDatabase {
    let db = MemoryDatabase::new();
    db.create_table(users()).unwrap();
    db.insert(
        "users",
        vec![
            Row::from(vec![Field::from(1), Field::from("ada")]),
            Row::from(vec![Field::from(2), Field::from("brian")]),
            Row::from(vec![Field::from(3), Field::from("grace")]),
        ],
    )
    .unwrap();
    db
}

fn collect(rows: Rows<'_>) -> Result<Vec<Row>> {
    rows.collect()
}

#[test]
fn test_connection_query() {
    let db = database();
    let connection = db.connect();
    let rows = connection
        .query(&Query::with_args(
            "SELECT name FROM users WHERE user_id >= $1 ORDER BY user_id DESC",
            vec![Field::from(2)],
        ))
        .unwrap();
    assert_eq!(rows.columns(), ["name".to_string()]);
    assert_eq!(
        collect(rows).unwrap(),
        vec![
            Row::from(vec![Field::from("grace")]),
            Row::from(vec![Field::from("brian")]),
        ]
    );
}

#[test]
fn test_insert_coerces_and_checks_arity() {
    let db = database();
    assert!(matches!(
        db.insert("users", vec![Row::from(vec![Field::from(4)])]),
        Err(Error::ArityMismatch { expected: 2, actual: 1, .. })
    ));
    assert!(db
        .insert("users", vec![Row::from(vec![Field::from("x"), Field::from("y")])])
        .is_err());
    assert!(db.insert("nope", vec![]).is_err());
    assert_eq!(db.table_rows("users").unwrap().len(), 3);
}

#[test]
fn test_temporary_table_lifecycle() {
    let db = database();
    let connection = db.connect();
    let table = Table::builder()
        .name("results")
        .column("user_id", DataType::Int)
        .build()
        .unwrap();

    let txn = connection.begin().unwrap();
    assert_eq!(db.open_transactions(), 1);
    txn.execute(&table.temporary_sql(), &[]).unwrap();
    assert_eq!(db.live_temp_tables(), 1);

    let mut load = txn.bulk_load("results", &table.column_names()).unwrap();
    load.append(Row::from(vec![Field::from(7)])).unwrap();
    load.append(Row::from(vec![Field::from(3.0)])).unwrap();
    assert_eq!(load.finish().unwrap(), 2);

    let rows = txn
        .query(&Query::new("SELECT user_id FROM results ORDER BY user_id"))
        .unwrap();
    assert_eq!(
        collect(rows).unwrap(),
        vec![Row::from(vec![Field::from(3)]), Row::from(vec![Field::from(7)])]
    );
    // Other connections can't see the table.
    assert!(db.connect().query(&Query::new("SELECT * FROM results")).is_err());

    txn.rollback().unwrap();
    assert_eq!(db.live_temp_tables(), 0);
    assert_eq!(db.open_transactions(), 0);
    assert_eq!(db.rollbacks(), 1);
    assert!(db.table_rows("results").is_err());
}

#[test]
fn test_commit_publishes_persistent_writes() {
    let db = database();
    let connection = db.connect();
    let txn = connection.begin().unwrap();
    txn.execute("CREATE TABLE scores (user_id integer NOT NULL, score double precision)", &[])
        .unwrap();
    txn.execute("CREATE TEMP TABLE scratch (a integer) ON COMMIT DROP", &[])
        .unwrap();

    let mut load = txn
        .bulk_load("scores", &["score".to_string(), "user_id".to_string()])
        .unwrap();
    load.append(Row::from(vec![Field::from(1.5), Field::from(1)])).unwrap();
    load.finish().unwrap();

    let mut load = txn.bulk_load("users", &["user_id".to_string()]).unwrap();
    load.append(Row::from(vec![Field::from(4)])).unwrap();
    load.finish().unwrap();
    assert_eq!(db.table_rows("users").unwrap().len(), 3);

    txn.commit().unwrap();
    assert_eq!(db.commits(), 1);
    assert_eq!(db.live_temp_tables(), 0);
    assert_eq!(
        db.table_rows("scores").unwrap(),
        vec![Row::from(vec![Field::from(1), Field::from(1.5)])]
    );
    assert_eq!(db.table_rows("users").unwrap().len(), 4);
    assert!(db.table_rows("scratch").is_err());
}

#[test]
fn test_drop_rolls_back() {
    let db = database();
    let connection = db.connect();
    {
        let txn = connection.begin().unwrap();
        txn.execute("CREATE TEMPORARY TABLE t (a integer) ON COMMIT DROP", &[])
            .unwrap();
        assert_eq!(db.live_temp_tables(), 1);
    }
    assert_eq!(db.live_temp_tables(), 0);
    assert_eq!(db.open_transactions(), 0);
    assert_eq!(db.rollbacks(), 1);
}

#[test]
fn test_bulk_load_checks_rows() {
    let db = database();
    let connection = db.connect();
    let txn = connection.begin().unwrap();
    txn.execute("CREATE TEMP TABLE t (a integer NOT NULL)", &[]).unwrap();
    let mut load = txn.bulk_load("t", &["a".to_string()]).unwrap();
    assert!(matches!(
        load.append(Row::from(vec![Field::from(1), Field::from(2)])),
        Err(Error::ArityMismatch { expected: 1, actual: 2, .. })
    ));
    assert!(load.append(Row::from(vec![Field::Null])).is_err());
    assert!(load.append(Row::from(vec![Field::from("text")])).is_err());
    assert!(txn.bulk_load("t", &["b".to_string()]).is_err());
    assert!(txn.bulk_load("missing", &["a".to_string()]).is_err());
}

#[test]
fn test_statement_errors() {
    let db = database();
    let connection = db.connect();
    let txn = connection.begin().unwrap();
    txn.execute("CREATE TEMP TABLE t (a integer)", &[]).unwrap();
    assert!(txn.execute("CREATE TEMP TABLE t (a integer)", &[]).is_err());
    assert!(txn.execute("CREATE TABLE users (a integer)", &[]).is_err());
    assert!(txn.execute("CREATE TEMP TABLE u (a integer, A text)", &[]).is_err());
    assert!(txn.execute("CREATE TEMP TABLE u (a blob)", &[]).is_err());
    assert!(txn.query(&Query::new("CREATE TEMP TABLE v (a integer)")).is_err());
    assert_eq!(
        txn.execute("SELECT * FROM users WHERE user_id > $1", &[Field::from(1)])
            .unwrap(),
        2
    );
}

#[test]
fn test_faults() {
    let db = database();
    let query = Query::new("SELECT * FROM users");
    let backend = |message: &str| Error::Backend(message.to_string());

    let connection = db.connect().with_fault(Fault::Query("no query".into()));
    assert_eq!(connection.query(&query).err(), Some(backend("no query")));

    let connection = db.connect().with_fault(Fault::AfterRows {
        rows: 2,
        message: "lost".into(),
    });
    let results: Vec<Result<Row>> = connection.query(&query).unwrap().collect();
    assert_eq!(results.len(), 3);
    assert_eq!(results[2], Err(backend("lost")));

    let connection = db.connect().with_fault(Fault::Begin("no begin".into()));
    assert!(matches!(connection.begin(), Err(Error::Backend(m)) if m == "no begin"));
    assert_eq!(db.open_transactions(), 0);

    let connection = db.connect().with_fault(Fault::Execute("no ddl".into()));
    let txn = connection.begin().unwrap();
    assert_eq!(
        txn.execute("CREATE TEMP TABLE t (a integer)", &[]),
        Err(backend("no ddl"))
    );
    drop(txn);

    let connection = db.connect().with_fault(Fault::BulkLoad {
        after: 1,
        message: "copy failed".into(),
    });
    let txn = connection.begin().unwrap();
    let mut load = txn.bulk_load("users", &users().column_names()).unwrap();
    load.append(Row::from(vec![Field::from(9), Field::from("x")])).unwrap();
    assert_eq!(
        load.append(Row::from(vec![Field::from(10), Field::from("y")])),
        Err(backend("copy failed"))
    );
}
