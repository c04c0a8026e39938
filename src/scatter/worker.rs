use crate::common::Result;
use crate::errdata;
use crate::scatter::protocol::Producer;
use crate::sql::engine::{Connection, Query};
use log::{debug, trace};

/// How a partition's stream ended, from the worker's point of view.
#[derive(Debug, PartialEq)]
enum Outcome {
    /// Every row was handed over.
    Complete { rows: u64 },
    /// The execution finished early; the rest of the stream was dropped.
    Abandoned { rows: u64 },
}

/// Runs one partition's query on its connection and relays every row to the
/// coordinator, followed by the end marker, or by the first error.
pub fn run<C: Connection>(connection: &C, query: &Query, producer: Producer) {
    let partition = producer.partition();
    match stream(connection, query, &producer) {
        Ok(Outcome::Complete { rows }) => {
            debug!("partition {partition} finished after {rows} rows");
            if !producer.send_end() {
                debug!("partition {partition} finished after the execution was done");
            }
        }
        Ok(Outcome::Abandoned { rows }) => {
            debug!("partition {partition} abandoned after {rows} rows");
        }
        Err(error) => {
            debug!("partition {partition} failed: {error}");
            if !producer.send_error(error) {
                debug!("partition {partition} error discarded, execution already done");
            }
        }
    }
}

/// Streams the query's rows into the producer. Each row's arity must match
/// the column metadata the cursor reported up front.
fn stream<C: Connection>(connection: &C, query: &Query, producer: &Producer) -> Result<Outcome> {
    let mut cursor = connection.query(query)?;
    let arity = cursor.columns().len();
    let mut rows = 0;
    while let Some(row) = cursor.next().transpose()? {
        if row.size() != arity {
            return errdata!(
                "partition {} returned a row with {} values for {arity} columns",
                producer.partition(),
                row.size()
            );
        }
        trace!("partition {} row {rows}: {}", producer.partition(), row.to_string(None));
        if !producer.send_row(row) {
            return Ok(Outcome::Abandoned { rows });
        }
        rows += 1;
    }
    Ok(Outcome::Complete { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use crate::scatter::protocol::{self, Event};
    use crate::storage::memory::{Fault, MemoryDatabase};
    use crate::storage::tuple::Row;
    use crate::types::{DataType, Field, Table};
    use std::thread;

    fn database() -> MemoryDatabase {
        let db = MemoryDatabase::new();
        let table = Table::builder()
            .name("users")
            .column("user_id", DataType::Int)
            .build()
            .unwrap();
        db.create_table(table).unwrap();
        db.insert(
            "users",
            (1..=3).map(|i| Row::from(vec![Field::from(i)])).collect(),
        )
        .unwrap();
        db
    }

    /// Runs a worker on its own thread and collects everything it sends.
    fn collect<C: Connection>(connection: &C, query: &Query) -> Vec<Event> {
        let mut consumer = protocol::channel(0);
        let producer = consumer.producer(0).unwrap();
        consumer.seal();
        thread::scope(|s| {
            s.spawn(|| run(connection, query, producer));
            let mut events = Vec::new();
            while let Ok(event) = consumer.recv() {
                events.push(event);
            }
            events
        })
    }

    #[test]
    fn test_rows_then_end_marker() {
        let db = database();
        let events = collect(&db.connect(), &Query::new("SELECT * FROM users"));

        assert_eq!(events.len(), 4);
        for (i, event) in events[..3].iter().enumerate() {
            assert_eq!(
                *event,
                Event::Row {
                    partition: 0,
                    row: Row::from(vec![Field::from(i as i64 + 1)])
                }
            );
        }
        assert_eq!(events[3], Event::End { partition: 0 });
    }

    #[test]
    fn test_empty_result_sends_only_end_marker() {
        let db = database();
        let query = Query::with_args(
            "SELECT user_id FROM users WHERE user_id > $1",
            vec![Field::from(10)],
        );
        let events = collect(&db.connect(), &query);

        assert_eq!(events, vec![Event::End { partition: 0 }]);
    }

    #[test]
    fn test_query_error_sends_only_error() {
        let db = database();
        let events = collect(&db.connect(), &Query::new("SELECT * FROM nope"));

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Event::Failed {
                partition: 0,
                error: Error::InvalidInput(_)
            }
        ));
    }

    #[test]
    fn test_error_mid_stream_stops_the_partition() {
        let db = database();
        let connection = db.connect().with_fault(Fault::AfterRows {
            rows: 1,
            message: "decode failed".to_string(),
        });
        let events = collect(&connection, &Query::new("SELECT * FROM users"));

        assert_eq!(
            events,
            vec![
                Event::Row {
                    partition: 0,
                    row: Row::from(vec![Field::from(1)])
                },
                Event::Failed {
                    partition: 0,
                    error: Error::Backend("decode failed".to_string())
                },
            ]
        );
    }

    #[test]
    fn test_done_abandons_the_stream() {
        let db = database();
        let connection = db.connect();
        let query = Query::new("SELECT * FROM users");
        let mut consumer = protocol::channel(0);
        let producer = consumer.producer(0).unwrap();
        consumer.seal();

        thread::scope(|s| {
            let worker = s.spawn(|| run(&connection, &query, producer));
            assert!(matches!(consumer.recv().unwrap(), Event::Row { .. }));
            consumer.finish();
            worker.join().unwrap();
        });
        // The worker exited without sending anything else.
        assert_eq!(consumer.recv(), Err(Error::Disconnected));
    }
}
