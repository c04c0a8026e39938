//! The handoff between partition workers and the coordinator.
//!
//! Two channels carry partition output: one for rows and end markers, one for
//! errors. Both are bounded (rendezvous by default), so a send blocks until
//! the coordinator receives it. A third, never-written channel is the done
//! signal: the coordinator drops its sending half, which disconnects every
//! worker's receiving half at once and turns all pending and future sends
//! into no-ops.
use crate::common::{Error, Result};
use crate::errdata;
use crate::storage::tuple::Row;
use crossbeam::channel::{bounded, select, Receiver, Sender, TryRecvError};

/// What a partition sends on the row channel.
#[derive(Debug, PartialEq)]
pub enum Message {
    Row(Row),
    /// The partition produced its last row. Nothing follows it.
    End,
}

/// What the coordinator observes next, from any partition.
#[derive(Debug, PartialEq)]
pub enum Event {
    Row { partition: usize, row: Row },
    End { partition: usize },
    Failed { partition: usize, error: Error },
}

/// Creates the channels for one execution. Producers are handed out per
/// partition with [`Consumer::producer`].
pub fn channel(capacity: usize) -> Consumer {
    let (rows_tx, rows_rx) = bounded(capacity);
    let (errors_tx, errors_rx) = bounded(capacity);
    let (done_tx, done_rx) = bounded(0);
    Consumer {
        rows: rows_rx,
        errors: errors_rx,
        senders: Some((rows_tx, errors_tx)),
        done: Some(done_tx),
        done_rx,
    }
}

/// A partition's sending side.
pub struct Producer {
    partition: usize,
    rows: Sender<(usize, Message)>,
    errors: Sender<(usize, Error)>,
    done: Receiver<()>,
}

impl Producer {
    /// Sends a row. Returns false if the execution is done and the row was
    /// dropped, in which case the partition should stop.
    pub fn send_row(&self, row: Row) -> bool {
        self.send_message(Message::Row(row))
    }

    /// Sends the end marker. Consumes the producer: nothing may follow it.
    pub fn send_end(self) -> bool {
        self.send_message(Message::End)
    }

    /// Sends an error. Consumes the producer: nothing may follow it.
    pub fn send_error(self, error: Error) -> bool {
        if self.is_done() {
            return false;
        }
        select! {
            send(self.errors, (self.partition, error)) -> sent => sent.is_ok(),
            recv(self.done) -> _ => false,
        }
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Whether the done signal has fired. Checked before every send so that a
    /// buffered channel doesn't keep accepting rows nobody will read.
    fn is_done(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }

    fn send_message(&self, message: Message) -> bool {
        if self.is_done() {
            return false;
        }
        select! {
            send(self.rows, (self.partition, message)) -> sent => sent.is_ok(),
            recv(self.done) -> _ => false,
        }
    }
}

/// The coordinator's receiving side. Owns the done signal, which fires when
/// [`Consumer::finish`] is called or the consumer is dropped.
pub struct Consumer {
    rows: Receiver<(usize, Message)>,
    errors: Receiver<(usize, Error)>,
    /// The consumer's own copies of the senders, cloned into producers. They
    /// are dropped by `seal` so that a channel disconnects once every
    /// producer is gone.
    senders: Option<(Sender<(usize, Message)>, Sender<(usize, Error)>)>,
    done: Option<Sender<()>>,
    done_rx: Receiver<()>,
}

impl Consumer {
    /// Creates the producer for the given partition. Errors if called after
    /// `seal`.
    pub fn producer(&self, partition: usize) -> Result<Producer> {
        let Some((rows, errors)) = &self.senders else {
            return errdata!("no producer for partition {partition}: channels are sealed");
        };
        Ok(Producer {
            partition,
            rows: rows.clone(),
            errors: errors.clone(),
            done: self.done_rx.clone(),
        })
    }

    /// Stops handing out producers. After this, the channels disconnect once
    /// every producer has been dropped.
    pub fn seal(&mut self) {
        self.senders = None;
    }

    /// Waits for the next row, end marker or error from any partition.
    /// Errors with `Error::Disconnected` if every producer is gone.
    pub fn recv(&self) -> Result<Event> {
        select! {
            recv(self.rows) -> message => match message {
                Ok(message) => Ok(row_event(message)),
                Err(_) => self.drain(),
            },
            recv(self.errors) -> error => match error {
                Ok((partition, error)) => Ok(Event::Failed { partition, error }),
                Err(_) => self.drain(),
            },
        }
    }

    /// Both channels disconnect together when the last producer is dropped,
    /// but with buffering either may still hold messages.
    fn drain(&self) -> Result<Event> {
        if let Ok(message) = self.rows.try_recv() {
            return Ok(row_event(message));
        }
        if let Ok((partition, error)) = self.errors.try_recv() {
            return Ok(Event::Failed { partition, error });
        }
        Err(Error::Disconnected)
    }

    /// Fires the done signal, releasing every blocked producer. Idempotent.
    pub fn finish(&mut self) {
        self.done.take();
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_none()
    }
}

fn row_event((partition, message): (usize, Message)) -> Event {
    match message {
        Message::Row(row) => Event::Row { partition, row },
        Message::End => Event::End { partition },
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.finish();
    }
}
