use serde::{Deserialize, Serialize};

/// Constructs an Error::InvalidInput for the given format string.
#[macro_export]
macro_rules! errinput {
    ($($args:tt)*) => { $crate::common::Error::InvalidInput(format!($($args)*)).into() };
}

/// Constructs an Error::InvalidData for the given format string.
#[macro_export]
macro_rules! errdata {
    ($($args:tt)*) => { $crate::common::Error::InvalidData(format!($($args)*)).into() };
}

/// scatterdb errors.
///
/// Errors have to be `Send` since they cross from partition worker threads
/// to the coordinator, and `Clone` so fault injection can replay them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// A row did not have the number of columns the target table expects.
    ArityMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },
    /// A failure raised by the database backend itself.
    Backend(String),
    /// Invalid settings.
    Config(String),
    /// A partition stopped producing without an end marker or an error,
    /// typically because its worker thread panicked.
    Disconnected,
    /// Invalid data, typically decoding errors or unexpected internal values.
    InvalidData(String),
    /// Invalid user input, typically parser or query errors.
    InvalidInput(String),
    /// An IO error.
    IO(String),
    OutOfBounds,
    OverflowError,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ArityMismatch {
                table,
                expected,
                actual,
            } => write!(
                f,
                "row has {actual} columns, table {table} expects {expected}"
            ),
            Error::Backend(msg) => write!(f, "backend error: {msg}"),
            Error::Config(msg) => write!(f, "invalid config: {msg}"),
            Error::Disconnected => write!(f, "partition disconnected before completing"),
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::IO(msg) => write!(f, "io error: {msg}"),
            Error::OutOfBounds => write!(f, "index out of bounds"),
            Error::OverflowError => write!(f, "integer overflow"),
        }
    }
}

/// A scatterdb Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<Error> for Result<T> {
    fn from(error: Error) -> Self {
        Err(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

impl From<sqlparser::parser::ParserError> for Error {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

impl From<crossbeam::channel::RecvError> for Error {
    fn from(_: crossbeam::channel::RecvError) -> Self {
        Error::Disconnected
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_build_errors() {
        let input: Result<()> = errinput!("no table {}", "t");
        assert_eq!(input, Err(Error::InvalidInput("no table t".to_string())));

        let data: Result<()> = errdata!("bad value {}", 7);
        assert_eq!(data, Err(Error::InvalidData("bad value 7".to_string())));
    }

    #[test]
    fn test_display() {
        let err = Error::ArityMismatch {
            table: "results".to_string(),
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "row has 3 columns, table results expects 2");
        assert_eq!(
            Error::Disconnected.to_string(),
            "partition disconnected before completing"
        );
    }
}
