use crate::common::Result;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::path::Path;

/// Environment variables starting with `SCATTERDB_` override file settings,
/// e.g. `SCATTERDB_CHANNEL_CAPACITY=4`.
pub const SCATTERDB_ENV_PREFIX: &str = "SCATTERDB";

/// Rendezvous: a partition blocks on every row until the coordinator takes it.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 0;
pub const DEFAULT_WORKER_NAME_PREFIX: &str = "partition";

/// Settings used by `Plan::query`.
pub static DEFAULT_EXECUTOR_CONFIG: Lazy<ExecutorConfig> = Lazy::new(ExecutorConfig::default);

/// Settings for a scatter/gather execution.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Buffer size of the row and error channels between the partition
    /// workers and the coordinator. Keep this small: rows buffered here are
    /// memory a fast partition holds ahead of the bulk load.
    pub channel_capacity: usize,
    /// Partition worker threads are named `<prefix>-<partition index>`.
    pub worker_name_prefix: String,
    /// Stack size for worker threads. Uses the platform default if unset.
    pub worker_stack_size: Option<usize>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            worker_name_prefix: DEFAULT_WORKER_NAME_PREFIX.to_string(),
            worker_stack_size: None,
        }
    }
}

impl ExecutorConfig {
    /// Loads settings from an optional file, overlaid by `SCATTERDB_*`
    /// environment variables. Missing keys keep their defaults.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        load(file)
    }
}

/// Settings for the demo binary.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of partitions. 0 runs the query directly, without scatter/gather.
    pub concurrency: usize,
    /// Scale factor for the generated data; each unit is 10,000 transactions.
    pub scale: usize,
    /// Only users with at least this many transactions are reported.
    pub min_transactions: usize,
    /// Seed for the generated data.
    pub seed: u64,
    /// Maximum log level written to stderr: off, error, warn, info, debug or
    /// trace.
    pub log_level: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            scale: 1,
            min_transactions: 3,
            seed: 339,
            log_level: "info".to_string(),
        }
    }
}

impl DemoConfig {
    pub fn load(file: Option<&Path>) -> Result<Self> {
        load(file)
    }
}

fn load<T: for<'de> Deserialize<'de>>(file: Option<&Path>) -> Result<T> {
    let mut builder = config::Config::builder();
    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path));
    }
    let settings = builder
        .add_source(config::Environment::with_prefix(SCATTERDB_ENV_PREFIX).try_parsing(true))
        .build()?;
    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.channel_capacity, 0);
        assert_eq!(config.worker_name_prefix, "partition");
        assert_eq!(config.worker_stack_size, None);
        assert_eq!(*DEFAULT_EXECUTOR_CONFIG, config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "channel_capacity = 2").unwrap();
        writeln!(file, "worker_name_prefix = \"shard\"").unwrap();

        let config = ExecutorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.channel_capacity, 2);
        assert_eq!(config.worker_name_prefix, "shard");
        assert_eq!(config.worker_stack_size, None);
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "concurrency = \"lots\"").unwrap();

        assert!(DemoConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_demo_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "concurrency = 0").unwrap();
        writeln!(file, "log_level = \"debug\"").unwrap();

        let config = DemoConfig::load(Some(file.path())).unwrap();
        assert_eq!(
            config,
            DemoConfig {
                concurrency: 0,
                log_level: "debug".to_string(),
                ..DemoConfig::default()
            }
        );
    }
}
