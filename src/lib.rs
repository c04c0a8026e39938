#![crate_type = "lib"]
#![crate_name = "scatterdb"]

pub mod common;
pub mod config;
pub mod scatter;
pub mod sql;
pub mod storage;
pub mod types;
