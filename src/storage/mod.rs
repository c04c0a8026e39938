pub mod memory;
pub mod tuple;

pub use memory::{Fault, MemoryConnection, MemoryDatabase, MemoryTransaction};
