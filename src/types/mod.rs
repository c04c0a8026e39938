pub mod field;
mod schema;

pub use field::Field;
pub use schema::{Column, ColumnBuilder, DataType, Table, TableBuilder};
