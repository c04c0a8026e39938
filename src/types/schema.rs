use crate::common::{Error, Result};
use crate::errinput;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(PartialEq, Eq, Hash, Clone, Debug, Copy, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int,
    Float,
    Text,
}

/// Renders the SQL type name used in DDL.
impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => write!(f, "boolean"),
            DataType::Int => write!(f, "integer"),
            DataType::Float => write!(f, "double precision"),
            DataType::Text => write!(f, "text"),
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    /// Parses a SQL type name. Accepts the common aliases, case-insensitively.
    /// Type modifiers like the length in `varchar(20)` are ignored.
    fn from_str(data_type: &str) -> Result<DataType> {
        let base = data_type.split('(').next().unwrap_or_default();
        let normalized = base.split_whitespace().join(" ").to_lowercase();
        Ok(match normalized.as_str() {
            "bool" | "boolean" => DataType::Bool,
            "int" | "int4" | "int8" | "integer" | "bigint" | "smallint" => DataType::Int,
            "float" | "float4" | "float8" | "real" | "double" | "double precision"
            | "numeric" | "decimal" | "money" => DataType::Float,
            "text" | "string" | "varchar" | "char" | "character varying" => DataType::Text,
            _ => return errinput!("unknown data type {data_type}"),
        })
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug, Serialize, Deserialize)]
pub struct Column {
    /// Column name. Can't be empty.
    name: String,
    /// Column datatype.
    data_type: DataType,
    /// Whether the column allows null values.
    nullable: bool,
}

impl Column {
    pub fn new(column_name: &str, dt: DataType, nullable: bool) -> Column {
        Column {
            name: column_name.to_string(),
            data_type: dt,
            nullable,
        }
    }

    pub fn builder() -> ColumnBuilder {
        ColumnBuilder::new()
    }

    pub fn get_data_type(&self) -> DataType {
        self.data_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// The column's DDL fragment, e.g. `user_id integer NOT NULL`.
    pub fn to_sql(&self) -> String {
        match self.nullable {
            true => format!("{} {}", self.name, self.data_type),
            false => format!("{} {} NOT NULL", self.name, self.data_type),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.data_type)
    }
}

pub struct ColumnBuilder {
    name: Option<String>,
    data_type: Option<DataType>,
    nullable: Option<bool>,
}

impl ColumnBuilder {
    fn new() -> Self {
        Self {
            name: None,
            data_type: None,
            nullable: None,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn build(self) -> Result<Column> {
        let Some(name) = self.name.filter(|name| !name.is_empty()) else {
            return errinput!("column name must be specified before building");
        };
        let Some(data_type) = self.data_type else {
            return errinput!("column {name} needs a data type");
        };
        Ok(Column {
            name,
            data_type,
            nullable: self.nullable.unwrap_or(true),
        })
    }
}

/// A table definition. For the aggregation table, the column order is both
/// the bulk-load column order and the order values are read from partition
/// rows.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Serialize, Deserialize)]
pub struct Table {
    /// The name of the table
    name: String,
    /// The column definitions of the table
    columns: Vec<Column>,
}

impl Table {
    pub fn new(table_name: &str) -> Table {
        Table {
            name: table_name.to_string(),
            columns: Vec::new(),
        }
    }

    pub fn builder() -> TableBuilder {
        TableBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    // if a field exists return its offset in the schema
    // otherwise return None
    pub fn field_name_to_index(&self, field_name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(field_name))
    }

    /// The DDL creating this table as a temporary table that is dropped when
    /// the enclosing transaction ends.
    pub fn temporary_sql(&self) -> String {
        format!(
            "CREATE TEMPORARY TABLE {} (\n{}\n) ON COMMIT DROP",
            self.name,
            self.columns.iter().map(Column::to_sql).join(",\n")
        )
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.columns.iter().join(", "))
    }
}

#[derive(Default)]
pub struct TableBuilder {
    name: Option<String>,
    columns: Vec<Column>,
}

impl TableBuilder {
    pub fn name(&mut self, name: &str) -> &mut Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn column(&mut self, column_name: &str, dt: DataType) -> &mut Self {
        self.columns.push(Column::new(column_name, dt, true));
        self
    }

    pub fn column_from_definition(&mut self, column_definition: Column) -> &mut Self {
        self.columns.push(column_definition);
        self
    }

    pub fn build(&mut self) -> Result<Table> {
        let Some(name) = self.name.clone() else {
            return errinput!("cannot build a table without a name");
        };
        if let Some(duplicate) = self
            .columns
            .iter()
            .map(|c| c.name.to_lowercase())
            .duplicates()
            .next()
        {
            return errinput!("duplicate column {duplicate} in table {name}");
        }
        let mut table = Table::new(&name);
        self.columns
            .iter()
            .for_each(|column| table.add_column(column.clone()));
        Ok(table)
    }
}
