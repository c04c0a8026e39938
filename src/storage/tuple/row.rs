use crate::common::{Error, Result};
use crate::types::field::Field;
use crate::types::Table;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::slice::Iter;

/// An ordered sequence of untyped column values. Its arity is whatever the
/// producing query returned; it is only checked against a table schema when
/// the row is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Row {
    values: Vec<Field>,
}

impl From<Vec<Field>> for Row {
    fn from(v: Vec<Field>) -> Self {
        Row::new(v)
    }
}

impl FromIterator<Field> for Row {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Row::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Row {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl Row {
    fn new(values: Vec<Field>) -> Row {
        Row { values }
    }

    pub fn iter(&self) -> Iter<'_, Field> {
        self.values.iter()
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_field(&self, index: usize) -> Result<Field> {
        Ok(self.values.get(index).ok_or(Error::OutOfBounds)?.clone())
    }

    pub fn values(&self) -> &[Field] {
        &self.values
    }

    /// Checks the row's arity against the table and converts every value to
    /// its column's type.
    pub fn coerce(self, schema: &Table) -> Result<Row> {
        if self.values.len() != schema.col_count() {
            return Err(Error::ArityMismatch {
                table: schema.name().to_string(),
                expected: schema.col_count(),
                actual: self.values.len(),
            });
        }
        self.values
            .into_iter()
            .zip(schema.columns())
            .map(|(value, column)| {
                if value.is_null() && !column.nullable() {
                    return Err(Error::InvalidData(format!(
                        "column {} of {} is not nullable",
                        column.name(),
                        schema.name()
                    )));
                }
                value.coerce(column.get_data_type())
            })
            .collect::<Result<Vec<_>>>()
            .map(Row::new)
    }

    pub fn to_string(&self, str_len: Option<usize>) -> String {
        self.values
            .iter()
            .map(|field| {
                let mut text = field.to_plain_string();
                if let (Field::String(_), Some(len)) = (field, str_len) {
                    text = text.chars().take(len).collect();
                }
                text
            })
            .join(", ")
    }
}
