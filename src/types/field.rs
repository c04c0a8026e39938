use crate::common::{Error, Result};
use crate::types::DataType;
use crate::{errdata, errinput};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// An untyped column value, as decoded from a backend row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Field {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl PartialEq for Field {
    fn eq(&self, other: &Field) -> bool {
        match (self, other) {
            (Field::Null, Field::Null) => true,
            (Field::Boolean(b), Field::Boolean(b2)) => b == b2,
            (Field::Integer(i), Field::Integer(i2)) => i == i2,
            // match on NaN as well as equality
            (Field::Float(f), Field::Float(f2)) => (f == f2) || (f.is_nan() && f2.is_nan()),
            (Field::String(s), Field::String(s2)) => s == s2,
            _ => false,
        }
    }
}

impl Eq for Field {} // implement Eq trait for Field, uses PartialEq

impl std::hash::Hash for Field {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Field::Null => {}
            Field::Boolean(b) => b.hash(state),
            Field::Integer(i) => i.hash(state),
            Field::Float(f) => {
                if f.is_nan() {
                    0.hash(state);
                } else {
                    f.to_bits().hash(state);
                }
            }
            Field::String(s) => s.hash(state),
        }
    }
}

// for use in sorting and grouping. Nulls sort first, NaN sorts after all
// other floats, and values of different types are ordered by type.
impl Ord for Field {
    fn cmp(&self, other: &Self) -> Ordering {
        use Field::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Boolean(b), Boolean(b2)) => b.cmp(b2),
            (Integer(i), Integer(i2)) => i.cmp(i2),
            (Float(f), Float(f2)) => match (f.is_nan(), f2.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => f.partial_cmp(f2).unwrap_or(Ordering::Equal),
            },
            (Integer(i), Float(f)) => Float(*i as f64).cmp(&Float(*f)).then(Ordering::Less),
            (Float(f), Integer(i)) => Float(*f).cmp(&Float(*i as f64)).then(Ordering::Greater),
            (String(s), String(s2)) => s.cmp(s2),
            (Boolean(_), _) => Ordering::Less,
            (_, Boolean(_)) => Ordering::Greater,
            (Integer(_) | Float(_), String(_)) => Ordering::Less,
            (String(_), Integer(_) | Float(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Boolean(true) => f.write_str("TRUE"),
            Self::Boolean(false) => f.write_str("FALSE"),
            Self::Integer(integer) => integer.fmt(f),
            Self::Float(float) => write!(f, "{float:?}"),
            Self::String(string) => write!(f, "'{}'", string.escape_debug()),
        }
    }
}

impl From<f64> for Field {
    fn from(v: f64) -> Self {
        Field::Float(v)
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Field::Integer(v)
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Integer(v.into())
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        Field::String(v)
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        Field::String(v.to_owned())
    }
}

impl From<bool> for Field {
    fn from(v: bool) -> Self {
        Field::Boolean(v)
    }
}

impl<T: Into<Field>> From<Option<T>> for Field {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Field::Null)
    }
}

/// Applies a binary arithmetic operator. Nulls propagate; an integer combined
/// with a float yields a float.
macro_rules! arithmetic {
    ($lhs:expr, $rhs:expr, $checked:ident, $op:tt, $verb:literal) => {{
        use Field::*;
        match ($lhs, $rhs) {
            (Integer(lhs), Integer(rhs)) => match lhs.$checked(*rhs) {
                Some(v) => Ok(Integer(v)),
                None => Err(Error::OverflowError),
            },
            (Integer(lhs), Float(rhs)) => Ok(Float((*lhs as f64) $op rhs)),
            (Float(lhs), Integer(rhs)) => Ok(Float(lhs $op (*rhs as f64))),
            (Float(lhs), Float(rhs)) => Ok(Float(lhs $op rhs)),
            (Null, Integer(_) | Float(_) | Null) | (Integer(_) | Float(_), Null) => Ok(Null),
            (lhs, rhs) => errdata!("cannot {} {} and {}", $verb, lhs, rhs),
        }
    }};
}

impl Field {
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Converts the value to the given column type, as a backend does when a
    /// value is loaded into a typed column. Integers widen to floats, and
    /// integral floats narrow to integers; anything else must match exactly.
    pub fn coerce(self, data_type: DataType) -> Result<Field> {
        Ok(match (self, data_type) {
            (Field::Null, _) => Field::Null,
            (Field::Boolean(b), DataType::Bool) => Field::Boolean(b),
            (Field::Integer(i), DataType::Int) => Field::Integer(i),
            (Field::Integer(i), DataType::Float) => Field::Float(i as f64),
            (Field::Float(f), DataType::Float) => Field::Float(f),
            (Field::Float(f), DataType::Int) if f.fract() == 0.0 && f.is_finite() => {
                Field::Integer(f as i64)
            }
            (Field::String(s), DataType::Text) => Field::String(s),
            (value, data_type) => return errdata!("cannot store {value} in a {data_type} column"),
        })
    }

    /// Compares two values with SQL semantics: comparisons involving NULL are
    /// unknown (`None`), and only values of compatible types can be compared.
    pub fn compare(&self, other: &Field) -> Result<Option<Ordering>> {
        use Field::*;
        match (self, other) {
            (Null, _) | (_, Null) => Ok(None),
            (Integer(i), Float(f)) => Ok((*i as f64).partial_cmp(f)),
            (Float(f), Integer(i)) => Ok(f.partial_cmp(&(*i as f64))),
            (Boolean(_), Boolean(_))
            | (Integer(_), Integer(_))
            | (Float(_), Float(_))
            | (String(_), String(_)) => Ok(Some(self.cmp(other))),
            (lhs, rhs) => errinput!("cannot compare {lhs} and {rhs}"),
        }
    }

    pub fn checked_add(&self, other: &Field) -> Result<Field> {
        arithmetic!(self, other, checked_add, +, "add")
    }

    pub fn checked_sub(&self, other: &Field) -> Result<Field> {
        arithmetic!(self, other, checked_sub, -, "subtract")
    }

    pub fn checked_mul(&self, other: &Field) -> Result<Field> {
        arithmetic!(self, other, checked_mul, *, "multiply")
    }

    pub fn checked_div(&self, other: &Field) -> Result<Field> {
        if matches!(other, Field::Integer(0)) || matches!(other, Field::Float(f) if *f == 0.0) {
            return errinput!("division by zero");
        }
        arithmetic!(self, other, checked_div, /, "divide")
    }

    pub fn checked_mod(&self, other: &Field) -> Result<Field> {
        if matches!(other, Field::Integer(0)) {
            return errinput!("division by zero");
        }
        arithmetic!(self, other, checked_rem, %, "mod")
    }

    /// Returns the value as an owned string for plain-text output, without
    /// the quoting Display applies.
    pub fn to_plain_string(&self) -> String {
        match self {
            Field::String(s) => s.clone(),
            Field::Boolean(b) => b.to_string(),
            Field::Float(f) => f.to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_addition() {
        let add = |lhs: Field, rhs: Field| lhs.checked_add(&rhs);
        assert_eq!(add(Field::Integer(10), Field::Integer(7)), Ok(Field::Integer(17)));
        assert_eq!(add(Field::Float(10.0), Field::Integer(7)), Ok(Field::Float(17.0)));
        assert_eq!(add(Field::Null, Field::Integer(7)), Ok(Field::Null));
        assert_eq!(
            add(Field::Integer(i64::MAX), Field::Integer(1)),
            Err(Error::OverflowError)
        );
        assert!(matches!(
            add(Field::from("a"), Field::Integer(1)),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    pub fn test_division_and_modulo() {
        assert_eq!(
            Field::Integer(7).checked_div(&Field::Integer(2)),
            Ok(Field::Integer(3))
        );
        assert_eq!(
            Field::Integer(1234).checked_mod(&Field::Integer(1000)),
            Ok(Field::Integer(234))
        );
        assert_eq!(
            Field::Float(1.0).checked_sub(&Field::Integer(3)),
            Ok(Field::Float(-2.0))
        );
        assert_eq!(
            Field::Integer(i64::MIN).checked_mul(&Field::Integer(-1)),
            Err(Error::OverflowError)
        );
        assert!(Field::Integer(1).checked_div(&Field::Integer(0)).is_err());
        assert!(Field::Integer(1).checked_mod(&Field::Integer(0)).is_err());
    }

    #[test]
    pub fn test_comparison() {
        assert!(Field::Integer(10) > Field::Integer(7));
        assert!(Field::Float(10.0) > Field::Float(7.0));
        assert!(Field::Null < Field::Integer(i64::MIN));
        assert_eq!(
            Field::Integer(2).compare(&Field::Float(2.5)).unwrap(),
            Some(Ordering::Less)
        );
        assert_eq!(Field::Null.compare(&Field::Integer(1)).unwrap(), None);
        assert!(Field::from("a").compare(&Field::Integer(1)).is_err());
    }

    #[test]
    pub fn test_nan_equality() {
        assert_eq!(Field::Float(f64::NAN), Field::Float(f64::NAN));
        assert!(Field::Float(f64::NAN) > Field::Float(f64::INFINITY));
    }

    #[test]
    pub fn test_coerce() {
        assert_eq!(
            Field::Integer(3).coerce(DataType::Float).unwrap(),
            Field::Float(3.0)
        );
        assert_eq!(
            Field::Float(3.0).coerce(DataType::Int).unwrap(),
            Field::Integer(3)
        );
        assert_eq!(Field::Null.coerce(DataType::Text).unwrap(), Field::Null);
        assert!(Field::Float(3.5).coerce(DataType::Int).is_err());
        assert!(Field::from("x").coerce(DataType::Int).is_err());
    }

    #[test]
    pub fn test_display() {
        assert_eq!(Field::from("it's").to_string(), "'it\\'s'");
        assert_eq!(Field::from("it's").to_plain_string(), "it's");
        assert_eq!(Field::Boolean(true).to_string(), "TRUE");
        assert_eq!(Field::from(None::<i64>), Field::Null);
    }
}
