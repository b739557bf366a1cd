//! Scalar values exchanged with feature tables.
//!
//! [`Value`] carries metadata cells, query parameters and raw row cells before
//! they are coerced into the concrete kind of a column. [`Value::Null`] doubles
//! as the "don't care" placeholder in metadata queries.

use std::fmt;

/// A loosely typed cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value, or "don't care" when used in a query.
    #[default]
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
    /// Contents of a fixed-width array cell.
    List(Vec<Value>),
}

macro_rules! impl_from_for_value {
    ($variant:ident, $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for_value!(Int, i8, i16, i32, u8, u16);
impl_from_for_value!(Long, i64, u32);
impl_from_for_value!(Float, f32);
impl_from_for_value!(Double, f64);
impl_from_for_value!(Bool, bool);
impl_from_for_value!(String, String);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(f64::from(*v)),
            Value::Long(v) => Some(*v as f64),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Integral view of the value. Floats only convert when they carry no
    /// fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Double(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Double(v) => write!(f, "{v:?}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_pick_the_expected_variant() {
        assert_eq!(Value::from(3i32), Value::Int(3));
        assert_eq!(Value::from(-1i64), Value::Long(-1));
        assert_eq!(Value::from(2.5f64), Value::Double(2.5));
        assert_eq!(Value::from("abc"), Value::String("abc".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(
            Value::from(vec![1.0f64, 2.0]),
            Value::List(vec![Value::Double(1.0), Value::Double(2.0)])
        );
    }

    #[test]
    fn numeric_views() {
        assert_eq!(Value::Long(7).as_f64(), Some(7.0));
        assert_eq!(Value::Double(4.0).as_i64(), Some(4));
        assert_eq!(Value::Double(4.5).as_i64(), None);
        assert_eq!(Value::String("4".into()).as_f64(), None);
    }
}
