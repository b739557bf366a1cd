//! Metadata queries and their rendering into table conditions.
//!
//! A [`MetaQuery`] names, for some or all metadata columns, the value (or
//! set of values) a row must hold. It renders to the condition string
//! understood by the remote table service:
//!
//! ```
//! use fstore_table::condition::{MetaMatch, render_conditions};
//! use fstore_types::Value;
//!
//! let cond = render_conditions([
//!     ("ImageID", &MetaMatch::from(12i64)),
//!     ("RoiID", &MetaMatch::AnyOf(vec![Value::Long(1), Value::Null, Value::Long(2)])),
//!     ("Well", &MetaMatch::from(Value::Null)),
//! ]);
//! assert_eq!(cond, "(ImageID==12) & ((RoiID==1) | (RoiID==2))");
//! ```

#![forbid(unsafe_code)]

use fstore_types::Value;

/// Constraint on one metadata column.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaMatch {
    /// Equal to the value. [`Value::Null`] matches anything.
    Eq(Value),
    /// Equal to any non-null value of the list. A list of nulls matches
    /// anything.
    AnyOf(Vec<Value>),
}

impl MetaMatch {
    /// Whether this constraint filters nothing.
    pub fn is_wildcard(&self) -> bool {
        match self {
            MetaMatch::Eq(v) => v.is_null(),
            MetaMatch::AnyOf(values) => values.iter().all(Value::is_null),
        }
    }
}

impl From<Value> for MetaMatch {
    fn from(value: Value) -> Self {
        match value {
            Value::List(values) => MetaMatch::AnyOf(values),
            other => MetaMatch::Eq(other),
        }
    }
}

impl From<Vec<Value>> for MetaMatch {
    fn from(values: Vec<Value>) -> Self {
        MetaMatch::AnyOf(values)
    }
}

macro_rules! impl_from_for_meta_match {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for MetaMatch {
                fn from(v: $source) -> Self {
                    MetaMatch::Eq(Value::from(v))
                }
            }
        )+
    };
}

impl_from_for_meta_match!(i8, i16, i32, i64, u8, u16, u32, f32, f64, bool, String, &str);

/// Metadata lookup, either by column name or by metadata column position.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaQuery {
    Named(Vec<(String, MetaMatch)>),
    /// One entry per metadata column, in column order.
    Positional(Vec<MetaMatch>),
}

impl MetaQuery {
    pub fn named<I, K, M>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, M)>,
        K: Into<String>,
        M: Into<MetaMatch>,
    {
        MetaQuery::Named(
            pairs
                .into_iter()
                .map(|(k, m)| (k.into(), m.into()))
                .collect(),
        )
    }

    pub fn positional<I, M>(matches: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MetaMatch>,
    {
        MetaQuery::Positional(matches.into_iter().map(Into::into).collect())
    }
}

/// Render one literal. Strings are double quoted with `"` and `\` escaped.
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Int(v) => v.to_string(),
        Value::Long(v) => v.to_string(),
        // Widened to the f64 the backend compares against.
        Value::Float(v) => format!("{:?}", f64::from(*v)),
        Value::Double(v) => format!("{v:?}"),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push('"');
            for c in s.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
            out
        }
        Value::List(items) => format!(
            "[{}]",
            items
                .iter()
                .map(render_literal)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Render a column reference. Names that are not plain identifiers, such as
/// `Image ID` or `Area (px)`, are wrapped in backticks.
pub fn render_column(name: &str) -> String {
    let mut chars = name.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name != "True"
        && name != "False";
    if plain {
        name.to_string()
    } else {
        format!("`{name}`")
    }
}

/// Render the clause for one column, or `None` for a wildcard.
pub fn render_match(column: &str, m: &MetaMatch) -> Option<String> {
    let column = render_column(column);
    match m {
        MetaMatch::Eq(v) if v.is_null() => None,
        MetaMatch::Eq(v) => Some(format!("({column}=={})", render_literal(v))),
        MetaMatch::AnyOf(values) => {
            let alternatives: Vec<String> = values
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| format!("({column}=={})", render_literal(v)))
                .collect();
            if alternatives.is_empty() {
                None
            } else {
                Some(format!("({})", alternatives.join(" | ")))
            }
        }
    }
}

/// Join the clauses of every non-wildcard constraint with ` & `. An empty
/// string selects every row.
pub fn render_conditions<'a, I>(constraints: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a MetaMatch)>,
{
    constraints
        .into_iter()
        .filter_map(|(column, m)| render_match(column, m))
        .collect::<Vec<_>>()
        .join(" & ")
}
