//! Structured view of one stored feature row.
//!
//! A [`FeatureRow`] pairs an ordered list of feature names/values with an
//! ordered list of metadata ("info") names/values. Names are shared between
//! the rows decoded from one table, so they are held as `Arc<[String]>`.

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use fstore_result::{Error, Result};
use rustc_hash::FxHashMap;

use crate::literal::Value;

type NameMap = FxHashMap<String, usize>;

#[derive(Clone, Default)]
pub struct FeatureRow {
    names: Option<Arc<[String]>>,
    values: Option<Vec<f64>>,
    info_names: Option<Arc<[String]>>,
    info_values: Option<Vec<Value>>,
    name_map: OnceCell<NameMap>,
    info_name_map: OnceCell<NameMap>,
}

/// Location of a name inside a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSlot {
    Feature(usize),
    Info(usize),
}

impl FeatureRow {
    /// Create a row from feature names and/or values.
    ///
    /// At least one of the two must be provided, and when both are their
    /// lengths must agree.
    pub fn new(names: Option<Vec<String>>, values: Option<Vec<f64>>) -> Result<Self> {
        Self::with_info(names.map(Arc::from), values, None, None)
    }

    /// Create a row with both feature and metadata parts.
    pub fn with_info(
        names: Option<Arc<[String]>>,
        values: Option<Vec<f64>>,
        info_names: Option<Arc<[String]>>,
        info_values: Option<Vec<Value>>,
    ) -> Result<Self> {
        let has_names = names.as_ref().is_some_and(|n| !n.is_empty());
        let has_values = values.as_ref().is_some_and(|v| !v.is_empty());
        if !has_names && !has_values {
            return Err(Error::RowEncoding(
                "At least one of names or values must be provided".into(),
            ));
        }
        let mut row = FeatureRow {
            names,
            info_names,
            ..Default::default()
        };
        if let Some(values) = values {
            row.set_values(values)?;
        }
        if let Some(info_values) = info_values {
            row.set_info_values(info_values)?;
        }
        Ok(row)
    }

    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }

    pub fn info_names(&self) -> Option<&[String]> {
        self.info_names.as_deref()
    }

    pub fn info_values(&self) -> Option<&[Value]> {
        self.info_values.as_deref()
    }

    /// Replace all feature values. The count must match the declared names,
    /// or the current values when the row has no names.
    pub fn set_values(&mut self, values: Vec<f64>) -> Result<()> {
        let expected = match (&self.names, &self.values) {
            (Some(names), _) => names.len(),
            (None, Some(current)) => current.len(),
            (None, None) => values.len(),
        };
        if values.len() != expected {
            return Err(Error::RowEncoding(format!(
                "Expected {} elements, received {}",
                expected,
                values.len()
            )));
        }
        self.values = Some(values);
        Ok(())
    }

    pub fn set_info_values(&mut self, info_values: Vec<Value>) -> Result<()> {
        let expected = self.info_names.as_ref().map_or(info_values.len(), |n| n.len());
        if info_values.len() != expected {
            return Err(Error::RowEncoding(format!(
                "Expected {} elements, received {}",
                expected,
                info_values.len()
            )));
        }
        self.info_values = Some(info_values);
        Ok(())
    }

    /// Resolve a name. Feature names shadow metadata names.
    pub fn slot(&self, name: &str) -> Result<RowSlot> {
        let features = self
            .name_map
            .get_or_init(|| build_name_map(self.names.as_deref()));
        if let Some(&i) = features.get(name) {
            return Ok(RowSlot::Feature(i));
        }
        let info = self
            .info_name_map
            .get_or_init(|| build_name_map(self.info_names.as_deref()));
        info.get(name)
            .map(|&i| RowSlot::Info(i))
            .ok_or_else(|| Error::KeyNotFound(name.to_string()))
    }

    /// Fetch a value by name. Features come back as [`Value::Double`].
    pub fn get(&self, name: &str) -> Result<Value> {
        match self.slot(name)? {
            RowSlot::Feature(i) => self
                .values
                .as_ref()
                .and_then(|v| v.get(i))
                .map(|v| Value::Double(*v))
                .ok_or_else(|| Error::RowEncoding(format!("No value set for '{name}'"))),
            RowSlot::Info(i) => self
                .info_values
                .as_ref()
                .and_then(|v| v.get(i))
                .cloned()
                .ok_or_else(|| Error::RowEncoding(format!("No value set for '{name}'"))),
        }
    }

    /// Overwrite a single named value in place.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match self.slot(name)? {
            RowSlot::Feature(i) => {
                let v = value.as_f64().ok_or_else(|| {
                    Error::RowEncoding(format!(
                        "Feature '{name}' requires a numeric value, got {}",
                        value.type_name()
                    ))
                })?;
                let slot = self
                    .values
                    .as_mut()
                    .and_then(|values| values.get_mut(i))
                    .ok_or_else(|| Error::RowEncoding(format!("No value set for '{name}'")))?;
                *slot = v;
            }
            RowSlot::Info(i) => {
                let slot = self
                    .info_values
                    .as_mut()
                    .and_then(|values| values.get_mut(i))
                    .ok_or_else(|| Error::RowEncoding(format!("No value set for '{name}'")))?;
                *slot = value;
            }
        }
        Ok(())
    }
}

fn build_name_map(names: Option<&[String]>) -> NameMap {
    names
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, n)| (n.clone(), i))
        .collect()
}

impl PartialEq for FeatureRow {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names
            && self.values == other.values
            && self.info_names == other.info_names
            && self.info_values == other.info_values
    }
}

impl fmt::Debug for FeatureRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FeatureRow(names={:?}, values={:?}, infonames={:?}, infovalues={:?})",
            self.names.as_deref(),
            self.values,
            self.info_names.as_deref(),
            self.info_values
        )
    }
}

impl fmt::Display for FeatureRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
