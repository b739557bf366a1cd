//! Column descriptors and their wire representation.
//!
//! A [`ColumnDescriptor`] is the in-process view of one column: its kind, its
//! display name, its declared width and its [`ColumnRole`]. The remote table
//! service has no first-class per-column metadata, so on the wire the role is
//! serialised into the free-text description of a [`ColumnHeader`] as
//! `{"columntype": "..."}`. That JSON never leaves this module.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field};
use fstore_result::{Error, Result};
use serde::{Deserialize, Serialize};

/// Separator used when packing several feature names into one header name.
pub const FEATURE_NAME_SEPARATOR: char = ',';

/// Primitive kind of a remote column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Int,
    Long,
    Float,
    Double,
    Bool,
    String,
    IntArray,
    LongArray,
    FloatArray,
    DoubleArray,
}

impl ColumnKind {
    pub const ALL: [ColumnKind; 10] = [
        ColumnKind::Int,
        ColumnKind::Long,
        ColumnKind::Float,
        ColumnKind::Double,
        ColumnKind::Bool,
        ColumnKind::String,
        ColumnKind::IntArray,
        ColumnKind::LongArray,
        ColumnKind::FloatArray,
        ColumnKind::DoubleArray,
    ];

    #[inline]
    pub fn is_array(self) -> bool {
        matches!(
            self,
            ColumnKind::IntArray
                | ColumnKind::LongArray
                | ColumnKind::FloatArray
                | ColumnKind::DoubleArray
        )
    }

    /// Kinds usable for metadata columns.
    #[inline]
    pub fn is_scalar(self) -> bool {
        !self.is_array()
    }

    #[inline]
    pub fn is_numeric(self) -> bool {
        !matches!(self, ColumnKind::Bool | ColumnKind::String)
    }

    /// Scalar kind of a single element. Scalar kinds map to themselves.
    pub fn element(self) -> ColumnKind {
        match self {
            ColumnKind::IntArray => ColumnKind::Int,
            ColumnKind::LongArray => ColumnKind::Long,
            ColumnKind::FloatArray => ColumnKind::Float,
            ColumnKind::DoubleArray => ColumnKind::Double,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Int => "Int",
            ColumnKind::Long => "Long",
            ColumnKind::Float => "Float",
            ColumnKind::Double => "Double",
            ColumnKind::Bool => "Bool",
            ColumnKind::String => "String",
            ColumnKind::IntArray => "IntArray",
            ColumnKind::LongArray => "LongArray",
            ColumnKind::FloatArray => "FloatArray",
            ColumnKind::DoubleArray => "DoubleArray",
        }
    }

    /// Arrow type used for this kind in column batches.
    pub fn data_type(self, width: Option<usize>) -> Result<DataType> {
        let scalar = |kind: ColumnKind| match kind {
            ColumnKind::Int => DataType::Int32,
            ColumnKind::Long => DataType::Int64,
            ColumnKind::Float => DataType::Float32,
            ColumnKind::Double => DataType::Float64,
            ColumnKind::Bool => DataType::Boolean,
            _ => DataType::Utf8,
        };
        if !self.is_array() {
            return Ok(scalar(self));
        }
        let width = match width {
            Some(w) if w > 0 => w,
            _ => {
                return Err(Error::Usage(format!(
                    "{} column requires a positive width",
                    self.as_str()
                )));
            }
        };
        let width = i32::try_from(width)
            .map_err(|_| Error::Usage(format!("array width {width} is too large")))?;
        let item = Field::new("item", scalar(self.element()), false);
        Ok(DataType::FixedSizeList(Arc::new(item), width))
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ColumnKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::Usage(format!("Invalid column type: {s}")))
    }
}

/// How a column participates in a feature table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRole {
    /// Identifies a row; used for lookups and filters.
    Metadata,
    /// Holds exactly one named feature; the column name is the feature name.
    SingleFeature,
    /// Packed vector of features, one name per array element.
    MultiFeature { names: Vec<String> },
}

impl ColumnRole {
    /// Tag written to the header description.
    pub fn tag(&self) -> &'static str {
        match self {
            ColumnRole::Metadata => "metadata",
            ColumnRole::SingleFeature => "feature",
            ColumnRole::MultiFeature { .. } => "multifeature",
        }
    }

    #[inline]
    pub fn is_feature(&self) -> bool {
        !matches!(self, ColumnRole::Metadata)
    }
}

/// Column header as exchanged with the remote table service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    pub kind: ColumnKind,
    pub name: String,
    pub description: String,
    /// String columns: maximum length. Array columns: element count.
    pub width: Option<usize>,
}

impl ColumnHeader {
    pub fn new(kind: ColumnKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: String::new(),
            width: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    /// Arrow field for this header. Every field is nullable so that absent
    /// metadata can be stored.
    pub fn field(&self) -> Result<Field> {
        Ok(Field::new(
            self.name.clone(),
            self.kind.data_type(self.width)?,
            true,
        ))
    }
}

#[derive(Serialize, Deserialize)]
struct ColumnTag {
    columntype: String,
}

/// Serialise a role tag the way it is stored in header descriptions.
pub fn column_tag_json(tag: &str) -> String {
    // Serialising a struct holding one string cannot fail.
    serde_json::to_string(&ColumnTag {
        columntype: tag.to_string(),
    })
    .unwrap_or_default()
}

/// Parse the role tag from a header description, if one is present.
pub fn parse_column_tag(description: &str) -> Option<String> {
    serde_json::from_str::<ColumnTag>(description)
        .ok()
        .map(|t| t.columntype)
}

/// In-process description of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub kind: ColumnKind,
    pub name: String,
    pub width: Option<usize>,
    pub role: ColumnRole,
}

impl ColumnDescriptor {
    pub fn metadata(kind: ColumnKind, name: impl Into<String>, width: Option<usize>) -> Self {
        Self {
            kind,
            name: name.into(),
            width,
            role: ColumnRole::Metadata,
        }
    }

    pub fn single_feature(kind: ColumnKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            width: None,
            role: ColumnRole::SingleFeature,
        }
    }

    /// A packed array column holding one element per feature name.
    pub fn packed_features(kind: ColumnKind, names: Vec<String>) -> Self {
        let name = names.join(&FEATURE_NAME_SEPARATOR.to_string());
        Self {
            kind,
            name,
            width: Some(names.len()),
            role: ColumnRole::MultiFeature { names },
        }
    }

    /// Number of scalar features this column contributes to a row.
    pub fn feature_count(&self) -> usize {
        match &self.role {
            ColumnRole::Metadata => 0,
            ColumnRole::SingleFeature => 1,
            ColumnRole::MultiFeature { names } => names.len(),
        }
    }

    /// Approximate transfer cost of one cell, in 8-byte units.
    pub fn row_cost(&self) -> usize {
        if self.kind.is_array() {
            self.width.unwrap_or(1).max(1)
        } else {
            1
        }
    }

    pub fn to_header(&self) -> ColumnHeader {
        ColumnHeader {
            kind: self.kind,
            name: self.name.clone(),
            description: column_tag_json(self.role.tag()),
            width: self.width,
        }
    }

    /// Classify a header read back from the remote service.
    ///
    /// Headers without a recognisable tag fall back to the legacy layout:
    /// array columns hold packed features, scalar columns hold metadata.
    pub fn from_header(header: &ColumnHeader) -> Result<Self> {
        let tag = parse_column_tag(&header.description);
        let role = match tag.as_deref() {
            Some("metadata") => ColumnRole::Metadata,
            Some("feature") if !header.kind.is_array() => ColumnRole::SingleFeature,
            Some("feature") | Some("multifeature") => packed_role(header)?,
            _ if header.kind.is_array() => packed_role(header)?,
            _ => ColumnRole::Metadata,
        };
        Ok(Self {
            kind: header.kind,
            name: header.name.clone(),
            width: header.width,
            role,
        })
    }

    pub fn field(&self) -> Result<Field> {
        self.to_header().field()
    }
}

fn packed_role(header: &ColumnHeader) -> Result<ColumnRole> {
    let names: Vec<String> = header
        .name
        .split(FEATURE_NAME_SEPARATOR)
        .map(str::to_string)
        .collect();
    match header.width {
        Some(w) if w == names.len() => Ok(ColumnRole::MultiFeature { names }),
        w => Err(Error::Backend(format!(
            "packed column '{}' declares width {:?} but names {} features",
            header.name,
            w,
            names.len()
        ))),
    }
}
