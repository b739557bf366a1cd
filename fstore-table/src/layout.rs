//! Column layout of an open feature table.
//!
//! The layout classifies every column as metadata, a single feature or a
//! packed feature vector, and converts between caller rows and the Arrow
//! batches exchanged with the table service.

#![forbid(unsafe_code)]

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use fstore_result::{Error, Result};
use fstore_types::codec::{array_value, build_array, coerce};
use fstore_types::{ColumnDescriptor, ColumnHeader, ColumnRole, FeatureRow, Value};
use rustc_hash::FxHashMap;

use crate::constants::{CELL_BYTES, MAX_TRANSFER_BYTES};

#[derive(Debug, Clone)]
pub struct TableLayout {
    columns: Vec<ColumnDescriptor>,
    meta_cols: Vec<usize>,
    single_ft_cols: Vec<usize>,
    multi_ft_cols: Vec<usize>,
    /// Every feature column, in column order.
    feature_cols: Vec<usize>,
    metadata_names: Arc<[String]>,
    feature_names: Arc<[String]>,
    lookup: FxHashMap<String, usize>,
    schema: SchemaRef,
}

impl TableLayout {
    /// Classify the headers read back from a remote table.
    pub fn from_headers(headers: &[ColumnHeader]) -> Result<Self> {
        let columns = headers
            .iter()
            .map(ColumnDescriptor::from_header)
            .collect::<Result<Vec<_>>>()?;
        Self::from_descriptors(columns)
    }

    pub fn from_descriptors(columns: Vec<ColumnDescriptor>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::Backend("table has no columns".into()));
        }
        let mut meta_cols = Vec::new();
        let mut single_ft_cols = Vec::new();
        let mut multi_ft_cols = Vec::new();
        let mut feature_cols = Vec::new();
        let mut metadata_names = Vec::new();
        let mut feature_names = Vec::new();
        let mut lookup = FxHashMap::default();
        let mut fields = Vec::with_capacity(columns.len());

        for (i, col) in columns.iter().enumerate() {
            match &col.role {
                ColumnRole::Metadata => {
                    meta_cols.push(i);
                    metadata_names.push(col.name.clone());
                }
                ColumnRole::SingleFeature => {
                    single_ft_cols.push(i);
                    feature_cols.push(i);
                    feature_names.push(col.name.clone());
                }
                ColumnRole::MultiFeature { names } => {
                    multi_ft_cols.push(i);
                    feature_cols.push(i);
                    feature_names.extend(names.iter().cloned());
                }
            }
            lookup.insert(col.name.clone(), i);
            fields.push(col.field()?);
        }

        Ok(Self {
            columns,
            meta_cols,
            single_ft_cols,
            multi_ft_cols,
            feature_cols,
            metadata_names: metadata_names.into(),
            feature_names: feature_names.into(),
            lookup,
            schema: Arc::new(Schema::new(fields)),
        })
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn meta_cols(&self) -> &[usize] {
        &self.meta_cols
    }

    pub fn single_ft_cols(&self) -> &[usize] {
        &self.single_ft_cols
    }

    pub fn multi_ft_cols(&self) -> &[usize] {
        &self.multi_ft_cols
    }

    pub fn metadata_names(&self) -> &Arc<[String]> {
        &self.metadata_names
    }

    pub fn feature_names(&self) -> &Arc<[String]> {
        &self.feature_names
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Column by its stored name. Packed columns are stored under their
    /// comma-joined feature names.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.lookup.get(name).map(|&i| &self.columns[i])
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Number of rows fetched per `read_coordinates` call. Each cell is
    /// costed as one double per array element.
    pub fn chunk_size(&self) -> usize {
        let row_bytes: usize = self
            .columns
            .iter()
            .map(ColumnDescriptor::row_cost)
            .sum::<usize>()
            * CELL_BYTES;
        (MAX_TRANSFER_BYTES / row_bytes.max(1)).max(1)
    }

    /// Validate and coerce one caller row into one cell per column.
    pub fn encode_row(&self, meta: &[Value], features: &[f64]) -> Result<Vec<Value>> {
        if meta.len() != self.meta_cols.len() {
            return Err(Error::Usage(format!(
                "Expected {} metadata values, received {}",
                self.meta_cols.len(),
                meta.len()
            )));
        }
        if features.len() != self.feature_count() {
            return Err(Error::Usage(format!(
                "Expected {} feature values, received {}",
                self.feature_count(),
                features.len()
            )));
        }

        let mut cells = vec![Value::Null; self.columns.len()];
        for (&col, value) in self.meta_cols.iter().zip(meta) {
            let desc = &self.columns[col];
            let cell = coerce(desc.kind, value)?;
            if let (Some(limit), Some(s)) = (desc.width, cell.as_str()) {
                if s.chars().count() > limit {
                    return Err(Error::Usage(format!(
                        "Value for '{}' exceeds column width {}",
                        desc.name, limit
                    )));
                }
            }
            cells[col] = cell;
        }

        let mut remaining = features;
        for &col in &self.feature_cols {
            let desc = &self.columns[col];
            let (taken, rest) = remaining.split_at(desc.feature_count());
            remaining = rest;
            let raw = match desc.role {
                ColumnRole::MultiFeature { .. } => {
                    Value::List(taken.iter().copied().map(Value::Double).collect())
                }
                _ => Value::Double(taken[0]),
            };
            cells[col] = coerce(desc.kind, &raw)?;
        }
        Ok(cells)
    }

    /// Build a batch from column-major cells.
    pub fn encode_columns(&self, cells: &[Vec<Value>]) -> Result<RecordBatch> {
        if cells.len() != self.columns.len() {
            return Err(Error::Internal(format!(
                "expected {} columns, got {}",
                self.columns.len(),
                cells.len()
            )));
        }
        let arrays = self
            .columns
            .iter()
            .zip(cells)
            .map(|(desc, values)| build_array(desc.kind, desc.width, values))
            .collect::<Result<Vec<ArrayRef>>>()?;
        Ok(RecordBatch::try_new(self.schema(), arrays)?)
    }

    /// Build a one-row batch.
    pub fn encode_single(&self, row: Vec<Value>) -> Result<RecordBatch> {
        let cells: Vec<Vec<Value>> = row.into_iter().map(|cell| vec![cell]).collect();
        self.encode_columns(&cells)
    }

    /// Raw rows of a batch: one value per column, arrays as [`Value::List`].
    pub fn decode_rows(&self, batch: &RecordBatch) -> Result<Vec<Vec<Value>>> {
        if batch.num_columns() != self.columns.len() {
            return Err(Error::Internal(format!(
                "table returned {} columns, layout has {}",
                batch.num_columns(),
                self.columns.len()
            )));
        }
        (0..batch.num_rows())
            .map(|row| {
                batch
                    .columns()
                    .iter()
                    .map(|array| array_value(array.as_ref(), row))
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    /// Split a raw row into a [`FeatureRow`]. Null feature cells decode as
    /// NaN.
    pub fn feature_row(&self, raw: &[Value]) -> Result<FeatureRow> {
        if raw.len() != self.columns.len() {
            return Err(Error::Internal(format!(
                "row has {} cells, layout has {} columns",
                raw.len(),
                self.columns.len()
            )));
        }
        let info: Vec<Value> = self.meta_cols.iter().map(|&i| raw[i].clone()).collect();
        let mut values = Vec::with_capacity(self.feature_count());
        for &col in &self.feature_cols {
            let expected = self.columns[col].feature_count();
            match &raw[col] {
                Value::List(items) if items.len() == expected => {
                    values.extend(items.iter().map(|v| v.as_f64().unwrap_or(f64::NAN)));
                }
                Value::Null => values.extend(std::iter::repeat_n(f64::NAN, expected)),
                scalar if expected == 1 => values.push(scalar.as_f64().unwrap_or(f64::NAN)),
                other => {
                    return Err(Error::Internal(format!(
                        "column '{}' returned {} for {} features",
                        self.columns[col].name,
                        other.type_name(),
                        expected
                    )));
                }
            }
        }
        FeatureRow::with_info(
            Some(Arc::clone(&self.feature_names)),
            Some(values),
            Some(Arc::clone(&self.metadata_names)),
            Some(info),
        )
    }
}
