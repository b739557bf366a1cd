//! Conversions between [`Value`] cells and Arrow arrays.
//!
//! Column batches exchanged with the remote table service are Arrow
//! [`RecordBatch`](arrow::record_batch::RecordBatch)es. These helpers build one
//! column array from a slice of values (coercing each value into the column
//! kind) and read a single cell back out as a [`Value`].

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, FixedSizeListArray, Float32Array, Float64Array,
    Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, Field, Float32Type, Float64Type, Int32Type, Int64Type};
use fstore_result::{Error, Result};

use crate::column::ColumnKind;
use crate::literal::Value;

/// Coerce `value` into the scalar representation used by `kind`.
///
/// Nulls pass through untouched. Array kinds expect a [`Value::List`] and
/// coerce each element to the element kind.
pub fn coerce(kind: ColumnKind, value: &Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let mismatch = || {
        Error::Usage(format!(
            "Cannot store {} value {} in {} column",
            value.type_name(),
            value,
            kind
        ))
    };
    let coerced = match kind {
        ColumnKind::Int => {
            let v = value.as_i64().ok_or_else(mismatch)?;
            Value::Int(i32::try_from(v).map_err(|_| mismatch())?)
        }
        ColumnKind::Long => Value::Long(value.as_i64().ok_or_else(mismatch)?),
        ColumnKind::Float => Value::Float(value.as_f64().ok_or_else(mismatch)? as f32),
        ColumnKind::Double => Value::Double(value.as_f64().ok_or_else(mismatch)?),
        ColumnKind::Bool => match value {
            Value::Bool(b) => Value::Bool(*b),
            _ => return Err(mismatch()),
        },
        ColumnKind::String => match value {
            Value::String(s) => Value::String(s.clone()),
            _ => return Err(mismatch()),
        },
        array_kind => match value {
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Null => Err(mismatch()),
                        item => coerce(array_kind.element(), item),
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            _ => return Err(mismatch()),
        },
    };
    Ok(coerced)
}

/// Build one column array from `values`.
///
/// `width` is the declared width: maximum string length for `String`
/// columns and element count for array columns.
pub fn build_array(kind: ColumnKind, width: Option<usize>, values: &[Value]) -> Result<ArrayRef> {
    let coerced = values
        .iter()
        .map(|v| coerce(kind, v))
        .collect::<Result<Vec<_>>>()?;

    let array: ArrayRef = match kind {
        ColumnKind::Int => Arc::new(Int32Array::from_iter(coerced.iter().map(|v| match v {
            Value::Int(x) => Some(*x),
            _ => None,
        }))),
        ColumnKind::Long => Arc::new(Int64Array::from_iter(coerced.iter().map(|v| match v {
            Value::Long(x) => Some(*x),
            _ => None,
        }))),
        ColumnKind::Float => Arc::new(Float32Array::from_iter(coerced.iter().map(|v| match v {
            Value::Float(x) => Some(*x),
            _ => None,
        }))),
        ColumnKind::Double => Arc::new(Float64Array::from_iter(coerced.iter().map(|v| match v {
            Value::Double(x) => Some(*x),
            _ => None,
        }))),
        ColumnKind::Bool => Arc::new(BooleanArray::from_iter(coerced.iter().map(|v| match v {
            Value::Bool(x) => Some(*x),
            _ => None,
        }))),
        ColumnKind::String => {
            if let Some(limit) = width {
                if let Some(long) = coerced
                    .iter()
                    .filter_map(Value::as_str)
                    .find(|s| s.chars().count() > limit)
                {
                    return Err(Error::Usage(format!(
                        "String value of length {} exceeds column width {}",
                        long.chars().count(),
                        limit
                    )));
                }
            }
            Arc::new(StringArray::from_iter(
                coerced.iter().map(|v| v.as_str().map(str::to_string)),
            ))
        }
        array_kind => build_list_array(array_kind, width, &coerced)?,
    };
    Ok(array)
}

fn build_list_array(kind: ColumnKind, width: Option<usize>, cells: &[Value]) -> Result<ArrayRef> {
    let width = match width {
        Some(w) if w > 0 => w,
        _ => {
            return Err(Error::Usage(format!(
                "{kind} column requires a positive width"
            )));
        }
    };
    let mut flat = Vec::with_capacity(cells.len() * width);
    for cell in cells {
        match cell {
            Value::List(items) if items.len() == width => flat.extend(items.iter().cloned()),
            Value::List(items) => {
                return Err(Error::Usage(format!(
                    "Expected {} array elements, received {}",
                    width,
                    items.len()
                )));
            }
            _ => {
                return Err(Error::Usage(format!(
                    "{kind} column cells must be non-null lists"
                )));
            }
        }
    }
    let element = kind.element();
    let child = build_array(element, None, &flat)?;
    let item = Arc::new(Field::new("item", element.data_type(None)?, false));
    let size = i32::try_from(width)
        .map_err(|_| Error::Usage(format!("array width {width} is too large")))?;
    Ok(Arc::new(FixedSizeListArray::try_new(item, size, child, None)?))
}

/// Read a single cell of `array` as a [`Value`].
pub fn array_value(array: &dyn Array, row: usize) -> Result<Value> {
    if row >= array.len() {
        return Err(Error::Internal(format!(
            "row {} out of bounds for array of length {}",
            row,
            array.len()
        )));
    }
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match array.data_type() {
        DataType::Int32 => Value::Int(array.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => Value::Long(array.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => Value::Float(array.as_primitive::<Float32Type>().value(row)),
        DataType::Float64 => Value::Double(array.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => Value::Bool(array.as_boolean().value(row)),
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        DataType::FixedSizeList(_, _) => {
            let cell = array.as_fixed_size_list().value(row);
            Value::List(
                (0..cell.len())
                    .map(|i| array_value(cell.as_ref(), i))
                    .collect::<Result<Vec<_>>>()?,
            )
        }
        other => {
            return Err(Error::Internal(format!(
                "unsupported column data type {other:?}"
            )));
        }
    };
    Ok(value)
}

/// Read every cell of `array`.
pub fn array_values(array: &dyn Array) -> Result<Vec<Value>> {
    (0..array.len()).map(|row| array_value(array, row)).collect()
}
