use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use arrow::array::ArrayRef;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use fstore_result::{Error, Result};
use fstore_types::codec::{array_value, build_array};
use fstore_types::{ColumnHeader, FileId, RowOffset, Value};
use rustc_hash::FxHashMap;
use tracing::trace;

use super::condition::Condition;
use super::session::MemState;
use super::stats::CallStats;
use crate::objects::FileRef;
use crate::traits::RemoteTable;

/// Rows of one in-memory table, stored row-major.
#[derive(Debug, Default)]
pub(crate) struct TableData {
    pub(crate) headers: Vec<ColumnHeader>,
    pub(crate) rows: Vec<Vec<Value>>,
}

impl TableData {
    fn schema(&self) -> Result<Arc<Schema>> {
        let fields = self
            .headers
            .iter()
            .map(ColumnHeader::field)
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(Schema::new(fields)))
    }

    fn decode_batch(&self, batch: &RecordBatch) -> Result<Vec<Vec<Value>>> {
        if batch.num_columns() != self.headers.len() {
            return Err(Error::Backend(format!(
                "batch has {} columns, table has {}",
                batch.num_columns(),
                self.headers.len()
            )));
        }
        for (column, header) in batch.columns().iter().zip(&self.headers) {
            let expected = header.kind.data_type(header.width)?;
            if column.data_type() != &expected {
                return Err(Error::Backend(format!(
                    "column '{}' expects {:?}, got {:?}",
                    header.name,
                    expected,
                    column.data_type()
                )));
            }
        }
        (0..batch.num_rows())
            .map(|row| {
                batch
                    .columns()
                    .iter()
                    .map(|column| array_value(column.as_ref(), row))
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    fn encode_rows(&self, rows: &[&Vec<Value>]) -> Result<RecordBatch> {
        let schema = self.schema()?;
        let columns = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cells: Vec<Value> = rows.iter().map(|row| row[i].clone()).collect();
                build_array(header.kind, header.width, &cells)
            })
            .collect::<Result<Vec<ArrayRef>>>()?;
        Ok(RecordBatch::try_new(schema, columns)?)
    }

    fn require_initialized(&self) -> Result<()> {
        if self.headers.is_empty() {
            return Err(Error::Backend("table is not initialized".into()));
        }
        Ok(())
    }
}

/// Handle to one table held by a [`MemSession`](super::MemSession).
pub struct MemTable {
    file_id: FileId,
    state: Arc<MemState>,
    data: Arc<RwLock<TableData>>,
    closed: AtomicBool,
}

impl MemTable {
    pub(crate) fn new(file_id: FileId, state: Arc<MemState>, data: Arc<RwLock<TableData>>) -> Self {
        Self {
            file_id,
            state,
            data,
            closed: AtomicBool::new(false),
        }
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Backend(format!(
                "table handle for file {} is closed",
                self.file_id
            )));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, TableData>> {
        self.ensure_open()?;
        self.data
            .read()
            .map_err(|_| Error::Internal("MemTable data read lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, TableData>> {
        self.ensure_open()?;
        self.data
            .write()
            .map_err(|_| Error::Internal("MemTable data write lock poisoned".into()))
    }
}

impl RemoteTable for MemTable {
    fn file(&self) -> Result<FileRef> {
        self.ensure_open()?;
        self.state.file(self.file_id)
    }

    fn initialize(&self, columns: &[ColumnHeader]) -> Result<()> {
        CallStats::bump(&self.state.stats.initialize);
        let mut data = self.write()?;
        if !data.headers.is_empty() {
            return Err(Error::Backend("table is already initialized".into()));
        }
        if self.state.fail_initialize.load(Ordering::Acquire) {
            return Err(Error::Backend("table service rejected initialize".into()));
        }
        if columns.is_empty() {
            return Err(Error::Backend("cannot initialize a table without columns".into()));
        }
        for header in columns {
            header.field()?;
        }
        data.headers = columns.to_vec();
        Ok(())
    }

    fn headers(&self) -> Result<Vec<ColumnHeader>> {
        Ok(self.read()?.headers.clone())
    }

    fn add_data(&self, batch: &RecordBatch) -> Result<()> {
        CallStats::bump(&self.state.stats.add_data);
        let mut data = self.write()?;
        data.require_initialized()?;
        let rows = data.decode_batch(batch)?;
        trace!(file = %self.file_id, rows = rows.len(), "mem table append");
        data.rows.extend(rows);
        Ok(())
    }

    fn update(&self, offsets: &[RowOffset], batch: &RecordBatch) -> Result<()> {
        CallStats::bump(&self.state.stats.update);
        let mut data = self.write()?;
        data.require_initialized()?;
        if offsets.len() != batch.num_rows() {
            return Err(Error::Backend(format!(
                "update of {} offsets received {} rows",
                offsets.len(),
                batch.num_rows()
            )));
        }
        let rows = data.decode_batch(batch)?;
        let len = data.rows.len();
        for (&offset, row) in offsets.iter().zip(rows) {
            let slot = usize::try_from(offset)
                .ok()
                .filter(|&i| i < len)
                .ok_or_else(|| Error::Backend(format!("row offset {offset} out of range")))?;
            data.rows[slot] = row;
        }
        Ok(())
    }

    fn number_of_rows(&self) -> Result<u64> {
        CallStats::bump(&self.state.stats.number_of_rows);
        Ok(self.read()?.rows.len() as u64)
    }

    fn where_list(
        &self,
        condition: &str,
        start: u64,
        stop: u64,
        limit: u64,
    ) -> Result<Vec<RowOffset>> {
        CallStats::bump(&self.state.stats.where_list);
        let data = self.read()?;
        data.require_initialized()?;
        let columns: FxHashMap<String, usize> = data
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.name.clone(), i))
            .collect();
        let stop = stop.min(data.rows.len() as u64);
        let mut hits = Vec::new();
        if condition.trim().is_empty() {
            hits.extend(start..stop.max(start));
        } else {
            let cond = Condition::parse(condition)?;
            for offset in start..stop {
                if cond.evaluate(&columns, &data.rows[offset as usize])? {
                    hits.push(offset);
                }
            }
        }
        if limit > 0 {
            hits.truncate(limit as usize);
        }
        trace!(file = %self.file_id, condition, hits = hits.len(), "mem table where_list");
        Ok(hits)
    }

    fn read_coordinates(&self, offsets: &[RowOffset]) -> Result<RecordBatch> {
        CallStats::bump(&self.state.stats.read_coordinates);
        let data = self.read()?;
        data.require_initialized()?;
        let rows = offsets
            .iter()
            .map(|&offset| {
                usize::try_from(offset)
                    .ok()
                    .and_then(|i| data.rows.get(i))
                    .ok_or_else(|| Error::Backend(format!("row offset {offset} out of range")))
            })
            .collect::<Result<Vec<_>>>()?;
        data.encode_rows(&rows)
    }

    fn close(&self) -> Result<()> {
        CallStats::bump(&self.state.stats.close);
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
