use fstore_types::Value;

/// Column-major buffer of rows awaiting a flush.
#[derive(Debug, Default)]
pub(crate) struct PendingRows {
    columns: Vec<Vec<Value>>,
    rows: usize,
}

impl PendingRows {
    pub(crate) fn push(&mut self, cells: Vec<Value>) {
        if self.columns.is_empty() {
            self.columns = vec![Vec::new(); cells.len()];
        }
        for (column, cell) in self.columns.iter_mut().zip(cells) {
            column.push(cell);
        }
        self.rows += 1;
    }

    pub(crate) fn len(&self) -> usize {
        self.rows
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub(crate) fn columns(&self) -> &[Vec<Value>] {
        &self.columns
    }

    pub(crate) fn clear(&mut self) {
        self.columns.clear();
        self.rows = 0;
    }
}
