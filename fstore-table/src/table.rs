//! A feature table backed by one remote table.
//!
//! [`FeatureTable`] owns at most one open remote handle together with the
//! state derived from it: the column layout, the pending write buffer, the
//! memoised edit permission and the read chunk size. Closing the table
//! discards all of it.

#![forbid(unsafe_code)]

use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use fstore_remote::objects::{FILE_ANNOTATION, ORIGINAL_FILE, fields};
use fstore_remote::{
    Criteria, FileRef, ObjectRecord, ObjectRepository, RemoteTable, Session, TableService,
    annotation_link_kind, annotation_link_kinds,
};
use fstore_result::{Error, Result};
use fstore_types::codec::coerce;
use fstore_types::{
    ColumnDescriptor, ColumnKind, FeatureRow, FileId, ObjectId, RowOffset, UserId, Value,
};
use tracing::{debug, error, info, warn};

use crate::condition::{MetaMatch, MetaQuery, render_conditions};
use crate::constants::{MAX_PACKED_NAME_BYTES, TABLE_REPOSITORY_ID};
use crate::layout::TableLayout;
use crate::names::validate_name;
use crate::pending::PendingRows;
use crate::permissions::PermissionGuard;

/// Declaration of one metadata column of a new table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataColumn {
    pub kind: ColumnKind,
    pub name: String,
    /// Maximum length; required for `String` columns.
    pub width: Option<usize>,
}

impl MetadataColumn {
    pub fn new(kind: ColumnKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            width: None,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    fn descriptor(&self) -> Result<ColumnDescriptor> {
        if !self.kind.is_scalar() {
            return Err(Error::Usage(format!(
                "Invalid metadata type: {} ({})",
                self.kind, self.name
            )));
        }
        validate_name("metadata", &self.name)?;
        let width = match self.kind {
            ColumnKind::String => match self.width {
                Some(w) if w > 0 => Some(w),
                _ => {
                    return Err(Error::Usage(format!(
                        "Invalid metadata width for String column {}",
                        self.name
                    )));
                }
            },
            _ => None,
        };
        Ok(ColumnDescriptor::metadata(self.kind, self.name.clone(), width))
    }
}

impl<N: Into<String>> From<(ColumnKind, N)> for MetadataColumn {
    fn from((kind, name): (ColumnKind, N)) -> Self {
        Self::new(kind, name)
    }
}

impl<N: Into<String>> From<(ColumnKind, N, usize)> for MetadataColumn {
    fn from((kind, name, width): (ColumnKind, N, usize)) -> Self {
        Self::new(kind, name).with_width(width)
    }
}

pub struct FeatureTable<S: Session> {
    session: Arc<S>,
    guard: PermissionGuard,
    name: String,
    feature_space: String,
    annotation_space: String,
    table: Option<S::Table>,
    layout: Option<TableLayout>,
    pending: PendingRows,
    editable: Option<bool>,
    chunk_size: Option<usize>,
}

impl<S: Session> FeatureTable<S> {
    /// An unopened table. No remote calls are made.
    pub fn new(
        session: Arc<S>,
        identity: UserId,
        name: impl Into<String>,
        feature_space: impl Into<String>,
        annotation_space: impl Into<String>,
    ) -> Self {
        Self {
            session,
            guard: PermissionGuard::new(identity),
            name: name.into(),
            feature_space: feature_space.into(),
            annotation_space: annotation_space.into(),
            table: None,
            layout: None,
            pending: PendingRows::default(),
            editable: None,
            chunk_size: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn feature_space(&self) -> &str {
        &self.feature_space
    }

    pub fn annotation_space(&self) -> &str {
        &self.annotation_space
    }

    pub fn guard(&self) -> &PermissionGuard {
        &self.guard
    }

    pub fn is_open(&self) -> bool {
        self.table.is_some()
    }

    /// `<feature space>/<name>`
    pub fn table_path(&self) -> String {
        format!("{}/{}", self.feature_space, self.name)
    }

    fn handle(&self) -> Result<&S::Table> {
        self.table
            .as_ref()
            .ok_or_else(|| Error::Usage(format!("Table not open: {}", self.table_path())))
    }

    pub fn layout(&self) -> Result<&TableLayout> {
        self.layout
            .as_ref()
            .ok_or_else(|| Error::Usage(format!("Table not open: {}", self.table_path())))
    }

    pub fn metadata_names(&self) -> Result<&[String]> {
        Ok(&self.layout()?.metadata_names()[..])
    }

    pub fn feature_names(&self) -> Result<&[String]> {
        Ok(&self.layout()?.feature_names()[..])
    }

    pub fn column(&self, name: &str) -> Result<&ColumnDescriptor> {
        self.layout()?
            .column(name)
            .ok_or_else(|| Error::NotFound(format!("Column {name} in {}", self.table_path())))
    }

    /// File object backing the open table.
    pub fn file(&self) -> Result<FileRef> {
        self.handle()?.file()
    }

    /// Open an existing table, or create one when `create` carries the
    /// metadata columns and feature names.
    ///
    /// `file` selects the table by file id instead of by name and feature
    /// space. `owner` restricts the lookup to one owner; creating a table is
    /// only possible for the caller.
    pub fn open_or_create(
        &mut self,
        owner: Option<UserId>,
        create: Option<(&[MetadataColumn], &[String])>,
        file: Option<FileId>,
    ) -> Result<()> {
        if self.is_open() {
            return Err(Error::Usage(format!(
                "Table already open: {}",
                self.table_path()
            )));
        }
        match create {
            Some((meta, feature_names)) => {
                let owner = owner.unwrap_or(self.guard.user());
                if !self.find_table_files(file, Some(owner))?.is_empty() {
                    return Err(Error::TooManyMatches(format!(
                        "Table file already exists: {}",
                        self.table_path()
                    )));
                }
                if owner != self.guard.user() {
                    return Err(Error::Usage(
                        "Unable to create table for a different user".into(),
                    ));
                }
                self.create(meta, feature_names)
            }
            None => self.open(file, owner),
        }
    }

    fn find_table_files(
        &self,
        file: Option<FileId>,
        owner: Option<UserId>,
    ) -> Result<Vec<FileRef>> {
        let mut criteria = match file {
            Some(id) => Criteria::new().eq(fields::ID, id.0),
            None => Criteria::new()
                .eq(fields::NAME, self.name.as_str())
                .eq(fields::PATH, self.feature_space.as_str()),
        };
        if let Some(owner) = owner {
            criteria = criteria.eq(fields::OWNER, owner.0);
        }
        self.session
            .find_objects(ORIGINAL_FILE, &criteria)?
            .iter()
            .map(FileRef::try_from)
            .collect()
    }

    /// Open the unique table matching `file`, or the name and feature space.
    pub fn open(&mut self, file: Option<FileId>, owner: Option<UserId>) -> Result<()> {
        if self.is_open() {
            return Err(Error::Usage(format!(
                "Table already open: {}",
                self.table_path()
            )));
        }
        let mut found = self.find_table_files(file, owner)?;
        let what = match file {
            Some(id) => format!("file {id}"),
            None => self.table_path(),
        };
        match found.len() {
            0 => Err(Error::NotFound(format!("No table files found for: {what}"))),
            1 => {
                let file = found.remove(0);
                self.open_file(&file)
            }
            n => Err(Error::TooManyMatches(format!(
                "{n} table files found for: {what}"
            ))),
        }
    }

    fn open_file(&mut self, file: &FileRef) -> Result<()> {
        let table = self.session.open_table(file)?;
        let headers = table.headers()?;
        if headers.is_empty() {
            return Err(Error::Backend(format!(
                "Failed to get columns for table file {}",
                file.id
            )));
        }
        let layout = TableLayout::from_headers(&headers)?;
        debug!(table = %self.table_path(), file = %file.id, columns = headers.len(), "opened feature table");
        self.table = Some(table);
        self.layout = Some(layout);
        Ok(())
    }

    /// Create and initialise a new table with the given metadata columns and
    /// one packed column holding every feature.
    pub fn create(&mut self, meta: &[MetadataColumn], feature_names: &[String]) -> Result<()> {
        if self.is_open() {
            return Err(Error::Usage(format!(
                "Table already open: {}",
                self.table_path()
            )));
        }
        if meta.is_empty() || feature_names.is_empty() {
            return Err(Error::Usage("Metadata and feature names required".into()));
        }
        let mut columns = meta
            .iter()
            .map(MetadataColumn::descriptor)
            .collect::<Result<Vec<_>>>()?;
        for name in feature_names {
            validate_name("feature", name)?;
        }
        let packed = ColumnDescriptor::packed_features(ColumnKind::DoubleArray, feature_names.to_vec());
        if packed.name.len() > MAX_PACKED_NAME_BYTES {
            warn!(
                table = %self.table_path(),
                bytes = packed.name.len(),
                "feature names may exceed the limit of the table service"
            );
        }
        columns.push(packed);

        let path = self.table_path();
        let mut table = self.session.new_table(TABLE_REPOSITORY_ID, &path)?;
        let mut file = table.file()?;
        if file.path != self.feature_space || file.name != self.name {
            warn!(table = %path, stored = %file.full_path(), "overriding table path and name");
            file.path = self.feature_space.clone();
            file.name = self.name.clone();
            let saved = self.session.save_file(&file)?;
            table.close()?;
            table = self.session.open_table(&saved)?;
            file = saved;
        }

        let headers: Vec<_> = columns.iter().map(ColumnDescriptor::to_header).collect();
        if let Err(err) = table.initialize(&headers) {
            error!(table = %path, file = %file.id, error = %err, "failed to initialize table, deleting");
            if let Err(close_err) = table.close() {
                debug!(file = %file.id, error = %close_err, "close after failed initialize");
            }
            if let Err(cleanup_err) = self.session.delete_object(ORIGINAL_FILE, file.id.0) {
                warn!(file = %file.id, error = %cleanup_err, "failed to delete uninitialized table file");
            }
            return Err(err);
        }

        let stored = table.headers()?;
        if stored.is_empty() {
            return Err(Error::Backend(format!(
                "Failed to get columns for table file {}",
                file.id
            )));
        }
        let layout = TableLayout::from_headers(&stored)?;
        info!(
            table = %path,
            file = %file.id,
            metadata = layout.meta_cols().len(),
            features = layout.feature_count(),
            "created feature table"
        );
        self.table = Some(table);
        self.layout = Some(layout);
        Ok(())
    }

    fn ensure_editable(&mut self) -> Result<()> {
        let editable = match self.editable {
            Some(editable) => editable,
            None => {
                let file = self.handle()?.file()?;
                let editable = self.guard.can_edit(&file.details);
                self.editable = Some(editable);
                editable
            }
        };
        if editable {
            Ok(())
        } else {
            Err(Error::Permission(format!(
                "Feature table {} must be owned by the current user",
                self.table_path()
            )))
        }
    }

    /// Write one row. With `replace`, the last row whose metadata equals
    /// `meta` is overwritten instead of appending.
    pub fn store(&mut self, meta: &[Value], features: &[f64], replace: bool) -> Result<()> {
        self.ensure_editable()?;
        let layout = self.layout()?;
        let cells = layout.encode_row(meta, features)?;

        let mut offset = None;
        if replace {
            let key: Vec<(&str, MetaMatch)> = layout
                .meta_cols()
                .iter()
                .zip(layout.metadata_names().iter())
                .map(|(&col, name)| (name.as_str(), MetaMatch::Eq(cells[col].clone())))
                .collect();
            let condition = render_conditions(key.iter().map(|(n, m)| (*n, m)));
            // Rows without any metadata key are always appended.
            if !condition.is_empty() {
                let table = self.handle()?;
                let rows = table.number_of_rows()?;
                offset = table.where_list(&condition, 0, rows, 0)?.into_iter().max();
            }
        }

        let batch = layout.encode_single(cells)?;
        let table = self.handle()?;
        match offset {
            Some(offset) => table.update(&[offset], &batch),
            None => table.add_data(&batch),
        }
    }

    /// Buffer one row for the next [`store_flush`](Self::store_flush).
    pub fn store_pending(&mut self, meta: &[Value], features: &[f64]) -> Result<()> {
        self.ensure_editable()?;
        let cells = self.layout()?.encode_row(meta, features)?;
        self.pending.push(cells);
        Ok(())
    }

    /// Write every buffered row in one call. Returns the number of rows
    /// written.
    pub fn store_flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        self.ensure_editable()?;
        let batch = self.layout()?.encode_columns(self.pending.columns())?;
        self.handle()?.add_data(&batch)?;
        let written = self.pending.len();
        self.pending.clear();
        debug!(table = %self.table_path(), rows = written, "flushed pending rows");
        Ok(written)
    }

    pub fn pending_rows(&self) -> usize {
        self.pending.len()
    }

    fn metadata_condition(&self, query: &MetaQuery) -> Result<String> {
        let layout = self.layout()?;
        let names = layout.metadata_names();
        let kinds: Vec<ColumnKind> = layout
            .meta_cols()
            .iter()
            .map(|&col| layout.columns()[col].kind)
            .collect();
        let pairs: Vec<(&str, MetaMatch)> = match query {
            MetaQuery::Named(pairs) => pairs
                .iter()
                .map(|(name, m)| {
                    names
                        .iter()
                        .position(|n| n == name)
                        .map(|i| (names[i].as_str(), coerce_match(kinds[i], m)))
                        .ok_or_else(|| Error::Usage(format!("Unknown metadata column: {name}")))
                })
                .collect::<Result<_>>()?,
            MetaQuery::Positional(matches) => {
                if matches.len() != names.len() {
                    return Err(Error::Usage(format!(
                        "Expected {} metadata values",
                        names.len()
                    )));
                }
                names
                    .iter()
                    .zip(&kinds)
                    .zip(matches)
                    .map(|((name, &kind), m)| (name.as_str(), coerce_match(kind, m)))
                    .collect()
            }
        };
        Ok(render_conditions(pairs.iter().map(|(n, m)| (*n, m))))
    }

    pub fn fetch_by_metadata(&mut self, query: &MetaQuery) -> Result<Vec<FeatureRow>> {
        let raw = self.fetch_by_metadata_raw(query)?;
        self.to_feature_rows(&raw)
    }

    /// Raw rows matching `query`: one value per column in column order.
    pub fn fetch_by_metadata_raw(&mut self, query: &MetaQuery) -> Result<Vec<Vec<Value>>> {
        let condition = self.metadata_condition(query)?;
        self.filter_raw(&condition)
    }

    pub fn filter(&mut self, condition: &str) -> Result<Vec<FeatureRow>> {
        warn!("The filter/query syntax is still under development");
        let raw = self.filter_raw(condition)?;
        self.to_feature_rows(&raw)
    }

    /// Raw rows matching a table condition. An empty condition selects
    /// every row.
    pub fn filter_raw(&mut self, condition: &str) -> Result<Vec<Vec<Value>>> {
        let chunk_size = self.chunk_size()?;
        let table = self.handle()?;
        let rows = table.number_of_rows()?;
        let offsets: Vec<RowOffset> = if condition.is_empty() {
            (0..rows).collect()
        } else {
            table.where_list(condition, 0, rows, 0)?
        };
        let batch = self.chunked_table_read(&offsets, chunk_size)?;
        self.layout()?.decode_rows(&batch)
    }

    fn to_feature_rows(&self, raw: &[Vec<Value>]) -> Result<Vec<FeatureRow>> {
        let layout = self.layout()?;
        raw.iter().map(|row| layout.feature_row(row)).collect()
    }

    /// Rows fetched per remote read, computed once per open table.
    pub fn chunk_size(&mut self) -> Result<usize> {
        if let Some(size) = self.chunk_size {
            return Ok(size);
        }
        let size = self.layout()?.chunk_size();
        self.chunk_size = Some(size);
        Ok(size)
    }

    /// Read the rows at `offsets` in slices of at most `chunk_size` rows and
    /// reassemble them in order.
    pub fn chunked_table_read(
        &self,
        offsets: &[RowOffset],
        chunk_size: usize,
    ) -> Result<RecordBatch> {
        if chunk_size == 0 {
            return Err(Error::Usage("Chunk size must be at least 1".into()));
        }
        let schema = self.layout()?.schema();
        if offsets.is_empty() {
            return Ok(RecordBatch::new_empty(schema));
        }
        let table = self.handle()?;
        let mut batches = Vec::with_capacity(offsets.len().div_ceil(chunk_size));
        for (i, chunk) in offsets.chunks(chunk_size).enumerate() {
            debug!(chunk = i, start = i * chunk_size, rows = chunk.len(), "reading table chunk");
            batches.push(table.read_coordinates(chunk)?);
        }
        Ok(concat_batches(&schema, &batches)?)
    }

    pub fn get_objects(&self, kind: &str, criteria: &Criteria) -> Result<Vec<ObjectRecord>> {
        self.session.find_objects(kind, criteria)
    }

    /// Existing links from the `kind` object `object_id` to this table's
    /// file under namespace `ns`.
    pub fn file_annotation_links(
        &self,
        kind: &str,
        object_id: ObjectId,
        ns: &str,
    ) -> Result<Vec<ObjectRecord>> {
        let file = self.file()?;
        let annotations = self.session.find_objects(
            FILE_ANNOTATION,
            &Criteria::new().eq(fields::NS, ns).eq(fields::FILE, file.id.0),
        )?;
        if annotations.is_empty() {
            return Ok(Vec::new());
        }
        let ids = annotations.iter().map(|a| Value::Long(a.id)).collect();
        self.session.find_objects(
            &annotation_link_kind(kind),
            &Criteria::new()
                .eq(fields::PARENT, object_id)
                .any_of(fields::CHILD, ids),
        )
    }

    /// Link a domain object to this table's file. `ns` defaults to the
    /// annotation space. An existing link is returned instead of creating a
    /// duplicate.
    pub fn create_file_annotation(
        &self,
        kind: &str,
        object_id: ObjectId,
        ns: Option<&str>,
    ) -> Result<ObjectRecord> {
        let ns = ns.unwrap_or(&self.annotation_space);
        let file = self.file()?;
        let mut links = self.file_annotation_links(kind, object_id, ns)?;
        if links.len() > 1 {
            warn!(ns, kind, object_id, file = %file.id, "multiple annotation links found");
        }
        if !links.is_empty() {
            return Ok(links.swap_remove(0));
        }

        let objects = self
            .session
            .find_objects(kind, &Criteria::new().eq(fields::ID, object_id))?;
        let [target] = objects.as_slice() else {
            return Err(Error::NotFound(format!(
                "Failed to get object {kind}:{object_id}"
            )));
        };
        if !self.guard.can_annotate(&target.details) {
            return Err(Error::Permission(format!(
                "Cannot annotate {kind}:{object_id}"
            )));
        }
        self.session
            .link_file_annotation(kind, object_id, ns, file.id)
    }

    /// Delete the table file together with every annotation referencing it.
    pub fn delete(&mut self) -> Result<()> {
        self.ensure_editable()?;
        let file = self.file()?;

        let annotations = self.session.find_objects(
            FILE_ANNOTATION,
            &Criteria::new().eq(fields::FILE, file.id.0),
        )?;
        let mut doomed: Vec<(String, ObjectId)> = Vec::new();
        if !annotations.is_empty() {
            let ids: Vec<Value> = annotations.iter().map(|a| Value::Long(a.id)).collect();
            for link_kind in annotation_link_kinds() {
                let links = self.session.find_objects(
                    &link_kind,
                    &Criteria::new().any_of(fields::CHILD, ids.clone()),
                )?;
                doomed.extend(links.into_iter().map(|l| (l.kind, l.id)));
            }
        }
        doomed.extend(annotations.into_iter().map(|a| (a.kind, a.id)));
        doomed.push((ORIGINAL_FILE.to_string(), file.id.0));

        info!(table = %self.table_path(), objects = ?doomed, "deleting feature table");
        self.close()?;
        for (kind, id) in &doomed {
            self.session.delete_object(kind, *id)?;
        }
        Ok(())
    }

    /// Close the remote handle and discard derived state. Closing a closed
    /// table is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.layout = None;
        self.pending.clear();
        self.editable = None;
        self.chunk_size = None;
        match self.table.take() {
            Some(table) => {
                debug!(table = %self.table_path(), "closing feature table");
                table.close()
            }
            None => Ok(()),
        }
    }
}

/// Convert query values to the column kind so they render like stored
/// cells. Values that do not convert are kept and simply match nothing.
fn coerce_match(kind: ColumnKind, m: &MetaMatch) -> MetaMatch {
    let cast = |v: &Value| coerce(kind, v).unwrap_or_else(|_| v.clone());
    match m {
        MetaMatch::Eq(v) => MetaMatch::Eq(cast(v)),
        MetaMatch::AnyOf(values) => MetaMatch::AnyOf(values.iter().map(cast).collect()),
    }
}

impl<S: Session> Drop for FeatureTable<S> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(table = %self.table_path(), error = %err, "failed to close feature table");
        }
    }
}

impl<S: Session> std::fmt::Debug for FeatureTable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureTable")
            .field("name", &self.name)
            .field("feature_space", &self.feature_space)
            .field("user", &self.guard.user())
            .field("open", &self.is_open())
            .field("pending", &self.pending.len())
            .finish()
    }
}
