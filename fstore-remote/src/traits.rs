//! Contracts required of the external collaborators.
//!
//! The feature store never talks to a concrete backend. It is generic over a
//! [`Session`], which bundles the remote table service, the object repository
//! and the identity service. All calls are synchronous; a call either
//! completes or fails, and failures are reported once without retries.

use arrow::record_batch::RecordBatch;
use fstore_result::Result;
use fstore_types::{ColumnHeader, FileId, ObjectId, RowOffset, UserId};

use crate::objects::{Criteria, FileRef, ObjectRecord};

/// An open handle to one remote table.
///
/// Column batches follow the header order returned by [`headers`](Self::headers).
pub trait RemoteTable: Send + 'static {
    /// File object backing this table.
    fn file(&self) -> Result<FileRef>;

    /// Declare the table columns. Only valid once, on a freshly created table.
    fn initialize(&self, columns: &[ColumnHeader]) -> Result<()>;

    /// Column headers; empty for a table that was never initialised.
    fn headers(&self) -> Result<Vec<ColumnHeader>>;

    /// Append every row of `batch`.
    fn add_data(&self, batch: &RecordBatch) -> Result<()>;

    /// Overwrite the rows at `offsets` with the rows of `batch`, in order.
    fn update(&self, offsets: &[RowOffset], batch: &RecordBatch) -> Result<()>;

    fn number_of_rows(&self) -> Result<u64>;

    /// Offsets of the rows in `[start, stop)` matching `condition`. A `limit`
    /// of zero means no limit.
    fn where_list(
        &self,
        condition: &str,
        start: u64,
        stop: u64,
        limit: u64,
    ) -> Result<Vec<RowOffset>>;

    /// Read the rows at `offsets`, preserving their order.
    fn read_coordinates(&self, offsets: &[RowOffset]) -> Result<RecordBatch>;

    /// Release the remote handle.
    fn close(&self) -> Result<()>;
}

/// Factory for remote table handles.
pub trait TableService {
    type Table: RemoteTable;

    /// Create a new, uninitialised table stored at `path`.
    fn new_table(&self, repository_id: i64, path: &str) -> Result<Self::Table>;

    /// Open an existing table by its file object.
    fn open_table(&self, file: &FileRef) -> Result<Self::Table>;
}

/// Repository of domain objects and annotation records.
pub trait ObjectRepository {
    /// Records of `kind` matching every criterion.
    fn find_objects(&self, kind: &str, criteria: &Criteria) -> Result<Vec<ObjectRecord>>;

    /// Persist changes to a file object's name or path.
    fn save_file(&self, file: &FileRef) -> Result<FileRef>;

    /// Create a file annotation in namespace `ns` referencing `file`, and a
    /// link from the `parent_kind` object `parent_id` to it. Returns the link.
    fn link_file_annotation(
        &self,
        parent_kind: &str,
        parent_id: ObjectId,
        ns: &str,
        file: FileId,
    ) -> Result<ObjectRecord>;

    /// Delete one record.
    fn delete_object(&self, kind: &str, id: ObjectId) -> Result<()>;
}

/// Identity of the calling user.
pub trait IdentityService {
    fn current_user(&self) -> Result<UserId>;
}

/// Everything the feature store needs from a connected session.
pub trait Session: TableService + ObjectRepository + IdentityService + Send + Sync + 'static {}

impl<T> Session for T where T: TableService + ObjectRepository + IdentityService + Send + Sync + 'static
{}
