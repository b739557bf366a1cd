//! Identifiers shared across fstore crates.
//!
//! These wrap the raw numeric ids handed out by the remote services so that a
//! user id can never be passed where a file id is expected.

use std::fmt;

/// Numeric identity of a user, as reported by the identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the file object that backs a remote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub i64);

impl From<i64> for FileId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<FileId> for i64 {
    fn from(id: FileId) -> Self {
        id.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of any record held by the object repository.
pub type ObjectId = i64;

/// Zero-based position of a row inside a remote table.
pub type RowOffset = u64;
