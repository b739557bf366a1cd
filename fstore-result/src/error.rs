use std::fmt;
use thiserror::Error;

/// Unified error type for all fstore operations.
///
/// The taxonomy is flat on purpose: every failure the feature store can
/// report maps to exactly one variant, and callers match on the variant rather
/// than unwrapping layers of wrapper types.
///
/// # Error Handling Strategy
///
/// Errors propagate upward with the `?` operator and reach the immediate
/// caller unchanged. No layer retries a failed remote call. The only automatic
/// recovery paths are the cleanup after a failed table initialisation and the
/// implicit close performed when the handle cache evicts an entry.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller misuse of the API.
    ///
    /// Raised for:
    /// - operating on a handle that is already open (or not open)
    /// - malformed metadata or feature names
    /// - metadata/feature value counts that do not match the table schema
    /// - creating a table on behalf of another user
    /// - values that cannot be coerced into the declared column kind
    #[error("Usage error: {0}")]
    Usage(String),

    /// Zero matches where exactly one was required.
    ///
    /// Table lookups by name/path or by file id raise this when the remote
    /// repository has no matching record.
    #[error("Not found: {0}")]
    NotFound(String),

    /// More than one match where exactly one was required, or an attempt to
    /// create something that already exists.
    #[error("Too many matches: {0}")]
    TooManyMatches(String),

    /// A write or delete was attempted by a caller that does not own the
    /// feature table.
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Value/name cardinality mismatch when constructing or mutating a
    /// feature row.
    #[error("Row encoding error: {0}")]
    RowEncoding(String),

    /// A named value was requested from a row that has no such name.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The remote table service or object repository failed.
    ///
    /// The message carries whatever the backend reported. When this happens
    /// during table initialisation the partially created remote object has
    /// already been removed by the time the caller sees the error.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Arrow error while encoding or decoding column buffers.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Internal error indicating a bug or unexpected state, such as a
    /// poisoned lock or a remote reply whose shape contradicts the schema.
    #[error("An internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create a backend error from any displayable error.
    ///
    /// # Examples
    ///
    /// ```
    /// use fstore_result::Error;
    ///
    /// let err = Error::backend("connection reset");
    /// assert!(matches!(err, Error::Backend(msg) if msg == "connection reset"));
    /// ```
    #[inline]
    pub fn backend<E: fmt::Display>(err: E) -> Self {
        Error::Backend(err.to_string())
    }

    /// Create an internal error from any displayable error.
    #[inline]
    pub fn internal<E: fmt::Display>(err: E) -> Self {
        Error::Internal(err.to_string())
    }

    /// Whether this error reports a missing remote object.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
