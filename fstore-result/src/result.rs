use crate::error::Error;

/// Result type alias used throughout fstore.
///
/// Shorthand for `std::result::Result<T, Error>`; every fallible fstore
/// operation returns it.
pub type Result<T> = std::result::Result<T, Error>;
