//! Error types and result definitions for the fstore workspace.
//!
//! All fstore crates share the single [`Error`] enum and the [`Result<T>`]
//! alias so that failures cross crate boundaries with plain `?`.
//!
//! # Error Categories
//!
//! - **Caller misuse** ([`Error::Usage`]): bad names, wrong value counts, handle state
//! - **Lookup failures** ([`Error::NotFound`], [`Error::TooManyMatches`]): exactly-one lookups
//! - **Authorisation** ([`Error::Permission`]): writes by a non-owner
//! - **Row model** ([`Error::RowEncoding`], [`Error::KeyNotFound`]): feature row misuse
//! - **Remote failures** ([`Error::Backend`]): the table service or repository failed
//! - **Data format** ([`Error::Arrow`]): column buffer encoding
//! - **Internal errors** ([`Error::Internal`]): bugs or unexpected states

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
