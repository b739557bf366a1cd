//! Boundary between the feature store and the remote services it drives.
//!
//! [`traits`] declares what the feature store needs from a connected session:
//! a remote columnar table service, an object repository and an identity
//! service. [`objects`] holds the repository record types. [`mem`] is an
//! in-memory [`Session`] used by tests.

pub mod mem;
pub mod objects;
pub mod traits;

pub use mem::{CallStatsSnapshot, MemSession, MemTable};
pub use objects::{
    Criteria, Criterion, FileRef, ObjectDetails, ObjectRecord, Permissions, annotation_link_kind,
    annotation_link_kinds,
};
pub use traits::{IdentityService, ObjectRepository, RemoteTable, Session, TableService};
