//! fstore: feature tables over a remote columnar table service.
//!
//! This crate is the entrypoint of the workspace. It adds a cached
//! [`FeatureTableManager`] on top of the per-table API in `fstore-table` and
//! re-exports the types needed to use it.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use fstore::{
//!     ColumnKind, FeatureTableManager, ManagerOptions, MemSession, MetaQuery, MetadataColumn,
//!     UserId, Value,
//! };
//!
//! let session = Arc::new(MemSession::new(UserId(1)));
//! let mut manager = FeatureTableManager::new(session, ManagerOptions::default()).unwrap();
//!
//! let meta = vec![MetadataColumn::new(ColumnKind::Long, "ImageID")];
//! let features = vec!["area".to_string(), "perimeter".to_string()];
//! let handle = manager.create("shapes", &meta, &features).unwrap();
//!
//! let mut table = handle.lock().unwrap();
//! table.store(&[Value::Long(7)], &[12.5, 14.0], true).unwrap();
//! let rows = table.fetch_by_metadata(&MetaQuery::positional([7i64])).unwrap();
//! assert_eq!(rows[0].values(), Some(&[12.5, 14.0][..]));
//! ```
//!
//! # Architecture
//!
//! - **Row model** (`fstore-types`): values, column descriptors and [`FeatureRow`].
//! - **Remote contracts** (`fstore-remote`): the [`Session`] traits and the
//!   in-memory [`MemSession`] backend.
//! - **Table store** (`fstore-table`): [`FeatureTable`] and [`PermissionGuard`].
//! - **Handle cache and manager** (this crate): [`LruCache`],
//!   [`LruClosableCache`] and [`FeatureTableManager`].

#![forbid(unsafe_code)]

pub mod cache;
pub mod manager;
pub mod options;

pub use cache::{Closable, LruCache, LruClosableCache};
pub use manager::{FeatureTableHandle, FeatureTableManager};
pub use options::{DEFAULT_CACHE_SIZE, DEFAULT_NAMESPACE, ManagerOptions};

pub use fstore_remote::{MemSession, Session};
pub use fstore_result::{Error, Result};
pub use fstore_table::{FeatureTable, MetaMatch, MetaQuery, MetadataColumn, PermissionGuard};
pub use fstore_types::{ColumnKind, FeatureRow, FileId, UserId, Value};
