//! Feature tables stored in a remote columnar table service.
//!
//! A feature table holds one row per entity: a few metadata columns that
//! identify the row (image id, region id, labels) and one or more feature
//! columns with the numeric payload. Features are normally packed into a
//! single fixed-width `DoubleArray` column whose name lists the feature
//! names, comma separated.
//!
//! - [`FeatureTable`]: create, open, write, query and delete one table.
//! - [`condition`]: metadata queries and the condition strings they render to.
//! - [`TableLayout`]: column classification and row encoding.
//! - [`PermissionGuard`]: owner-only write policy.

pub mod condition;
pub mod constants;
pub mod layout;
mod names;
mod pending;
pub mod permissions;
pub mod table;

pub use condition::{MetaMatch, MetaQuery};
pub use layout::TableLayout;
pub use names::is_valid_name;
pub use permissions::PermissionGuard;
pub use table::{FeatureTable, MetadataColumn};
