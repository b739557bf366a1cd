//! Value, column and row types shared by the fstore crates.
//!
//! - [`Value`]: loosely typed cell value, also the "don't care" query placeholder.
//! - [`ColumnKind`], [`ColumnRole`], [`ColumnDescriptor`], [`ColumnHeader`]: column model
//!   and its wire representation.
//! - [`FeatureRow`]: one decoded row with named features and metadata.
//! - [`codec`]: conversions between values and Arrow column arrays.
//! - [`UserId`], [`FileId`]: typed identifiers handed out by the remote services.

pub mod codec;
pub mod column;
pub mod ids;
pub mod literal;
pub mod row;

pub use column::{
    ColumnDescriptor, ColumnHeader, ColumnKind, ColumnRole,
    FEATURE_NAME_SEPARATOR,
};
pub use ids::{FileId, ObjectId, RowOffset, UserId};
pub use literal::Value;
pub use row::{FeatureRow, RowSlot};
