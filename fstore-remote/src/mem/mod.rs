//! In-memory implementation of the remote collaborators.
//!
//! [`MemSession`] keeps objects and table rows in process memory and
//! evaluates table conditions with a small parser. It is meant for tests and
//! local experiments; nothing is persisted.

mod condition;
mod session;
mod stats;
mod table;

pub use condition::{CompareOp, Condition, Operand};
pub use session::MemSession;
pub use stats::{CallStats, CallStatsSnapshot};
pub use table::MemTable;
