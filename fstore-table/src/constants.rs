#![forbid(unsafe_code)]

/// Upper bound on the payload of one `read_coordinates` call.
pub const MAX_TRANSFER_BYTES: usize = 16 * 1024 * 1024;

/// Assumed size of one stored cell element. Every element is costed as a
/// double.
pub const CELL_BYTES: usize = 8;

/// Length above which a packed feature name list may be rejected by the
/// table service.
pub const MAX_PACKED_NAME_BYTES: usize = 64_000;

/// Repository id passed to the table service when creating tables.
pub const TABLE_REPOSITORY_ID: i64 = 0;

/// Pattern every metadata and feature name must match.
pub const NAME_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_ \-\(\)\[\]\{\}\.]*$";
