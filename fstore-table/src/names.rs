use std::sync::OnceLock;

use fstore_result::{Error, Result};
use regex::Regex;

use crate::constants::NAME_PATTERN;

static NAME_RE: OnceLock<Regex> = OnceLock::new();

/// Whether `name` is usable as a metadata or feature name.
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE
        .get_or_init(|| Regex::new(NAME_PATTERN).expect("valid name regex"))
        .is_match(name)
}

pub(crate) fn validate_name(what: &str, name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::Usage(format!("Invalid {what} name: {name:?}")))
    }
}
