//! Profile definitions and fetched profile snapshots.

pub mod definition;
pub mod loaded;

use std::sync::LazyLock;

use regex::Regex;

pub use definition::ProfileDef;
pub use loaded::{ContentType, LoadedProfile, ProfileContents, ProfileField, ValidationIssue};

static RE_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Returns true if `name` is a symbolic identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_symbol(name: &str) -> bool {
    RE_SYMBOL.is_match(name)
}
