//! Dotted parameter names.
//!
//! A hierarchical name such as `a.b.c` addresses `c` inside the sub-policy
//! `b` inside the sub-policy `a`. Segments may not be empty: a name cannot
//! start or end with a period, nor contain two consecutive periods.

use crate::error::{Error, Result};

/// Separator between the segments of a hierarchical name.
pub const SEPARATOR: char = '.';

/// Check that `name` is a well-formed hierarchical name.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::bad_name(name, "empty name"));
    }
    if name.split(SEPARATOR).any(str::is_empty) {
        return Err(Error::bad_name(name, "contains an empty field"));
    }
    Ok(())
}

/// Split a well-formed name into its segments.
pub fn segments(name: &str) -> Result<Vec<&str>> {
    validate(name)?;
    Ok(name.split(SEPARATOR).collect())
}

/// Split a name into its parent path (if any) and final segment.
///
/// `"a.b.c"` becomes `(Some("a.b"), "c")`; `"a"` becomes `(None, "a")`.
pub fn split_leaf(name: &str) -> (Option<&str>, &str) {
    match name.rfind(SEPARATOR) {
        Some(i) => (Some(&name[..i]), &name[i + 1..]),
        None => (None, name),
    }
}

/// Join a prefix and a child name, omitting the separator for an empty prefix.
pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}{SEPARATOR}{name}")
    }
}
