//! Validation reports.
//!
//! Validation never stops at the first fault: every offending parameter is
//! recorded with the OR of all faults found for it, and the caller decides
//! what to do with the report.

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Faults found for a single parameter. Bit positions are stable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ErrorFlags: u32 {
        /// The value kind differs from the declared type.
        const WRONG_TYPE = 1 << 0;

        /// A required parameter has no value.
        const MISSING_REQUIRED = 1 << 1;

        /// Fewer values than `minOccurs`.
        const ARRAY_TOO_SHORT = 1 << 3;

        /// More values than `maxOccurs`.
        const TOO_MANY_VALUES = 1 << 5;

        /// A value is not in the `allowed` set.
        const VALUE_DISALLOWED = 1 << 7;

        /// A value lies outside `[min, max]`.
        const VALUE_OUT_OF_RANGE = 1 << 8;

        /// The name has no definition in the dictionary.
        const UNKNOWN_NAME = 1 << 10;

        /// A sub-policy is still an unresolved file reference.
        const NOT_LOADED = 1 << 12;
    }
}

impl ErrorFlags {
    /// No fault.
    pub const OK: ErrorFlags = ErrorFlags::empty();
}

const MESSAGES: [(ErrorFlags, &str); 8] = [
    (ErrorFlags::WRONG_TYPE, "value has the incorrect type"),
    (
        ErrorFlags::MISSING_REQUIRED,
        "no value available for required parameter",
    ),
    (
        ErrorFlags::ARRAY_TOO_SHORT,
        "insufficient number of array values",
    ),
    (
        ErrorFlags::TOO_MANY_VALUES,
        "too many values provided for parameter",
    ),
    (ErrorFlags::VALUE_DISALLOWED, "value is not among defined set"),
    (ErrorFlags::VALUE_OUT_OF_RANGE, "value is out of range"),
    (ErrorFlags::UNKNOWN_NAME, "parameter name is unknown"),
    (ErrorFlags::NOT_LOADED, "file not loaded"),
];

/// Human-readable description of a set of faults, one phrase per flag.
pub fn message_for(flags: ErrorFlags) -> String {
    MESSAGES
        .iter()
        .filter(|(flag, _)| flags.contains(*flag))
        .map(|(_, msg)| *msg)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Accumulated validation faults, keyed by dotted parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    errors: BTreeMap<String, ErrorFlags>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `flags` against `name`, OR-ing with any earlier faults.
    /// Recording [`ErrorFlags::OK`] is a no-op.
    pub fn add_error(&mut self, name: impl Into<String>, flags: ErrorFlags) {
        if flags.is_empty() {
            return;
        }
        *self.errors.entry(name.into()).or_insert(ErrorFlags::OK) |= flags;
    }

    /// Faults recorded against `name`; [`ErrorFlags::OK`] when none.
    pub fn errors_for(&self, name: &str) -> ErrorFlags {
        self.errors.get(name).copied().unwrap_or(ErrorFlags::OK)
    }

    /// The OR of every recorded fault.
    pub fn errors(&self) -> ErrorFlags {
        self.errors
            .values()
            .fold(ErrorFlags::OK, |acc, flags| acc | *flags)
    }

    /// Number of parameters with at least one fault.
    pub fn param_count(&self) -> usize {
        self.errors.len()
    }

    /// Faulty parameter names, sorted.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fold every fault from `other` into this report.
    pub fn merge(&mut self, other: &ValidationError) {
        for (name, flags) in &other.errors {
            self.add_error(name.clone(), *flags);
        }
    }

    /// One line per faulty parameter, each starting with `prefix`.
    pub fn describe(&self, prefix: &str) -> String {
        self.errors
            .iter()
            .map(|(name, flags)| format!("{prefix}{name}: {}\n", message_for(*flags)))
            .collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            write!(f, "Validation error: no errors")
        } else {
            write!(f, "Validation error: \n{}", self.describe("  * "))
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_are_stable() {
        assert_eq!(ErrorFlags::OK.bits(), 0);
        assert_eq!(ErrorFlags::WRONG_TYPE.bits(), 1);
        assert_eq!(ErrorFlags::MISSING_REQUIRED.bits(), 2);
        assert_eq!(ErrorFlags::ARRAY_TOO_SHORT.bits(), 8);
        assert_eq!(ErrorFlags::TOO_MANY_VALUES.bits(), 32);
        assert_eq!(ErrorFlags::VALUE_DISALLOWED.bits(), 128);
        assert_eq!(ErrorFlags::VALUE_OUT_OF_RANGE.bits(), 256);
        assert_eq!(ErrorFlags::UNKNOWN_NAME.bits(), 1024);
        assert_eq!(ErrorFlags::NOT_LOADED.bits(), 4096);
    }

    #[test]
    fn errors_accumulate_per_name() {
        let mut report = ValidationError::new();
        assert!(report.is_ok());
        report.add_error("height", ErrorFlags::VALUE_OUT_OF_RANGE);
        report.add_error("height", ErrorFlags::VALUE_DISALLOWED);
        report.add_error("tags", ErrorFlags::ARRAY_TOO_SHORT);
        report.add_error("ignored", ErrorFlags::OK);

        assert_eq!(report.param_count(), 2);
        assert_eq!(
            report.errors_for("height"),
            ErrorFlags::VALUE_OUT_OF_RANGE | ErrorFlags::VALUE_DISALLOWED
        );
        assert_eq!(report.errors_for("nobody"), ErrorFlags::OK);
        assert_eq!(
            report.errors(),
            ErrorFlags::VALUE_OUT_OF_RANGE
                | ErrorFlags::VALUE_DISALLOWED
                | ErrorFlags::ARRAY_TOO_SHORT
        );
        assert_eq!(report.param_names().collect::<Vec<_>>(), vec!["height", "tags"]);
    }

    #[test]
    fn merge_ors_flags() {
        let mut a = ValidationError::new();
        a.add_error("x", ErrorFlags::WRONG_TYPE);
        let mut b = ValidationError::new();
        b.add_error("x", ErrorFlags::NOT_LOADED);
        b.add_error("y", ErrorFlags::MISSING_REQUIRED);
        a.merge(&b);
        assert_eq!(a.errors_for("x"), ErrorFlags::WRONG_TYPE | ErrorFlags::NOT_LOADED);
        assert_eq!(a.param_count(), 2);
    }

    #[test]
    fn messages_name_each_fault() {
        assert_eq!(message_for(ErrorFlags::OK), "");
        assert_eq!(message_for(ErrorFlags::NOT_LOADED), "file not loaded");
        let combined = message_for(ErrorFlags::ARRAY_TOO_SHORT | ErrorFlags::NOT_LOADED);
        assert!(combined.contains("insufficient number of array values"));
        assert!(combined.contains("file not loaded"));
    }

    #[test]
    fn display_lists_faulty_parameters() {
        let mut report = ValidationError::new();
        assert_eq!(report.to_string(), "Validation error: no errors");
        report.add_error("height", ErrorFlags::VALUE_OUT_OF_RANGE);
        let text = report.to_string();
        assert!(text.contains("  * height: value is out of range"));
        assert_eq!(report.describe("- "), "- height: value is out of range\n");
    }

    #[test]
    fn serializes_to_json() {
        let mut report = ValidationError::new();
        report.add_error("height", ErrorFlags::VALUE_OUT_OF_RANGE);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("height"));
        assert!(json.contains("VALUE_OUT_OF_RANGE"));
    }
}
