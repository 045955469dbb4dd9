//! Error types for policy trees, dictionaries and reference resolution.

use std::path::PathBuf;
use thiserror::Error;

use crate::kind::ValueKind;

/// Result type alias for policy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for policy operations.
///
/// Validation faults are not errors: they accumulate as flags in a
/// validation report. Everything here is a hard failure of a single call.
#[derive(Error, Debug)]
pub enum Error {
    // Tree access errors (10-19)
    #[error("policy parameter name not found: {name}")]
    NameNotFound { name: String },

    #[error("parameter \"{name}\" has wrong type; expecting {expected}, found {found}")]
    WrongType {
        name: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("illegal policy parameter name \"{name}\": {reason}")]
    BadName { name: String, reason: String },

    #[error("invalid value for \"{name}\": {reason}")]
    InvalidValue { name: String, reason: String },

    // Resolution errors (20-29)
    #[error("failure opening policy file: {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {}: {detail}", path.display())]
    Parse { path: PathBuf, detail: String },

    #[error("reference \"{reference}\" exceeds {limit} levels of indirection")]
    IndirectionLoop { reference: String, limit: usize },

    #[error("circular policy file reference: {}", path.display())]
    ReferenceCycle { path: PathBuf },

    // Schema errors (30-39)
    #[error("malformed dictionary: {0}")]
    Dictionary(String),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::NameNotFound { .. } => 10,
            Error::WrongType { .. } => 11,
            Error::BadName { .. } => 12,
            Error::InvalidValue { .. } => 13,
            Error::Io { .. } => 20,
            Error::Parse { .. } => 21,
            Error::IndirectionLoop { .. } => 22,
            Error::ReferenceCycle { .. } => 23,
            Error::Dictionary(_) => 30,
        }
    }

    pub fn name_not_found(name: impl Into<String>) -> Self {
        Error::NameNotFound { name: name.into() }
    }

    pub fn bad_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::BadName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn dictionary(msg: impl Into<String>) -> Self {
        Error::Dictionary(msg.into())
    }

    /// Attach the attempted path to an I/O failure.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
