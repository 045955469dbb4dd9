//! Value kinds stored in a policy tree.
//!
//! The ordinal set is fixed: dictionaries refer to kinds by their canonical
//! type name, and reports compare kinds by ordinal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The kind of every value held under a single policy name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKind {
    #[serde(rename = "undefined")]
    Undefined = 0,
    #[serde(rename = "bool")]
    Bool = 1,
    #[serde(rename = "int")]
    Int = 2,
    #[serde(rename = "double")]
    Double = 3,
    #[serde(rename = "string")]
    String = 4,
    #[serde(rename = "Policy")]
    Policy = 5,
    /// An unresolved reference to another policy file. Never a schema type.
    #[serde(rename = "PolicyFile")]
    FileReference = 6,
}

impl ValueKind {
    /// Every kind, in ordinal order.
    pub const ALL: [ValueKind; 7] = [
        ValueKind::Undefined,
        ValueKind::Bool,
        ValueKind::Int,
        ValueKind::Double,
        ValueKind::String,
        ValueKind::Policy,
        ValueKind::FileReference,
    ];

    /// Canonical type name, as written in a dictionary's `type` field.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::Policy => "Policy",
            ValueKind::FileReference => "PolicyFile",
        }
    }

    /// Look up a kind by its canonical type name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Whether a dictionary may declare this kind as a definition's type.
    pub fn is_schema_type(self) -> bool {
        self != ValueKind::FileReference
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| Error::BadName {
            name: s.to_string(),
            reason: "not a known type name".to_string(),
        })
    }
}
