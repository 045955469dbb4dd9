//! Hierarchical typed policy trees and their schemas.
//!
//! This crate provides:
//! - [`Policy`]: an ordered tree of named, typed, multi-valued parameters
//! - [`Dictionary`] and [`Definition`]: schemas describing policies
//! - The validation pass producing a [`ValidationError`] report
//!
//! Loading policies from files and resolving file references lives in the
//! `pol-resolve` crate.

pub mod definition;
pub mod dictionary;
pub mod names;
pub mod policy;
pub mod report;
pub mod validate;
pub mod value;

pub use definition::Definition;
pub use dictionary::Dictionary;
pub use names::Names;
pub use policy::Policy;
pub use report::{ErrorFlags, ValidationError};
pub use validate::ValidateOptions;
pub use value::{FileReference, Value};

pub use pol_common::{Error, Result, ValueKind};
