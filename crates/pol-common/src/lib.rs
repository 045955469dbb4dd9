//! Policy common types and errors.
//!
//! This crate provides foundational types shared across the policy crates:
//! - The unified error type and its stable error codes
//! - The closed set of value kinds and their canonical type names
//! - Helpers for hierarchical (dotted) parameter names

pub mod error;
pub mod kind;
pub mod name;

pub use error::{Error, Result};
pub use kind::ValueKind;
