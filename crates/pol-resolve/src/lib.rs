//! Policy file loading and reference resolution.
//!
//! This crate provides:
//! - Parsing of file references and package URNs
//! - Package location through the environment, a fixed map, or search roots
//! - The JSON policy format
//! - The resolver that loads files and replaces file references in place

pub mod config;
pub mod locate;
pub mod parser;
pub mod resolver;
pub mod urn;

pub use config::ResolverConfig;
pub use locate::{EnvLocator, PackageLocator, SearchPathLocator, StaticLocator};
pub use parser::{policy_to_json, JsonPolicyParser, ParseError, PolicyParser};
pub use resolver::{LoadFailure, LoadReport, Resolver};
pub use urn::{looks_like_urn, Indirection, Reference, Target};
