//! Resolver limits.

use std::env;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable overriding [`ResolverConfig::max_indirections`].
pub const ENV_MAX_INDIRECTIONS: &str = "POLICY_MAX_INDIRECTIONS";

/// Environment variable overriding [`ResolverConfig::max_depth`].
pub const ENV_MAX_DEPTH: &str = "POLICY_MAX_DEPTH";

fn default_max_indirections() -> usize {
    8
}

fn default_max_depth() -> usize {
    32
}

/// Bounds on reference chasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum number of `@` indirections followed for one reference.
    #[serde(default = "default_max_indirections")]
    pub max_indirections: usize,

    /// Maximum nesting of policy files loaded through file references.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_indirections: default_max_indirections(),
            max_depth: default_max_depth(),
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, overridden by `POLICY_MAX_INDIRECTIONS` and
    /// `POLICY_MAX_DEPTH` when set. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    pub fn with_max_indirections(mut self, max: usize) -> Self {
        self.max_indirections = max;
        self
    }

    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        for (key, slot) in [
            (ENV_MAX_INDIRECTIONS, &mut self.max_indirections),
            (ENV_MAX_DEPTH, &mut self.max_depth),
        ] {
            let Some(raw) = lookup(key) else {
                continue;
            };
            match raw.trim().parse() {
                Ok(value) => *slot = value,
                Err(_) => warn!(key, value = %raw, "ignoring unparseable resolver limit"),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.max_indirections, 8);
        assert_eq!(config.max_depth, 32);
    }

    #[test]
    fn builders() {
        let config = ResolverConfig::new()
            .with_max_indirections(2)
            .with_max_depth(3);
        assert_eq!(config.max_indirections, 2);
        assert_eq!(config.max_depth, 3);
    }

    #[test]
    fn overrides_apply_and_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            (ENV_MAX_INDIRECTIONS, " 3 "),
            (ENV_MAX_DEPTH, "deep"),
        ]
        .into_iter()
        .collect();
        let config = ResolverConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.max_indirections, 3);
        assert_eq!(config.max_depth, 32);
    }

    #[test]
    fn serde_fills_missing_fields() {
        let config: ResolverConfig = serde_json::from_str(r#"{"max_depth": 4}"#).unwrap();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.max_indirections, 8);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"max_indirections\":8"));
    }
}
