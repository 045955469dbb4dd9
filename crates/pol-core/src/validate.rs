//! The validation pass.
//!
//! Checks run per definition in a fixed order: presence, cardinality, type,
//! then per-value constraints. An unresolved file reference or a type
//! mismatch ends the checks for that name. Faults accumulate in the report;
//! only a malformed dictionary aborts the pass.

use pol_common::{name, Result, ValueKind};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::definition::Definition;
use crate::dictionary;
use crate::policy::Policy;
use crate::report::{ErrorFlags, ValidationError};

/// Knobs for a validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateOptions {
    /// Report names present in the policy but absent from the dictionary
    /// as [`ErrorFlags::UNKNOWN_NAME`].
    pub flag_unknown_names: bool,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag_unknown_names(mut self, flag: bool) -> Self {
        self.flag_unknown_names = flag;
        self
    }
}

/// Validate every name the dictionary held by `dict` defines against
/// `policy`, reporting faults under `prefix`.
pub(crate) fn validate_policy(
    dict: &Policy,
    policy: &Policy,
    prefix: &str,
    report: &mut ValidationError,
    options: &ValidateOptions,
) -> Result<()> {
    let defs = dictionary::definitions_of(dict)?;
    for leaf in defs.names(true) {
        let (def, sub) = dictionary::lookup(dict, &leaf)?;
        validate_definition(&def, sub, policy, &leaf, prefix, report, options)?;
    }
    if options.flag_unknown_names {
        for leaf in policy.names(true) {
            if !defs.exists(&leaf) {
                report.add_error(name::join(prefix, &leaf), ErrorFlags::UNKNOWN_NAME);
            }
        }
    }
    Ok(())
}

fn validate_definition(
    def: &Definition,
    sub: Option<&Policy>,
    policy: &Policy,
    leaf: &str,
    prefix: &str,
    report: &mut ValidationError,
    options: &ValidateOptions,
) -> Result<()> {
    let full = name::join(prefix, leaf);
    let values = policy.get_array(leaf).unwrap_or(&[]);
    let Some(first) = values.first() else {
        if def.is_required() {
            report.add_error(full, ErrorFlags::MISSING_REQUIRED);
        }
        return Ok(());
    };

    let count = values.len();
    let mut flags = ErrorFlags::OK;
    if count < def.min_occurs() {
        flags |= ErrorFlags::ARRAY_TOO_SHORT;
    }
    if def.max_occurs().is_some_and(|max| count > max) {
        flags |= ErrorFlags::TOO_MANY_VALUES;
    }

    let found = first.kind();
    let declared = def.kind();
    // An unresolved reference is NOT_LOADED unless a scalar type was declared.
    if found == ValueKind::FileReference
        && matches!(declared, ValueKind::Policy | ValueKind::Undefined)
    {
        flags |= ErrorFlags::NOT_LOADED;
    } else if declared != ValueKind::Undefined && declared != found {
        flags |= ErrorFlags::WRONG_TYPE;
    } else {
        for value in values {
            flags |= def.check_value(value);
        }
    }
    trace!(param = %full, count, flags = flags.bits(), "checked definition");

    let nested = flags.intersects(ErrorFlags::NOT_LOADED | ErrorFlags::WRONG_TYPE);
    report.add_error(full.clone(), flags);
    if nested {
        return Ok(());
    }
    if let Some(sub) = sub {
        for value in values {
            if let Some(child) = value.as_policy() {
                validate_policy(sub, child, &full, report, options)?;
            }
        }
    }
    Ok(())
}
