//! Dictionaries: policies that describe other policies.
//!
//! A dictionary is an ordinary [`Policy`] with a single `definitions`
//! sub-policy. Each name under `definitions` is itself a sub-policy that
//! materializes into a [`Definition`]. Definitions of `Policy`-typed
//! parameters may carry a nested `dictionary`, so schemas nest the same way
//! the data they describe does.

use pol_common::{name, Error, Result, ValueKind};
use tracing::debug;

use crate::definition::Definition;
use crate::names::Names;
use crate::policy::Policy;
use crate::report::ValidationError;
use crate::validate::{self, ValidateOptions};
use crate::value::Value;

/// Name of the section holding the definitions.
pub const DEFINITIONS: &str = "definitions";

/// A schema for policies.
#[derive(Debug, Clone, PartialEq)]
pub struct Dictionary {
    policy: Policy,
}

impl Dictionary {
    /// Wrap a policy as a dictionary. It must contain a `definitions` entry;
    /// use [`Dictionary::check`] for a full integrity check.
    pub fn new(policy: Policy) -> Result<Self> {
        require_definitions(&policy)?;
        Ok(Self { policy })
    }

    /// The underlying policy.
    pub fn as_policy(&self) -> &Policy {
        &self.policy
    }

    pub fn into_policy(self) -> Policy {
        self.policy
    }

    /// The single `definitions` section.
    pub fn definitions(&self) -> Result<&Policy> {
        definitions_of(&self.policy)
    }

    /// Names defined at the top level of this dictionary.
    pub fn definition_names(&self) -> Result<Names<'_>> {
        Ok(self.definitions()?.names(true))
    }

    /// Check the integrity of this dictionary: exactly one `definitions`
    /// section, every definition materializes, and nested dictionaries pass
    /// the same check.
    pub fn check(&self) -> Result<()> {
        check_policy(&self.policy)
    }

    /// Materialize the definition for `name`.
    ///
    /// A dotted name walks nested dictionaries: `a.b` is the definition `b`
    /// inside the `dictionary` of definition `a`.
    pub fn make_def(&self, name: &str) -> Result<Definition> {
        let (mut def, sub) = lookup(&self.policy, name)?;
        if let Some(sub) = sub {
            def = def.with_sub_dictionary(Dictionary::new(sub.clone())?);
        }
        Ok(def)
    }

    /// A policy holding every default this dictionary declares, including
    /// those of nested dictionaries.
    pub fn defaults(&self) -> Result<Policy> {
        let mut out = Policy::new();
        for name in self.definition_names()? {
            self.make_def(&name)?.set_default_in(&mut out, &name)?;
        }
        Ok(out)
    }

    /// Validate `policy` against this dictionary.
    pub fn validate(&self, policy: &Policy) -> Result<ValidationError> {
        self.validate_with(policy, &ValidateOptions::default())
    }

    /// Validate `policy`, adding faults to an existing report. The report
    /// is left untouched when the dictionary is malformed.
    pub fn validate_into(&self, policy: &Policy, report: &mut ValidationError) -> Result<()> {
        let found = self.validate(policy)?;
        report.merge(&found);
        Ok(())
    }

    /// Validate `policy` with explicit options. The whole dictionary is
    /// checked first, including nested dictionaries the policy never
    /// reaches.
    pub fn validate_with(
        &self,
        policy: &Policy,
        options: &ValidateOptions,
    ) -> Result<ValidationError> {
        self.check()?;
        let mut report = ValidationError::new();
        validate::validate_policy(&self.policy, policy, "", &mut report, options)?;
        debug!(
            faults = report.param_count(),
            flags = report.errors().bits(),
            "validation pass complete"
        );
        Ok(report)
    }
}

impl TryFrom<Policy> for Dictionary {
    type Error = Error;

    fn try_from(policy: Policy) -> Result<Self> {
        Dictionary::new(policy)
    }
}

pub(crate) fn require_definitions(policy: &Policy) -> Result<()> {
    if !policy.exists(DEFINITIONS) {
        return Err(Error::dictionary("no \"definitions\" section found"));
    }
    Ok(())
}

pub(crate) fn definitions_of(policy: &Policy) -> Result<&Policy> {
    let count = policy.value_count(DEFINITIONS);
    match count {
        0 => Err(Error::dictionary("no \"definitions\" section found")),
        1 => policy.get_policy(DEFINITIONS).map_err(|_| {
            let found = policy
                .value_kind(DEFINITIONS)
                .unwrap_or(ValueKind::Undefined);
            Error::dictionary(format!(
                "\"definitions\" must be a Policy; found {found}"
            ))
        }),
        n => Err(Error::dictionary(format!(
            "expected a single \"definitions\" section; found {n}"
        ))),
    }
}

/// Find the definition for a possibly dotted `name` in the dictionary held
/// by `dict`. Its nested dictionary, if any, is returned borrowed.
pub(crate) fn lookup<'p>(
    dict: &'p Policy,
    name: &str,
) -> Result<(Definition, Option<&'p Policy>)> {
    let segments = name::segments(name)?;
    let last = segments.len() - 1;
    let mut dict_policy = dict;
    for (i, segment) in segments.iter().enumerate() {
        let defs = definitions_of(dict_policy)?;
        if !defs.exists(segment) {
            return Err(Error::name_not_found(name));
        }
        let def_policy = defs.get_policy(segment).map_err(|_| {
            Error::dictionary(format!("definition for \"{segment}\" is not a Policy"))
        })?;
        if i == last {
            return Definition::materialize(name, def_policy);
        }
        dict_policy = match def_policy.get("dictionary") {
            Ok(Value::Policy(p)) => p,
            _ => {
                return Err(Error::dictionary(format!(
                    "{segment}.dictionary not found."
                )))
            }
        };
    }
    Err(Error::name_not_found(name))
}

fn check_policy(dict: &Policy) -> Result<()> {
    for leaf in definitions_of(dict)?.names(true) {
        if let (_, Some(sub)) = lookup(dict, &leaf)? {
            check_policy(sub)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people_dictionary() -> Dictionary {
        let mut p = Policy::new();
        p.set("definitions.name.type", "string").unwrap();
        p.set("definitions.name.description", "who").unwrap();
        p.set("definitions.height.type", "int").unwrap();
        p.set("definitions.height.min", 0).unwrap();
        p.set("definitions.height.max", 300).unwrap();
        p.set("definitions.height.minOccurs", 0).unwrap();
        p.set("definitions.height.default", 170).unwrap();
        p.set("definitions.address.type", "Policy").unwrap();
        p.set("definitions.address.minOccurs", 0).unwrap();
        p.set(
            "definitions.address.dictionary.definitions.city.type",
            "string",
        )
        .unwrap();
        p.set(
            "definitions.address.dictionary.definitions.city.default",
            "Tucson",
        )
        .unwrap();
        Dictionary::new(p).unwrap()
    }

    #[test]
    fn new_requires_definitions() {
        let mut p = Policy::new();
        p.set("other", 1).unwrap();
        let err = Dictionary::new(p).unwrap_err();
        assert!(matches!(err, Error::Dictionary(_)));
        assert!(err.to_string().contains("definitions"));
    }

    #[test]
    fn check_rejects_multiple_definitions_sections() {
        let mut p = Policy::new();
        p.add("definitions", Policy::new()).unwrap();
        p.add("definitions", Policy::new()).unwrap();
        let dict = Dictionary::new(p).unwrap();
        let err = dict.check().unwrap_err();
        assert!(err
            .to_string()
            .contains("expected a single \"definitions\" section"));
    }

    #[test]
    fn check_walks_nested_dictionaries() {
        let dict = people_dictionary();
        dict.check().unwrap();

        let mut p = dict.into_policy();
        p.set(
            "definitions.address.dictionary.definitions.zip.type",
            "zipcode",
        )
        .unwrap();
        let dict = Dictionary::new(p).unwrap();
        assert!(dict.check().unwrap_err().to_string().contains("Unknown type"));
    }

    #[test]
    fn make_def_walks_dotted_names() {
        let dict = people_dictionary();
        let def = dict.make_def("address.city").unwrap();
        assert_eq!(def.name(), "address.city");
        assert_eq!(def.kind(), ValueKind::String);

        assert!(matches!(
            dict.make_def("nobody"),
            Err(Error::NameNotFound { .. })
        ));
        assert!(matches!(
            dict.make_def("address.nobody"),
            Err(Error::NameNotFound { .. })
        ));
        assert!(matches!(
            dict.make_def("name.first"),
            Err(Error::Dictionary(_))
        ));
    }

    #[test]
    fn definition_names_are_top_level() {
        let dict = people_dictionary();
        let names: Vec<String> = dict.definition_names().unwrap().collect();
        assert_eq!(names, vec!["name", "height", "address"]);
    }

    #[test]
    fn defaults_collect_nested_values() {
        let defaults = people_dictionary().defaults().unwrap();
        assert_eq!(defaults.get_int("height").unwrap(), 170);
        assert_eq!(defaults.get_string("address.city").unwrap(), "Tucson");
        assert!(!defaults.exists("name"));
    }

    #[test]
    fn validate_into_accumulates() {
        let dict = people_dictionary();
        let mut report = ValidationError::new();
        let empty = Policy::new();
        dict.validate_into(&empty, &mut report).unwrap();
        dict.validate_into(&empty, &mut report).unwrap();
        assert_eq!(report.param_count(), 1);
        assert!(report.errors_for("name").contains(crate::ErrorFlags::MISSING_REQUIRED));
    }

    #[test]
    fn broken_schema_under_absent_key_fails_validation() {
        let mut p = people_dictionary().into_policy();
        p.set(
            "definitions.address.dictionary.definitions.zip.type",
            "zipcode",
        )
        .unwrap();
        let dict = Dictionary::new(p).unwrap();
        let mut policy = Policy::new();
        policy.set("name", "Ray").unwrap();

        let err = dict.validate(&policy).unwrap_err();
        assert!(matches!(err, Error::Dictionary(_)));
        assert!(err.to_string().contains("Unknown type"));
        assert!(dict.validate_into(&policy, &mut ValidationError::new()).is_err());
    }

    #[test]
    fn failed_validate_into_leaves_report_untouched() {
        let mut p = Policy::new();
        p.set("definitions.a.type", "int").unwrap();
        p.set("definitions.b.type", "float").unwrap();
        let dict = Dictionary::new(p).unwrap();

        let mut report = ValidationError::new();
        report.add_error("earlier", crate::ErrorFlags::WRONG_TYPE);
        let before = report.clone();
        assert!(dict.validate_into(&Policy::new(), &mut report).is_err());
        assert_eq!(report, before);
        assert_eq!(report.errors_for("a"), crate::ErrorFlags::OK);
    }
}
