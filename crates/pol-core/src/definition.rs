//! Single-parameter definitions materialized from a dictionary.

use pol_common::{Error, Result, ValueKind};

use crate::dictionary::{self, Dictionary};
use crate::policy::Policy;
use crate::report::ErrorFlags;
use crate::value::Value;

/// The schema for one parameter.
///
/// Built from a definition sub-policy with the keys `type`, `minOccurs`,
/// `maxOccurs`, `min`, `max`, `allowed`, `default`, `description` and
/// `dictionary`. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    name: String,
    kind: ValueKind,
    min_occurs: usize,
    max_occurs: Option<usize>,
    min: Option<Value>,
    max: Option<Value>,
    allowed: Vec<Value>,
    default: Vec<Value>,
    description: Option<String>,
    dictionary: Option<Dictionary>,
}

impl Definition {
    /// Materialize the definition of `name` from its definition policy.
    pub fn from_policy(name: &str, fields: &Policy) -> Result<Self> {
        let (def, sub) = Self::materialize(name, fields)?;
        match sub {
            Some(p) => Ok(def.with_sub_dictionary(Dictionary::new(p.clone())?)),
            None => Ok(def),
        }
    }

    pub(crate) fn with_sub_dictionary(mut self, dictionary: Dictionary) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Like [`Definition::from_policy`], but the nested dictionary is handed
    /// back borrowed instead of being attached.
    pub(crate) fn materialize<'p>(
        name: &str,
        fields: &'p Policy,
    ) -> Result<(Self, Option<&'p Policy>)> {
        let kind = declared_kind(name, fields)?;
        let min_occurs = if fields.exists("minOccurs") {
            occurs(name, fields, "minOccurs")?.unwrap_or(0)
        } else {
            1
        };
        // An absent maxOccurs never contradicts an explicit minOccurs.
        let max_occurs = if fields.exists("maxOccurs") {
            occurs(name, fields, "maxOccurs")?
        } else {
            Some(min_occurs.max(1))
        };
        if let Some(max) = max_occurs.filter(|max| min_occurs > *max) {
            return Err(Error::dictionary(format!(
                "{name}: minOccurs ({min_occurs}) exceeds maxOccurs ({max})"
            )));
        }

        let mut bounds = Bounds::default();
        bounds.take(name, kind, fields)?;
        let mut allowed = Vec::new();
        if let Ok(entries) = fields.get_array("allowed") {
            for entry in entries {
                match entry {
                    Value::Policy(p) => {
                        bounds.take(name, kind, p)?;
                        if let Ok(values) = p.get_array("value") {
                            for v in values {
                                allowed.push(coerce(name, kind, "allowed", v)?);
                            }
                        }
                    }
                    other => allowed.push(coerce(name, kind, "allowed", other)?),
                }
            }
        }

        let default = match fields.get_array("default") {
            Ok(values) => values
                .iter()
                .map(|v| coerce(name, kind, "default", v))
                .collect::<Result<Vec<_>>>()?,
            Err(_) => Vec::new(),
        };

        let description = fields.get_string("description").ok().map(str::to_string);

        let sub = match fields.get("dictionary") {
            Err(_) => None,
            Ok(value) => {
                if kind != ValueKind::Policy {
                    return Err(Error::dictionary(format!(
                        "{name}: a \"dictionary\" is only allowed for type \"Policy\", not \"{kind}\""
                    )));
                }
                match value {
                    Value::Policy(p) => {
                        dictionary::require_definitions(p)?;
                        Some(p)
                    }
                    Value::File(r) => {
                        return Err(Error::dictionary(format!(
                            "{name}: \"dictionary\" file {r} has not been loaded"
                        )))
                    }
                    other => {
                        return Err(Error::dictionary(format!(
                            "Wrong type for {name} \"dictionary\": expected Policy, but found {}.",
                            other.kind()
                        )))
                    }
                }
            }
        };

        let def = Self {
            name: name.to_string(),
            kind,
            min_occurs,
            max_occurs,
            min: bounds.min,
            max: bounds.max,
            allowed,
            default,
            description,
            dictionary: None,
        };
        Ok((def, sub))
    }

    /// The (possibly dotted) parameter name this definition describes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type; `Undefined` accepts any kind.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn min_occurs(&self) -> usize {
        self.min_occurs
    }

    /// `None` means unbounded.
    pub fn max_occurs(&self) -> Option<usize> {
        self.max_occurs
    }

    pub fn is_required(&self) -> bool {
        self.min_occurs > 0
    }

    pub fn min(&self) -> Option<&Value> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&Value> {
        self.max.as_ref()
    }

    pub fn allowed_values(&self) -> &[Value] {
        &self.allowed
    }

    pub fn default_values(&self) -> &[Value] {
        &self.default
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The nested dictionary for `Policy`-typed parameters.
    pub fn sub_dictionary(&self) -> Option<&Dictionary> {
        self.dictionary.as_ref()
    }

    /// Faults for a single value of the declared kind: membership in the
    /// allowed set and the `[min, max]` range. Values that cannot be
    /// compared with a bound are out of range.
    pub fn check_value(&self, value: &Value) -> ErrorFlags {
        let mut flags = ErrorFlags::OK;
        if !self.allowed.is_empty() && !self.allowed.contains(value) {
            flags |= ErrorFlags::VALUE_DISALLOWED;
        }
        let below = self
            .min
            .as_ref()
            .is_some_and(|min| value.compare(min).map_or(true, |o| o.is_lt()));
        let above = self
            .max
            .as_ref()
            .is_some_and(|max| value.compare(max).map_or(true, |o| o.is_gt()));
        if below || above {
            flags |= ErrorFlags::VALUE_OUT_OF_RANGE;
        }
        flags
    }

    /// Store this definition's default under `at` in `policy`.
    ///
    /// An explicit `default` wins; otherwise a sub-dictionary's defaults are
    /// collected into a sub-policy. Nothing is written when neither yields
    /// a value.
    pub fn set_default_in(&self, policy: &mut Policy, at: &str) -> Result<()> {
        if !self.default.is_empty() {
            return policy.set_array(at, self.default.clone());
        }
        if let Some(dict) = &self.dictionary {
            let sub = dict.defaults()?;
            if !sub.is_empty() {
                policy.set(at, sub)?;
            }
        }
        Ok(())
    }
}

fn declared_kind(name: &str, fields: &Policy) -> Result<ValueKind> {
    let Ok(value) = fields.get("type") else {
        return Ok(ValueKind::Undefined);
    };
    let Some(type_name) = value.as_str() else {
        return Err(Error::dictionary(format!(
            "{name}: Expected string for \"type\"; found {} instead.",
            value.kind()
        )));
    };
    match ValueKind::from_name(type_name) {
        None => Err(Error::dictionary(format!(
            "{name}: Unknown type: \"{type_name}\"."
        ))),
        Some(ValueKind::FileReference) => Err(Error::dictionary(format!(
            "{name}: Illegal type: \"{type_name}\"; use \"{}\" instead.",
            ValueKind::Policy
        ))),
        Some(kind) => Ok(kind),
    }
}

/// Read an occurrence bound. Negative values mean unbounded.
fn occurs(name: &str, fields: &Policy, key: &str) -> Result<Option<usize>> {
    let Ok(value) = fields.get(key) else {
        return Ok(None);
    };
    match value.as_int() {
        Some(n) if n < 0 => Ok(None),
        Some(n) => Ok(Some(usize::try_from(n).unwrap_or(usize::MAX))),
        None => Err(Error::dictionary(format!(
            "{name}: \"{key}\" must be an int, found {}",
            value.kind()
        ))),
    }
}

/// Check a schema-supplied value against the declared kind. An int is
/// accepted where a double is declared.
fn coerce(name: &str, kind: ValueKind, what: &str, value: &Value) -> Result<Value> {
    match (kind, value) {
        (ValueKind::Double, Value::Int(i)) => Ok(Value::Double(*i as f64)),
        (ValueKind::Undefined, v) => Ok(v.clone()),
        (k, v) if v.kind() == k => Ok(v.clone()),
        (k, v) => Err(Error::dictionary(format!(
            "Wrong type for {name} {what} value: expected {k}, found {}.",
            v.kind()
        ))),
    }
}

#[derive(Default)]
struct Bounds {
    min: Option<Value>,
    max: Option<Value>,
}

impl Bounds {
    fn take(&mut self, name: &str, kind: ValueKind, source: &Policy) -> Result<()> {
        for (key, slot, label) in [
            ("min", &mut self.min, "Min"),
            ("max", &mut self.max, "Max"),
        ] {
            let Ok(value) = source.get(key) else {
                continue;
            };
            if slot.is_some() || source.value_count(key) > 1 {
                return Err(Error::dictionary(format!(
                    "{label} value for {name} already specified; additional value not allowed."
                )));
            }
            *slot = Some(coerce(name, kind, key, value)?);
        }
        Ok(())
    }
}
