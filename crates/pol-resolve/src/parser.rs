//! Policy file formats.
//!
//! The JSON mapping:
//! - an object is a sub-policy, keys are single-segment names
//! - an array holds the values of a multi-valued name; it must be non-empty
//!   in effect (empty arrays are skipped), flat, and of one kind
//! - `{"$ref": "<reference>"}` is an unresolved file reference
//! - integers without a fractional part are ints, other numbers doubles
//! - `null` is not a value

use pol_common::name::SEPARATOR;
use pol_core::{FileReference, Policy, Value};
use serde_json::{Map, Number, Value as Json};
use thiserror::Error;

/// Key marking an object as a file reference.
pub const REF_KEY: &str = "$ref";

/// A policy document could not be turned into a [`Policy`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ParseError {
    message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn at(path: &str, message: impl std::fmt::Display) -> Self {
        Self::new(format!("{path}: {message}"))
    }
}

/// Turns the text of a policy file into a [`Policy`].
pub trait PolicyParser {
    fn parse(&self, text: &str) -> Result<Policy, ParseError>;
}

impl<P: PolicyParser + ?Sized> PolicyParser for &P {
    fn parse(&self, text: &str) -> Result<Policy, ParseError> {
        (**self).parse(text)
    }
}

/// Parser for JSON policy documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPolicyParser;

impl JsonPolicyParser {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyParser for JsonPolicyParser {
    fn parse(&self, text: &str) -> Result<Policy, ParseError> {
        let doc: Json = serde_json::from_str(text)
            .map_err(|e| ParseError::new(format!("invalid JSON: {e}")))?;
        match doc {
            Json::Object(map) => object_to_policy(&map, ""),
            other => Err(ParseError::new(format!(
                "a policy document must be a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

fn object_to_policy(map: &Map<String, Json>, at: &str) -> Result<Policy, ParseError> {
    let mut policy = Policy::new();
    for (key, json) in map {
        let path = if at.is_empty() {
            key.clone()
        } else {
            format!("{at}{SEPARATOR}{key}")
        };
        if key.is_empty() || key.contains(SEPARATOR) {
            return Err(ParseError::at(&path, "names may not be empty or contain '.'"));
        }
        match json {
            Json::Array(items) => {
                if items.is_empty() {
                    continue;
                }
                let values = items
                    .iter()
                    .map(|item| match item {
                        Json::Array(_) => Err(ParseError::at(&path, "nested arrays are not supported")),
                        other => to_value(other, &path),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                policy
                    .set_array(key, values)
                    .map_err(|e| ParseError::at(&path, e))?;
            }
            other => {
                let value = to_value(other, &path)?;
                policy.set(key, value).map_err(|e| ParseError::at(&path, e))?;
            }
        }
    }
    Ok(policy)
}

fn to_value(json: &Json, path: &str) -> Result<Value, ParseError> {
    match json {
        Json::Null => Err(ParseError::at(path, "null is not a value")),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => Ok(number_to_value(n)),
        Json::String(s) => Ok(Value::String(s.clone())),
        Json::Array(_) => Err(ParseError::at(path, "unexpected array")),
        Json::Object(map) => match reference_of(map) {
            Some(reference) => Ok(Value::File(FileReference::new(reference))),
            None => Ok(Value::Policy(object_to_policy(map, path)?)),
        },
    }
}

fn number_to_value(n: &Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Int(i),
        None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
    }
}

fn reference_of(map: &Map<String, Json>) -> Option<&str> {
    if map.len() != 1 {
        return None;
    }
    map.get(REF_KEY).and_then(Json::as_str)
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

/// Render a policy as a JSON object, the inverse of [`JsonPolicyParser`].
///
/// Single values are written as scalars and multiple values as arrays.
pub fn policy_to_json(policy: &Policy) -> Json {
    let mut map = Map::new();
    for (name, values) in policy.iter() {
        let json = match values {
            [single] => value_to_json(single),
            many => Json::Array(many.iter().map(value_to_json).collect()),
        };
        map.insert(name.to_string(), json);
    }
    Json::Object(map)
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Undefined => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Double(d) => Number::from_f64(*d).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s.clone()),
        Value::Policy(p) => policy_to_json(p),
        Value::File(r) => {
            let mut map = Map::new();
            map.insert(REF_KEY.to_string(), Json::String(r.reference().to_string()));
            Json::Object(map)
        }
    }
}
