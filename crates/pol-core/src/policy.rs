//! The policy data tree.
//!
//! A [`Policy`] is an ordered mapping from single-segment names to non-empty
//! arrays of same-kind [`Value`]s. Hierarchical names (`a.b.c`) walk through
//! nested sub-policies; where a name holds an array of sub-policies, the walk
//! continues through the most recently added one.
//!
//! Array semantics: `add` appends, `set` replaces the whole array with a
//! single value, and scalar reads return the last element.

use pol_common::name::{self, SEPARATOR};
use pol_common::{Error, Result, ValueKind};

use crate::names::{NameFilter, Names};
use crate::value::{FileReference, Value};

/// One name and its values. `values` is never empty and holds a single kind.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Entry {
    pub(crate) name: String,
    pub(crate) values: Vec<Value>,
}

impl Entry {
    fn new(name: &str, value: Value) -> Self {
        Self {
            name: name.to_string(),
            values: vec![value],
        }
    }

    pub(crate) fn kind(&self) -> ValueKind {
        self.values
            .first()
            .map(Value::kind)
            .unwrap_or(ValueKind::Undefined)
    }
}

/// A hierarchical, typed, multi-valued configuration tree.
///
/// Cloning is a deep copy; sub-policies are never shared between trees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Policy {
    entries: Vec<Entry>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this policy holds no names at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the top-level names and their value arrays, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.values.as_slice()))
    }

    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries
    }

    fn entry_index(&self, leaf: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == leaf)
    }

    fn entry(&self, leaf: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == leaf)
    }

    // ── Read access ─────────────────────────────────────────────────────

    /// Follow a hierarchical path of sub-policy names. Unresolved file
    /// references are never dereferenced.
    fn sub_policy(&self, path: &str) -> Option<&Policy> {
        let mut cur = self;
        for seg in path.split(SEPARATOR) {
            cur = cur.entry(seg)?.values.last()?.as_policy()?;
        }
        Some(cur)
    }

    fn lookup(&self, path: &str) -> Option<&[Value]> {
        if name::validate(path).is_err() {
            return None;
        }
        let (parent, leaf) = name::split_leaf(path);
        let holder = match parent {
            Some(parent) => self.sub_policy(parent)?,
            None => self,
        };
        holder.entry(leaf).map(|e| e.values.as_slice())
    }

    fn require(&self, path: &str) -> Result<&[Value]> {
        if path.is_empty() {
            return Err(Error::name_not_found(path));
        }
        name::validate(path)?;
        self.lookup(path)
            .ok_or_else(|| Error::name_not_found(path))
    }

    /// Whether a value exists under `path`.
    pub fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Number of values stored under `path`; 0 when absent.
    pub fn value_count(&self, path: &str) -> usize {
        self.lookup(path).map_or(0, <[Value]>::len)
    }

    /// Whether `path` holds more than one value.
    pub fn is_array(&self, path: &str) -> bool {
        self.value_count(path) > 1
    }

    /// The kind of the values stored under `path`.
    pub fn value_kind(&self, path: &str) -> Result<ValueKind> {
        Ok(self.get(path)?.kind())
    }

    /// The most recently added value under `path`.
    pub fn get(&self, path: &str) -> Result<&Value> {
        self.require(path)?
            .last()
            .ok_or_else(|| Error::name_not_found(path))
    }

    /// All values under `path`, in insertion order.
    pub fn get_array(&self, path: &str) -> Result<&[Value]> {
        self.require(path)
    }

    fn typed<'a, T>(
        &'a self,
        path: &str,
        expected: ValueKind,
        extract: impl Fn(&'a Value) -> Option<T>,
    ) -> Result<T> {
        let value = self.get(path)?;
        extract(value).ok_or_else(|| Error::WrongType {
            name: path.to_string(),
            expected,
            found: value.kind(),
        })
    }

    fn typed_array<'a, T>(
        &'a self,
        path: &str,
        expected: ValueKind,
        extract: impl Fn(&'a Value) -> Option<T>,
    ) -> Result<Vec<T>> {
        let values = self.require(path)?;
        values
            .iter()
            .map(|v| {
                extract(v).ok_or_else(|| Error::WrongType {
                    name: path.to_string(),
                    expected,
                    found: v.kind(),
                })
            })
            .collect()
    }

    pub fn get_bool(&self, path: &str) -> Result<bool> {
        self.typed(path, ValueKind::Bool, Value::as_bool)
    }

    pub fn get_int(&self, path: &str) -> Result<i64> {
        self.typed(path, ValueKind::Int, Value::as_int)
    }

    pub fn get_double(&self, path: &str) -> Result<f64> {
        self.typed(path, ValueKind::Double, Value::as_double)
    }

    pub fn get_string(&self, path: &str) -> Result<&str> {
        self.typed(path, ValueKind::String, Value::as_str)
    }

    pub fn get_policy(&self, path: &str) -> Result<&Policy> {
        self.typed(path, ValueKind::Policy, Value::as_policy)
    }

    pub fn get_file(&self, path: &str) -> Result<&FileReference> {
        self.typed(path, ValueKind::FileReference, Value::as_file)
    }

    pub fn get_bool_array(&self, path: &str) -> Result<Vec<bool>> {
        self.typed_array(path, ValueKind::Bool, Value::as_bool)
    }

    pub fn get_int_array(&self, path: &str) -> Result<Vec<i64>> {
        self.typed_array(path, ValueKind::Int, Value::as_int)
    }

    pub fn get_double_array(&self, path: &str) -> Result<Vec<f64>> {
        self.typed_array(path, ValueKind::Double, Value::as_double)
    }

    pub fn get_string_array(&self, path: &str) -> Result<Vec<&str>> {
        self.typed_array(path, ValueKind::String, Value::as_str)
    }

    pub fn get_policy_array(&self, path: &str) -> Result<Vec<&Policy>> {
        self.typed_array(path, ValueKind::Policy, Value::as_policy)
    }

    pub fn get_file_array(&self, path: &str) -> Result<Vec<&FileReference>> {
        self.typed_array(path, ValueKind::FileReference, Value::as_file)
    }

    // ── Write access ────────────────────────────────────────────────────

    /// Descend into the sub-policy named `leaf`, optionally creating it.
    /// `full` is the path walked so far, for error messages.
    fn child_policy_mut(&mut self, leaf: &str, create: bool, full: &str) -> Result<&mut Policy> {
        let idx = match self.entry_index(leaf) {
            Some(idx) => idx,
            None if create => {
                self.entries
                    .push(Entry::new(leaf, Value::Policy(Policy::new())));
                self.entries.len() - 1
            }
            None => return Err(Error::name_not_found(full)),
        };
        let last = self.entries[idx]
            .values
            .last_mut()
            .ok_or_else(|| Error::name_not_found(full))?;
        let found = last.kind();
        last.as_policy_mut().ok_or_else(|| Error::WrongType {
            name: full.to_string(),
            expected: ValueKind::Policy,
            found,
        })
    }

    /// The policy that directly holds the final segment of `path`.
    fn holder_mut<'p>(&mut self, path: &'p str, create: bool) -> Result<(&mut Policy, &'p str)> {
        name::validate(path)?;
        let (parent, leaf) = name::split_leaf(path);
        let mut cur = self;
        if let Some(parent) = parent {
            let mut offset = 0;
            for seg in parent.split(SEPARATOR) {
                let end = offset + seg.len();
                cur = cur.child_policy_mut(seg, create, &path[..end])?;
                offset = end + 1;
            }
        }
        Ok((cur, leaf))
    }

    /// Replace whatever is stored under `path` with the single `value`.
    ///
    /// Intermediate sub-policies are created as needed. Storing
    /// [`Value::Undefined`] is rejected; use [`Policy::remove`] instead.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if value.is_undefined() {
            return Err(Error::InvalidValue {
                name: path.to_string(),
                reason: "values must be defined; use remove() instead".to_string(),
            });
        }
        let (holder, leaf) = self.holder_mut(path, true)?;
        match holder.entry_index(leaf) {
            Some(idx) => holder.entries[idx].values = vec![value],
            None => holder.entries.push(Entry::new(leaf, value)),
        }
        Ok(())
    }

    /// Append `value` to the array under `path`.
    ///
    /// The value must have the same kind as the values already stored there.
    pub fn add(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if value.is_undefined() {
            return Err(Error::InvalidValue {
                name: path.to_string(),
                reason: "values must be defined".to_string(),
            });
        }
        let (holder, leaf) = self.holder_mut(path, true)?;
        match holder.entry_index(leaf) {
            Some(idx) => {
                let entry = &mut holder.entries[idx];
                let expected = entry.kind();
                if value.kind() != expected {
                    return Err(Error::WrongType {
                        name: path.to_string(),
                        expected,
                        found: value.kind(),
                    });
                }
                entry.values.push(value);
            }
            None => holder.entries.push(Entry::new(leaf, value)),
        }
        Ok(())
    }

    /// Replace the array under `path` with `values`.
    ///
    /// The array must be non-empty and hold a single kind.
    pub fn set_array(&mut self, path: &str, values: Vec<Value>) -> Result<()> {
        let Some(first) = values.first() else {
            return Err(Error::InvalidValue {
                name: path.to_string(),
                reason: "arrays may not be empty; use remove() instead".to_string(),
            });
        };
        let expected = first.kind();
        if let Some(odd) = values.iter().find(|v| v.kind() != expected) {
            return Err(Error::WrongType {
                name: path.to_string(),
                expected,
                found: odd.kind(),
            });
        }
        if expected == ValueKind::Undefined {
            return Err(Error::InvalidValue {
                name: path.to_string(),
                reason: "values must be defined".to_string(),
            });
        }
        let (holder, leaf) = self.holder_mut(path, true)?;
        match holder.entry_index(leaf) {
            Some(idx) => holder.entries[idx].values = values,
            None => holder.entries.push(Entry {
                name: leaf.to_string(),
                values,
            }),
        }
        Ok(())
    }

    /// Remove every value under `path`, returning them.
    pub fn remove(&mut self, path: &str) -> Option<Vec<Value>> {
        let (holder, leaf) = self.holder_mut(path, false).ok()?;
        let idx = holder.entry_index(leaf)?;
        Some(holder.entries.remove(idx).values)
    }

    /// Remove the most recently added value under `path`. Removing the last
    /// value removes the name.
    pub fn pop(&mut self, path: &str) -> Option<Value> {
        let (holder, leaf) = self.holder_mut(path, false).ok()?;
        let idx = holder.entry_index(leaf)?;
        let value = holder.entries[idx].values.pop();
        if holder.entries[idx].values.is_empty() {
            holder.entries.remove(idx);
        }
        value
    }

    /// Mutable access to the sub-policy stored under `path`.
    pub fn get_policy_mut(&mut self, path: &str) -> Result<&mut Policy> {
        let (holder, leaf) = self.holder_mut(path, false)?;
        holder.child_policy_mut(leaf, false, path)
    }

    /// Mutable access to every sub-policy in the array under `path`.
    pub fn policies_mut(&mut self, path: &str) -> Result<impl Iterator<Item = &mut Policy>> {
        let (holder, leaf) = self.holder_mut(path, false)?;
        let idx = holder
            .entry_index(leaf)
            .ok_or_else(|| Error::name_not_found(path))?;
        let entry = &mut holder.entries[idx];
        let found = entry.kind();
        if found != ValueKind::Policy {
            return Err(Error::WrongType {
                name: path.to_string(),
                expected: ValueKind::Policy,
                found,
            });
        }
        Ok(entry.values.iter_mut().filter_map(Value::as_policy_mut))
    }

    /// Fill in every name from `defaults` that this policy lacks.
    ///
    /// Names already present are never overwritten. Where both trees hold
    /// sub-policies under the same name, each of this policy's sub-policies
    /// is filled from the last sub-policy in `defaults`. Returns the number
    /// of names filled.
    pub fn merge_defaults(&mut self, defaults: &Policy) -> usize {
        let mut filled = 0;
        for entry in &defaults.entries {
            match self.entry_index(&entry.name) {
                None => {
                    self.entries.push(entry.clone());
                    filled += 1;
                }
                Some(idx) => {
                    let Some(default_sub) = entry.values.last().and_then(Value::as_policy) else {
                        continue;
                    };
                    for value in &mut self.entries[idx].values {
                        if let Value::Policy(sub) = value {
                            filled += sub.merge_defaults(default_sub);
                        }
                    }
                }
            }
        }
        filled
    }

    // ── Name listing ────────────────────────────────────────────────────

    /// Names in this policy.
    ///
    /// With `top_only`, only the immediate children; otherwise every
    /// terminal and intermediate name, parents before their children. The
    /// returned iterator is lazy and can be restarted by cloning it.
    pub fn names(&self, top_only: bool) -> Names<'_> {
        Names::new(self, top_only, NameFilter::All)
    }

    /// Names holding plain parameters (neither sub-policies nor files).
    pub fn param_names(&self, top_only: bool) -> Names<'_> {
        Names::new(self, top_only, NameFilter::Params)
    }

    /// Names holding sub-policies.
    pub fn policy_names(&self, top_only: bool) -> Names<'_> {
        Names::new(self, top_only, NameFilter::Policies)
    }

    /// Names holding unresolved file references.
    pub fn file_names(&self, top_only: bool) -> Names<'_> {
        Names::new(self, top_only, NameFilter::Files)
    }

    pub fn name_count(&self, top_only: bool) -> usize {
        if top_only {
            self.entries.len()
        } else {
            self.names(false).count()
        }
    }
}
