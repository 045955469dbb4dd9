//! Lazy name listing over a policy tree.

use std::slice;

use pol_common::name;
use pol_common::ValueKind;

use crate::policy::{Entry, Policy};
use crate::value::Value;

/// Which names a [`Names`] iterator yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NameFilter {
    All,
    Params,
    Policies,
    Files,
}

impl NameFilter {
    fn accepts(self, kind: ValueKind) -> bool {
        match self {
            NameFilter::All => true,
            NameFilter::Params => {
                !matches!(kind, ValueKind::Policy | ValueKind::FileReference)
            }
            NameFilter::Policies => kind == ValueKind::Policy,
            NameFilter::Files => kind == ValueKind::FileReference,
        }
    }
}

#[derive(Debug, Clone)]
struct Level<'a> {
    prefix: String,
    entries: slice::Iter<'a, Entry>,
}

/// Iterator over the (possibly hierarchical) names of a [`Policy`].
///
/// Names come out in insertion order, each parent directly followed by its
/// children. Where a name holds several sub-policies, only the last one is
/// descended into.
#[derive(Debug, Clone)]
pub struct Names<'a> {
    stack: Vec<Level<'a>>,
    top_only: bool,
    filter: NameFilter,
}

impl<'a> Names<'a> {
    pub(crate) fn new(policy: &'a Policy, top_only: bool, filter: NameFilter) -> Self {
        Self {
            stack: vec![Level {
                prefix: String::new(),
                entries: policy.entries().iter(),
            }],
            top_only,
            filter,
        }
    }
}

impl Iterator for Names<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let level = self.stack.last_mut()?;
            let Some(entry) = level.entries.next() else {
                self.stack.pop();
                continue;
            };
            let full = name::join(&level.prefix, &entry.name);
            if !self.top_only {
                if let Some(sub) = entry.values.last().and_then(Value::as_policy) {
                    self.stack.push(Level {
                        prefix: full.clone(),
                        entries: sub.entries().iter(),
                    });
                }
            }
            if self.filter.accepts(entry.kind()) {
                return Some(full);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policy_has_no_names() {
        let p = Policy::new();
        assert_eq!(p.names(false).count(), 0);
        assert_eq!(p.names(true).count(), 0);
    }

    #[test]
    fn deep_nesting_yields_every_level() {
        let mut p = Policy::new();
        p.set("a.b.c.d", 1).unwrap();
        let names: Vec<String> = p.names(false).collect();
        assert_eq!(names, vec!["a", "a.b", "a.b.c", "a.b.c.d"]);
        let params: Vec<String> = p.param_names(false).collect();
        assert_eq!(params, vec!["a.b.c.d"]);
    }

    #[test]
    fn only_last_sub_policy_is_listed() {
        let mut first = Policy::new();
        first.set("old", 1).unwrap();
        let mut second = Policy::new();
        second.set("new", 2).unwrap();
        let mut p = Policy::new();
        p.add("pol", first).unwrap();
        p.add("pol", second).unwrap();
        let names: Vec<String> = p.names(false).collect();
        assert_eq!(names, vec!["pol", "pol.new"]);
    }
}
