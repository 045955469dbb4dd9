//! Loading policy files and replacing file references with their content.
//!
//! References resolve relative to a base directory. A bare relative path
//! joins the current base. A package URN resolves inside the package's
//! directory, and files loaded through a URN use the package repository as
//! the base for their own references.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use pol_common::{name, Error, Result, ValueKind};
use pol_core::{Dictionary, FileReference, Policy, Value};
use tracing::{debug, trace, warn};

use crate::config::ResolverConfig;
use crate::locate::{EnvLocator, PackageLocator};
use crate::parser::{JsonPolicyParser, PolicyParser};
use crate::urn::{Reference, Target};

/// Key naming a definition's schema file inside a dictionary.
pub const DICTIONARY_FILE: &str = "dictionaryFile";

/// One reference that could not be resolved.
#[derive(Debug)]
pub struct LoadFailure {
    /// Dotted name of the parameter holding the reference.
    pub name: String,
    pub reference: String,
    pub error: Error,
}

/// Outcome of a [`Resolver::load_policy_files`] pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Number of references replaced by their policy.
    pub loaded: usize,
    /// References left unresolved.
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Treat any failure as an error, yielding the first one.
    pub fn into_result(self) -> Result<usize> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.loaded),
        }
    }
}

/// A resolved file and the base directory for references inside it.
struct Located {
    file: PathBuf,
    base: PathBuf,
}

/// Resolves references and loads policy files.
#[derive(Debug, Clone)]
pub struct Resolver<L = EnvLocator, P = JsonPolicyParser> {
    locator: L,
    parser: P,
    config: ResolverConfig,
}

impl Resolver {
    /// JSON policies, packages located through the environment, limits
    /// from [`ResolverConfig::from_env`].
    pub fn new() -> Self {
        Self::with_parts(EnvLocator, JsonPolicyParser, ResolverConfig::from_env())
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: PackageLocator> Resolver<L, JsonPolicyParser> {
    pub fn with_locator(locator: L) -> Self {
        Self::with_parts(locator, JsonPolicyParser, ResolverConfig::default())
    }
}

impl<L: PackageLocator, P: PolicyParser> Resolver<L, P> {
    pub fn with_parts(locator: L, parser: P, config: ResolverConfig) -> Self {
        Self {
            locator,
            parser,
            config,
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    /// The file `reference` designates, following `@` indirections.
    pub fn resolve_path(&self, reference: &str, base: &Path) -> Result<PathBuf> {
        Ok(self.locate_reference(reference, base)?.file)
    }

    /// Load the policy file `reference` designates and resolve every file
    /// reference inside it. Broken nested references are logged and left
    /// unresolved; use [`Resolver::load_with_report`] to inspect them.
    pub fn load(&self, reference: &str, base: &Path) -> Result<Policy> {
        self.load_with_report(reference, base)
            .map(|(policy, _)| policy)
    }

    pub fn load_with_report(&self, reference: &str, base: &Path) -> Result<(Policy, LoadReport)> {
        let located = self.locate_reference(reference, base)?;
        let mut policy = self.read_policy(&located.file)?;
        let mut chain = vec![canonical(&located.file)];
        let mut report = LoadReport::default();
        self.resolve_tree(&mut policy, &located.base, "", &mut chain, &mut report);
        Ok((policy, report))
    }

    /// Replace every file reference in `policy` by the policy it names,
    /// recursively. Each failure is recorded under the dotted name holding
    /// the reference and leaves that name untouched; other names are still
    /// resolved. Running the pass again only retries past failures.
    pub fn load_policy_files(&self, policy: &mut Policy, base: &Path) -> LoadReport {
        let mut chain = Vec::new();
        let mut report = LoadReport::default();
        self.resolve_tree(policy, base, "", &mut chain, &mut report);
        debug!(
            loaded = report.loaded,
            failed = report.failures.len(),
            "resolved policy files"
        );
        report
    }

    /// Load a dictionary, following `dictionaryFile` entries to nested
    /// schema files, and check its integrity. Any unresolved reference is
    /// an error.
    pub fn load_dictionary(&self, reference: &str, base: &Path) -> Result<Dictionary> {
        let located = self.locate_reference(reference, base)?;
        let mut policy = self.read_policy(&located.file)?;
        let mut chain = vec![canonical(&located.file)];
        let mut report = LoadReport::default();
        self.resolve_tree(&mut policy, &located.base, "", &mut chain, &mut report);
        for _ in 0..self.config.max_depth {
            if promote_dictionary_files(&mut policy)? == 0 {
                break;
            }
            self.resolve_tree(&mut policy, &located.base, "", &mut chain, &mut report);
        }
        report.into_result()?;
        let dictionary = Dictionary::new(policy)?;
        dictionary.check()?;
        Ok(dictionary)
    }

    fn locate_reference(&self, reference: &str, base: &Path) -> Result<Located> {
        let mut current = Reference::parse(reference)?;
        let mut current_base = base.to_path_buf();
        let mut visited = HashSet::new();
        loop {
            let located = self.locate_target(&current, &current_base)?;
            if !current.is_indirect() {
                return Ok(located);
            }
            if visited.len() >= self.config.max_indirections
                || !visited.insert(canonical(&located.file))
            {
                return Err(Error::IndirectionLoop {
                    reference: reference.to_string(),
                    limit: self.config.max_indirections,
                });
            }
            let text = fs::read_to_string(&located.file)
                .map_err(|e| Error::io(&located.file, e))?;
            trace!(from = %current, to = text.trim(), "following indirection");
            current = Reference::parse(text.trim())?;
            current_base = located
                .file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
        }
    }

    fn locate_target(&self, reference: &Reference, base: &Path) -> Result<Located> {
        match reference.target() {
            Target::Path(path) => Ok(Located {
                file: base.join(path),
                base: base.to_path_buf(),
            }),
            Target::Package {
                package,
                repository,
                path,
            } => {
                let dir = self.locator.locate(package).map_err(|e| {
                    let mut attempted = PathBuf::from(package);
                    if let Some(repository) = repository {
                        attempted.push(repository);
                    }
                    attempted.push(path);
                    Error::io(attempted, e)
                })?;
                debug!(package = %package, dir = %dir.display(), "located package");
                let repository_dir = match repository {
                    Some(repository) => dir.join(repository),
                    None => dir,
                };
                Ok(Located {
                    file: repository_dir.join(path),
                    base: repository_dir,
                })
            }
        }
    }

    fn read_policy(&self, file: &Path) -> Result<Policy> {
        let text = fs::read_to_string(file).map_err(|e| Error::io(file, e))?;
        let policy = self.parser.parse(&text).map_err(|e| Error::Parse {
            path: file.to_path_buf(),
            detail: e.to_string(),
        })?;
        debug!(path = %file.display(), names = policy.name_count(true), "loaded policy file");
        Ok(policy)
    }

    fn resolve_tree(
        &self,
        policy: &mut Policy,
        base: &Path,
        prefix: &str,
        chain: &mut Vec<PathBuf>,
        report: &mut LoadReport,
    ) {
        let entries: Vec<(String, ValueKind)> = policy
            .iter()
            .map(|(leaf, values)| {
                let kind = values.first().map_or(ValueKind::Undefined, Value::kind);
                (leaf.to_string(), kind)
            })
            .collect();
        for (leaf, kind) in entries {
            let full = name::join(prefix, &leaf);
            match kind {
                ValueKind::FileReference => {
                    self.resolve_entry(policy, &leaf, &full, base, chain, report);
                }
                ValueKind::Policy => {
                    if let Ok(subs) = policy.policies_mut(&leaf) {
                        for sub in subs {
                            self.resolve_tree(sub, base, &full, chain, report);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Resolve every reference under `leaf`; the array is replaced only if
    /// all of them load.
    fn resolve_entry(
        &self,
        policy: &mut Policy,
        leaf: &str,
        full: &str,
        base: &Path,
        chain: &mut Vec<PathBuf>,
        report: &mut LoadReport,
    ) {
        let references: Vec<String> = match policy.get_file_array(leaf) {
            Ok(refs) => refs.iter().map(|r| r.reference().to_string()).collect(),
            Err(_) => return,
        };
        let mut loaded = Vec::with_capacity(references.len());
        for reference in &references {
            match self.load_nested(reference, base, full, chain, report) {
                Ok(sub) => loaded.push(Value::Policy(sub)),
                Err(error) => {
                    warn!(param = %full, reference = %reference, error = %error, "failed to load policy file");
                    report.failures.push(LoadFailure {
                        name: full.to_string(),
                        reference: reference.clone(),
                        error,
                    });
                    return;
                }
            }
        }
        match policy.set_array(leaf, loaded) {
            Ok(()) => report.loaded += references.len(),
            Err(error) => report.failures.push(LoadFailure {
                name: full.to_string(),
                reference: references.join(", "),
                error,
            }),
        }
    }

    fn load_nested(
        &self,
        reference: &str,
        base: &Path,
        full: &str,
        chain: &mut Vec<PathBuf>,
        report: &mut LoadReport,
    ) -> Result<Policy> {
        if chain.len() >= self.config.max_depth {
            return Err(Error::IndirectionLoop {
                reference: reference.to_string(),
                limit: self.config.max_depth,
            });
        }
        let located = self.locate_reference(reference, base)?;
        let key = canonical(&located.file);
        if chain.contains(&key) {
            return Err(Error::ReferenceCycle { path: located.file });
        }
        let mut policy = self.read_policy(&located.file)?;
        chain.push(key);
        self.resolve_tree(&mut policy, &located.base, full, chain, report);
        chain.pop();
        Ok(policy)
    }
}

/// Turn every `<definition>.dictionaryFile` into a `dictionary` file
/// reference on the same definition. Returns the number promoted.
fn promote_dictionary_files(policy: &mut Policy) -> Result<usize> {
    let suffix = format!("{}{DICTIONARY_FILE}", name::SEPARATOR);
    let found: Vec<String> = policy
        .names(false)
        .filter(|n| n.ends_with(&suffix))
        .collect();
    for path in &found {
        let parent = &path[..path.len() - suffix.len()];
        let reference = match policy.get(path)? {
            Value::File(r) => r.clone(),
            Value::String(s) => FileReference::new(s.as_str()),
            other => {
                return Err(Error::dictionary(format!(
                    "{path}: expected a file reference, found {}",
                    other.kind()
                )))
            }
        };
        policy.remove(path);
        policy.get_policy_mut(parent)?.set("dictionary", reference)?;
    }
    Ok(found.len())
}

/// Key used to recognise a file already on the loading chain.
fn canonical(file: &Path) -> PathBuf {
    fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::StaticLocator;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, text: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        path
    }

    fn resolver(pkg: &Path) -> Resolver<StaticLocator> {
        Resolver::with_locator(StaticLocator::new().with_package("pkgA", pkg))
    }

    #[test]
    fn bare_paths_join_the_base() {
        let tmp = TempDir::new().unwrap();
        let r = resolver(tmp.path());
        assert_eq!(
            r.resolve_path("sub/a.json", Path::new("/etc/policies")).unwrap(),
            PathBuf::from("/etc/policies/sub/a.json")
        );
        assert_eq!(
            r.resolve_path("/abs/a.json", Path::new("/etc")).unwrap(),
            PathBuf::from("/abs/a.json")
        );
    }

    #[test]
    fn urns_resolve_inside_the_package() {
        let tmp = TempDir::new().unwrap();
        let r = resolver(tmp.path());
        assert_eq!(
            r.resolve_path("pkgA:tests/urn:level_1.paf", Path::new("/elsewhere"))
                .unwrap(),
            tmp.path().join("tests/urn/level_1.paf")
        );
    }

    #[test]
    fn unknown_package_names_attempted_path() {
        let tmp = TempDir::new().unwrap();
        let err = resolver(tmp.path())
            .resolve_path("pkgB:tests/urn:level_1.paf", tmp.path())
            .unwrap_err();
        match err {
            Error::Io { path, .. } => {
                assert_eq!(path, PathBuf::from("pkgB/tests/urn/level_1.paf"))
            }
            other => panic!("expected Io, got {other}"),
        }
    }

    #[test]
    fn single_indirection_is_followed() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "ptr/current", "  ../real/a.json\n");
        write(tmp.path(), "real/a.json", r#"{"x": 1}"#);
        let r = resolver(tmp.path());
        let path = r.resolve_path("@ptr/current", tmp.path()).unwrap();
        assert_eq!(path, tmp.path().join("ptr").join("../real/a.json"));
        assert_eq!(r.load("@ptr/current", tmp.path()).unwrap().get_int("x").unwrap(), 1);
    }

    #[test]
    fn indirection_loops_are_detected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a", "@b");
        write(tmp.path(), "b", "@a");
        let err = resolver(tmp.path()).resolve_path("@a", tmp.path()).unwrap_err();
        assert!(matches!(err, Error::IndirectionLoop { .. }));
    }

    #[test]
    fn parse_errors_carry_the_path() {
        let tmp = TempDir::new().unwrap();
        let file = write(tmp.path(), "bad.json", "{ nope");
        let err = resolver(tmp.path()).load("bad.json", tmp.path()).unwrap_err();
        match err {
            Error::Parse { path, .. } => assert_eq!(path, file),
            other => panic!("expected Parse, got {other}"),
        }
    }

    #[test]
    fn references_resolve_transitively() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "top.json", r#"{"sub": {"$ref": "mid.json"}}"#);
        write(tmp.path(), "mid.json", r#"{"inner": {"$ref": "leaf.json"}}"#);
        write(tmp.path(), "leaf.json", r#"{"x": 42}"#);
        let (p, report) = resolver(tmp.path())
            .load_with_report("top.json", tmp.path())
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.loaded, 2);
        assert_eq!(p.get_int("sub.inner.x").unwrap(), 42);
    }

    #[test]
    fn broken_reference_does_not_stop_siblings() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "good.json", r#"{"ok": true}"#);
        let mut p = Policy::new();
        p.set("a.broken", FileReference::new("missing.json")).unwrap();
        p.set("b", FileReference::new("good.json")).unwrap();
        let report = resolver(tmp.path()).load_policy_files(&mut p, tmp.path());
        assert_eq!(report.loaded, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "a.broken");
        assert!(matches!(report.failures[0].error, Error::Io { .. }));
        assert_eq!(p.value_kind("a.broken").unwrap(), ValueKind::FileReference);
        assert!(p.get_bool("b.ok").unwrap());
        assert!(report.into_result().is_err());
    }

    #[test]
    fn arrays_are_replaced_all_or_nothing() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "one.json", r#"{"n": 1}"#);
        let mut p = Policy::new();
        p.add("subs", FileReference::new("one.json")).unwrap();
        p.add("subs", FileReference::new("two.json")).unwrap();
        let report = resolver(tmp.path()).load_policy_files(&mut p, tmp.path());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(p.get_file_array("subs").unwrap().len(), 2);

        write(tmp.path(), "two.json", r#"{"n": 2}"#);
        let report = resolver(tmp.path()).load_policy_files(&mut p, tmp.path());
        assert!(report.is_complete());
        let ns: Vec<i64> = p
            .get_policy_array("subs")
            .unwrap()
            .iter()
            .map(|s| s.get_int("n").unwrap())
            .collect();
        assert_eq!(ns, vec![1, 2]);
    }

    #[test]
    fn resolution_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "leaf.json", r#"{"x": 1}"#);
        let mut p = Policy::new();
        p.set("sub", FileReference::new("leaf.json")).unwrap();
        let r = resolver(tmp.path());
        r.load_policy_files(&mut p, tmp.path());
        let once = p.clone();
        let report = r.load_policy_files(&mut p, tmp.path());
        assert_eq!(report.loaded, 0);
        assert_eq!(p, once);
    }

    #[test]
    fn cycles_are_reported() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.json", r#"{"next": {"$ref": "b.json"}}"#);
        write(tmp.path(), "b.json", r#"{"back": {"$ref": "a.json"}}"#);
        let (p, report) = resolver(tmp.path())
            .load_with_report("a.json", tmp.path())
            .unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "next.back");
        assert!(matches!(report.failures[0].error, Error::ReferenceCycle { .. }));
        assert_eq!(p.value_kind("next.back").unwrap(), ValueKind::FileReference);
    }

    #[test]
    fn depth_is_bounded() {
        let tmp = TempDir::new().unwrap();
        for i in 0..5 {
            write(
                tmp.path(),
                &format!("l{i}.json"),
                &format!(r#"{{"next": {{"$ref": "l{}.json"}}}}"#, i + 1),
            );
        }
        write(tmp.path(), "l5.json", r#"{"end": true}"#);
        let r = resolver(tmp.path()).with_config(ResolverConfig::new().with_max_depth(2));
        let (_, report) = r.load_with_report("l0.json", tmp.path()).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].error,
            Error::IndirectionLoop { limit: 2, .. }
        ));
    }

    #[test]
    fn dictionary_files_are_promoted() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "dict.json",
            r#"{"definitions": {"address": {"type": "Policy",
                "dictionaryFile": "address_dict.json"}}}"#,
        );
        write(
            tmp.path(),
            "address_dict.json",
            r#"{"definitions": {"zip": {"type": "int"}}}"#,
        );
        let dict = resolver(tmp.path())
            .load_dictionary("dict.json", tmp.path())
            .unwrap();
        let def = dict.make_def("address.zip").unwrap();
        assert_eq!(def.kind(), ValueKind::Int);
    }

    #[test]
    fn broken_dictionary_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "dict.json",
            r#"{"definitions": {"a": {"type": "Policy", "dictionaryFile": "nope.json"}}}"#,
        );
        let err = resolver(tmp.path())
            .load_dictionary("dict.json", tmp.path())
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
