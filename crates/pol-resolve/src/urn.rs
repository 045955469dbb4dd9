//! Policy file references.
//!
//! A reference is either a plain file path or a package URN:
//!
//! ```text
//! [@ | @@] [urn:eupspkg:] <package> : [<repository> :] <path>
//! ```
//!
//! The `urn:eupspkg:` prefix is matched case-insensitively. A single leading
//! `@` marks an indirection: the named file holds the text of another
//! reference rather than a policy. Two or more `@`s are an alias and carry no
//! indirection.

use std::fmt;
use std::path::{Path, PathBuf};

use pol_common::{Error, Result};

/// Prefix naming the package scheme.
pub const URN_PREFIX: &str = "urn:eupspkg:";

const TERM_SEPARATOR: char = ':';

/// How a reference's target should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Indirection {
    /// The target is a policy file.
    #[default]
    None,
    /// `@`: the target holds another reference.
    Single,
    /// `@@` or more: an alias for the plain reference.
    Alias,
}

/// Where a reference points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// A file path, relative to the current base directory unless absolute.
    Path(PathBuf),
    /// A file inside an installed package.
    Package {
        package: String,
        repository: Option<String>,
        path: PathBuf,
    },
}

/// A parsed policy file reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    indirection: Indirection,
    target: Target,
}

impl Reference {
    /// Parse a reference string.
    pub fn parse(reference: &str) -> Result<Self> {
        let trimmed = reference.trim();
        let ats = trimmed.chars().take_while(|c| *c == '@').count();
        let indirection = match ats {
            0 => Indirection::None,
            1 => Indirection::Single,
            _ => Indirection::Alias,
        };
        let rest = &trimmed[ats..];
        let (prefixed, body) = strip_urn_prefix(rest);

        if !prefixed && !body.contains(TERM_SEPARATOR) {
            if body.is_empty() {
                return Err(Error::bad_name(reference, "empty reference"));
            }
            return Ok(Self {
                indirection,
                target: Target::Path(PathBuf::from(body)),
            });
        }

        let terms: Vec<&str> = body.split(TERM_SEPARATOR).collect();
        let (package, repository, path) = match terms.as_slice() {
            [package, path] => (*package, None, *path),
            [package, repository, path] => (*package, Some(*repository), *path),
            _ => {
                return Err(Error::bad_name(
                    reference,
                    format!("Wrong number of terms: {}", terms.len()),
                ))
            }
        };
        if package.is_empty() {
            return Err(Error::bad_name(reference, "empty package name"));
        }
        if path.is_empty() {
            return Err(Error::bad_name(reference, "empty path"));
        }

        Ok(Self {
            indirection,
            target: Target::Package {
                package: package.to_string(),
                repository: repository.filter(|r| !r.is_empty()).map(str::to_string),
                path: PathBuf::from(path),
            },
        })
    }

    pub fn indirection(&self) -> Indirection {
        self.indirection
    }

    /// Whether the target holds another reference instead of a policy.
    pub fn is_indirect(&self) -> bool {
        self.indirection == Indirection::Single
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn is_urn(&self) -> bool {
        matches!(self.target, Target::Package { .. })
    }

    pub fn package(&self) -> Option<&str> {
        match &self.target {
            Target::Package { package, .. } => Some(package),
            Target::Path(_) => None,
        }
    }

    pub fn repository(&self) -> Option<&str> {
        match &self.target {
            Target::Package { repository, .. } => repository.as_deref(),
            Target::Path(_) => None,
        }
    }

    /// The file path, relative to the package repository for URNs.
    pub fn path(&self) -> &Path {
        match &self.target {
            Target::Package { path, .. } | Target::Path(path) => path,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.indirection {
            Indirection::None => {}
            Indirection::Single => f.write_str("@")?,
            Indirection::Alias => f.write_str("@@")?,
        }
        match &self.target {
            Target::Path(path) => write!(f, "{}", path.display()),
            Target::Package {
                package,
                repository,
                path,
            } => {
                write!(f, "{URN_PREFIX}{package}{TERM_SEPARATOR}")?;
                if let Some(repository) = repository {
                    write!(f, "{repository}{TERM_SEPARATOR}")?;
                }
                write!(f, "{}", path.display())
            }
        }
    }
}

impl std::str::FromStr for Reference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Reference::parse(s)
    }
}

/// Whether `reference` would be read as a package URN rather than a path.
pub fn looks_like_urn(reference: &str) -> bool {
    let rest = reference.trim().trim_start_matches('@');
    let (prefixed, body) = strip_urn_prefix(rest);
    prefixed || body.contains(TERM_SEPARATOR)
}

fn strip_urn_prefix(s: &str) -> (bool, &str) {
    match s.get(..URN_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(URN_PREFIX) => (true, &s[URN_PREFIX.len()..]),
        _ => (false, s),
    }
}
