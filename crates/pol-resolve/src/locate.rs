//! Finding installed packages on disk.

use std::collections::HashMap;
use std::env;
use std::io;
use std::path::PathBuf;

use tracing::trace;

/// Maps a package name to its installation directory.
pub trait PackageLocator {
    fn locate(&self, package: &str) -> io::Result<PathBuf>;
}

impl<L: PackageLocator + ?Sized> PackageLocator for &L {
    fn locate(&self, package: &str) -> io::Result<PathBuf> {
        (**self).locate(package)
    }
}

impl<L: PackageLocator + ?Sized> PackageLocator for Box<L> {
    fn locate(&self, package: &str) -> io::Result<PathBuf> {
        (**self).locate(package)
    }
}

/// Locates packages through `<PACKAGE>_DIR` environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvLocator;

impl EnvLocator {
    pub fn new() -> Self {
        Self
    }

    /// The variable consulted for `package`: upper-cased, with `-` mapped
    /// to `_`, followed by `_DIR`.
    pub fn var_name(package: &str) -> String {
        format!("{}_DIR", package.to_ascii_uppercase().replace('-', "_"))
    }
}

impl PackageLocator for EnvLocator {
    fn locate(&self, package: &str) -> io::Result<PathBuf> {
        let var = Self::var_name(package);
        let dir = env::var_os(&var).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("package \"{package}\" is not set up ({var} is not set)"),
            )
        })?;
        trace!(package, var = %var, "package located via environment");
        Ok(PathBuf::from(dir))
    }
}

/// Locates packages from an explicit name-to-directory map.
#[derive(Debug, Clone, Default)]
pub struct StaticLocator {
    packages: HashMap<String, PathBuf>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.insert(package, dir);
        self
    }

    pub fn insert(&mut self, package: impl Into<String>, dir: impl Into<PathBuf>) {
        self.packages.insert(package.into(), dir.into());
    }
}

impl PackageLocator for StaticLocator {
    fn locate(&self, package: &str) -> io::Result<PathBuf> {
        self.packages.get(package).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("package \"{package}\" is not registered"),
            )
        })
    }
}

/// Locates packages as `<root>/<package>` directories under a list of
/// search roots, first match wins.
#[derive(Debug, Clone)]
pub struct SearchPathLocator {
    roots: Vec<PathBuf>,
}

impl SearchPathLocator {
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Platform data directory for installed policy packages.
    pub fn default_root() -> Option<PathBuf> {
        dirs::data_dir().map(|base| base.join("policy").join("packages"))
    }
}

impl Default for SearchPathLocator {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}

impl PackageLocator for SearchPathLocator {
    fn locate(&self, package: &str) -> io::Result<PathBuf> {
        self.roots
            .iter()
            .map(|root| root.join(package))
            .find(|dir| dir.is_dir())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!(
                        "package \"{package}\" not found in {} search root(s)",
                        self.roots.len()
                    ),
                )
            })
    }
}
