use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use directories::BaseDirs;

use crate::error::PackagesError;

pub const DEFAULT_PACKAGE_DIR: &str = "packages";
pub const IGNORE_FILE: &str = ".gitignore";
pub const STAGING_PREFIX: &str = ".mgp-staging";

/// Where packages are materialized and how relative paths are resolved.
///
/// Passed explicitly to every run so independent runs never share state.
#[derive(Debug, Clone)]
pub struct PackagesConfig {
    package_dir: Utf8PathBuf,
    working_dir: Utf8PathBuf,
    home_dir: Option<Utf8PathBuf>,
}

impl PackagesConfig {
    /// Uses the process working directory and the user's home directory.
    pub fn new() -> Result<Self, PackagesError> {
        let cwd =
            std::env::current_dir().map_err(|err| PackagesError::Filesystem(err.to_string()))?;
        let working_dir = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| PackagesError::Filesystem("invalid working directory".to_string()))?;
        let home_dir = BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.home_dir().to_path_buf()).ok());

        Ok(Self::new_with_paths(
            working_dir.join(DEFAULT_PACKAGE_DIR),
            working_dir,
            home_dir,
        ))
    }

    pub fn new_with_paths(
        package_dir: Utf8PathBuf,
        working_dir: Utf8PathBuf,
        home_dir: Option<Utf8PathBuf>,
    ) -> Self {
        Self {
            package_dir,
            working_dir,
            home_dir,
        }
    }

    /// Replaces the package directory; `~` and relative paths are resolved.
    pub fn with_package_dir(mut self, package_dir: &str) -> Result<Self, PackagesError> {
        self.package_dir = self.resolve_path(package_dir)?;
        Ok(self)
    }

    pub fn package_dir(&self) -> &Utf8Path {
        &self.package_dir
    }

    pub fn working_dir(&self) -> &Utf8Path {
        &self.working_dir
    }

    pub fn home_dir(&self) -> Option<&Utf8Path> {
        self.home_dir.as_deref()
    }

    pub fn ignore_file(&self) -> Utf8PathBuf {
        self.package_dir.join(IGNORE_FILE)
    }

    pub fn package_path(&self, file_name: &str) -> Utf8PathBuf {
        self.package_dir.join(file_name)
    }

    pub fn resolve_path(&self, input: &str) -> Result<Utf8PathBuf, PackagesError> {
        resolve_path(input, &self.working_dir, self.home_dir.as_deref())
    }
}

/// Expands a leading `~`, anchors relative paths at `working_dir` and folds `.`/`..`.
pub fn resolve_path(
    input: &str,
    working_dir: &Utf8Path,
    home_dir: Option<&Utf8Path>,
) -> Result<Utf8PathBuf, PackagesError> {
    let expanded = match input.strip_prefix('~') {
        Some(rest) => {
            let home =
                home_dir.ok_or_else(|| PackagesError::HomeDirUnavailable(input.to_string()))?;
            let rest = rest.trim_start_matches(['/', '\\']);
            if rest.is_empty() {
                home.to_path_buf()
            } else {
                home.join(rest)
            }
        }
        None => Utf8PathBuf::from(input),
    };

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        working_dir.join(expanded)
    };
    Ok(normalize_lexically(&absolute))
}

fn normalize_lexically(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_str()),
        }
    }
    out
}
