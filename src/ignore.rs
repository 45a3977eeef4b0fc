use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::domain::{TOKEN_KEY, sanitize};
use crate::error::PackagesError;
use crate::manifest::{Manifest, ManifestValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IgnoreResult {
    pub path: String,
    pub added: Vec<String>,
}

/// Sanitized names for every manifest key except the token; repository lists expand to
/// their members. Falsy values still reserve their key.
pub fn ignore_names(manifest: &Manifest) -> Vec<String> {
    let mut names = Vec::new();
    for (key, value) in manifest.entries().filter(|(key, _)| *key != TOKEN_KEY) {
        match value {
            ManifestValue::Repository(members) => {
                names.extend(members.iter().map(|member| sanitize(member.name.trim())));
            }
            _ => names.push(sanitize(key.trim())),
        }
    }
    names
}

/// Appends every manifest package missing from the ignore file, creating it if needed.
pub async fn ensure_ignored(
    manifest: &Manifest,
    ignore_file: &Path,
) -> Result<IgnoreResult, PackagesError> {
    if let Some(parent) = ignore_file.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| PackagesError::Filesystem(err.to_string()))?;
    }
    let mut contents = match tokio::fs::read_to_string(ignore_file).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(PackagesError::Filesystem(err.to_string())),
    };

    let mut present: HashSet<String> = contents.lines().map(|line| line.trim().to_string()).collect();
    let mut added = Vec::new();
    for name in ignore_names(manifest) {
        if name.is_empty() || present.contains(&name) {
            continue;
        }
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        contents.push_str(&name);
        contents.push('\n');
        present.insert(name.clone());
        added.push(name);
    }

    debug!(path = %ignore_file.display(), added = added.len(), "updating ignore list");
    tokio::fs::write(ignore_file, contents)
        .await
        .map_err(|err| PackagesError::Filesystem(err.to_string()))?;

    Ok(IgnoreResult {
        path: ignore_file.display().to_string(),
        added,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_expand_lists_and_skip_token() {
        let manifest = Manifest::parse(
            r#"{
                "https://host/a.tar.gz": [{"name": "x:pkg1"}, {"name": "x:pkg2"}],
                "jon:legacy": {"tarball": "https://host/b.tar.gz"},
                "jon:disabled": null,
                "token": "abc123"
            }"#,
        )
        .unwrap();
        let mut names = ignore_names(&manifest);
        names.sort();
        assert_eq!(names, vec!["jon_disabled", "jon_legacy", "x_pkg1", "x_pkg2"]);
    }
}
