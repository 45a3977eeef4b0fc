use std::collections::BTreeMap;
use std::path::Path;

use camino::Utf8Path;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde::Serialize;
use tracing::debug;

use crate::domain::PackageName;
use crate::error::PackagesError;
use crate::fs_util::replace_with_copy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedPackage {
    pub name: String,
    pub path: String,
    pub source: String,
}

/// Copies each `sub_path` of the staging directory to `package_dir/<sanitized name>`.
///
/// Prior contents at each destination are removed first. Resolves after every copy has
/// finished; the first failure aborts the rest.
pub async fn materialize(
    packages: &BTreeMap<PackageName, String>,
    staging_dir: &Path,
    package_dir: &Utf8Path,
    archive_url: &str,
) -> Result<Vec<MaterializedPackage>, PackagesError> {
    let mut copies = FuturesUnordered::new();
    for (name, sub_path) in packages {
        let src = staging_dir.join(sub_path);
        let dest = package_dir.join(name.file_name()).into_std_path_buf();
        let summary = MaterializedPackage {
            name: name.to_string(),
            path: dest.display().to_string(),
            source: format!("{archive_url}#{sub_path}"),
        };
        copies.push(async move {
            debug!(package = %summary.name, src = %src.display(), "copying package");
            let task_src = src.clone();
            let task_dest = dest.clone();
            tokio::task::spawn_blocking(move || replace_with_copy(&task_src, &task_dest))
                .await
                .map_err(|err| PackagesError::Task(err.to_string()))?
                .map_err(|err| PackagesError::Copy {
                    src: src.display().to_string(),
                    dest: dest.display().to_string(),
                    reason: err.to_string(),
                })?;
            Ok::<_, PackagesError>(summary)
        });
    }

    let mut done = Vec::with_capacity(copies.len());
    while let Some(result) = copies.next().await {
        done.push(result?);
    }
    done.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(done)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;

    fn package_map(pairs: &[(&str, &str)]) -> BTreeMap<PackageName, String> {
        pairs
            .iter()
            .map(|(name, path)| (name.parse().unwrap(), path.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn copies_sub_paths_to_sanitized_names() {
        let staging = tempfile::tempdir().unwrap();
        fs::create_dir_all(staging.path().join("p1/inner")).unwrap();
        fs::write(staging.path().join("p1/inner/a.txt"), "a").unwrap();
        fs::create_dir_all(staging.path().join("p2")).unwrap();
        fs::write(staging.path().join("p2/b.txt"), "b").unwrap();

        let out = tempfile::tempdir().unwrap();
        let package_dir = Utf8PathBuf::from_path_buf(out.path().to_path_buf()).unwrap();
        let done = materialize(
            &package_map(&[("x:pkg1", "p1"), ("x:pkg2", "p2")]),
            staging.path(),
            &package_dir,
            "https://host/a.tar.gz",
        )
        .await
        .unwrap();

        assert_eq!(done.len(), 2);
        assert_eq!(
            fs::read_to_string(out.path().join("x_pkg1/inner/a.txt")).unwrap(),
            "a"
        );
        assert_eq!(fs::read_to_string(out.path().join("x_pkg2/b.txt")).unwrap(), "b");
    }

    #[tokio::test]
    async fn missing_sub_path_fails() {
        let staging = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let package_dir = Utf8PathBuf::from_path_buf(out.path().to_path_buf()).unwrap();
        let err = materialize(
            &package_map(&[("x:pkg", "nope")]),
            staging.path(),
            &package_dir,
            "https://host/a.tar.gz",
        )
        .await
        .unwrap_err();
        assert_matches!(err, PackagesError::Copy { .. });
    }
}
