use std::io;
use std::path::Path;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde::Serialize;
use tracing::debug;

use crate::config::PackagesConfig;
use crate::error::PackagesError;
use crate::fs_util::remove_entry;
use crate::normalize::LocalPackage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedPackage {
    pub name: String,
    pub path: String,
    pub target: String,
}

/// Replaces `package_dir/<sanitized name>` with a directory symlink to each local path.
pub async fn link_packages(
    packages: &[LocalPackage],
    config: &PackagesConfig,
) -> Result<Vec<LinkedPackage>, PackagesError> {
    tokio::fs::create_dir_all(config.package_dir().as_std_path())
        .await
        .map_err(|err| PackagesError::Filesystem(err.to_string()))?;

    let mut links = FuturesUnordered::new();
    for package in packages {
        let src = config.resolve_path(&package.path)?;
        let dest = config.package_path(&package.name.file_name());
        let name = package.name.to_string();
        links.push(async move {
            let link_error = |reason: String| PackagesError::Link {
                src: src.to_string(),
                dest: dest.to_string(),
                reason,
            };
            if !tokio::fs::try_exists(src.as_std_path())
                .await
                .map_err(|err| link_error(err.to_string()))?
            {
                return Err(link_error("source path does not exist".to_string()));
            }

            let remove_target = dest.clone().into_std_path_buf();
            tokio::task::spawn_blocking(move || remove_entry(&remove_target))
                .await
                .map_err(|err| PackagesError::Task(err.to_string()))?
                .map_err(|err| link_error(err.to_string()))?;

            debug!(package = %name, src = %src, "linking package");
            symlink_dir(src.as_std_path(), dest.as_std_path())
                .await
                .map_err(|err| match err.kind() {
                    io::ErrorKind::Unsupported => PackagesError::UnsupportedSymlink,
                    _ => link_error(err.to_string()),
                })?;

            Ok::<_, PackagesError>(LinkedPackage {
                name,
                path: dest.to_string(),
                target: src.to_string(),
            })
        });
    }

    let mut linked = Vec::with_capacity(links.len());
    while let Some(result) = links.next().await {
        linked.push(result?);
    }
    linked.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(linked)
}

#[cfg(unix)]
async fn symlink_dir(src: &Path, dest: &Path) -> io::Result<()> {
    tokio::fs::symlink(src, dest).await
}

#[cfg(windows)]
async fn symlink_dir(src: &Path, dest: &Path) -> io::Result<()> {
    tokio::fs::symlink_dir(src, dest).await
}

#[cfg(not(any(unix, windows)))]
async fn symlink_dir(_src: &Path, _dest: &Path) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}
