use std::path::PathBuf;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde::Serialize;
use tempfile::Builder;
use tracing::{debug, info};

use crate::config::{PackagesConfig, STAGING_PREFIX};
use crate::domain::AuthToken;
use crate::error::PackagesError;
use crate::fetcher::ArchiveFetcher;
use crate::ignore::{IgnoreResult, ensure_ignored};
use crate::link::{LinkedPackage, link_packages};
use crate::manifest::Manifest;
use crate::materialize::{MaterializedPackage, materialize};
use crate::normalize::{ArchiveGroup, local_packages, normalize};

#[derive(Debug, Clone, Default, Serialize)]
pub struct AcquireResult {
    pub archives: usize,
    pub packages: Vec<MaterializedPackage>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkResult {
    pub packages: Vec<LinkedPackage>,
}

/// Runs the acquire, link and ignore operations against one package directory.
#[derive(Clone)]
pub struct Pipeline<F: ArchiveFetcher> {
    config: PackagesConfig,
    fetcher: F,
}

impl<F: ArchiveFetcher> Pipeline<F> {
    pub fn new(config: PackagesConfig, fetcher: F) -> Self {
        Self { config, fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetches every archive the manifest references once and copies the requested
    /// sub-paths into the package directory.
    ///
    /// Groups run concurrently; the staging root is removed only after all of them have
    /// been materialized. On failure the first error is returned and the remaining groups
    /// are dropped without further cleanup guarantees.
    pub async fn acquire(&self, manifest: &Manifest) -> Result<AcquireResult, PackagesError> {
        let groups = normalize(manifest)?;
        let package_dir = self.config.package_dir();
        tokio::fs::create_dir_all(package_dir.as_std_path())
            .await
            .map_err(|err| PackagesError::Filesystem(err.to_string()))?;

        if groups.is_empty() {
            info!("no remote packages to fetch");
            return Ok(AcquireResult::default());
        }

        let staging = Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(package_dir.as_std_path())
            .map_err(|err| PackagesError::Filesystem(err.to_string()))?;
        let token = manifest.token();

        info!(archives = groups.len(), "fetching archives");
        let mut in_flight = FuturesUnordered::new();
        for (index, group) in groups.iter().enumerate() {
            let staging_dir = staging.path().join(index.to_string());
            in_flight.push(self.acquire_group(group, staging_dir, token.as_ref()));
        }

        // Join barrier: the stream ends only after every group has reported.
        let mut packages = Vec::new();
        while let Some(result) = in_flight.next().await {
            packages.extend(result?);
            debug!(remaining = in_flight.len(), "archive group done");
        }

        staging
            .close()
            .map_err(|err| PackagesError::Filesystem(err.to_string()))?;
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        info!(packages = packages.len(), "packages copied");

        Ok(AcquireResult {
            archives: groups.len(),
            packages,
        })
    }

    async fn acquire_group(
        &self,
        group: &ArchiveGroup,
        staging_dir: PathBuf,
        token: Option<&AuthToken>,
    ) -> Result<Vec<MaterializedPackage>, PackagesError> {
        info!(url = %group.archive_url, packages = group.packages.len(), "downloading archive");
        self.fetcher
            .fetch(&group.archive_url, token, &staging_dir)
            .await?;
        materialize(
            &group.packages,
            &staging_dir,
            self.config.package_dir(),
            &group.archive_url,
        )
        .await
    }

    /// Symlinks every local package of the manifest into the package directory.
    pub async fn link(&self, manifest: &Manifest) -> Result<LinkResult, PackagesError> {
        let locals = local_packages(manifest)?;
        info!(packages = locals.len(), "linking local packages");
        let packages = link_packages(&locals, &self.config).await?;
        Ok(LinkResult { packages })
    }

    pub async fn ensure_ignored(&self, manifest: &Manifest) -> Result<IgnoreResult, PackagesError> {
        ensure_ignored(manifest, self.config.ignore_file().as_std_path()).await
    }
}
