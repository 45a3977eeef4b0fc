//! Turns the manifest into archive groups and local packages.
//!
//! Every manifest value is classified once into a [`SourceDescriptor`]; the rest of the
//! pipeline only ever sees the classified form.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::domain::PackageName;
use crate::error::PackagesError;
use crate::manifest::{Descriptor, Manifest, ManifestValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// `{ "path": ... }` without a tarball.
    Local { path: String },
    /// `{ "tarball": ..., "path": ... }` keyed by package name.
    Remote { archive_url: String, sub_path: String },
    /// Member of a repository list keyed by archive url.
    NamedRemote { archive_url: String, sub_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSource {
    pub name: PackageName,
    pub descriptor: SourceDescriptor,
}

/// All packages extracted from one archive, keyed by package name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveGroup {
    pub archive_url: String,
    pub packages: BTreeMap<PackageName, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPackage {
    pub name: PackageName,
    pub path: String,
}

/// Classifies every package entry of the manifest.
///
/// Entries that are neither remote nor carry a local path are skipped, as are values of an
/// unrecognized shape.
pub fn classify(manifest: &Manifest) -> Result<Vec<PackageSource>, PackagesError> {
    let mut sources = Vec::new();
    for (key, value) in manifest.package_entries() {
        match value {
            ManifestValue::Repository(members) => {
                for member in members {
                    sources.push(PackageSource {
                        name: member.name.parse()?,
                        descriptor: SourceDescriptor::NamedRemote {
                            archive_url: key.to_string(),
                            sub_path: clean_sub_path(member.sub_path.as_deref()),
                        },
                    });
                }
            }
            ManifestValue::Descriptor(descriptor) => {
                let Some(descriptor) = classify_descriptor(descriptor) else {
                    warn!(package = key, "skipping entry without tarball or path");
                    continue;
                };
                sources.push(PackageSource {
                    name: key.parse()?,
                    descriptor,
                });
            }
            ManifestValue::Text(_) | ManifestValue::Other(_) => {
                warn!(package = key, "skipping entry with unrecognized value");
            }
        }
    }
    Ok(sources)
}

fn classify_descriptor(descriptor: &Descriptor) -> Option<SourceDescriptor> {
    match (&descriptor.archive_url, &descriptor.path) {
        (Some(url), path) if !url.is_empty() => Some(SourceDescriptor::Remote {
            archive_url: url.clone(),
            sub_path: clean_sub_path(path.as_deref()),
        }),
        (_, Some(path)) if !path.is_empty() => Some(SourceDescriptor::Local { path: path.clone() }),
        _ => None,
    }
}

fn clean_sub_path(sub_path: Option<&str>) -> String {
    sub_path
        .unwrap_or_default()
        .trim_matches(['/', '\\'])
        .to_string()
}

/// Groups remote packages so each archive url appears in exactly one group.
pub fn normalize(manifest: &Manifest) -> Result<Vec<ArchiveGroup>, PackagesError> {
    let mut groups: BTreeMap<String, ArchiveGroup> = BTreeMap::new();
    for source in classify(manifest)? {
        let (archive_url, sub_path) = match source.descriptor {
            SourceDescriptor::Remote {
                archive_url,
                sub_path,
            }
            | SourceDescriptor::NamedRemote {
                archive_url,
                sub_path,
            } => (archive_url, sub_path),
            SourceDescriptor::Local { .. } => continue,
        };
        groups
            .entry(archive_url.clone())
            .or_insert_with(|| ArchiveGroup {
                archive_url,
                packages: BTreeMap::new(),
            })
            .packages
            .insert(source.name, sub_path);
    }
    Ok(groups.into_values().collect())
}

pub fn local_packages(manifest: &Manifest) -> Result<Vec<LocalPackage>, PackagesError> {
    Ok(classify(manifest)?
        .into_iter()
        .filter_map(|source| match source.descriptor {
            SourceDescriptor::Local { path } => Some(LocalPackage {
                name: source.name,
                path,
            }),
            _ => None,
        })
        .collect())
}
