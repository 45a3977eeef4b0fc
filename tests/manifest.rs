use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use git_packages::config::PackagesConfig;
use git_packages::error::PackagesError;
use git_packages::manifest::{DEFAULT_MANIFEST_FILE, ManifestLoader};
use git_packages::normalize::normalize;

fn config_in(dir: &std::path::Path) -> PackagesConfig {
    let root = Utf8PathBuf::from_path_buf(dir.to_path_buf()).unwrap();
    PackagesConfig::new_with_paths(root.join("packages"), root, None)
}

#[test]
fn loads_default_manifest_from_working_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(DEFAULT_MANIFEST_FILE),
        r#"{"jon:legacy": {"tarball": "https://host/b.tar.gz", "path": "legacy"}}"#,
    )
    .unwrap();

    let manifest = ManifestLoader::load(&config_in(dir.path()), None).unwrap();
    let groups = normalize(&manifest).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].archive_url, "https://host/b.tar.gz");
}

#[test]
fn loads_explicit_relative_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("conf")).unwrap();
    fs::write(dir.path().join("conf/packages.json"), r#"{"token": "t"}"#).unwrap();

    let manifest = ManifestLoader::load(&config_in(dir.path()), Some("conf/packages.json")).unwrap();
    assert!(manifest.is_empty());
    assert!(manifest.token().is_some());
}

#[test]
fn missing_default_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let err = ManifestLoader::load(&config_in(dir.path()), None).unwrap_err();
    assert_matches!(err, PackagesError::MissingManifest(_));
    assert!(err.is_configuration());
}

#[test]
fn unreadable_and_malformed_manifests() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let err = ManifestLoader::load(&config, Some("absent.json")).unwrap_err();
    assert_matches!(err, PackagesError::ManifestRead(_));

    fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
    let err = ManifestLoader::load(&config, Some("bad.json")).unwrap_err();
    assert_matches!(err, PackagesError::ManifestParse(_));
}
