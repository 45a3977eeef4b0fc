use std::collections::BTreeMap;
use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PackagesConfig;
use crate::domain::{AuthToken, TOKEN_KEY};
use crate::error::PackagesError;

pub const DEFAULT_MANIFEST_FILE: &str = "git-packages.json";

/// Parsed manifest: package key (or archive url for repository lists) to its value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ManifestValue {
    Repository(Vec<NamedDescriptor>),
    Descriptor(Descriptor),
    Text(String),
    Other(Value),
}

/// Singleton form. `tarball` present means remote, absent means local.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Descriptor {
    #[serde(default, rename = "tarball", skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Member of a repository list; the archive url is the enclosing manifest key.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NamedDescriptor {
    pub name: String,
    #[serde(default, rename = "path", skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

impl ManifestValue {
    pub fn is_falsy(&self) -> bool {
        match self {
            ManifestValue::Repository(members) => members.is_empty(),
            ManifestValue::Descriptor(_) => false,
            ManifestValue::Text(text) => text.is_empty(),
            ManifestValue::Other(value) => match value {
                Value::Null => true,
                Value::Bool(flag) => !flag,
                Value::Number(number) => number.as_f64() == Some(0.0),
                _ => false,
            },
        }
    }
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self, PackagesError> {
        serde_json::from_str(content).map_err(|err| PackagesError::ManifestParse(err.to_string()))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ManifestValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Package entries: everything except the reserved token key and falsy values.
    pub fn package_entries(&self) -> impl Iterator<Item = (&str, &ManifestValue)> {
        self.entries()
            .filter(|(key, value)| *key != TOKEN_KEY && !value.is_falsy())
    }

    pub fn token(&self) -> Option<AuthToken> {
        match self.entries.get(TOKEN_KEY)? {
            ManifestValue::Text(text) => AuthToken::new(text.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.package_entries().next().is_none()
    }
}

pub struct ManifestLoader;

impl ManifestLoader {
    /// Reads the manifest at `path`, or `git-packages.json` in the working directory.
    pub fn load(config: &PackagesConfig, path: Option<&str>) -> Result<Manifest, PackagesError> {
        let manifest_path = match path {
            Some(path) => config.resolve_path(path)?,
            None => config.working_dir().join(DEFAULT_MANIFEST_FILE),
        };

        if path.is_none() && !manifest_path.as_std_path().exists() {
            return Err(PackagesError::MissingManifest(
                manifest_path.into_std_path_buf(),
            ));
        }

        let content = fs::read_to_string(manifest_path.as_std_path())
            .map_err(|_| PackagesError::ManifestRead(manifest_path.clone().into_std_path_buf()))?;
        Manifest::parse(&content)
    }
}
