use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PackagesError;

/// Separator used by scoped package names (`author:package`).
pub const SCOPE_SEPARATOR: char = ':';

/// Manifest key reserved for the archive host token.
pub const TOKEN_KEY: &str = "token";

/// Replaces the scope separator so the name is safe as a path segment.
pub fn sanitize(name: &str) -> String {
    name.replace(SCOPE_SEPARATOR, "_")
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageName(String);

impl PackageName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name as it appears on disk and in the ignore list.
    pub fn file_name(&self) -> String {
        sanitize(&self.0)
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PackageName {
    type Err = PackagesError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && !trimmed.contains(['/', '\\'])
            && trimmed != "."
            && trimmed != "..";
        if !is_valid {
            return Err(PackagesError::InvalidPackageName(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("token {}", self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn sanitize_replaces_separator() {
        assert_eq!(sanitize("jon:bank-account"), "jon_bank-account");
        assert_eq!(sanitize("a:b:c"), "a_b_c");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize("x:pkg1");
        assert_eq!(sanitize(&once), once);
        assert_eq!(sanitize("plain"), "plain");
    }

    #[test]
    fn parse_package_name() {
        let name: PackageName = " jon:legacy ".parse().unwrap();
        assert_eq!(name.as_str(), "jon:legacy");
        assert_eq!(name.file_name(), "jon_legacy");
    }

    #[test]
    fn parse_package_name_invalid() {
        assert_matches!(
            "".parse::<PackageName>(),
            Err(PackagesError::InvalidPackageName(_))
        );
        assert_matches!(
            "../escape".parse::<PackageName>(),
            Err(PackagesError::InvalidPackageName(_))
        );
    }

    #[test]
    fn token_header_and_redaction() {
        let token = AuthToken::new("abc123").unwrap();
        assert_eq!(token.header_value(), "token abc123");
        assert!(!format!("{token:?}").contains("abc123"));
        assert!(AuthToken::new("  ").is_none());
    }
}
