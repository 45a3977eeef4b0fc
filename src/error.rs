use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PackagesError {
    #[error("missing manifest file {0}")]
    MissingManifest(PathBuf),

    #[error("failed to read manifest at {0}")]
    ManifestRead(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(String),

    #[error("invalid package name: {0:?}")]
    InvalidPackageName(String),

    #[error("unable to resolve home directory for {0}")]
    HomeDirUnavailable(String),

    #[error("archive request failed: {0}")]
    Http(String),

    #[error("archive request to {url} returned status {status}")]
    HttpStatus { status: u16, url: String },

    #[error("invalid request header: {0}")]
    InvalidHeader(String),

    #[error("archive extraction failed: {0}")]
    Extraction(String),

    #[error("archive entry escapes staging directory: {0}")]
    UnsafeArchivePath(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("could not copy {src} to {dest}: {reason}")]
    Copy {
        src: String,
        dest: String,
        reason: String,
    },

    #[error("could not link {src} to {dest}: {reason}")]
    Link {
        src: String,
        dest: String,
        reason: String,
    },

    #[error("directory symlinks are not supported on this platform")]
    UnsupportedSymlink,

    #[error("background task failed: {0}")]
    Task(String),
}

impl PackagesError {
    /// True for faults caused by the manifest or configuration rather than I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PackagesError::MissingManifest(_)
                | PackagesError::ManifestRead(_)
                | PackagesError::ManifestParse(_)
                | PackagesError::InvalidPackageName(_)
                | PackagesError::HomeDirUnavailable(_)
        )
    }
}
