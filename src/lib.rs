//! Materializes packages declared in a `git-packages.json` manifest.
//!
//! Remote packages are fetched as gzip tarballs (one request per archive, however many
//! packages it hosts) and copied out of a staging directory; local packages are symlinked.

pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod fs_util;
pub mod ignore;
pub mod link;
pub mod manifest;
pub mod materialize;
pub mod normalize;
pub mod output;
pub mod pipeline;
