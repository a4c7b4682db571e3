//! External release host abstraction

use std::path::PathBuf;

#[cfg(test)]
use mockall::automock;

use crate::mirror::error::PublishError;

/// A file attached to a release under a public asset name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub path: PathBuf,
    pub name: String,
}

/// A release to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelease {
    pub tag: String,
    pub title: String,
    pub notes: String,
    pub assets: Vec<ReleaseAsset>,
}

/// Trait for the host that mirrored artifacts are published to
///
/// A release either exists with all of its assets or not at all:
/// `create_release` must not leave a partially uploaded release behind.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ReleaseStore: Send + Sync {
    async fn release_exists(&self, tag: &str) -> Result<bool, PublishError>;

    /// Delete the release and its tag; deleting a missing release succeeds
    async fn delete_release(&self, tag: &str) -> Result<(), PublishError>;

    async fn create_release(&self, release: &NewRelease) -> Result<(), PublishError>;

    /// Public URL of an asset, without scheme
    fn download_url(&self, tag: &str, filename: &str) -> String;
}
