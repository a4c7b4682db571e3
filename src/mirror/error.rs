use thiserror::Error;

use crate::tracker::error::ResolveError;

/// Failure while talking to the external release host
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("GitHub API error: {status} {reason}")]
    Api { status: u16, reason: String },

    #[error("Failed to read asset: {0}")]
    Io(#[from] std::io::Error),
}

impl PublishError {
    pub(crate) fn api(status: reqwest::StatusCode) -> Self {
        PublishError::Api {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}

/// Failure of a single mirror item
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Mirror repository is not configured")]
    Config,

    #[error(transparent)]
    Catalog(#[from] ResolveError),

    #[error("{0}")]
    Negotiation(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Download failed - file not created")]
    MissingFile,

    #[error("Invalid asset filename: {0:?}")]
    InvalidFilename(String),

    #[error("Duplicate asset name in batch: {0}")]
    DuplicateAsset(String),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
