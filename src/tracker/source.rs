//! Source trait for fetching a tool's current version from one kind of upstream

#[cfg(test)]
use mockall::automock;

use crate::tracker::error::ResolveError;
use crate::tracker::types::{SourceKind, ToolSource};

/// Trait for fetching the current authoritative version of a tool
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait VersionSource: Send + Sync {
    /// Returns the kind of source this implementation handles
    fn source_kind(&self) -> SourceKind;

    /// Fetches the current version described by `source`
    ///
    /// # Returns
    /// * `Ok(String)` - The version string, with any leading `v` removed
    /// * `Err(ResolveError)` - If the fetch fails or nothing matches
    async fn fetch_latest(&self, source: &ToolSource) -> Result<String, ResolveError>;
}

/// Builds a reqwest client with the shared user agent and a request timeout
pub(crate) fn http_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(crate::config::USER_AGENT)
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client")
}

/// Strips a single leading `v` from a release tag
pub(crate) fn strip_tag_prefix(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}
