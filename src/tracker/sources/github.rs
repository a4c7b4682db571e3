//! GitHub Releases API source
//!
//! Uses the `/releases/latest` endpoint, which only ever returns the newest
//! stable release: pre-releases and drafts are excluded by the API itself.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::FETCH_TIMEOUT;
use crate::tracker::error::ResolveError;
use crate::tracker::source::{VersionSource, http_client, strip_tag_prefix};
use crate::tracker::types::{SourceKind, ToolSource};

/// Default base URL for GitHub API
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

const SERVICE: &str = "GitHub API";

/// Response from GitHub Releases API
#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Source implementation for GitHub Releases API
pub struct GitHubSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubSource {
    /// Creates a new GitHubSource with a custom base URL
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: http_client(FETCH_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }
}

impl Default for GitHubSource {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, None)
    }
}

#[async_trait::async_trait]
impl VersionSource for GitHubSource {
    fn source_kind(&self) -> SourceKind {
        SourceKind::TagFeed
    }

    async fn fetch_latest(&self, source: &ToolSource) -> Result<String, ResolveError> {
        let ToolSource::Github { repo } = source else {
            return Err(ResolveError::InvalidResponse(format!(
                "GitHub source cannot resolve {:?} tools",
                source.kind()
            )));
        };

        let url = format!("{}/repos/{}/releases/latest", self.base_url, repo);
        let tag = fetch_release_tag(&self.client, &url, self.token.as_deref(), repo).await?;
        Ok(strip_tag_prefix(&tag).to_string())
    }
}

/// Fetch the `tag_name` of a "latest release" document
///
/// Shared with the custom strategies that fall back to a GitHub release feed.
pub(crate) async fn fetch_release_tag(
    client: &reqwest::Client,
    url: &str,
    token: Option<&str>,
    repo: &str,
) -> Result<String, ResolveError> {
    debug!("Fetching latest GitHub release: {}", url);

    let mut request = client
        .get(url)
        .header("Accept", "application/vnd.github+json");
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ResolveError::NotFound {
            kind: "Release",
            name: repo.to_string(),
        });
    }

    if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::TOO_MANY_REQUESTS
    {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(ResolveError::RateLimited {
            service: SERVICE,
            retry_after_secs: retry_after,
        });
    }

    if !status.is_success() {
        warn!("GitHub API returned status {}: {}", status, url);
        return Err(ResolveError::api(SERVICE, status));
    }

    let release: Release = response.json().await.map_err(|e| {
        warn!("Failed to parse GitHub release response: {}", e);
        ResolveError::InvalidResponse(e.to_string())
    })?;

    Ok(release.tag_name)
}
