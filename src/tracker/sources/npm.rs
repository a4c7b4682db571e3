//! npm registry source

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::FETCH_TIMEOUT;
use crate::tracker::error::ResolveError;
use crate::tracker::source::{VersionSource, http_client};
use crate::tracker::types::{SourceKind, ToolSource};

/// Default base URL for npm registry
pub const DEFAULT_BASE_URL: &str = "https://registry.npmjs.org";

const SERVICE: &str = "npm registry";

/// Response from the npm `/<package>/latest` endpoint
#[derive(Debug, Deserialize)]
struct LatestManifest {
    version: String,
}

/// Source implementation for the npm registry
pub struct NpmSource {
    client: reqwest::Client,
    base_url: String,
}

impl NpmSource {
    /// Creates a new NpmSource with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: http_client(FETCH_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Encode package name for URL (handles scoped packages)
    fn encode_package_name(package_name: &str) -> String {
        if package_name.starts_with('@') {
            // Scoped package: @scope/name -> @scope%2Fname
            package_name.replace('/', "%2F")
        } else {
            package_name.to_string()
        }
    }
}

impl Default for NpmSource {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait::async_trait]
impl VersionSource for NpmSource {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Registry
    }

    async fn fetch_latest(&self, source: &ToolSource) -> Result<String, ResolveError> {
        let ToolSource::Npm { package } = source else {
            return Err(ResolveError::InvalidResponse(format!(
                "npm source cannot resolve {:?} tools",
                source.kind()
            )));
        };

        let url = format!(
            "{}/{}/latest",
            self.base_url,
            Self::encode_package_name(package)
        );
        debug!("Fetching npm package: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            warn!("npm registry returned status {}: {}", status, url);
            return Err(ResolveError::api(SERVICE, status));
        }

        let manifest: LatestManifest = response.json().await.map_err(|e| {
            warn!("Failed to parse npm registry response: {}", e);
            ResolveError::InvalidResponse(e.to_string())
        })?;

        Ok(manifest.version)
    }
}
