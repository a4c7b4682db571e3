//! VS Code Marketplace catalog
//!
//! The catalog is queried in two places:
//! - [`MarketplaceSource`] resolves the newest *stable* version of an extension
//! - the asset mirror locates the VSIX package for an exact version/platform

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::FETCH_TIMEOUT;
use crate::tracker::error::ResolveError;
use crate::tracker::source::{VersionSource, http_client};
use crate::tracker::types::{SourceKind, ToolSource};

/// Default base URL for the marketplace gallery API
pub const DEFAULT_BASE_URL: &str = "https://marketplace.visualstudio.com";

const SERVICE: &str = "VS Code Marketplace";

/// Filter type selecting an extension by `publisher.name`
const FILTER_BY_EXTENSION_NAME: u32 = 7;

/// Query flags
const INCLUDE_VERSIONS: u32 = 0x1;
const INCLUDE_FILES: u32 = 0x2;
const INCLUDE_VERSION_PROPERTIES: u32 = 0x10;

/// Version property marking an explicit pre-release
pub const PRE_RELEASE_PROPERTY: &str = "Microsoft.VisualStudio.Code.PreRelease";

/// Asset type of the installable extension package
pub const VSIX_ASSET_TYPE: &str = "Microsoft.VisualStudio.Services.VSIXPackage";

/// Build numbers longer than this are treated as pre-release timestamps
const MAX_STABLE_BUILD_DIGITS: usize = 4;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    extensions: Vec<Extension>,
}

#[derive(Debug, Deserialize)]
struct Extension {
    #[serde(default)]
    versions: Vec<VersionEntry>,
}

/// One version entry of an extension, as listed by the catalog
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub version: String,
    #[serde(default)]
    pub target_platform: Option<String>,
    #[serde(default)]
    pub properties: Option<Vec<VersionProperty>>,
    #[serde(default)]
    pub files: Option<Vec<VersionFile>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct VersionProperty {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionFile {
    pub asset_type: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl VersionEntry {
    /// Whether this entry is a pre-release
    ///
    /// An explicit pre-release property wins. Without it, a purely numeric
    /// final segment longer than four digits is a build timestamp
    /// (e.g. `1.17.10291017`) and marks a pre-release too.
    pub fn is_prerelease(&self) -> bool {
        let flagged = self.properties.iter().flatten().any(|p| {
            p.key == PRE_RELEASE_PROPERTY && p.value.eq_ignore_ascii_case("true")
        });
        if flagged {
            return true;
        }

        self.version.rsplit('.').next().is_some_and(|last| {
            last.len() > MAX_STABLE_BUILD_DIGITS && last.bytes().all(|b| b.is_ascii_digit())
        })
    }

    fn vsix_source(&self) -> Option<&str> {
        self.files
            .iter()
            .flatten()
            .find(|f| f.asset_type == VSIX_ASSET_TYPE)
            .and_then(|f| f.source.as_deref())
    }
}

/// Pick the first stable entry, falling back to the first entry when every
/// listed version is a pre-release
pub fn select_stable(entries: &[VersionEntry]) -> Option<&VersionEntry> {
    entries
        .iter()
        .find(|entry| !entry.is_prerelease())
        .or_else(|| entries.first())
}

/// Find the VSIX download URL for an exact version and platform
///
/// Without a `target_platform` only universal entries (no platform) match.
pub fn find_vsix_url(
    entries: &[VersionEntry],
    extension_id: &str,
    version: &str,
    target_platform: Option<&str>,
) -> Result<String, ResolveError> {
    let entry = entries
        .iter()
        .find(|e| e.version == version && e.target_platform.as_deref() == target_platform)
        .ok_or_else(|| {
            let platform = target_platform
                .map(|p| format!(" for {}", p))
                .unwrap_or_else(|| " (universal)".to_string());
            ResolveError::NoMatch(format!(
                "Version {}{} not found in marketplace for {}",
                version, platform, extension_id
            ))
        })?;

    entry.vsix_source().map(str::to_string).ok_or_else(|| {
        ResolveError::NoMatch(format!(
            "VSIX download URL not found in marketplace response for {}",
            extension_id
        ))
    })
}

/// Client for the marketplace `extensionquery` endpoint
#[derive(Clone)]
pub struct MarketplaceCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl MarketplaceCatalog {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: http_client(FETCH_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Query the version entries of an extension, newest first
    pub async fn query(
        &self,
        extension_id: &str,
        flags: u32,
    ) -> Result<Vec<VersionEntry>, ResolveError> {
        let url = format!("{}/_apis/public/gallery/extensionquery", self.base_url);
        debug!("Querying marketplace for {}: {}", extension_id, url);

        let body = json!({
            "filters": [{
                "criteria": [{ "filterType": FILTER_BY_EXTENSION_NAME, "value": extension_id }],
                "pageNumber": 1,
                "pageSize": 1
            }],
            "flags": flags
        });

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json;api-version=7.2-preview.1")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Marketplace returned status {}: {}", status, url);
            return Err(ResolveError::api(SERVICE, status));
        }

        let data: QueryResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse marketplace response: {}", e);
            ResolveError::InvalidResponse(e.to_string())
        })?;

        data.results
            .into_iter()
            .next()
            .and_then(|r| r.extensions.into_iter().next())
            .map(|ext| ext.versions)
            .ok_or_else(|| ResolveError::NotFound {
                kind: "Extension",
                name: extension_id.to_string(),
            })
    }

    /// Resolve the newest stable version of an extension
    pub async fn latest_stable(&self, extension_id: &str) -> Result<String, ResolveError> {
        let entries = self
            .query(extension_id, INCLUDE_VERSIONS | INCLUDE_VERSION_PROPERTIES)
            .await?;

        let selected = select_stable(&entries).ok_or_else(|| {
            ResolveError::NoMatch(format!("No versions listed for {}", extension_id))
        })?;

        if selected.is_prerelease() {
            warn!(
                "No stable version listed for {}, using {}",
                extension_id, selected.version
            );
        }
        Ok(selected.version.clone())
    }

    /// Resolve the VSIX download URL for an exact version and platform
    pub async fn vsix_url(
        &self,
        extension_id: &str,
        version: &str,
        target_platform: Option<&str>,
    ) -> Result<String, ResolveError> {
        let entries = self
            .query(extension_id, INCLUDE_VERSIONS | INCLUDE_FILES)
            .await?;
        find_vsix_url(&entries, extension_id, version, target_platform)
    }
}

impl Default for MarketplaceCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Source implementation for marketplace extensions
#[derive(Default)]
pub struct MarketplaceSource {
    catalog: MarketplaceCatalog,
}

impl MarketplaceSource {
    pub fn new(catalog: MarketplaceCatalog) -> Self {
        Self { catalog }
    }
}

#[async_trait::async_trait]
impl VersionSource for MarketplaceSource {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Marketplace
    }

    async fn fetch_latest(&self, source: &ToolSource) -> Result<String, ResolveError> {
        let ToolSource::VscodeMarketplace { extension_id } = source else {
            return Err(ResolveError::InvalidResponse(format!(
                "Marketplace source cannot resolve {:?} tools",
                source.kind()
            )));
        };

        self.catalog.latest_stable(extension_id).await
    }
}
