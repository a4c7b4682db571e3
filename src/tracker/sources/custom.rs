//! Custom version strategies
//!
//! Tools without a structured release feed are resolved through a named
//! strategy. Each strategy declares a primary probe and an optional fallback;
//! the fallback runs whenever the primary fails for any reason.
//!
//! The directory-listing probe treats the *last* match in document order as
//! the newest version. That holds for the listings in use today (sorted
//! oldest to newest) but is a heuristic, not a guarantee.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::FETCH_TIMEOUT;
use crate::tracker::error::ResolveError;
use crate::tracker::source::{VersionSource, http_client, strip_tag_prefix};
use crate::tracker::sources::github::fetch_release_tag;
use crate::tracker::types::{SourceKind, ToolSource};

/// How a single endpoint is turned into a version string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Plain GET whose body is read in the given format
    Body(BodyFormat),
    /// `tag_name` of a GitHub "latest release" document, `v` stripped
    ReleaseTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    /// First element of a JSON array of version strings
    JsonArrayFirst,
    /// Whole response body, trimmed
    Text,
    /// String at a JSON pointer (e.g. `/version/string`)
    JsonField(&'static str),
    /// Last capture of a version pattern in an HTML directory listing
    ListingPattern(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub probe: Probe,
}

/// A named strategy with its primary/fallback order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    /// Human-readable name used in error messages
    pub label: &'static str,
    pub primary: Endpoint,
    pub fallback: Option<Endpoint>,
}

impl Strategy {
    /// Look up a strategy by name
    pub fn named(name: &str) -> Option<Self> {
        let strategy = match name {
            "vscode" => Strategy {
                label: "VSCode",
                primary: Endpoint {
                    url: "https://update.code.visualstudio.com/api/releases/stable".to_string(),
                    probe: Probe::Body(BodyFormat::JsonArrayFirst),
                },
                fallback: None,
            },
            "claude-cli" => Strategy {
                label: "Claude Code CLI",
                primary: Endpoint {
                    url: "https://storage.googleapis.com/claude-code-dist-86c565f3-f756-42ad-8dfa-d59b1c096819/claude-code-releases/latest".to_string(),
                    probe: Probe::Body(BodyFormat::Text),
                },
                fallback: Some(Endpoint {
                    url: "https://api.github.com/repos/anthropics/claude-code/releases/latest"
                        .to_string(),
                    probe: Probe::ReleaseTag,
                }),
            },
            "cmake" => Strategy {
                label: "CMake",
                primary: Endpoint {
                    url: "https://cmake.org/files/LatestRelease/cmake-latest-files-v1.json"
                        .to_string(),
                    probe: Probe::Body(BodyFormat::JsonField("/version/string")),
                },
                fallback: Some(Endpoint {
                    url: "https://cmake.org/files/LatestRelease/".to_string(),
                    probe: Probe::Body(BodyFormat::ListingPattern(r"cmake-(\d+\.\d+\.\d+)")),
                }),
            },
            _ => return None,
        };
        Some(strategy)
    }

    /// Replace endpoint URLs with per-tool overrides
    fn with_overrides(mut self, url: Option<&str>, fallback_url: Option<&str>) -> Self {
        if let Some(url) = url {
            self.primary.url = url.to_string();
        }
        if let (Some(fallback), Some(url)) = (self.fallback.as_mut(), fallback_url) {
            fallback.url = url.to_string();
        }
        self
    }
}

/// Source implementation for the custom strategy table
pub struct CustomSource {
    client: reqwest::Client,
    token: Option<String>,
}

impl CustomSource {
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: http_client(FETCH_TIMEOUT),
            token,
        }
    }

    async fn run(&self, strategy: &Strategy) -> Result<String, ResolveError> {
        let primary = self.probe(strategy.label, &strategy.primary).await;

        match (primary, &strategy.fallback) {
            (Ok(version), _) => Ok(version),
            (Err(e), Some(fallback)) => {
                info!(
                    "{} primary endpoint failed ({}), trying fallback {}",
                    strategy.label, e, fallback.url
                );
                self.probe(strategy.label, fallback).await
            }
            (Err(e), None) => Err(e),
        }
    }

    async fn probe(&self, label: &'static str, endpoint: &Endpoint) -> Result<String, ResolveError> {
        debug!("Probing {} endpoint: {}", label, endpoint.url);

        match endpoint.probe {
            Probe::ReleaseTag => {
                let tag =
                    fetch_release_tag(&self.client, &endpoint.url, self.token.as_deref(), label)
                        .await?;
                Ok(strip_tag_prefix(&tag).to_string())
            }
            Probe::Body(format) => {
                let response = self.client.get(&endpoint.url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    warn!("{} endpoint returned status {}: {}", label, status, endpoint.url);
                    return Err(ResolveError::api(label, status));
                }
                let body = response.text().await?;
                extract_version(label, format, &body)
            }
        }
    }
}

fn extract_version(label: &str, format: BodyFormat, body: &str) -> Result<String, ResolveError> {
    let version = match format {
        BodyFormat::JsonArrayFirst => {
            let releases: Vec<String> = parse_json(label, body)?;
            releases.into_iter().next()
        }
        BodyFormat::Text => Some(body.trim().to_string()).filter(|v| !v.is_empty()),
        BodyFormat::JsonField(pointer) => {
            let value: serde_json::Value = parse_json(label, body)?;
            value
                .pointer(pointer)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        }
        BodyFormat::ListingPattern(pattern) => {
            return last_listing_match(pattern, body)?.ok_or_else(|| {
                ResolveError::NoMatch(format!(
                    "Could not parse {} version from directory listing",
                    label
                ))
            });
        }
    };

    version.ok_or_else(|| {
        ResolveError::NoMatch(format!("Could not find {} version in response", label))
    })
}

impl Default for CustomSource {
    fn default() -> Self {
        Self::new(None)
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(
    label: &str,
    body: &str,
) -> Result<T, ResolveError> {
    serde_json::from_str(body).map_err(|e| {
        warn!("Failed to parse {} response: {}", label, e);
        ResolveError::InvalidResponse(e.to_string())
    })
}

/// Last capture of `pattern` in `listing`, which is sorted oldest to newest
fn last_listing_match(pattern: &str, listing: &str) -> Result<Option<String>, ResolveError> {
    let re = Regex::new(pattern).map_err(|e| ResolveError::InvalidResponse(e.to_string()))?;
    Ok(re
        .captures_iter(listing)
        .filter_map(|c| c.get(1))
        .last()
        .map(|m| m.as_str().to_string()))
}

#[async_trait::async_trait]
impl VersionSource for CustomSource {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Custom
    }

    async fn fetch_latest(&self, source: &ToolSource) -> Result<String, ResolveError> {
        let ToolSource::Custom {
            strategy,
            url,
            fallback_url,
        } = source
        else {
            return Err(ResolveError::InvalidResponse(format!(
                "Custom source cannot resolve {:?} tools",
                source.kind()
            )));
        };

        let resolved = Strategy::named(strategy)
            .ok_or_else(|| ResolveError::UnknownStrategy(strategy.clone()))?
            .with_overrides(url.as_deref(), fallback_url.as_deref());

        self.run(&resolved).await
    }
}
