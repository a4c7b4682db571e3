//! Common types for mirroring

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

/// `sourceUrl` value that asks for the artifact URL to be negotiated with the
/// marketplace catalog instead of used directly
pub const MARKETPLACE_SENTINEL: &str = "marketplace-api";

/// Where a mirrored artifact is fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorSource {
    /// Fixed URL, redirects followed
    Direct(String),
    /// VSIX of an exact extension version, optionally platform-specific
    Marketplace {
        extension_id: String,
        target_platform: Option<String>,
    },
}

/// Mirror settings of a download entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawMirrorConfig")]
pub struct MirrorConfig {
    pub source: MirrorSource,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMirrorConfig {
    source_url: String,
    #[serde(default)]
    extension_id: Option<String>,
    #[serde(default)]
    target_platform: Option<String>,
}

impl TryFrom<RawMirrorConfig> for MirrorConfig {
    type Error = String;

    fn try_from(raw: RawMirrorConfig) -> Result<Self, Self::Error> {
        let source = if raw.source_url == MARKETPLACE_SENTINEL {
            let extension_id = raw.extension_id.ok_or_else(|| {
                format!("extensionId is required when sourceUrl is \"{MARKETPLACE_SENTINEL}\"")
            })?;
            MirrorSource::Marketplace {
                extension_id,
                target_platform: raw.target_platform,
            }
        } else {
            MirrorSource::Direct(raw.source_url)
        };
        Ok(Self { source })
    }
}

impl MirrorConfig {
    pub fn direct(url: &str) -> Self {
        Self {
            source: MirrorSource::Direct(url.to_string()),
        }
    }

    pub fn marketplace(extension_id: &str, target_platform: Option<&str>) -> Self {
        Self {
            source: MirrorSource::Marketplace {
                extension_id: extension_id.to_string(),
                target_platform: target_platform.map(str::to_string),
            },
        }
    }
}

/// One artifact to mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRequest {
    pub tool_name: String,
    pub version: String,
    pub config: MirrorConfig,
    /// Asset filename; may contain version placeholders
    pub filename_template: String,
}

/// Result of mirroring one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    Mirrored { download_url: String },
    Failed { error: String },
}

impl MirrorOutcome {
    pub fn failed(error: impl ToString) -> Self {
        MirrorOutcome::Failed {
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MirrorOutcome::Mirrored { .. })
    }

    pub fn download_url(&self) -> Option<&str> {
        match self {
            MirrorOutcome::Mirrored { download_url } => Some(download_url),
            MirrorOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            MirrorOutcome::Mirrored { .. } => None,
            MirrorOutcome::Failed { error } => Some(error),
        }
    }
}

/// Result of a batch mirror, keyed by tool name in request order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub tag: String,
    pub results: IndexMap<String, MirrorOutcome>,
}

/// Release tag for one tool version, e.g. `claude-code-vscode-v2.1.9`
pub fn release_tag(tool_name: &str, version: &str) -> String {
    let slug = tool_name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    format!("{slug}-v{version}")
}

/// Shared tag for one batch invocation, e.g. `batch-20260123-101500`
pub fn batch_tag(now: DateTime<Utc>) -> String {
    format!("batch-{}", now.format("%Y%m%d-%H%M%S"))
}
