//! Common types for tracked tools

use serde::Deserialize;

/// A tracked tool and where its version comes from
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Unique key for every record about this tool
    pub name: String,
    #[serde(flatten)]
    pub source: ToolSource,
}

/// Source of a tool's authoritative version, with the parameters of that source
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ToolSource {
    /// Latest stable release of a GitHub repository (`owner/repo`)
    Github { repo: String },
    /// `latest` dist-tag of an npm package
    Npm { package: String },
    /// VS Code Marketplace extension (`publisher.name`)
    VscodeMarketplace {
        #[serde(rename = "extensionId")]
        extension_id: String,
    },
    /// Named strategy from the custom strategy table
    Custom {
        #[serde(rename = "customFetcher")]
        strategy: String,
        /// Overrides the strategy's primary endpoint
        #[serde(default)]
        url: Option<String>,
        /// Overrides the strategy's fallback endpoint
        #[serde(default, rename = "fallbackUrl")]
        fallback_url: Option<String>,
    },
}

/// Kind of version source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    TagFeed,
    Registry,
    Marketplace,
    Custom,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::TagFeed => "tag_feed",
            SourceKind::Registry => "registry",
            SourceKind::Marketplace => "marketplace",
            SourceKind::Custom => "custom",
        }
    }
}

impl ToolSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ToolSource::Github { .. } => SourceKind::TagFeed,
            ToolSource::Npm { .. } => SourceKind::Registry,
            ToolSource::VscodeMarketplace { .. } => SourceKind::Marketplace,
            ToolSource::Custom { .. } => SourceKind::Custom,
        }
    }
}

impl ToolDescriptor {
    pub fn new(name: &str, source: ToolSource) -> Self {
        Self {
            name: name.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }
}

/// Last known version of a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub tool_name: String,
    pub version: String,
    /// RFC 3339 timestamp of the last store write, if any
    pub last_checked_at: Option<String>,
}
