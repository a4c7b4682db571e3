//! Version resolution across source kinds
//!
//! [`SourceResolver`] routes each tool to the [`VersionSource`] registered for
//! its source kind. The checker only sees the [`VersionResolver`] trait, so a
//! source can be swapped or removed without touching orchestration.

use std::collections::HashMap;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::tracker::error::ResolveError;
use crate::tracker::source::VersionSource;
use crate::tracker::sources::{
    CustomSource, GitHubSource, MarketplaceCatalog, MarketplaceSource, NpmSource,
};
use crate::tracker::types::{SourceKind, ToolDescriptor};

/// Trait for resolving a tool's current authoritative version
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait VersionResolver: Send + Sync {
    async fn resolve(&self, tool: &ToolDescriptor) -> Result<String, ResolveError>;
}

/// Resolver that dispatches on the tool's source kind
pub struct SourceResolver {
    sources: HashMap<SourceKind, Arc<dyn VersionSource>>,
}

impl SourceResolver {
    /// Create a resolver from explicit sources, keyed by the kind each handles
    pub fn new(sources: Vec<Arc<dyn VersionSource>>) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.source_kind(), source))
            .collect();
        Self { sources }
    }

    /// Get the source registered for a kind
    pub fn source(&self, kind: SourceKind) -> Option<&Arc<dyn VersionSource>> {
        self.sources.get(&kind)
    }
}

/// Create the default set of sources for all supported source kinds
pub fn create_default_sources(
    github_token: Option<String>,
    catalog: MarketplaceCatalog,
) -> Vec<Arc<dyn VersionSource>> {
    vec![
        Arc::new(GitHubSource::new(
            crate::tracker::sources::github::DEFAULT_BASE_URL,
            github_token.clone(),
        )),
        Arc::new(NpmSource::default()),
        Arc::new(MarketplaceSource::new(catalog)),
        Arc::new(CustomSource::new(github_token)),
    ]
}

#[async_trait::async_trait]
impl VersionResolver for SourceResolver {
    async fn resolve(&self, tool: &ToolDescriptor) -> Result<String, ResolveError> {
        let kind = tool.kind();
        let source = self.sources.get(&kind).ok_or_else(|| {
            ResolveError::InvalidResponse(format!(
                "No source registered for {} tools",
                kind.as_str()
            ))
        })?;

        source.fetch_latest(&tool.source).await
    }
}
