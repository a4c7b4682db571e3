//! Mirroring artifacts into the release host
//!
//! Per-tool releases are tagged `{slug}-v{version}` and that tag is the
//! idempotency key: an existing release short-circuits both single and batch
//! mirroring. Batch mode downloads strictly one item at a time and commits
//! everything it fetched with a single release under a timestamped tag.

use std::collections::HashSet;
use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::config::BATCH_DOWNLOAD_DELAY;
use crate::mirror::downloader::Downloader;
use crate::mirror::error::MirrorError;
use crate::mirror::release::{NewRelease, ReleaseAsset, ReleaseStore};
use crate::mirror::types::{
    BatchOutcome, MirrorOutcome, MirrorRequest, MirrorSource, batch_tag, release_tag,
};
use crate::tracker::error::ResolveError;
use crate::tracker::sources::MarketplaceCatalog;
use crate::tracker::template::apply_version;

const RELEASE_NOTES: &str = "Mirrored for proxy access.";

/// Expand the filename template; the result must be a single path component
fn asset_name(request: &MirrorRequest) -> Result<String, MirrorError> {
    let filename = apply_version(&request.filename_template, &request.version);
    let mut components = Path::new(&filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(filename),
        _ => Err(MirrorError::InvalidFilename(filename)),
    }
}

/// Pause between consecutive downloads
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

pub struct TokioDelay;

#[async_trait::async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Trait for mirroring several artifacts in one pass
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait BatchMirror: Send + Sync {
    /// Mirror every request; failures are reported per item, never returned
    async fn mirror_batch(&self, items: &[MirrorRequest]) -> BatchOutcome;
}

pub struct AssetMirror {
    releases: Arc<dyn ReleaseStore>,
    downloader: Arc<dyn Downloader>,
    catalog: MarketplaceCatalog,
    delay: Arc<dyn Delay>,
    download_delay: Duration,
}

impl AssetMirror {
    pub fn new(
        releases: Arc<dyn ReleaseStore>,
        downloader: Arc<dyn Downloader>,
        catalog: MarketplaceCatalog,
    ) -> Self {
        Self {
            releases,
            downloader,
            catalog,
            delay: Arc::new(TokioDelay),
            download_delay: BATCH_DOWNLOAD_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Mirror one artifact under its per-tool tag
    ///
    /// With `force` any existing release for the tag is deleted and the
    /// artifact republished.
    pub async fn mirror(&self, request: &MirrorRequest, force: bool) -> MirrorOutcome {
        match self.mirror_one(request, force).await {
            Ok(download_url) => {
                info!("Mirrored {} to {}", request.tool_name, download_url);
                MirrorOutcome::Mirrored { download_url }
            }
            Err(e) => {
                warn!("Failed to mirror {}: {}", request.tool_name, e);
                MirrorOutcome::failed(e)
            }
        }
    }

    async fn mirror_one(&self, request: &MirrorRequest, force: bool) -> Result<String, MirrorError> {
        let tag = release_tag(&request.tool_name, &request.version);
        let filename = asset_name(request)?;
        let download_url = self.releases.download_url(&tag, &filename);

        if force {
            info!("Force mirror: deleting release {}", tag);
            self.releases.delete_release(&tag).await?;
        } else if self.releases.release_exists(&tag).await? {
            info!("Release {} already exists, skipping", tag);
            return Ok(download_url);
        }

        // Dropping the staging directory removes the download on every path.
        let staging = tempfile::tempdir()?;
        let path = staging.path().join("asset");
        self.fetch_artifact(request, &path).await?;

        self.releases
            .create_release(&NewRelease {
                tag,
                title: format!("{} {}", request.tool_name, request.version),
                notes: RELEASE_NOTES.to_string(),
                assets: vec![ReleaseAsset {
                    path,
                    name: filename,
                }],
            })
            .await?;

        Ok(download_url)
    }

    /// Resolve the concrete source URL and download it to `dest`
    async fn fetch_artifact(&self, request: &MirrorRequest, dest: &Path) -> Result<(), MirrorError> {
        let source_url = match &request.config.source {
            MirrorSource::Direct(url) => url.clone(),
            MirrorSource::Marketplace {
                extension_id,
                target_platform,
            } => self
                .catalog
                .vsix_url(extension_id, &request.version, target_platform.as_deref())
                .await
                .map_err(|e| match e {
                    ResolveError::NoMatch(message) => MirrorError::Negotiation(message),
                    other => MirrorError::Catalog(other),
                })?,
        };

        info!(
            "Downloading {} {} from {}",
            request.tool_name, request.version, source_url
        );
        self.downloader.download(&source_url, dest).await?;

        if !dest.exists() {
            return Err(MirrorError::MissingFile);
        }
        Ok(())
    }

    async fn run_batch(&self, items: &[MirrorRequest]) -> BatchOutcome {
        let tag = batch_tag(Utc::now());
        let mut results = IndexMap::new();

        let staging = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                let message = MirrorError::from(e).to_string();
                for item in items {
                    results.insert(item.tool_name.clone(), MirrorOutcome::failed(&message));
                }
                return BatchOutcome { tag, results };
            }
        };

        let mut pending: Vec<(&MirrorRequest, ReleaseAsset)> = Vec::new();
        let mut names = HashSet::new();

        for (index, item) in items.iter().enumerate() {
            let item_tag = release_tag(&item.tool_name, &item.version);
            let filename = match asset_name(item) {
                Ok(filename) => filename,
                Err(e) => {
                    warn!("Skipping {}: {}", item.tool_name, e);
                    results.insert(item.tool_name.clone(), MirrorOutcome::failed(e));
                    continue;
                }
            };

            match self.releases.release_exists(&item_tag).await {
                Ok(true) => {
                    info!("Release {} already exists, skipping", item_tag);
                    let download_url = self.releases.download_url(&item_tag, &filename);
                    results.insert(
                        item.tool_name.clone(),
                        MirrorOutcome::Mirrored { download_url },
                    );
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to check release {}: {}", item_tag, e);
                    results.insert(item.tool_name.clone(), MirrorOutcome::failed(e));
                    continue;
                }
            }

            if names.contains(&filename) {
                let e = MirrorError::DuplicateAsset(filename);
                warn!("Skipping {}: {}", item.tool_name, e);
                results.insert(item.tool_name.clone(), MirrorOutcome::failed(e));
                continue;
            }

            let path = staging.path().join(format!("asset-{index}"));
            match self.fetch_artifact(item, &path).await {
                Ok(()) => {
                    names.insert(filename.clone());
                    let download_url = self.releases.download_url(&tag, &filename);
                    results.insert(
                        item.tool_name.clone(),
                        MirrorOutcome::Mirrored { download_url },
                    );
                    pending.push((
                        item,
                        ReleaseAsset {
                            path,
                            name: filename,
                        },
                    ));
                }
                Err(e) => {
                    warn!("Failed to download {}: {}", item.tool_name, e);
                    results.insert(item.tool_name.clone(), MirrorOutcome::failed(e));
                }
            }

            if index + 1 < items.len() {
                debug!("Waiting {:?} before next download", self.download_delay);
                self.delay.wait(self.download_delay).await;
            }
        }

        if pending.is_empty() {
            return BatchOutcome { tag, results };
        }

        let notes = pending
            .iter()
            .map(|(item, _)| format!("- {} {}", item.tool_name, item.version))
            .fold(format!("{RELEASE_NOTES}\n"), |mut notes, line| {
                notes.push('\n');
                notes.push_str(&line);
                notes
            });
        let release = NewRelease {
            tag: tag.clone(),
            title: format!("Mirror batch {}", tag.trim_start_matches("batch-")),
            notes,
            assets: pending.iter().map(|(_, asset)| asset.clone()).collect(),
        };

        info!(
            "Publishing batch release {} with {} assets",
            tag,
            release.assets.len()
        );
        if let Err(e) = self.releases.create_release(&release).await {
            let message = MirrorError::from(e).to_string();
            warn!("Failed to publish batch {}: {}", tag, message);
            for (item, _) in &pending {
                results.insert(item.tool_name.clone(), MirrorOutcome::failed(&message));
            }
        }

        BatchOutcome { tag, results }
    }
}

#[async_trait::async_trait]
impl BatchMirror for AssetMirror {
    async fn mirror_batch(&self, items: &[MirrorRequest]) -> BatchOutcome {
        self.run_batch(items).await
    }
}
