//! Change detection across all tracked tools

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{DownloadEntry, DownloadsConfig};
use crate::mirror::asset::BatchMirror;
use crate::mirror::types::{MirrorOutcome, MirrorRequest};
use crate::report::Reporter;
use crate::tracker::error::CheckError;
use crate::tracker::resolver::VersionResolver;
use crate::tracker::store::VersionStorer;
use crate::tracker::types::ToolDescriptor;

/// A tool whose version changed since the last run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    pub name: String,
    pub old_version: String,
    pub new_version: String,
}

/// A tool whose version could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureInfo {
    pub name: String,
    pub error: String,
}

/// Outcome of one check pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub updates: Vec<UpdateInfo>,
    pub failures: Vec<FailureInfo>,
}

/// What the trigger side needs from a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSummary {
    pub has_updates: bool,
    pub update_count: usize,
}

impl CheckReport {
    pub fn has_updates(&self) -> bool {
        !self.updates.is_empty()
    }

    pub fn update_count(&self) -> usize {
        self.updates.len()
    }

    pub fn summary(&self) -> CheckSummary {
        CheckSummary {
            has_updates: self.has_updates(),
            update_count: self.update_count(),
        }
    }
}

/// Classification of a resolved version against the stored one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No prior record
    FirstSeen,
    /// Stored version differs
    Changed { old_version: String },
    Unchanged,
}

pub fn classify(stored: Option<&str>, resolved: &str) -> Classification {
    match stored {
        None => Classification::FirstSeen,
        Some(old) if old == resolved => Classification::Unchanged,
        Some(old) => Classification::Changed {
            old_version: old.to_string(),
        },
    }
}

/// Runs check passes: resolve, compare, store, mirror, report
pub struct ChangeDetector<S: VersionStorer> {
    resolver: Arc<dyn VersionResolver>,
    store: Arc<S>,
    reporter: Arc<dyn Reporter>,
    mirror: Option<Arc<dyn BatchMirror>>,
    downloads: DownloadsConfig,
    /// Held for the duration of a pass; one pass at a time per detector
    running: Mutex<()>,
}

impl<S: VersionStorer> ChangeDetector<S> {
    pub fn new(
        resolver: Arc<dyn VersionResolver>,
        store: Arc<S>,
        reporter: Arc<dyn Reporter>,
        downloads: DownloadsConfig,
    ) -> Self {
        Self {
            resolver,
            store,
            reporter,
            mirror: None,
            downloads,
            running: Mutex::new(()),
        }
    }

    /// Enable mirroring of changed tools that have mirror settings
    pub fn with_mirror(mut self, mirror: Arc<dyn BatchMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Check every tool in order
    ///
    /// Resolution failures are collected per tool and never abort the pass.
    /// Store failures do, since continuing could repeat notifications.
    pub async fn check_all(&self, tools: &[ToolDescriptor]) -> Result<CheckReport, CheckError> {
        let _running = self
            .running
            .try_lock()
            .map_err(|_| CheckError::AlreadyRunning)?;

        info!("Checking {} tools", tools.len());
        let mut report = CheckReport::default();
        let mut mirror_requests = Vec::new();

        for tool in tools {
            let new_version = match self.resolver.resolve(tool).await {
                Ok(version) => version,
                Err(e) => {
                    warn!("Failed to check {}: {}", tool.name, e);
                    report.failures.push(FailureInfo {
                        name: tool.name.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let stored = self
                .store
                .get_version(&tool.name)
                .inspect_err(|e| error!("Failed to read version of {}: {}", tool.name, e))?;

            match classify(stored.as_deref(), &new_version) {
                Classification::FirstSeen => {
                    info!("First seen {}: {}", tool.name, new_version);
                    self.store.set_version(&tool.name, &new_version)?;
                }
                Classification::Unchanged => {
                    debug!("{} unchanged at {}", tool.name, new_version);
                }
                Classification::Changed { old_version } => {
                    info!("{}: {} -> {}", tool.name, old_version, new_version);
                    self.store.set_version(&tool.name, &new_version)?;
                    if let Some(request) = self.mirror_request(&tool.name, &new_version) {
                        mirror_requests.push(request);
                    }
                    report.updates.push(UpdateInfo {
                        name: tool.name.clone(),
                        old_version,
                        new_version,
                    });
                }
            }
        }

        if !mirror_requests.is_empty() {
            self.mirror_updates(&mirror_requests).await?;
        }

        let _ = self
            .reporter
            .send_batched_updates(&report.updates)
            .await
            .inspect_err(|e| error!("Failed to report updates: {}", e));
        let _ = self
            .reporter
            .send_batched_failures(&report.failures)
            .await
            .inspect_err(|e| error!("Failed to report failures: {}", e));

        info!(
            "Check finished: {} updates, {} failures",
            report.updates.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn mirror_request(&self, tool_name: &str, version: &str) -> Option<MirrorRequest> {
        if self.mirror.is_none() {
            return None;
        }
        let spec = self.downloads.get(tool_name).and_then(DownloadEntry::mirror)?;
        let config = spec.mirror.clone()?;
        Some(MirrorRequest {
            tool_name: tool_name.to_string(),
            version: version.to_string(),
            config,
            filename_template: spec.filename.clone(),
        })
    }

    async fn mirror_updates(&self, requests: &[MirrorRequest]) -> Result<(), CheckError> {
        let Some(mirror) = &self.mirror else {
            return Ok(());
        };

        info!("Mirroring {} updated tools", requests.len());
        let outcome = mirror.mirror_batch(requests).await;

        for (tool_name, result) in &outcome.results {
            match result {
                MirrorOutcome::Mirrored { download_url } => {
                    self.store.set_mirror_url(tool_name, download_url)?;
                }
                MirrorOutcome::Failed { error } => {
                    warn!("Mirror of {} failed: {}", tool_name, error);
                }
            }
        }
        Ok(())
    }
}
