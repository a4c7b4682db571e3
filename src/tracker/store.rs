//! JSON-file store of the last seen version and mirror URL per tool

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::tracker::error::StoreError;
use crate::tracker::types::VersionRecord;

/// Trait for storing and retrieving tracked versions and mirror URLs
#[cfg_attr(test, automock)]
pub trait VersionStorer: Send + Sync + 'static {
    /// Get the last known version of a tool
    fn get_version(&self, tool_name: &str) -> Result<Option<String>, StoreError>;

    /// Record a new version for a tool and persist it
    fn set_version(&self, tool_name: &str, version: &str) -> Result<(), StoreError>;

    /// Get the mirror URL produced for a tool, if any
    fn get_mirror_url(&self, tool_name: &str) -> Result<Option<String>, StoreError>;

    /// Record the mirror URL for a tool and persist it
    fn set_mirror_url(&self, tool_name: &str, url: &str) -> Result<(), StoreError>;
}

/// On-disk layout of the version store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    pub last_check: Option<String>,
    #[serde(default)]
    pub versions: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_urls: Option<IndexMap<String, String>>,
}

/// JSON-file version store
///
/// Every mutation rewrites the whole file through a temporary file in the
/// same directory that is then renamed over the original, so a crash
/// mid-write leaves the previous state intact.
pub struct VersionStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl VersionStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("Opening version store at {:?}", path);
        let state = Self::read_state(path)?;
        debug!("Loaded {} tracked versions", state.versions.len());

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_state(path: &Path) -> Result<StoreState, StoreError> {
        if !path.exists() {
            return Ok(StoreState::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(StoreError::Parse)
    }

    /// Acquire state lock with proper error handling
    fn lock_state(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Atomically replace the store file with `state`
    fn save(&self, state: &StoreState) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let encoded = serde_json::to_string_pretty(state).map_err(StoreError::Serialize)?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(encoded.as_bytes())?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        debug!("Saved version store to {:?}", self.path);
        Ok(())
    }

    fn now() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Snapshot of the whole state
    pub fn snapshot(&self) -> Result<StoreState, StoreError> {
        Ok(self.lock_state()?.clone())
    }

    /// All tracked versions, in insertion order
    pub fn all_versions(&self) -> Result<IndexMap<String, String>, StoreError> {
        Ok(self.lock_state()?.versions.clone())
    }

    /// All known mirror URLs
    pub fn all_mirror_urls(&self) -> Result<IndexMap<String, String>, StoreError> {
        Ok(self.lock_state()?.mirror_urls.clone().unwrap_or_default())
    }

    /// Version records for every tracked tool
    pub fn records(&self) -> Result<Vec<VersionRecord>, StoreError> {
        let state = self.lock_state()?;
        Ok(state
            .versions
            .iter()
            .map(|(name, version)| VersionRecord {
                tool_name: name.clone(),
                version: version.clone(),
                last_checked_at: state.last_check.clone(),
            })
            .collect())
    }

    /// Forget a tool's version and mirror URL
    ///
    /// Returns true if the tool was tracked.
    pub fn delete_version(&self, tool_name: &str) -> Result<bool, StoreError> {
        let mut state = self.lock_state()?;
        let mut next = state.clone();
        if next.versions.shift_remove(tool_name).is_none() {
            return Ok(false);
        }
        if let Some(urls) = next.mirror_urls.as_mut() {
            urls.shift_remove(tool_name);
        }

        self.save(&next)?;
        *state = next;
        info!("Forgot {}", tool_name);
        Ok(true)
    }
}

impl VersionStorer for VersionStore {
    fn get_version(&self, tool_name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock_state()?.versions.get(tool_name).cloned())
    }

    fn set_version(&self, tool_name: &str, version: &str) -> Result<(), StoreError> {
        let mut state = self.lock_state()?;
        let mut next = state.clone();
        next.versions.insert(tool_name.to_string(), version.to_string());
        next.last_check = Some(Self::now());

        // Only commit in memory once the file has been replaced.
        self.save(&next)?;
        *state = next;
        Ok(())
    }

    fn get_mirror_url(&self, tool_name: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .lock_state()?
            .mirror_urls
            .as_ref()
            .and_then(|urls| urls.get(tool_name).cloned()))
    }

    fn set_mirror_url(&self, tool_name: &str, url: &str) -> Result<(), StoreError> {
        let mut state = self.lock_state()?;
        let mut next = state.clone();
        next.mirror_urls
            .get_or_insert_with(IndexMap::new)
            .insert(tool_name.to_string(), url.to_string());

        self.save(&next)?;
        *state = next;
        Ok(())
    }
}
