use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::{self, Deserializer};
use thiserror::Error;

use crate::mirror::types::MirrorConfig;
use crate::tracker::types::ToolDescriptor;

// =============================================================================
// Time-related constants
// =============================================================================

/// Timeout for version resolution and catalog queries (30 seconds)
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for downloading a single artifact (5 minutes)
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for release creation and asset upload (5 minutes)
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(300);

/// Pause between consecutive batch downloads to keep memory pressure low
pub const BATCH_DOWNLOAD_DELAY: Duration = Duration::from_secs(1);

/// Default interval between scheduled checks
pub const DEFAULT_CHECK_INTERVAL_HOURS: u64 = 6;

/// User agent sent with every outgoing request
pub const USER_AGENT: &str = "release-radar";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),
}

/// Tracked tool set (`tools.json`)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RadarConfig {
    pub check_interval_hours: u64,
    /// `owner/repo` receiving mirrored artifacts
    pub mirror_repo: Option<String>,
    pub tools: Vec<ToolDescriptor>,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            check_interval_hours: DEFAULT_CHECK_INTERVAL_HOURS,
            mirror_repo: None,
            tools: Vec::new(),
        }
    }
}

impl RadarConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: RadarConfig = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Tool names are the key for every record, so they must be unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(ConfigError::DuplicateTool(tool.name.clone()));
            }
        }
        Ok(())
    }
}

/// Per-tool download configuration (`downloads.json`), keyed by tool name
pub type DownloadsConfig = IndexMap<String, DownloadEntry>;

pub fn load_downloads(path: &Path) -> Result<DownloadsConfig, ConfigError> {
    read_json(path)
}

/// A download-configuration entry.
///
/// The `type` field selects the variant: absent or `"download"` is a direct
/// artifact download, `"npm"` is a package installed through npm.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEntry {
    Download(DownloadSpec),
    Npm(NpmSpec),
}

impl DownloadEntry {
    pub fn display_name(&self) -> &str {
        match self {
            DownloadEntry::Download(spec) => &spec.display_name,
            DownloadEntry::Npm(spec) => &spec.display_name,
        }
    }

    /// Mirror configuration, if this entry asks for its artifact to be mirrored
    pub fn mirror(&self) -> Option<&DownloadSpec> {
        match self {
            DownloadEntry::Download(spec) if spec.mirror.is_some() => Some(spec),
            DownloadEntry::Download(_) | DownloadEntry::Npm(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSpec {
    pub display_name: String,
    pub download_url: String,
    pub filename: String,
    #[serde(default)]
    pub mirror: Option<MirrorConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NpmSpec {
    pub display_name: String,
    pub package: String,
}

impl<'de> Deserialize<'de> for DownloadEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = serde_json::Value::deserialize(deserializer)?;
        let kind = match value.as_object_mut() {
            Some(object) => object.remove("type"),
            None => return Err(de::Error::custom("download entry must be an object")),
        };

        match kind.as_ref().map(|k| k.as_str()) {
            None | Some(Some("download")) => serde_json::from_value(value)
                .map(DownloadEntry::Download)
                .map_err(de::Error::custom),
            Some(Some("npm")) => serde_json::from_value(value)
                .map(DownloadEntry::Npm)
                .map_err(de::Error::custom),
            Some(Some(other)) => Err(de::Error::custom(format!(
                "unknown download entry type: {}",
                other
            ))),
            Some(None) => Err(de::Error::custom("download entry type must be a string")),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Returns the path to the data directory for release-radar.
/// Uses $RELEASE_RADAR_DATA_DIR if set, then $XDG_DATA_HOME/release-radar,
/// otherwise falls back to ~/.local/share/release-radar,
/// or ./release-radar if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(
        std::env::var("RELEASE_RADAR_DATA_DIR").ok(),
        std::env::var("XDG_DATA_HOME").ok(),
        dirs::home_dir(),
    )
}

/// Returns the path to the version store inside `data_dir`.
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join("versions.json")
}

/// Name of the log file inside the data directory
pub const LOG_FILE_NAME: &str = "release-radar.log";

fn data_dir_with_env(
    explicit: Option<String>,
    xdg_data_home: Option<String>,
    home_dir: Option<PathBuf>,
) -> PathBuf {
    if let Some(dir) = explicit {
        return PathBuf::from(dir);
    }

    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("release-radar")
}
