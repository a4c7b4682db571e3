//! Downloadable-tools manifest generated from tracked versions

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::config::{DownloadEntry, DownloadsConfig};
use crate::tracker::template::{MIRROR_URL, NEXUS_URL, apply_version};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub generated_at: String,
    pub tools: Vec<ManifestTool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ManifestTool {
    Download(DownloadTool),
    Npm(NpmTool),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTool {
    pub name: String,
    pub display_name: String,
    pub version: String,
    pub published_at: String,
    pub download_url: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NpmTool {
    pub name: String,
    pub display_name: String,
    pub version: String,
    pub published_at: String,
    #[serde(rename = "type")]
    pub kind: NpmKind,
    pub package: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NpmKind {
    Npm,
}

impl ManifestTool {
    pub fn name(&self) -> &str {
        match self {
            ManifestTool::Download(tool) => &tool.name,
            ManifestTool::Npm(tool) => &tool.name,
        }
    }
}

/// Build the manifest for every tracked tool that has download settings
///
/// A `{{MIRROR_URL}}` download template is replaced by the tool's mirror URL;
/// tools without one yet are left out. Download URLs are prefixed with the
/// `{{NEXUS_URL}}` placeholder for the serving proxy to fill in.
pub fn generate_manifest(
    versions: &IndexMap<String, String>,
    mirror_urls: &IndexMap<String, String>,
    downloads: &DownloadsConfig,
    now: DateTime<Utc>,
) -> Manifest {
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut tools = Vec::new();

    for (name, version) in versions {
        let Some(entry) = downloads.get(name) else {
            debug!("No download settings for {}, skipping", name);
            continue;
        };

        let tool = match entry {
            DownloadEntry::Npm(spec) => ManifestTool::Npm(NpmTool {
                name: name.clone(),
                display_name: spec.display_name.clone(),
                version: version.clone(),
                published_at: timestamp.clone(),
                kind: NpmKind::Npm,
                package: spec.package.clone(),
            }),
            DownloadEntry::Download(spec) => {
                let template = if spec.download_url.contains(MIRROR_URL) {
                    let Some(mirror_url) = mirror_urls.get(name) else {
                        debug!("No mirror URL for {} yet, skipping", name);
                        continue;
                    };
                    spec.download_url.replace(MIRROR_URL, mirror_url)
                } else {
                    spec.download_url.clone()
                };

                ManifestTool::Download(DownloadTool {
                    name: name.clone(),
                    display_name: spec.display_name.clone(),
                    version: version.clone(),
                    published_at: timestamp.clone(),
                    download_url: format!("{}/{}", NEXUS_URL, apply_version(&template, version)),
                    filename: apply_version(&spec.filename, version),
                })
            }
        };
        tools.push(tool);
    }

    Manifest {
        generated_at: timestamp,
        tools,
    }
}
