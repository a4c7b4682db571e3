#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use release_radar::mirror::asset::Delay;
use release_radar::mirror::downloader::Downloader;
use release_radar::mirror::error::{MirrorError, PublishError};
use release_radar::mirror::release::{NewRelease, ReleaseStore};
use release_radar::report::{ReportError, Reporter};
use release_radar::tracker::checker::{FailureInfo, UpdateInfo};
use release_radar::tracker::error::ResolveError;
use release_radar::tracker::resolver::VersionResolver;
use release_radar::tracker::types::ToolDescriptor;

pub const MIRROR_REPO: &str = "acme/mirror";

/// Resolver answering from a mutable name -> version table
#[derive(Default)]
pub struct FakeResolver {
    versions: Mutex<HashMap<String, String>>,
}

impl FakeResolver {
    pub fn set(&self, tool: &str, version: &str) {
        self.versions
            .lock()
            .unwrap()
            .insert(tool.to_string(), version.to_string());
    }
}

#[async_trait::async_trait]
impl VersionResolver for FakeResolver {
    async fn resolve(&self, tool: &ToolDescriptor) -> Result<String, ResolveError> {
        self.versions
            .lock()
            .unwrap()
            .get(&tool.name)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                kind: "Release",
                name: tool.name.clone(),
            })
    }
}

/// In-memory release host recording every created release
#[derive(Default)]
pub struct FakeReleaseStore {
    pub releases: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeReleaseStore {
    pub fn tags(&self) -> Vec<String> {
        self.releases
            .lock()
            .unwrap()
            .iter()
            .map(|(tag, _)| tag.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl ReleaseStore for FakeReleaseStore {
    async fn release_exists(&self, tag: &str) -> Result<bool, PublishError> {
        Ok(self.releases.lock().unwrap().iter().any(|(t, _)| t == tag))
    }

    async fn delete_release(&self, tag: &str) -> Result<(), PublishError> {
        self.releases.lock().unwrap().retain(|(t, _)| t != tag);
        Ok(())
    }

    async fn create_release(&self, release: &NewRelease) -> Result<(), PublishError> {
        let names = release.assets.iter().map(|a| a.name.clone()).collect();
        self.releases
            .lock()
            .unwrap()
            .push((release.tag.clone(), names));
        Ok(())
    }

    fn download_url(&self, tag: &str, filename: &str) -> String {
        format!("github.com/{MIRROR_REPO}/releases/download/{tag}/{filename}")
    }
}

/// Downloader writing the URL as file content and counting calls
#[derive(Default)]
pub struct FakeDownloader {
    pub calls: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), MirrorError> {
        self.calls.lock().unwrap().push(url.to_string());
        std::fs::write(dest, url)?;
        Ok(())
    }
}

pub struct NoDelay;

#[async_trait::async_trait]
impl Delay for NoDelay {
    async fn wait(&self, _duration: Duration) {}
}

/// Reporter keeping every non-empty batch it was sent
#[derive(Default)]
pub struct RecordingReporter {
    pub updates: Mutex<Vec<UpdateInfo>>,
    pub failures: Mutex<Vec<FailureInfo>>,
}

#[async_trait::async_trait]
impl Reporter for RecordingReporter {
    async fn send_batched_updates(&self, updates: &[UpdateInfo]) -> Result<(), ReportError> {
        self.updates.lock().unwrap().extend_from_slice(updates);
        Ok(())
    }

    async fn send_batched_failures(&self, failures: &[FailureInfo]) -> Result<(), ReportError> {
        self.failures.lock().unwrap().extend_from_slice(failures);
        Ok(())
    }
}
