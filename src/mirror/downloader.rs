//! Artifact download

use std::path::Path;

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::config::DOWNLOAD_TIMEOUT;
use crate::mirror::error::MirrorError;
use crate::tracker::source::http_client;

/// Trait for fetching an artifact to a local path
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), MirrorError>;
}

/// Downloader streaming the response body to disk, following redirects
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> Self {
        Self {
            client: http_client(DOWNLOAD_TIMEOUT),
        }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), MirrorError> {
        debug!("Downloading {} to {:?}", url, dest);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MirrorError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Download returned status {}: {}", status, url);
            return Err(MirrorError::Download(format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| MirrorError::Download(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        debug!("Downloaded {} bytes from {}", written, url);
        Ok(())
    }
}
