//! GitHub Releases as the mirror host

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::PUBLISH_TIMEOUT;
use crate::mirror::error::PublishError;
use crate::mirror::release::{NewRelease, ReleaseStore};
use crate::tracker::source::http_client;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    upload_url: String,
}

/// Release store backed by the GitHub REST API
pub struct GitHubReleaseStore {
    client: reqwest::Client,
    api_url: String,
    repo: String,
    token: Option<String>,
}

impl GitHubReleaseStore {
    /// Create a store publishing to `repo` (`owner/name`)
    pub fn new(api_url: &str, repo: &str, token: Option<String>) -> Self {
        Self {
            client: http_client(PUBLISH_TIMEOUT),
            api_url: api_url.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
            token,
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn find_release(&self, tag: &str) -> Result<Option<ReleaseResponse>, PublishError> {
        let url = format!("{}/repos/{}/releases/tags/{}", self.api_url, self.repo, tag);
        debug!("Looking up release: {}", url);

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            warn!("GitHub API returned status {}: {}", status, url);
            return Err(PublishError::api(status));
        }

        Ok(Some(response.json().await?))
    }

    async fn delete_by_id(&self, id: u64) -> Result<(), PublishError> {
        let url = format!("{}/repos/{}/releases/{}", self.api_url, self.repo, id);
        let response = self.request(reqwest::Method::DELETE, &url).send().await?;
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(PublishError::api(status));
        }
        Ok(())
    }

    /// Deleting a release keeps its git tag, so the ref is removed separately.
    async fn delete_tag_ref(&self, tag: &str) -> Result<(), PublishError> {
        let url = format!("{}/repos/{}/git/refs/tags/{}", self.api_url, self.repo, tag);
        let response = self.request(reqwest::Method::DELETE, &url).send().await?;
        let status = response.status();
        if status.is_success()
            || status == reqwest::StatusCode::NOT_FOUND
            || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            return Ok(());
        }
        Err(PublishError::api(status))
    }

    async fn upload_assets(
        &self,
        upload_url: &str,
        release: &NewRelease,
    ) -> Result<(), PublishError> {
        // upload_url is a URI template such as `.../assets{?name,label}`
        let base = upload_url.split('{').next().unwrap_or(upload_url);

        for asset in &release.assets {
            let file = tokio::fs::File::open(&asset.path).await?;
            let size = file.metadata().await?.len();
            debug!("Uploading {} ({} bytes) to {}", asset.name, size, base);

            let response = self
                .request(reqwest::Method::POST, base)
                .query(&[("name", asset.name.as_str())])
                .header("Content-Type", "application/octet-stream")
                .header("Content-Length", size)
                .body(reqwest::Body::from(file))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                warn!("Asset upload returned status {}: {}", status, asset.name);
                return Err(PublishError::api(status));
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReleaseStore for GitHubReleaseStore {
    async fn release_exists(&self, tag: &str) -> Result<bool, PublishError> {
        Ok(self.find_release(tag).await?.is_some())
    }

    async fn delete_release(&self, tag: &str) -> Result<(), PublishError> {
        if let Some(release) = self.find_release(tag).await? {
            info!("Deleting release {} from {}", tag, self.repo);
            self.delete_by_id(release.id).await?;
        }
        self.delete_tag_ref(tag).await
    }

    async fn create_release(&self, release: &NewRelease) -> Result<(), PublishError> {
        let url = format!("{}/repos/{}/releases", self.api_url, self.repo);
        info!("Creating release {} in {}", release.tag, self.repo);

        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&json!({
                "tag_name": release.tag,
                "name": release.title,
                "body": release.notes,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("GitHub API returned status {}: {}", status, url);
            return Err(PublishError::api(status));
        }
        let created: ReleaseResponse = response.json().await?;

        if let Err(e) = self.upload_assets(&created.upload_url, release).await {
            warn!("Rolling back release {}: {}", release.tag, e);
            let _ = self
                .delete_by_id(created.id)
                .await
                .inspect_err(|e| warn!("Failed to delete release {}: {}", release.tag, e));
            let _ = self
                .delete_tag_ref(&release.tag)
                .await
                .inspect_err(|e| warn!("Failed to delete tag {}: {}", release.tag, e));
            return Err(e);
        }

        Ok(())
    }

    fn download_url(&self, tag: &str, filename: &str) -> String {
        format!(
            "github.com/{}/releases/download/{}/{}",
            self.repo, tag, filename
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::release::ReleaseAsset;
    use mockito::{Matcher, Server};
    use tempfile::TempDir;

    const REPO: &str = "acme/mirror";

    fn store(server: &Server) -> GitHubReleaseStore {
        GitHubReleaseStore::new(&server.url(), REPO, Some("test-token".to_string()))
    }

    fn release_with_asset(dir: &TempDir) -> NewRelease {
        let path = dir.path().join("tool.msi");
        std::fs::write(&path, "artifact").unwrap();
        NewRelease {
            tag: "tool-v1.0.0".to_string(),
            title: "Tool 1.0.0".to_string(),
            notes: "notes".to_string(),
            assets: vec![ReleaseAsset {
                path,
                name: "tool-1.0.0.msi".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn release_exists_returns_true_for_existing_tag() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/acme/mirror/releases/tags/tool-v1.0.0")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(r#"{"id": 7, "upload_url": "https://uploads/x{?name,label}"}"#)
            .create_async()
            .await;

        assert!(store(&server).release_exists("tool-v1.0.0").await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn release_exists_returns_false_for_missing_tag() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/acme/mirror/releases/tags/tool-v1.0.0")
            .with_status(404)
            .create_async()
            .await;

        assert!(!store(&server).release_exists("tool-v1.0.0").await.unwrap());
    }

    #[tokio::test]
    async fn release_exists_propagates_server_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/acme/mirror/releases/tags/tool-v1.0.0")
            .with_status(500)
            .create_async()
            .await;

        let err = store(&server)
            .release_exists("tool-v1.0.0")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "GitHub API error: 500 Internal Server Error");
    }

    #[tokio::test]
    async fn create_release_uploads_every_asset() {
        let mut server = Server::new_async().await;
        let upload_url = format!(
            "{}/uploads/repos/acme/mirror/releases/7/assets{{?name,label}}",
            server.url()
        );
        let create = server
            .mock("POST", "/repos/acme/mirror/releases")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "tag_name": "tool-v1.0.0",
                "name": "Tool 1.0.0"
            })))
            .with_status(201)
            .with_body(format!(r#"{{"id": 7, "upload_url": "{}"}}"#, upload_url))
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/uploads/repos/acme/mirror/releases/7/assets")
            .match_query(Matcher::UrlEncoded(
                "name".to_string(),
                "tool-1.0.0.msi".to_string(),
            ))
            .match_body("artifact")
            .with_status(201)
            .create_async()
            .await;
        let dir = TempDir::new().unwrap();

        store(&server)
            .create_release(&release_with_asset(&dir))
            .await
            .unwrap();

        create.assert_async().await;
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn upload_encodes_asset_name_in_query() {
        let mut server = Server::new_async().await;
        let upload_url = format!("{}/uploads/assets{{?name,label}}", server.url());
        let _create = server
            .mock("POST", "/repos/acme/mirror/releases")
            .with_status(201)
            .with_body(format!(r#"{{"id": 9, "upload_url": "{}"}}"#, upload_url))
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/uploads/assets")
            .match_query(Matcher::UrlEncoded(
                "name".to_string(),
                "Tool Setup 1.0.0.msi".to_string(),
            ))
            .match_header("content-length", "8")
            .match_body("artifact")
            .with_status(201)
            .create_async()
            .await;
        let dir = TempDir::new().unwrap();
        let mut release = release_with_asset(&dir);
        release.assets[0].name = "Tool Setup 1.0.0.msi".to_string();

        store(&server).create_release(&release).await.unwrap();

        upload.assert_async().await;
    }

    #[tokio::test]
    async fn create_release_rolls_back_when_upload_fails() {
        let mut server = Server::new_async().await;
        let upload_url = format!("{}/uploads/assets{{?name,label}}", server.url());
        let _create = server
            .mock("POST", "/repos/acme/mirror/releases")
            .with_status(201)
            .with_body(format!(r#"{{"id": 7, "upload_url": "{}"}}"#, upload_url))
            .create_async()
            .await;
        let _upload = server
            .mock("POST", "/uploads/assets")
            .match_query(Matcher::Any)
            .with_status(502)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/repos/acme/mirror/releases/7")
            .with_status(204)
            .create_async()
            .await;
        let delete_ref = server
            .mock("DELETE", "/repos/acme/mirror/git/refs/tags/tool-v1.0.0")
            .with_status(204)
            .create_async()
            .await;
        let dir = TempDir::new().unwrap();

        let err = store(&server)
            .create_release(&release_with_asset(&dir))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "GitHub API error: 502 Bad Gateway");
        delete.assert_async().await;
        delete_ref.assert_async().await;
    }

    #[tokio::test]
    async fn delete_release_removes_release_and_tag() {
        let mut server = Server::new_async().await;
        let _find = server
            .mock("GET", "/repos/acme/mirror/releases/tags/tool-v1.0.0")
            .with_status(200)
            .with_body(r#"{"id": 42, "upload_url": "https://uploads/x"}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/repos/acme/mirror/releases/42")
            .with_status(204)
            .create_async()
            .await;
        let delete_ref = server
            .mock("DELETE", "/repos/acme/mirror/git/refs/tags/tool-v1.0.0")
            .with_status(204)
            .create_async()
            .await;

        store(&server).delete_release("tool-v1.0.0").await.unwrap();

        delete.assert_async().await;
        delete_ref.assert_async().await;
    }

    #[tokio::test]
    async fn delete_release_succeeds_when_nothing_exists() {
        let mut server = Server::new_async().await;
        let _find = server
            .mock("GET", "/repos/acme/mirror/releases/tags/tool-v1.0.0")
            .with_status(404)
            .create_async()
            .await;
        let _delete_ref = server
            .mock("DELETE", "/repos/acme/mirror/git/refs/tags/tool-v1.0.0")
            .with_status(422)
            .create_async()
            .await;

        store(&server).delete_release("tool-v1.0.0").await.unwrap();
    }

    #[test]
    fn download_url_is_scheme_less() {
        let store = GitHubReleaseStore::new(DEFAULT_API_URL, REPO, None);
        assert_eq!(
            store.download_url("tool-v1.0.0", "tool-1.0.0.msi"),
            "github.com/acme/mirror/releases/download/tool-v1.0.0/tool-1.0.0.msi"
        );
    }
}
