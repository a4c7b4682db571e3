mod helper;

use std::sync::Arc;

use chrono::Utc;
use release_radar::config::{DownloadEntry, DownloadSpec, DownloadsConfig};
use release_radar::manifest::{ManifestTool, generate_manifest};
use release_radar::mirror::AssetMirror;
use release_radar::mirror::types::MirrorConfig;
use release_radar::tracker::checker::ChangeDetector;
use release_radar::tracker::sources::MarketplaceCatalog;
use release_radar::tracker::store::{VersionStore, VersionStorer};
use release_radar::tracker::types::{ToolDescriptor, ToolSource};
use tempfile::TempDir;

use helper::{FakeDownloader, FakeReleaseStore, FakeResolver, NoDelay, RecordingReporter};

fn tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "VSCode",
            ToolSource::Custom {
                strategy: "vscode".to_string(),
                url: None,
                fallback_url: None,
            },
        ),
        ToolDescriptor::new(
            "Ninja",
            ToolSource::Github {
                repo: "ninja-build/ninja".to_string(),
            },
        ),
    ]
}

fn downloads() -> DownloadsConfig {
    let mut downloads = DownloadsConfig::new();
    downloads.insert(
        "VSCode".to_string(),
        DownloadEntry::Download(DownloadSpec {
            display_name: "VS Code".to_string(),
            download_url: "{{MIRROR_URL}}".to_string(),
            filename: "VSCode-{{VERSION}}-x64.msi".to_string(),
            mirror: Some(MirrorConfig::direct(
                "https://update.code.visualstudio.com/latest/win32-x64/stable",
            )),
        }),
    );
    downloads.insert(
        "Ninja".to_string(),
        DownloadEntry::Download(DownloadSpec {
            display_name: "Ninja".to_string(),
            download_url: "github.com/ninja-build/ninja/releases/download/v{{VERSION}}/ninja-win.zip"
                .to_string(),
            filename: "ninja-{{VERSION}}-win.zip".to_string(),
            mirror: None,
        }),
    );
    downloads
}

struct Pipeline {
    _dir: TempDir,
    store: Arc<VersionStore>,
    resolver: Arc<FakeResolver>,
    releases: Arc<FakeReleaseStore>,
    downloader: Arc<FakeDownloader>,
    reporter: Arc<RecordingReporter>,
    detector: ChangeDetector<VersionStore>,
}

fn pipeline() -> Pipeline {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(VersionStore::open(&dir.path().join("versions.json")).unwrap());
    let resolver = Arc::new(FakeResolver::default());
    let releases = Arc::new(FakeReleaseStore::default());
    let downloader = Arc::new(FakeDownloader::default());
    let reporter = Arc::new(RecordingReporter::default());

    let mirror = AssetMirror::new(
        releases.clone(),
        downloader.clone(),
        MarketplaceCatalog::default(),
    )
    .with_delay(Arc::new(NoDelay));
    let detector = ChangeDetector::new(
        resolver.clone(),
        store.clone(),
        reporter.clone(),
        downloads(),
    )
    .with_mirror(Arc::new(mirror));

    Pipeline {
        _dir: dir,
        store,
        resolver,
        releases,
        downloader,
        reporter,
        detector,
    }
}

#[tokio::test]
async fn first_run_records_versions_without_updates_or_mirrors() {
    let p = pipeline();
    p.resolver.set("VSCode", "1.96.0");
    p.resolver.set("Ninja", "1.11.1");

    let report = p.detector.check_all(&tools()).await.unwrap();

    assert!(!report.has_updates());
    assert_eq!(p.store.get_version("VSCode").unwrap(), Some("1.96.0".to_string()));
    assert_eq!(p.store.get_version("Ninja").unwrap(), Some("1.11.1".to_string()));
    assert!(p.releases.tags().is_empty());
    assert!(p.reporter.updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn version_change_is_reported_mirrored_and_published_in_manifest() {
    let p = pipeline();
    p.resolver.set("VSCode", "1.96.0");
    p.resolver.set("Ninja", "1.11.1");
    p.detector.check_all(&tools()).await.unwrap();

    p.resolver.set("VSCode", "1.97.0");
    p.resolver.set("Ninja", "1.12.0");
    let report = p.detector.check_all(&tools()).await.unwrap();

    assert_eq!(report.update_count(), 2);
    assert_eq!(p.reporter.updates.lock().unwrap().len(), 2);

    // Only VSCode has mirror settings
    let releases = p.releases.releases.lock().unwrap().clone();
    assert_eq!(releases.len(), 1);
    assert!(releases[0].0.starts_with("batch-"));
    assert_eq!(releases[0].1, vec!["VSCode-1.97.0-x64.msi".to_string()]);

    let mirror_url = p.store.get_mirror_url("VSCode").unwrap().unwrap();
    assert!(mirror_url.ends_with("/VSCode-1.97.0-x64.msi"));
    assert_eq!(p.store.get_mirror_url("Ninja").unwrap(), None);

    let manifest = generate_manifest(
        &p.store.all_versions().unwrap(),
        &p.store.all_mirror_urls().unwrap(),
        &downloads(),
        Utc::now(),
    );
    let vscode = manifest
        .tools
        .iter()
        .find_map(|tool| match tool {
            ManifestTool::Download(t) if t.name == "VSCode" => Some(t),
            _ => None,
        })
        .unwrap();
    assert_eq!(vscode.download_url, format!("{{{{NEXUS_URL}}}}/{}", mirror_url));
    assert_eq!(vscode.version, "1.97.0");
}

#[tokio::test]
async fn unchanged_run_does_not_mirror_again() {
    let p = pipeline();
    p.resolver.set("VSCode", "1.96.0");
    p.resolver.set("Ninja", "1.11.1");
    p.detector.check_all(&tools()).await.unwrap();
    p.resolver.set("VSCode", "1.97.0");
    p.detector.check_all(&tools()).await.unwrap();
    let downloads_after_change = p.downloader.calls.lock().unwrap().len();

    let report = p.detector.check_all(&tools()).await.unwrap();

    assert!(!report.has_updates());
    assert_eq!(p.downloader.calls.lock().unwrap().len(), downloads_after_change);
}

#[tokio::test]
async fn unresolvable_tool_is_reported_as_failure() {
    let p = pipeline();
    p.resolver.set("Ninja", "1.11.1");

    let report = p.detector.check_all(&tools()).await.unwrap();

    let failures = p.reporter.failures.lock().unwrap().clone();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "VSCode");
    assert_eq!(failures[0].error, "Release not found: VSCode");
    assert_eq!(report.failures, failures);
    assert_eq!(p.store.get_version("Ninja").unwrap(), Some("1.11.1".to_string()));
}

#[tokio::test]
async fn single_mirror_is_idempotent_per_version() {
    let p = pipeline();
    let mirror = AssetMirror::new(
        p.releases.clone(),
        p.downloader.clone(),
        MarketplaceCatalog::default(),
    );
    let request = release_radar::mirror::types::MirrorRequest {
        tool_name: "Claude Code VSCode".to_string(),
        version: "2.1.9".to_string(),
        config: MirrorConfig::direct("https://example.com/claude-code.vsix"),
        filename_template: "claude-code-{{VERSION}}.vsix".to_string(),
    };

    let first = mirror.mirror(&request, false).await;
    let second = mirror.mirror(&request, false).await;

    assert!(first.is_success());
    assert_eq!(first, second);
    assert_eq!(p.downloader.calls.lock().unwrap().len(), 1);
    assert_eq!(p.releases.tags(), vec!["claude-code-vscode-v2.1.9".to_string()]);
}
