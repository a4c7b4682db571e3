use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use release_radar::config::{
    self, DownloadEntry, DownloadsConfig, LOG_FILE_NAME, RadarConfig, load_downloads,
};
use release_radar::manifest::generate_manifest;
use release_radar::mirror::error::MirrorError;
use release_radar::mirror::types::{MirrorOutcome, MirrorRequest};
use release_radar::mirror::{AssetMirror, GitHubReleaseStore, HttpDownloader};
use release_radar::report::ConsoleReporter;
use release_radar::tracker::checker::ChangeDetector;
use release_radar::tracker::resolver::{SourceResolver, VersionResolver, create_default_sources};
use release_radar::tracker::sources::MarketplaceCatalog;
use release_radar::tracker::store::{VersionStore, VersionStorer};

#[derive(Parser)]
#[command(name = "release-radar")]
#[command(version, about = "Track third-party tool releases and mirror their artifacts")]
struct Cli {
    /// Tracked tools (tools.json)
    #[arg(long, global = true, default_value = "config/tools.json")]
    config: PathBuf,

    /// Download settings (downloads.json)
    #[arg(long, global = true, default_value = "config/downloads.json")]
    downloads: PathBuf,

    /// Directory holding the version store and log file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one check pass over all tracked tools
    Check,
    /// Run check passes every `checkIntervalHours` until interrupted
    Watch,
    /// Mirror the current version of mirror-enabled tools
    Mirror {
        /// Republish even if a release already exists
        #[arg(long)]
        force: bool,
        /// Only these tools (default: every mirror-enabled tool)
        tools: Vec<String>,
    },
    /// Print tracked versions
    Status,
    /// Generate the downloadable-tools manifest
    Manifest {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Forget a tool's tracked version and mirror URL
    Forget { tool: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(config::data_dir);
    let _guard = init_logging(cli.verbose, &data_dir)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli, data_dir))
}

fn init_logging(verbose: u8, data_dir: &Path) -> anyhow::Result<WorkerGuard> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("release_radar=info")),
        1 => EnvFilter::new("release_radar=debug"),
        _ => EnvFilter::new("release_radar=trace"),
    };

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;
    let file_appender = tracing_appender::rolling::never(data_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    Ok(guard)
}

async fn run(cli: Cli, data_dir: PathBuf) -> anyhow::Result<()> {
    let store = Arc::new(VersionStore::open(&config::store_path(&data_dir))?);

    match &cli.command {
        Command::Check => {
            let radar = RadarConfig::load(&cli.config)?;
            let detector = build_detector(&cli, &radar, store)?;
            let summary = detector.check_all(&radar.tools).await?.summary();
            info!(
                "has_updates={} update_count={}",
                summary.has_updates, summary.update_count
            );
        }
        Command::Watch => {
            let radar = RadarConfig::load(&cli.config)?;
            let detector = build_detector(&cli, &radar, store)?;
            let period = Duration::from_secs(radar.check_interval_hours.max(1) * 3600);
            let mut interval = tokio::time::interval(period);
            info!("Checking every {} hours", radar.check_interval_hours);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = detector.check_all(&radar.tools).await {
                            warn!("Check failed: {}", e);
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Stopping");
                        break;
                    }
                }
            }
        }
        Command::Mirror { force, tools } => {
            let radar = RadarConfig::load(&cli.config)?;
            let downloads = load_downloads(&cli.downloads)?;
            mirror_tools(&cli, &radar, &downloads, &store, tools, *force).await?;
        }
        Command::Status => {
            let mut versions: Vec<_> = store.all_versions()?.into_iter().collect();
            if versions.is_empty() {
                println!("No versions tracked yet. Run check first.");
            }
            versions.sort();
            for (name, version) in versions {
                println!("{}: {}", name, version);
            }
        }
        Command::Manifest { output } => {
            let downloads = load_downloads(&cli.downloads)?;
            let manifest = generate_manifest(
                &store.all_versions()?,
                &store.all_mirror_urls()?,
                &downloads,
                Utc::now(),
            );
            let json = serde_json::to_string_pretty(&manifest)?;
            match output {
                Some(path) => {
                    std::fs::write(path, json)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    info!("Wrote manifest with {} tools to {:?}", manifest.tools.len(), path);
                }
                None => println!("{}", json),
            }
        }
        Command::Forget { tool } => {
            if store.delete_version(tool)? {
                println!("Forgot {}", tool);
            } else {
                println!("{} is not tracked", tool);
            }
        }
    }

    Ok(())
}

fn build_resolver(cli: &Cli) -> Arc<dyn VersionResolver> {
    Arc::new(SourceResolver::new(create_default_sources(
        cli.github_token.clone(),
        MarketplaceCatalog::default(),
    )))
}

fn build_mirror(cli: &Cli, repo: &str) -> AssetMirror {
    let releases = GitHubReleaseStore::new(
        release_radar::mirror::github::DEFAULT_API_URL,
        repo,
        cli.github_token.clone(),
    );
    AssetMirror::new(
        Arc::new(releases),
        Arc::new(HttpDownloader::new()),
        MarketplaceCatalog::default(),
    )
}

fn build_detector(
    cli: &Cli,
    radar: &RadarConfig,
    store: Arc<VersionStore>,
) -> anyhow::Result<ChangeDetector<VersionStore>> {
    let downloads = load_downloads(&cli.downloads)?;
    let detector = ChangeDetector::new(
        build_resolver(cli),
        store,
        Arc::new(ConsoleReporter::stdout()),
        downloads,
    );

    Ok(match &radar.mirror_repo {
        Some(repo) => detector.with_mirror(Arc::new(build_mirror(cli, repo))),
        None => {
            info!("No mirrorRepo configured, mirroring disabled");
            detector
        }
    })
}

async fn mirror_tools(
    cli: &Cli,
    radar: &RadarConfig,
    downloads: &DownloadsConfig,
    store: &VersionStore,
    only: &[String],
    force: bool,
) -> anyhow::Result<()> {
    let Some(repo) = &radar.mirror_repo else {
        return Err(MirrorError::Config)
            .with_context(|| format!("mirrorRepo missing in {:?}", cli.config));
    };
    let resolver = build_resolver(cli);
    let mirror = build_mirror(cli, repo);

    let selected: Vec<_> = radar
        .tools
        .iter()
        .filter(|tool| only.is_empty() || only.contains(&tool.name))
        .filter_map(|tool| {
            let spec = downloads.get(&tool.name).and_then(DownloadEntry::mirror)?;
            Some((tool, spec))
        })
        .collect();

    if selected.is_empty() {
        bail!("No mirror-enabled tools matched");
    }

    let mut failed = 0;
    for (tool, spec) in selected {
        let Some(config) = spec.mirror.clone() else {
            continue;
        };
        let version = match resolver.resolve(tool).await {
            Ok(version) => version,
            Err(e) => {
                println!("⚠️ Failed to check {}: {}", tool.name, e);
                failed += 1;
                continue;
            }
        };
        store.set_version(&tool.name, &version)?;

        let request = MirrorRequest {
            tool_name: tool.name.clone(),
            version: version.clone(),
            config,
            filename_template: spec.filename.clone(),
        };
        match mirror.mirror(&request, force).await {
            MirrorOutcome::Mirrored { download_url } => {
                store.set_mirror_url(&tool.name, &download_url)?;
                println!("✅ {} {}: {}", tool.name, version, download_url);
            }
            MirrorOutcome::Failed { error } => {
                println!("⚠️ Failed to mirror {}: {}", tool.name, error);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} tools failed to mirror", failed);
    }
    Ok(())
}
