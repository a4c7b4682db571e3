//! Republishing artifacts at a stable, proxy-reachable location
//!
//! ```text
//! MirrorRequest ──► AssetMirror ──► MarketplaceCatalog (VSIX negotiation)
//!                        │
//!                        ├──► Downloader   (artifact → staging dir)
//!                        └──► ReleaseStore (exists? / delete / create)
//! ```

pub mod asset;
pub mod downloader;
pub mod error;
pub mod github;
pub mod release;
pub mod types;

pub use asset::{AssetMirror, BatchMirror};
pub use downloader::HttpDownloader;
pub use github::GitHubReleaseStore;
