//! Source implementations for fetching tool versions

pub mod custom;
pub mod github;
pub mod marketplace;
pub mod npm;

pub use custom::CustomSource;
pub use github::GitHubSource;
pub use marketplace::{MarketplaceCatalog, MarketplaceSource};
pub use npm::NpmSource;
