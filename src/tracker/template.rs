//! Placeholder expansion for download templates
//!
//! - `{{VERSION}}` -> the resolved version, verbatim
//! - `{{VERSION_BASE}}` -> leading `major.minor.patch` of the version
//!
//! `{{MIRROR_URL}}` and `{{NEXUS_URL}}` are handled by the manifest generator.

use std::sync::LazyLock;

use regex::Regex;

pub const VERSION: &str = "{{VERSION}}";
pub const VERSION_BASE: &str = "{{VERSION_BASE}}";
pub const MIRROR_URL: &str = "{{MIRROR_URL}}";
pub const NEXUS_URL: &str = "{{NEXUS_URL}}";

static VERSION_BASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+\.\d+)").expect("valid version base pattern"));

/// Extract the leading `major.minor.patch` of a version
///
/// Versions without such a prefix are returned unchanged.
pub fn version_base(version: &str) -> &str {
    VERSION_BASE_RE
        .captures(version)
        .and_then(|c| c.get(1))
        .map_or(version, |m| m.as_str())
}

/// Substitute `{{VERSION}}` and `{{VERSION_BASE}}` in a template
pub fn apply_version(template: &str, version: &str) -> String {
    template
        .replace(VERSION_BASE, version_base(version))
        .replace(VERSION, version)
}
