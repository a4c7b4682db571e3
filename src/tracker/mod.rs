//! Version tracking layer
//!
//! Resolves the current version of each tracked tool, compares it with the
//! last recorded one and hands changed tools to the mirror layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Resolver   │────▶│   Checker   │────▶│    Store    │
//! │ (dispatch)  │     │ (classify)  │     │   (JSON)    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                   │
//!        ▼                   ▼
//! ┌─────────────┐     ┌─────────────┐
//! │   Sources   │     │   Mirror    │
//! │(gh,npm,vsx) │     │  (batch)    │
//! └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`checker`]: Per-run change detection and reporting
//! - [`resolver`]: Dispatch from a tool to the source for its kind
//! - [`source`]: Source trait and shared HTTP helpers
//! - [`sources`]: Tag feed, registry, marketplace and custom sources
//! - [`store`]: Version store persisted as JSON
//! - [`template`]: `{{VERSION}}` placeholder expansion
//! - [`error`]: Error types for resolution, storage and checks
//! - [`types`]: Tool descriptors and source kinds

pub mod checker;
pub mod error;
pub mod resolver;
pub mod source;
pub mod sources;
pub mod store;
pub mod template;
pub mod types;
