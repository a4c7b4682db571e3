pub mod config;
pub mod manifest;
pub mod mirror;
pub mod report;
pub mod tracker;
