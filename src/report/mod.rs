//! Reporting of check results

use std::io::Write;
use std::sync::Mutex;

use thiserror::Error;
use tracing::info;

#[cfg(test)]
use mockall::automock;

use crate::tracker::checker::{FailureInfo, UpdateInfo};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report output lock poisoned")]
    LockPoisoned,
}

/// Trait for delivering batched run results
///
/// Both methods are called every run; an empty slice means nothing to report.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Reporter: Send + Sync {
    async fn send_batched_updates(&self, updates: &[UpdateInfo]) -> Result<(), ReportError>;

    async fn send_batched_failures(&self, failures: &[FailureInfo]) -> Result<(), ReportError>;
}

pub fn format_update(update: &UpdateInfo) -> String {
    format!(
        "🔄 {}: {} → {}",
        update.name, update.old_version, update.new_version
    )
}

pub fn format_failure(failure: &FailureInfo) -> String {
    format!("⚠️ Failed to check {}: {}", failure.name, failure.error)
}

/// Reporter writing one message per non-empty batch to a writer
pub struct ConsoleReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> Result<W, ReportError> {
        self.out.into_inner().map_err(|_| ReportError::LockPoisoned)
    }

    fn send(&self, lines: Vec<String>) -> Result<(), ReportError> {
        if lines.is_empty() {
            return Ok(());
        }
        let message = lines.join("\n");
        info!("{}", message);

        let mut out = self.out.lock().map_err(|_| ReportError::LockPoisoned)?;
        writeln!(out, "{}", message)?;
        out.flush()?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    async fn send_batched_updates(&self, updates: &[UpdateInfo]) -> Result<(), ReportError> {
        self.send(updates.iter().map(format_update).collect())
    }

    async fn send_batched_failures(&self, failures: &[FailureInfo]) -> Result<(), ReportError> {
        self.send(failures.iter().map(format_failure).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(name: &str, old: &str, new: &str) -> UpdateInfo {
        UpdateInfo {
            name: name.to_string(),
            old_version: old.to_string(),
            new_version: new.to_string(),
        }
    }

    #[tokio::test]
    async fn send_batched_updates_writes_one_line_per_update() {
        let reporter = ConsoleReporter::new(Vec::new());

        reporter
            .send_batched_updates(&[
                update("Ninja", "1.11.1", "1.12.0"),
                update("VSCode", "1.95.0", "1.96.0"),
            ])
            .await
            .unwrap();

        let output = String::from_utf8(reporter.into_inner().unwrap()).unwrap();
        assert_eq!(
            output,
            "🔄 Ninja: 1.11.1 → 1.12.0\n🔄 VSCode: 1.95.0 → 1.96.0\n"
        );
    }

    #[tokio::test]
    async fn send_batched_failures_formats_error() {
        let reporter = ConsoleReporter::new(Vec::new());

        reporter
            .send_batched_failures(&[FailureInfo {
                name: "VSCode".to_string(),
                error: "Network timeout".to_string(),
            }])
            .await
            .unwrap();

        let output = String::from_utf8(reporter.into_inner().unwrap()).unwrap();
        assert_eq!(output, "⚠️ Failed to check VSCode: Network timeout\n");
    }

    #[tokio::test]
    async fn empty_batches_write_nothing() {
        let reporter = ConsoleReporter::new(Vec::new());

        reporter.send_batched_updates(&[]).await.unwrap();
        reporter.send_batched_failures(&[]).await.unwrap();

        assert!(reporter.into_inner().unwrap().is_empty());
    }
}
