//! The three scheduled run kinds. Each run reads and writes the shared
//! records in the blob store and finishes with a [`RunReport`].
//!
//! Runs of the same kind must not overlap against one store namespace.
//! Conditional writes turn an overlap into a retried conflict instead of a
//! lost update, but they cannot make two collection runs agree on what they
//! published.

pub mod collection;
pub mod selection;
pub mod tracking;

pub use collection::run_collection;
pub use selection::run_selection;
pub use tracking::run_tracking_publish;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, PathsConfig, TrackingConfig};
use crate::ledger::{ErrorLog, GroupNumber, LedgerError, LedgerStore};
use crate::storage::{open_store, BlobStore, StorageError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Collection,
    Selection,
    TrackingPublish,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunKind::Collection => "collection",
            RunKind::Selection => "selection",
            RunKind::TrackingPublish => "tracking-publish",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub kind: RunKind,
    pub success: bool,
    pub summary: String,
    pub groups: Vec<GroupNumber>,
    pub published_name: Option<String>,
    pub post_ids: usize,
}

impl RunReport {
    pub fn succeeded(kind: RunKind, summary: impl Into<String>) -> Self {
        Self {
            kind,
            success: true,
            summary: summary.into(),
            groups: Vec::new(),
            published_name: None,
            post_ids: 0,
        }
    }

    pub fn failed(kind: RunKind, summary: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::succeeded(kind, summary)
        }
    }

    pub fn with_groups(mut self, groups: Vec<GroupNumber>) -> Self {
        self.groups = groups;
        self
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "ok" } else { "FAILED" };
        write!(f, "{} run {}: {}", self.kind, status, self.summary)
    }
}

/// Everything a run needs: store handle, clock and layout.
#[derive(Clone)]
pub struct RunContext {
    pub ledger: LedgerStore,
    pub clock: Arc<dyn Clock>,
    pub paths: PathsConfig,
    pub tracking: TrackingConfig,
}

impl RunContext {
    pub fn new(store: Arc<dyn BlobStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            ledger: LedgerStore::new(store, config.store.max_write_attempts()),
            clock,
            paths: config.paths.clone(),
            tracking: config.tracking.clone(),
        }
    }

    /// Open the configured store and use the system clock.
    pub fn from_config(config: &Config) -> Result<Self, RunError> {
        let store = open_store(&config.store)?;
        let clock = Arc::new(SystemClock::new(config.clock));
        Ok(Self::new(store, clock, config))
    }

    pub fn error_log(&self, path: String) -> ErrorLog {
        ErrorLog::new(self.ledger.clone(), path, self.clock.clone())
    }
}

/// Turn a fault that escaped a run into a failed report, recording it in
/// the run's error log when the log is still writable.
pub(crate) async fn record_fault(kind: RunKind, errors: &ErrorLog, fault: LedgerError) -> RunReport {
    let message = format!("{} run failed: {}", kind, fault);
    tracing::error!(run = %kind, error = %fault, "Run failed");
    if let Err(e) = errors.record(&message).await {
        tracing::error!(path = %errors.path(), error = %e, "Could not record failure in error log");
    }
    RunReport::failed(kind, message)
}
