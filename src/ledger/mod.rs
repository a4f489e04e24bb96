//! Run bookkeeping: group numbering, window selection, id aggregation,
//! append-only run/error logs, per-group tracking status and output
//! publishing.

pub mod aggregate;
pub mod journal;
pub mod renamer;
pub mod sequencer;
pub mod status;
pub mod types;
pub mod window;

pub use aggregate::{AggregateOutcome, IdAggregator, RawFile, TrackedIdSet};
pub use journal::{ErrorLog, JsonLog};
pub use renamer::{OutputRenamer, PublishOutcome};
pub use sequencer::GroupSequencer;
pub use status::{CreationTimeIndex, TrackingStatusTable};
pub use types::*;
pub use window::{WindowSelection, WindowSelector};

use crate::storage::{Blob, BlobStore, StorageError};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("corrupt state in '{path}': {reason}")]
    Corrupt { path: String, reason: String },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("gave up on '{path}' after {attempts} conflicting writes")]
    TooManyConflicts { path: String, attempts: u32 },
}

impl LedgerError {
    pub fn corrupt(path: &str, reason: impl ToString) -> Self {
        LedgerError::Corrupt {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Store handle shared by the ledger components of one run.
#[derive(Clone)]
pub struct LedgerStore {
    store: Arc<dyn BlobStore>,
    max_write_attempts: u32,
}

impl LedgerStore {
    pub fn new(store: Arc<dyn BlobStore>, max_write_attempts: u32) -> Self {
        Self {
            store,
            max_write_attempts: max_write_attempts.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub async fn read_text(&self, path: &str) -> Result<Option<String>> {
        match self.store.get(path).await? {
            Some(blob) => Ok(Some(blob.text()?.to_string())),
            None => Ok(None),
        }
    }

    pub async fn write_text(&self, path: &str, text: &str) -> Result<()> {
        self.store
            .put(path, text.as_bytes().to_vec(), crate::storage::WriteMode::Overwrite)
            .await?;
        Ok(())
    }

    /// Read the blob at `path`, let `update` compute its replacement, and
    /// write it back only if nobody else wrote in between. Conflicts are
    /// retried from a fresh read.
    pub async fn read_modify_write<T, F>(&self, path: &str, mut update: F) -> Result<T>
    where
        F: FnMut(Option<&Blob>) -> Result<(Vec<u8>, T)>,
    {
        for attempt in 1..=self.max_write_attempts {
            let current = self.store.get(path).await?;
            let (content, output) = update(current.as_ref())?;
            let mode = crate::storage::WriteMode::after(current.as_ref());

            match self.store.put(path, content, mode).await {
                Ok(_) => return Ok(output),
                Err(e) if e.is_conflict() => {
                    tracing::warn!(path, attempt, "Concurrent write detected, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::TooManyConflicts {
            path: path.to_string(),
            attempts: self.max_write_attempts,
        })
    }
}

/// Pretty-print JSON with four-space indentation.
pub(crate) fn to_json_bytes<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}
