use super::{to_json_bytes, ErrorEntry, LedgerError, LedgerStore, Result};
use crate::clock::Clock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Append-only log stored as one JSON array.
///
/// Every append rewrites the whole array. Entries already present are kept
/// as raw JSON so fields this crate does not know about survive the rewrite.
pub struct JsonLog<T> {
    ledger: LedgerStore,
    path: String,
    _entry: PhantomData<fn() -> T>,
}

impl<T> JsonLog<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(ledger: LedgerStore, path: impl Into<String>) -> Self {
        Self {
            ledger,
            path: path.into(),
            _entry: PhantomData,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Append one entry and return the new length of the log.
    pub async fn append(&self, entry: &T) -> Result<usize> {
        let new_value = serde_json::to_value(entry)?;
        let path = self.path.clone();

        let len = self
            .ledger
            .read_modify_write(&self.path, |current| {
                let mut entries = match current {
                    Some(blob) => parse_array(&path, blob.text()?)?,
                    None => Vec::new(),
                };
                entries.push(new_value.clone());
                Ok((to_json_bytes(&entries)?, entries.len()))
            })
            .await?;

        tracing::debug!(path = %self.path, len, "Appended log entry");
        Ok(len)
    }

    /// Confirm the log can be appended to and return its current length.
    pub async fn check(&self) -> Result<usize> {
        match self.ledger.read_text(&self.path).await? {
            Some(text) => Ok(parse_array(&self.path, &text)?.len()),
            None => Ok(0),
        }
    }

    /// All entries, oldest first. An absent log is empty.
    pub async fn entries(&self) -> Result<Vec<T>> {
        match self.ledger.read_text(&self.path).await? {
            Some(text) => parse_array(&self.path, &text)?
                .into_iter()
                .enumerate()
                .map(|(i, value)| {
                    serde_json::from_value(value)
                        .map_err(|e| LedgerError::corrupt(&self.path, format!("entry {}: {}", i, e)))
                })
                .collect(),
            None => Ok(Vec::new()),
        }
    }
}

/// Parse a stored log. Empty or whitespace-only content counts as an empty
/// log; anything else that is not a JSON array is corrupt.
pub(crate) fn parse_array(path: &str, text: &str) -> Result<Vec<Value>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(LedgerError::corrupt(path, "expected a JSON array")),
        Err(e) => Err(LedgerError::corrupt(path, e)),
    }
}

/// Log of failure events, each stamped with the run clock.
pub struct ErrorLog {
    log: JsonLog<ErrorEntry>,
    clock: Arc<dyn Clock>,
}

impl ErrorLog {
    pub fn new(ledger: LedgerStore, path: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            log: JsonLog::new(ledger, path),
            clock,
        }
    }

    pub fn path(&self) -> &str {
        self.log.path()
    }

    pub async fn record(&self, message: &str) -> Result<()> {
        let entry = ErrorEntry {
            time: self.clock.timestamp(),
            error: message.to_string(),
        };
        self.log.append(&entry).await?;
        tracing::warn!(path = %self.log.path(), error = message, "Recorded error");
        Ok(())
    }

    pub async fn entries(&self) -> Result<Vec<ErrorEntry>> {
        self.log.entries().await
    }
}
