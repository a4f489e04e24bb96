use super::{GroupNumber, LedgerError, LedgerStore, Result};

/// Owner of the persisted group-number counter.
///
/// The counter is a single decimal number. An absent counter means no group
/// has been handed out yet.
pub struct GroupSequencer {
    ledger: LedgerStore,
    path: String,
}

impl GroupSequencer {
    pub fn new(ledger: LedgerStore, path: impl Into<String>) -> Self {
        Self {
            ledger,
            path: path.into(),
        }
    }

    /// Last group number handed out, if any.
    pub async fn current(&self) -> Result<Option<GroupNumber>> {
        match self.ledger.read_text(&self.path).await? {
            Some(text) => parse_counter(&self.path, &text),
            None => Ok(None),
        }
    }

    /// Persist and return the next group number.
    pub async fn next(&self) -> Result<GroupNumber> {
        let path = self.path.clone();
        let next = self
            .ledger
            .read_modify_write(&self.path, |current| {
                let last = match current {
                    Some(blob) => parse_counter(&path, blob.text()?)?,
                    None => None,
                };
                let next = last.unwrap_or(GroupNumber(0)).next();
                Ok((next.to_string().into_bytes(), next))
            })
            .await?;

        tracing::info!(group = %next, path = %self.path, "Assigned group number");
        Ok(next)
    }
}

fn parse_counter(path: &str, text: &str) -> Result<Option<GroupNumber>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<GroupNumber>()
        .map(Some)
        .map_err(|e| LedgerError::corrupt(path, format!("counter '{}' is not a number: {}", trimmed, e)))
}
