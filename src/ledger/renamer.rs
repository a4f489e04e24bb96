use super::aggregate::join_store_path;
use super::{GroupLabel, LedgerStore};
use crate::clock::Clock;
use crate::storage::WriteMode;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

/// Result of trying to publish a run's output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub success: bool,
    /// Canonical file name, set only on success.
    pub published_name: Option<String>,
    /// Timestamp the canonical name was built from.
    pub creation_time: String,
    /// Why publishing failed, suitable for the error log.
    pub reason: Option<String>,
}

impl PublishOutcome {
    fn published(name: String, creation_time: String) -> Self {
        Self {
            success: true,
            published_name: Some(name),
            creation_time,
            reason: None,
        }
    }

    fn failed(reason: String, creation_time: String) -> Self {
        Self {
            success: false,
            published_name: None,
            creation_time,
            reason: Some(reason),
        }
    }
}

/// Renames the freshly produced local output file to
/// `<timestamp>_<label>.<ext>` and uploads it under `remote_dir`.
pub struct OutputRenamer {
    ledger: LedgerStore,
    remote_dir: String,
    extension: String,
    clock: Arc<dyn Clock>,
    canonical: Regex,
}

impl OutputRenamer {
    pub fn new(
        ledger: LedgerStore,
        remote_dir: impl Into<String>,
        extension: &str,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let extension = extension.trim_start_matches('.').to_string();
        let canonical = Regex::new(&format!(
            r"^\d{{4}}(-\d{{2}}){{5}}_group_\d+(_group_\d+)?\.{}$",
            regex::escape(&extension)
        ))
        .expect("canonical name pattern is valid");

        Self {
            ledger,
            remote_dir: remote_dir.into(),
            extension,
            clock,
            canonical,
        }
    }

    pub fn canonical_name(&self, timestamp: &str, label: &GroupLabel) -> String {
        format!("{}_{}.{}", timestamp, label, self.extension)
    }

    /// Output files waiting to be published, sorted by name. Files that
    /// already carry a canonical name are left out.
    pub async fn candidates(&self, local_dir: &Path) -> std::io::Result<Vec<String>> {
        let suffix = format!(".{}", self.extension);
        let mut names = Vec::new();

        let mut dir = tokio::fs::read_dir(local_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(&suffix) && !self.canonical.is_match(&name) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    pub async fn publish(&self, local_dir: &Path, label: &GroupLabel) -> PublishOutcome {
        let now = self.clock.timestamp();
        let name = self.canonical_name(&now, label);

        let candidates = match self.candidates(local_dir).await {
            Ok(c) => c,
            Err(e) => {
                return PublishOutcome::failed(
                    format!("Failed to scan {}: {}", local_dir.display(), e),
                    now,
                )
            }
        };

        let Some(chosen) = candidates.first() else {
            return PublishOutcome::failed(label.missing_output_message(&now), now);
        };
        if candidates.len() > 1 {
            tracing::warn!(
                chosen = %chosen,
                ignored = ?&candidates[1..],
                "Several output files found, publishing the first by name"
            );
        }

        let original = local_dir.join(chosen);
        let renamed = local_dir.join(&name);
        if tokio::fs::try_exists(&renamed).await.unwrap_or(false) {
            return PublishOutcome::failed(format!("{} already exists locally", name), now);
        }

        if let Err(e) = tokio::fs::rename(&original, &renamed).await {
            return PublishOutcome::failed(format!("Failed to rename {} to {}: {}", chosen, name, e), now);
        }
        tracing::info!(from = %chosen, to = %name, "Renamed output file");

        match self.upload(&renamed, &name).await {
            Ok(remote) => {
                tracing::info!(file = %name, remote = %remote, "Uploaded output file");
                PublishOutcome::published(name, now)
            }
            Err(reason) => {
                restore(&renamed, &original).await;
                PublishOutcome::failed(reason, now)
            }
        }
    }

    async fn upload(&self, local: &Path, name: &str) -> Result<String, String> {
        let content = tokio::fs::read(local)
            .await
            .map_err(|e| format!("Failed to read {}: {}", local.display(), e))?;
        let remote = join_store_path(&self.remote_dir, name);
        self.ledger
            .store()
            .put(&remote, content, WriteMode::Overwrite)
            .await
            .map_err(|e| format!("Failed to upload {} to {}: {}", name, remote, e))?;
        Ok(remote)
    }
}

/// Move a renamed file back so a failed publish leaves nothing at the
/// canonical location.
async fn restore(renamed: &Path, original: &Path) {
    if let Err(e) = tokio::fs::rename(renamed, original).await {
        tracing::error!(
            file = %renamed.display(),
            error = %e,
            "Could not undo rename after failed upload"
        );
    }
}
