use super::LedgerStore;
use serde_json::Value;
use std::collections::BTreeSet;

pub const DEFAULT_ID_FIELD: &str = "mblogid";

/// Deduplicated post identifiers, kept sorted so output files are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedIdSet(BTreeSet<String>);

impl TrackedIdSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.0.insert(id.into())
    }

    /// Newline-joined ids, the format the fetch layer reads.
    pub fn to_text(&self) -> String {
        self.iter().collect::<Vec<_>>().join("\n")
    }
}

impl<S: Into<String>> FromIterator<S> for TrackedIdSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        TrackedIdSet(iter.into_iter().map(Into::into).collect())
    }
}

/// One raw record file. `content` is `None` when the file could not be read.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub content: Option<String>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Some(content.into()),
        }
    }

    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregateOutcome {
    pub ids: TrackedIdSet,
    pub files_read: usize,
    pub files_skipped: usize,
    pub lines_skipped: usize,
}

/// Pulls post ids out of JSON-lines record files.
#[derive(Debug, Clone)]
pub struct IdAggregator {
    id_field: String,
}

impl Default for IdAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_FIELD)
    }
}

impl IdAggregator {
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
        }
    }

    pub fn aggregate<I>(&self, files: I) -> AggregateOutcome
    where
        I: IntoIterator<Item = RawFile>,
    {
        let mut outcome = AggregateOutcome::default();

        for file in files {
            let Some(content) = file.content else {
                tracing::warn!(file = %file.name, "Could not read record file, skipping");
                outcome.files_skipped += 1;
                continue;
            };
            outcome.files_read += 1;

            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match self.extract(line) {
                    Ok(id) => {
                        outcome.ids.insert(id);
                    }
                    Err(reason) => {
                        tracing::warn!(file = %file.name, line = line_no + 1, reason = %reason, "Skipping record");
                        outcome.lines_skipped += 1;
                    }
                }
            }
        }

        outcome
    }

    fn extract(&self, line: &str) -> Result<String, String> {
        let record: Value = serde_json::from_str(line).map_err(|e| format!("invalid JSON: {}", e))?;
        record
            .get(&self.id_field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| format!("missing string field '{}'", self.id_field))
    }

    /// Fetch each named file from `base_dir` in the store and aggregate them.
    /// Files that are absent or fail to load are skipped.
    pub async fn aggregate_from_store(
        &self,
        ledger: &LedgerStore,
        base_dir: &str,
        file_names: &[String],
    ) -> AggregateOutcome {
        let mut files = Vec::with_capacity(file_names.len());
        for name in file_names {
            let path = join_store_path(base_dir, name);
            let file = match ledger.read_text(&path).await {
                Ok(Some(text)) => RawFile::new(path, text),
                Ok(None) => RawFile::missing(path),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to load record file");
                    RawFile::missing(path)
                }
            };
            files.push(file);
        }
        self.aggregate(files)
    }
}

pub fn join_store_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name.trim_start_matches('/'))
}
