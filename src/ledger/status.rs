use super::journal::parse_array;
use super::{
    to_json_bytes, CollectionLogEntry, GroupNumber, GroupTrackingStatus, LedgerError, LedgerStore,
    Result, UNKNOWN_CREATION_TIME,
};
use crate::clock::Clock;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Group number to original creation time, built once from the collection
/// log. The earliest entry for a group wins.
#[derive(Debug, Clone, Default)]
pub struct CreationTimeIndex {
    times: HashMap<GroupNumber, String>,
}

impl CreationTimeIndex {
    pub fn from_log<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a CollectionLogEntry>,
    {
        let mut times = HashMap::new();
        for entry in entries {
            times
                .entry(entry.group_number)
                .or_insert_with(|| entry.creation_time.clone());
        }
        Self { times }
    }

    pub fn lookup(&self, group: GroupNumber) -> Option<&str> {
        self.times.get(&group).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Per-group count of tracking runs.
pub struct TrackingStatusTable {
    ledger: LedgerStore,
    path: String,
    clock: Arc<dyn Clock>,
}

impl TrackingStatusTable {
    pub fn new(ledger: LedgerStore, path: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            path: path.into(),
            clock,
        }
    }

    pub async fn entries(&self) -> Result<Vec<GroupTrackingStatus>> {
        match self.ledger.read_text(&self.path).await? {
            Some(text) => Ok(decode(&self.path, &text)?
                .into_iter()
                .map(|(_, entry)| entry)
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Count one tracking run for `group`.
    pub async fn record_tracking<F>(&self, group: GroupNumber, lookup: F) -> Result<GroupTrackingStatus>
    where
        F: Fn(GroupNumber) -> Option<String>,
    {
        let mut updated = self.record_run(&[group], lookup).await?;
        updated
            .pop()
            .ok_or_else(|| LedgerError::corrupt(&self.path, "tracking entry vanished during update"))
    }

    /// Count one tracking run for every group in `groups` with a single
    /// rewrite of the table. Returns the updated entries in `groups` order.
    pub async fn record_run<F>(&self, groups: &[GroupNumber], lookup: F) -> Result<Vec<GroupTrackingStatus>>
    where
        F: Fn(GroupNumber) -> Option<String>,
    {
        let now = self.clock.timestamp();
        let path = self.path.clone();

        let updated = self
            .ledger
            .read_modify_write(&self.path, |current| {
                let (mut raw, mut table): (Vec<Value>, Vec<GroupTrackingStatus>) = match current {
                    Some(blob) => decode(&path, blob.text()?)?.into_iter().unzip(),
                    None => (Vec::new(), Vec::new()),
                };
                let mut index: HashMap<GroupNumber, usize> = table
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(i, entry)| (entry.group_number, i))
                    .collect();

                let mut touched = Vec::with_capacity(groups.len());
                for &group in groups {
                    let slot = match index.get(&group) {
                        Some(&i) => {
                            let entry = &mut table[i];
                            entry.tracked_times += 1;
                            entry.last_tracked = now.clone();
                            i
                        }
                        None => {
                            let original = lookup(group).unwrap_or_else(|| {
                                tracing::warn!(group = %group, "No collection log entry for group");
                                UNKNOWN_CREATION_TIME.to_string()
                            });
                            table.push(GroupTrackingStatus {
                                group_number: group,
                                original_creation_time: original,
                                tracked_times: 1,
                                last_tracked: now.clone(),
                            });
                            raw.push(Value::Null);
                            index.insert(group, table.len() - 1);
                            table.len() - 1
                        }
                    };
                    touched.push(slot);
                }

                let updated: Vec<GroupTrackingStatus> = touched.iter().map(|&i| table[i].clone()).collect();
                let rows = table
                    .iter()
                    .zip(&raw)
                    .map(|(entry, original)| merge_row(entry, original))
                    .collect::<Result<Vec<Value>>>()?;
                Ok((to_json_bytes(&rows)?, updated))
            })
            .await?;

        tracing::info!(path = %self.path, groups = groups.len(), "Updated tracking status");
        Ok(updated)
    }
}

/// Stored rows paired with their typed view. The raw row is kept so fields
/// this crate does not know about survive a rewrite.
fn decode(path: &str, text: &str) -> Result<Vec<(Value, GroupTrackingStatus)>> {
    parse_array(path, text)?
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let entry = GroupTrackingStatus::deserialize(&value)
                .map_err(|e| LedgerError::corrupt(path, format!("entry {}: {}", i, e)))?;
            Ok((value, entry))
        })
        .collect()
}

fn merge_row(entry: &GroupTrackingStatus, original: &Value) -> Result<Value> {
    let mut row = serde_json::to_value(entry)?;
    if let (Value::Object(known), Value::Object(stored)) = (&mut row, original) {
        for (key, value) in stored {
            known.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::Duration;

    fn table() -> (Arc<ManualClock>, TrackingStatusTable) {
        let clock = Arc::new(ManualClock::at("2024-01-02-00-00-00").unwrap());
        let ledger = LedgerStore::new(Arc::new(MemoryStore::new()), 3);
        let table = TrackingStatusTable::new(ledger, "/status.json", clock.clone());
        (clock, table)
    }

    fn index() -> CreationTimeIndex {
        let log = vec![CollectionLogEntry {
            file_name: "a".to_string(),
            creation_time: "2024-01-01-00-00-00".to_string(),
            group_number: GroupNumber(1),
            success: true,
        }];
        CreationTimeIndex::from_log(&log)
    }

    #[tokio::test]
    async fn test_first_tracking_creates_entry_then_increments() {
        let (clock, table) = table();
        let idx = index();
        let lookup = |g| idx.lookup(g).map(str::to_string);

        let first = table.record_tracking(GroupNumber(1), lookup).await.unwrap();
        assert_eq!(first.tracked_times, 1);
        assert_eq!(first.original_creation_time, "2024-01-01-00-00-00");
        assert_eq!(first.last_tracked, "2024-01-02-00-00-00");

        clock.advance(Duration::hours(1));
        let second = table.record_tracking(GroupNumber(1), lookup).await.unwrap();
        assert_eq!(second.tracked_times, 2);
        assert!(second.last_tracked > first.last_tracked);
        assert_eq!(second.original_creation_time, first.original_creation_time);

        assert_eq!(table.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_group_gets_sentinel_creation_time() {
        let (_, table) = table();
        let entry = table.record_tracking(GroupNumber(99), |_| None).await.unwrap();
        assert_eq!(entry.original_creation_time, UNKNOWN_CREATION_TIME);
    }

    #[tokio::test]
    async fn test_record_run_covers_every_group() {
        let (_, table) = table();
        let idx = index();
        let lookup = |g| idx.lookup(g).map(str::to_string);

        table.record_run(&[GroupNumber(1), GroupNumber(2)], lookup).await.unwrap();
        let updated = table
            .record_run(&[GroupNumber(2), GroupNumber(3)], lookup)
            .await
            .unwrap();

        assert_eq!(updated[0].group_number, GroupNumber(2));
        assert_eq!(updated[0].tracked_times, 2);
        assert_eq!(updated[1].tracked_times, 1);

        let counts: Vec<(u64, u64)> = table
            .entries()
            .await
            .unwrap()
            .iter()
            .map(|e| (e.group_number.0, e.tracked_times))
            .collect();
        assert_eq!(counts, vec![(1, 1), (2, 2), (3, 1)]);
    }

    #[tokio::test]
    async fn test_rewrite_keeps_unknown_row_fields() {
        use crate::storage::{BlobStore, WriteMode};

        let store = Arc::new(MemoryStore::new());
        store
            .put(
                "/status.json",
                br#"[{"group_number": 1, "original_creation_time": "2024-01-01-00-00-00",
                      "tracked_times": 4, "last_tracked": "2024-01-01-12-00-00", "note": "manual fix"}]"#
                    .to_vec(),
                WriteMode::Overwrite,
            )
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::at("2024-01-02-00-00-00").unwrap());
        let table = TrackingStatusTable::new(LedgerStore::new(store.clone(), 3), "/status.json", clock);

        table
            .record_run(&[GroupNumber(1), GroupNumber(2)], |_| None)
            .await
            .unwrap();

        let text = String::from_utf8(store.get("/status.json").await.unwrap().unwrap().content).unwrap();
        let rows: Vec<Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["note"], "manual fix");
        assert_eq!(rows[0]["tracked_times"], 5);
        assert_eq!(rows[0]["last_tracked"], "2024-01-02-00-00-00");
        assert_eq!(rows[1]["group_number"], 2);
        assert!(rows[1].get("note").is_none());
    }

    #[test]
    fn test_index_keeps_first_entry_per_group() {
        let log = vec![
            CollectionLogEntry {
                file_name: "first".to_string(),
                creation_time: "2024-01-01-00-00-00".to_string(),
                group_number: GroupNumber(5),
                success: false,
            },
            CollectionLogEntry {
                file_name: "second".to_string(),
                creation_time: "2024-01-01-01-00-00".to_string(),
                group_number: GroupNumber(5),
                success: true,
            },
        ];
        let idx = CreationTimeIndex::from_log(&log);
        assert_eq!(idx.lookup(GroupNumber(5)), Some("2024-01-01-00-00-00"));
        assert_eq!(idx.lookup(GroupNumber(6)), None);
    }
}
