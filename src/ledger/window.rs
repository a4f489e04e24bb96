use super::{CollectionLogEntry, GroupLabel, GroupNumber, LedgerError, Result};
use crate::clock::parse_timestamp;
use chrono::NaiveDateTime;
use serde_json::Value;
use std::time::Duration;

/// Groups chosen for re-tracking, as parallel file-name and number lists in
/// collection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSelection {
    pub file_names: Vec<String>,
    pub groups: Vec<GroupNumber>,
}

impl WindowSelection {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Contents of the groups-to-track file.
    pub fn file_names_text(&self) -> String {
        self.file_names.join("\n")
    }

    /// Contents of the group-number-range file.
    pub fn groups_text(&self) -> String {
        self.groups
            .iter()
            .map(|g| g.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn label(&self) -> Option<GroupLabel> {
        GroupLabel::from_groups(&self.groups)
    }
}

/// Selects collection runs young enough to be tracked again.
#[derive(Debug, Clone, Copy)]
pub struct WindowSelector {
    window: Duration,
}

impl WindowSelector {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_hours(hours: u64) -> Self {
        Self::new(Duration::from_secs(hours.saturating_mul(3600)))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Keep entries with `0 <= now - creation_time <= window`, in input
    /// order. Entries stamped in the future are left out so clock skew can't
    /// pull a group in early. Entries with an unreadable timestamp are
    /// skipped.
    pub fn select<'a, I>(&self, log: I, now: NaiveDateTime) -> WindowSelection
    where
        I: IntoIterator<Item = &'a CollectionLogEntry>,
    {
        let window_secs = i64::try_from(self.window.as_secs()).unwrap_or(i64::MAX);
        let mut selection = WindowSelection::default();

        for entry in log {
            let created = match parse_timestamp(&entry.creation_time) {
                Ok(ts) => ts,
                Err(e) => {
                    tracing::warn!(group = %entry.group_number, error = %e, "Skipping log entry with bad creation time");
                    continue;
                }
            };

            let age = (now - created).num_seconds();
            if (0..=window_secs).contains(&age) {
                selection.file_names.push(entry.file_name.clone());
                selection.groups.push(entry.group_number);
            }
        }

        selection
    }
}

/// Leniently read a collection log for selection purposes. An absent or
/// unparseable log yields no entries; individual entries that don't match
/// the expected shape are skipped.
pub fn parse_collection_log(path: &str, text: Option<&str>) -> Vec<CollectionLogEntry> {
    let Some(text) = text else {
        tracing::info!(path, "Collection log does not exist yet");
        return Vec::new();
    };

    let values = match super::journal::parse_array(path, text) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(path, error = %e, "Collection log is unreadable, nothing to track");
            return Vec::new();
        }
    };

    values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value): (usize, Value)| match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(path, index = i, error = %e, "Skipping malformed collection log entry");
                None
            }
        })
        .collect()
}

/// Parse the group-number-range file written by a selection run.
pub fn parse_group_range(path: &str, text: &str) -> Result<Vec<GroupNumber>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<GroupNumber>()
                .map_err(|e| LedgerError::corrupt(path, format!("bad group number '{}': {}", line, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, created: &str, group: u64) -> CollectionLogEntry {
        CollectionLogEntry {
            file_name: name.to_string(),
            creation_time: created.to_string(),
            group_number: GroupNumber(group),
            success: true,
        }
    }

    fn ts(value: &str) -> NaiveDateTime {
        parse_timestamp(value).unwrap()
    }

    #[test]
    fn test_one_day_old_group_inside_two_day_window() {
        let log = vec![entry("a", "2024-01-01-00-00-00", 1)];
        let selection = WindowSelector::from_hours(48).select(&log, ts("2024-01-02-00-00-00"));
        assert_eq!(selection.file_names, vec!["a".to_string()]);
        assert_eq!(selection.groups, vec![GroupNumber(1)]);
    }

    #[test]
    fn test_one_day_old_group_outside_half_day_window() {
        let log = vec![entry("a", "2024-01-01-00-00-00", 1)];
        let selection = WindowSelector::from_hours(12).select(&log, ts("2024-01-02-00-00-00"));
        assert!(selection.file_names.is_empty());
        assert!(selection.groups.is_empty());
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let log = vec![
            entry("exact", "2024-01-01-00-00-00", 1),
            entry("just_over", "2023-12-31-23-59-59", 2),
        ];
        let selection = WindowSelector::from_hours(24).select(&log, ts("2024-01-02-00-00-00"));
        assert_eq!(selection.file_names, vec!["exact".to_string()]);
    }

    #[test]
    fn test_huge_window_saturates() {
        let selector = WindowSelector::from_hours(u64::MAX);
        assert_eq!(selector.window(), Duration::from_secs(u64::MAX));

        let log = vec![entry("ancient", "1970-01-01-00-00-00", 1)];
        let selection = selector.select(&log, ts("2024-01-02-00-00-00"));
        assert_eq!(selection.groups, vec![GroupNumber(1)]);
    }

    #[test]
    fn test_future_entries_are_excluded() {
        let log = vec![
            entry("now", "2024-01-02-00-00-00", 1),
            entry("future", "2024-01-02-00-00-01", 2),
        ];
        let selection = WindowSelector::from_hours(48).select(&log, ts("2024-01-02-00-00-00"));
        assert_eq!(selection.groups, vec![GroupNumber(1)]);
    }

    #[test]
    fn test_input_order_is_preserved() {
        let log = vec![
            entry("c", "2024-01-01-12-00-00", 3),
            entry("old", "2023-01-01-00-00-00", 1),
            entry("a", "2024-01-01-06-00-00", 5),
        ];
        let selection = WindowSelector::from_hours(48).select(&log, ts("2024-01-02-00-00-00"));
        assert_eq!(selection.file_names, vec!["c".to_string(), "a".to_string()]);
        assert_eq!(selection.groups_text(), "3\n5");
        assert_eq!(
            selection.label(),
            Some(GroupLabel::Range {
                first: GroupNumber(3),
                last: GroupNumber(5)
            })
        );
    }

    #[test]
    fn test_bad_timestamp_entry_is_skipped() {
        let log = vec![
            entry("bad", "yesterday", 1),
            entry("good", "2024-01-01-00-00-00", 2),
        ];
        let selection = WindowSelector::from_hours(48).select(&log, ts("2024-01-02-00-00-00"));
        assert_eq!(selection.groups, vec![GroupNumber(2)]);
    }

    #[test]
    fn test_parse_collection_log_is_lenient() {
        assert!(parse_collection_log("/log", None).is_empty());
        assert!(parse_collection_log("/log", Some("{oops")).is_empty());

        let text = r#"[
            {"file_name": "a", "creation_time": "2024-01-01-00-00-00", "group_number": 1, "success": true},
            {"file_name": "b"}
        ]"#;
        let entries = parse_collection_log("/log", Some(text));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "a");
    }

    #[test]
    fn test_parse_group_range() {
        let groups = parse_group_range("/range", "3\n4\n\n5\n").unwrap();
        assert_eq!(groups, vec![GroupNumber(3), GroupNumber(4), GroupNumber(5)]);
        assert!(parse_group_range("/range", "3\nx\n").is_err());
        assert!(parse_group_range("/range", "").unwrap().is_empty());
    }
}
