use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of the batch of posts produced by one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupNumber(pub u64);

impl GroupNumber {
    pub fn next(self) -> GroupNumber {
        GroupNumber(self.0 + 1)
    }
}

impl fmt::Display for GroupNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for GroupNumber {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(GroupNumber)
    }
}

/// The group part of a published file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupLabel {
    Single(GroupNumber),
    Range { first: GroupNumber, last: GroupNumber },
}

impl GroupLabel {
    /// Label spanning the lowest and highest group of a selection.
    pub fn from_groups(groups: &[GroupNumber]) -> Option<GroupLabel> {
        let first = *groups.iter().min()?;
        let last = *groups.iter().max()?;
        Some(GroupLabel::Range { first, last })
    }

    /// Message recorded when a run had nothing to publish.
    pub fn missing_output_message(&self, at: &str) -> String {
        match self {
            GroupLabel::Single(n) => format!("No output file found for group {}", n),
            GroupLabel::Range { first, last } => format!(
                "No output file found for group {} to group {} at {}",
                first, last, at
            ),
        }
    }
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupLabel::Single(n) => write!(f, "group_{}", n),
            GroupLabel::Range { first, last } => write!(f, "group_{}_group_{}", first, last),
        }
    }
}

pub const UNKNOWN_CREATION_TIME: &str = "Unknown";
pub const NO_FILE: &str = "None";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionLogEntry {
    pub file_name: String,
    pub creation_time: String,
    pub group_number: GroupNumber,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingLogEntry {
    pub filename: String,
    pub creation_time: String,
    pub groups_in_it: String,
    pub success: bool,
}

impl TrackingLogEntry {
    pub fn join_groups(groups: &[GroupNumber]) -> String {
        groups
            .iter()
            .map(|g| g.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Group numbers listed in `groups_in_it`; unparseable items are dropped.
    pub fn groups(&self) -> Vec<GroupNumber> {
        self.groups_in_it
            .split(',')
            .filter_map(|part| part.parse().ok())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTrackingStatus {
    pub group_number: GroupNumber,
    pub original_creation_time: String,
    pub tracked_times: u64,
    pub last_tracked: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub time: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_render_like_file_names() {
        assert_eq!(GroupLabel::Single(GroupNumber(7)).to_string(), "group_7");
        let range = GroupLabel::Range {
            first: GroupNumber(3),
            last: GroupNumber(9),
        };
        assert_eq!(range.to_string(), "group_3_group_9");
    }

    #[test]
    fn test_range_label_from_groups() {
        let groups = [GroupNumber(5), GroupNumber(4), GroupNumber(6)];
        assert_eq!(
            GroupLabel::from_groups(&groups),
            Some(GroupLabel::Range {
                first: GroupNumber(4),
                last: GroupNumber(6)
            })
        );
        assert_eq!(GroupLabel::from_groups(&[]), None);
    }

    #[test]
    fn test_groups_in_it_round_trips_through_text() {
        let entry = TrackingLogEntry {
            filename: "f".to_string(),
            creation_time: "t".to_string(),
            groups_in_it: TrackingLogEntry::join_groups(&[GroupNumber(1), GroupNumber(12)]),
            success: true,
        };
        assert_eq!(entry.groups_in_it, "1, 12");
        assert_eq!(entry.groups(), vec![GroupNumber(1), GroupNumber(12)]);
    }

    #[test]
    fn test_collection_entry_field_names() {
        let entry = CollectionLogEntry {
            file_name: "2024-01-01-00-00-00_group_1.jsonl".to_string(),
            creation_time: "2024-01-01-00-00-00".to_string(),
            group_number: GroupNumber(1),
            success: true,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["group_number"], 1);
        assert_eq!(value["file_name"], "2024-01-01-00-00-00_group_1.jsonl");
    }
}
