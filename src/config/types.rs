use crate::clock::ClockKind;
use crate::ledger::aggregate::join_store_path;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub clock: ClockKind,
    /// Directory the crawler writes its output file into.
    #[serde(default = "default_local_output_dir")]
    pub local_output_dir: PathBuf,
}

fn default_local_output_dir() -> PathBuf {
    PathBuf::from("../output")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Local {
        root: PathBuf,
        #[serde(default = "default_max_write_attempts")]
        max_write_attempts: u32,
    },
    Dropbox {
        access_token: String,
        #[serde(default = "default_timeout", with = "humantime_serde")]
        timeout: Duration,
        /// Override of the content API endpoint.
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default = "default_max_write_attempts")]
        max_write_attempts: u32,
    },
}

impl StoreConfig {
    pub fn max_write_attempts(&self) -> u32 {
        match self {
            StoreConfig::Local {
                max_write_attempts, ..
            }
            | StoreConfig::Dropbox {
                max_write_attempts, ..
            } => *max_write_attempts,
        }
    }
}

fn default_max_write_attempts() -> u32 {
    crate::ledger::DEFAULT_MAX_WRITE_ATTEMPTS
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Locations inside the blob store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub records_dir: String,
    pub collection_output_dir: String,
    pub tracking_output_dir: String,
    pub files: RecordFiles,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            records_dir: "/records_and_logs".to_string(),
            collection_output_dir: "/keyword_output".to_string(),
            tracking_output_dir: "/repost_output".to_string(),
            files: RecordFiles::default(),
        }
    }
}

/// File names of the bookkeeping records, relative to `records_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFiles {
    pub group_number: String,
    pub groups_to_track: String,
    pub group_range: String,
    pub combined_post_ids: String,
    pub collection_log: String,
    pub collection_error_log: String,
    pub tracking_log: String,
    pub tracking_status: String,
    pub tracking_error_log: String,
}

impl Default for RecordFiles {
    fn default() -> Self {
        Self {
            group_number: "group_number.txt".to_string(),
            groups_to_track: "groups_to_track.txt".to_string(),
            group_range: "group_number_range.txt".to_string(),
            combined_post_ids: "combined_post_ids.txt".to_string(),
            collection_log: "keyword_output_log.json".to_string(),
            collection_error_log: "keyword_error_log.json".to_string(),
            tracking_log: "repost_output_log.json".to_string(),
            tracking_status: "repost_group_tracking_status.json".to_string(),
            tracking_error_log: "repost_error_log.json".to_string(),
        }
    }
}

impl RecordFiles {
    pub fn named(&self) -> [(&'static str, &str); 9] {
        [
            ("group_number", self.group_number.as_str()),
            ("groups_to_track", self.groups_to_track.as_str()),
            ("group_range", self.group_range.as_str()),
            ("combined_post_ids", self.combined_post_ids.as_str()),
            ("collection_log", self.collection_log.as_str()),
            ("collection_error_log", self.collection_error_log.as_str()),
            ("tracking_log", self.tracking_log.as_str()),
            ("tracking_status", self.tracking_status.as_str()),
            ("tracking_error_log", self.tracking_error_log.as_str()),
        ]
    }
}

impl PathsConfig {
    fn record(&self, name: &str) -> String {
        join_store_path(&self.records_dir, name)
    }

    pub fn group_number(&self) -> String {
        self.record(&self.files.group_number)
    }

    pub fn groups_to_track(&self) -> String {
        self.record(&self.files.groups_to_track)
    }

    pub fn group_range(&self) -> String {
        self.record(&self.files.group_range)
    }

    pub fn combined_post_ids(&self) -> String {
        self.record(&self.files.combined_post_ids)
    }

    pub fn collection_log(&self) -> String {
        self.record(&self.files.collection_log)
    }

    pub fn collection_error_log(&self) -> String {
        self.record(&self.files.collection_error_log)
    }

    pub fn tracking_log(&self) -> String {
        self.record(&self.files.tracking_log)
    }

    pub fn tracking_status(&self) -> String {
        self.record(&self.files.tracking_status)
    }

    pub fn tracking_error_log(&self) -> String {
        self.record(&self.files.tracking_error_log)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub extension: String,
    pub id_field: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(48 * 3600),
            extension: "jsonl".to_string(),
            id_field: crate::ledger::aggregate::DEFAULT_ID_FIELD.to_string(),
        }
    }
}
