use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use tracklog::config::generate::generate_starter_config;
use tracklog::config::{load_config, ConfigError, StoreConfig};

#[test]
fn test_generated_config_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(&config_path, generate_starter_config()).unwrap();

    let config = load_config(&config_path).expect("Generated config should be valid");

    assert!(matches!(config.store, StoreConfig::Local { .. }));
    assert_eq!(config.tracking.window, Duration::from_secs(48 * 3600));
    assert_eq!(
        config.paths.collection_log(),
        "/records_and_logs/keyword_output_log.json"
    );
}

#[test]
fn test_file_overrides_and_custom_layout() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    let config_yaml = r#"
store:
  type: local
  root: /srv/tracklog
paths:
  records_dir: /Dissertation/weibo_data/records_and_logs/
  files:
    combined_post_ids: ids.txt
tracking:
  window: 2days
clock: utc
local_output_dir: /tmp/crawl
"#;
    fs::write(&config_path, config_yaml).unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(
        config.paths.combined_post_ids(),
        "/Dissertation/weibo_data/records_and_logs/ids.txt"
    );
    assert_eq!(
        config.paths.group_number(),
        "/Dissertation/weibo_data/records_and_logs/group_number.txt"
    );
    assert_eq!(config.tracking.window, Duration::from_secs(48 * 3600));
    assert_eq!(config.local_output_dir, std::path::PathBuf::from("/tmp/crawl"));
}

#[test]
fn test_missing_file_reports_path() {
    let err = load_config(std::path::Path::new("/definitely/not/here.yml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
    assert!(err.to_string().contains("/definitely/not/here.yml"));
}

#[test]
fn test_yaml_errors_name_the_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("broken.yml");
    fs::write(&config_path, "store: [unclosed").unwrap();

    let err = load_config(&config_path).unwrap_err();
    assert!(err.to_string().contains("broken.yml"));
}

#[test]
fn test_empty_access_token_fails_validation() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        "store:\n  type: dropbox\n  access_token: \"\"\n",
    )
    .unwrap();

    match load_config(&config_path).unwrap_err() {
        ConfigError::ValidationList(errors) => {
            assert_eq!(errors, vec!["store.access_token cannot be empty".to_string()]);
        }
        other => panic!("expected validation error, got {}", other),
    }
}
