use super::types::*;
use crate::config::{expand_env_vars, expand_tilde};
use regex::Regex;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(inner) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), inner),
        )),
        other => other,
    })
}

/// Parse and validate config text.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    // Expand environment variables in the YAML string before parsing
    let yaml = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml)?;

    let mut config: Config = serde_yaml::from_str(&yaml)?;
    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with the actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             Set them in the environment or replace them in the config file",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

/// Expands tilde (~) in local filesystem paths.
fn expand_paths(config: &mut Config) {
    if let StoreConfig::Local { root, .. } = &mut config.store {
        *root = expand_tilde(root);
    }
    config.local_output_dir = expand_tilde(&config.local_output_dir);
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    match &config.store {
        StoreConfig::Local { root, .. } => {
            if root.as_os_str().is_empty() {
                errors.push("store.root cannot be empty".to_string());
            }
        }
        StoreConfig::Dropbox {
            access_token,
            timeout,
            ..
        } => {
            if access_token.trim().is_empty() {
                errors.push("store.access_token cannot be empty".to_string());
            }
            if timeout.is_zero() {
                errors.push("store.timeout must be greater than zero".to_string());
            }
        }
    }
    if config.store.max_write_attempts() == 0 {
        errors.push("store.max_write_attempts must be at least 1".to_string());
    }

    for (field, dir) in [
        ("paths.records_dir", &config.paths.records_dir),
        ("paths.collection_output_dir", &config.paths.collection_output_dir),
        ("paths.tracking_output_dir", &config.paths.tracking_output_dir),
    ] {
        if !dir.starts_with('/') {
            errors.push(format!("{}: '{}' must start with '/'", field, dir));
        }
        if dir.split('/').any(|part| part == "..") {
            errors.push(format!("{}: '{}' cannot contain '..'", field, dir));
        }
    }

    for (field, name) in config.paths.files.named() {
        if name.is_empty() || name.contains('/') {
            errors.push(format!(
                "paths.files.{}: '{}' must be a plain file name",
                field, name
            ));
        }
    }

    let tracking = &config.tracking;
    if tracking.window.is_zero() {
        errors.push("tracking.window must be greater than zero".to_string());
    }
    let ext = tracking.extension.trim_start_matches('.');
    if ext.is_empty() || ext.contains('/') {
        errors.push(format!(
            "tracking.extension: '{}' is not a valid file extension",
            tracking.extension
        ));
    }
    if tracking.id_field.is_empty() {
        errors.push("tracking.id_field cannot be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_minimal_local_config_uses_defaults() {
        let config = parse_config(
            r#"
store:
  type: local
  root: /tmp/tracklog-store
"#,
        )
        .unwrap();

        assert_eq!(config.tracking.window, Duration::from_secs(48 * 3600));
        assert_eq!(config.tracking.extension, "jsonl");
        assert_eq!(config.tracking.id_field, "mblogid");
        assert_eq!(
            config.paths.group_number(),
            "/records_and_logs/group_number.txt"
        );
        assert_eq!(
            config.paths.tracking_status(),
            "/records_and_logs/repost_group_tracking_status.json"
        );
        assert_eq!(config.store.max_write_attempts(), 5);
    }

    #[test]
    fn test_dropbox_config_with_env_token() {
        std::env::set_var("TRACKLOG_TEST_TOKEN", "sl.abc");
        let config = parse_config(
            r#"
store:
  type: dropbox
  access_token: $env{TRACKLOG_TEST_TOKEN}
  timeout: 10s
tracking:
  window: 12h
"#,
        )
        .unwrap();
        std::env::remove_var("TRACKLOG_TEST_TOKEN");

        match config.store {
            StoreConfig::Dropbox {
                access_token,
                timeout,
                ..
            } => {
                assert_eq!(access_token, "sl.abc");
                assert_eq!(timeout, Duration::from_secs(10));
            }
            other => panic!("expected dropbox store, got {:?}", other),
        }
        assert_eq!(config.tracking.window, Duration::from_secs(12 * 3600));
    }

    #[test]
    fn test_unset_env_var_is_reported_by_name() {
        let err = parse_config(
            r#"
store:
  type: dropbox
  access_token: $env{TRACKLOG_SURELY_UNSET_VAR}
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("TRACKLOG_SURELY_UNSET_VAR"));
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let err = parse_config(
            r#"
store:
  type: local
  root: /tmp/x
  max_write_attempts: 0
paths:
  records_dir: relative/dir
  files:
    group_number: nested/group.txt
tracking:
  window: 0s
  extension: ""
"#,
        )
        .unwrap_err();

        match err {
            ConfigError::ValidationList(errors) => {
                assert_eq!(errors.len(), 5, "{:?}", errors);
            }
            other => panic!("expected validation list, got {}", other),
        }
    }

    #[test]
    fn test_unknown_store_type_is_rejected() {
        let err = parse_config("store:\n  type: s3\n  bucket: x\n").unwrap_err();
        assert!(matches!(err, ConfigError::YamlParse(_)));
    }
}
