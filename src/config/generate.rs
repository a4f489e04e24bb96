pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# TRACKLOG CONFIGURATION
# =============================================================================
# Bookkeeping for scheduled collection and tracking runs.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/tracklog/config.yml
#   3. /etc/tracklog/config.yml
#
# Values written as a dollar sign, "env" and a braced variable name are
# replaced with that environment variable before the file is parsed.

# =============================================================================
# STORE
# =============================================================================
# Where run records and published output files are kept between runs.
#
#   type: local     a directory on this machine
#   type: dropbox   a Dropbox app folder, via the content API

store:
  type: local
  root: ~/tracklog-store
  # How many times a conflicting read-modify-write is retried
  max_write_attempts: 5

# store:
#   type: dropbox
#   access_token: <token or env placeholder for ACCESS_TOKEN>
#   timeout: 30s

# =============================================================================
# PATHS INSIDE THE STORE
# =============================================================================

paths:
  records_dir: /records_and_logs
  collection_output_dir: /keyword_output
  tracking_output_dir: /repost_output

# =============================================================================
# TRACKING
# =============================================================================

tracking:
  # Groups collected within this window are tracked again
  window: 48h
  # Extension of the crawler's output files
  extension: jsonl
  # Field holding the post identifier in collected records
  id_field: mblogid

# Clock used for timestamps and file names: local or utc
clock: local

# Directory the crawler writes its output file into
local_output_dir: ../output
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_starter_config_is_valid() {
        let config = parse_config(&generate_starter_config()).expect("starter config should parse");
        assert_eq!(config.paths.collection_output_dir, "/keyword_output");
        assert_eq!(config.tracking.window.as_secs(), 48 * 3600);
    }
}
