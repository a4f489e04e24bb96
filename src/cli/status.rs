use crate::cli::run::require_config;
use crate::ledger::{GroupTrackingStatus, TrackingStatusTable};
use crate::runs::RunContext;
use std::path::PathBuf;

pub async fn show(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = require_config(config_path)?;
    let ctx = RunContext::from_config(&config)?;

    let table = TrackingStatusTable::new(ctx.ledger.clone(), ctx.paths.tracking_status(), ctx.clock.clone());
    let rows = table.entries().await?;

    print!("{}", render(&rows));
    Ok(())
}

pub fn render(rows: &[GroupTrackingStatus]) -> String {
    if rows.is_empty() {
        return "No groups have been tracked yet.\n".to_string();
    }

    let mut out = format!(
        "{:>6}  {:<19}  {:>7}  {:<19}\n",
        "group", "collected", "tracked", "last tracked"
    );
    for row in rows {
        out.push_str(&format!(
            "{:>6}  {:<19}  {:>7}  {:<19}\n",
            row.group_number, row.original_creation_time, row.tracked_times, row.last_tracked
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::GroupNumber;

    #[test]
    fn test_render_rows() {
        let rows = vec![GroupTrackingStatus {
            group_number: GroupNumber(12),
            original_creation_time: "2024-01-01-00-00-00".to_string(),
            tracked_times: 3,
            last_tracked: "2024-01-02-00-00-00".to_string(),
        }];
        let text = render(&rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("12"));
        assert!(lines[1].contains("2024-01-02-00-00-00"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]), "No groups have been tracked yet.\n");
    }
}
