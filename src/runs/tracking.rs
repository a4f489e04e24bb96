use super::{record_fault, RunContext, RunKind, RunReport};
use crate::ledger::window::{parse_collection_log, parse_group_range};
use crate::ledger::{
    CreationTimeIndex, GroupLabel, JsonLog, LedgerError, OutputRenamer, TrackingLogEntry,
    TrackingStatusTable,
};
use std::path::Path;
use tracing::Instrument;
use uuid::Uuid;

/// Publish the fetch layer's output for the groups chosen by the last
/// selection run, then count one tracking run for each of those groups.
pub async fn run_tracking_publish(ctx: &RunContext, local_dir: &Path) -> RunReport {
    let span = tracing::info_span!("tracking_publish", run_id = %Uuid::new_v4());
    let errors = ctx.error_log(ctx.paths.tracking_error_log());

    async {
        match publish(ctx, local_dir).await {
            Ok(report) => report,
            Err(fault) => record_fault(RunKind::TrackingPublish, &errors, fault).await,
        }
    }
    .instrument(span)
    .await
}

async fn publish(ctx: &RunContext, local_dir: &Path) -> Result<RunReport, LedgerError> {
    let errors = ctx.error_log(ctx.paths.tracking_error_log());
    let range_path = ctx.paths.group_range();

    let groups = match ctx.ledger.read_text(&range_path).await? {
        Some(text) => parse_group_range(&range_path, &text)?,
        None => {
            let message = format!("Group range file {} not found", range_path);
            errors.record(&message).await?;
            return Ok(RunReport::failed(RunKind::TrackingPublish, message));
        }
    };
    let Some(label) = GroupLabel::from_groups(&groups) else {
        let message = "No groups were selected for tracking".to_string();
        errors.record(&message).await?;
        return Ok(RunReport::failed(RunKind::TrackingPublish, message));
    };

    // Everything written after a successful upload must be readable first,
    // so a corrupt record aborts before the output is renamed or uploaded.
    let tracking_log: JsonLog<TrackingLogEntry> =
        JsonLog::new(ctx.ledger.clone(), ctx.paths.tracking_log());
    tracking_log.check().await?;
    let status = TrackingStatusTable::new(ctx.ledger.clone(), ctx.paths.tracking_status(), ctx.clock.clone());
    status.entries().await?;

    let log_path = ctx.paths.collection_log();
    let log_text = ctx.ledger.read_text(&log_path).await?;
    let index = CreationTimeIndex::from_log(&parse_collection_log(&log_path, log_text.as_deref()));

    let renamer = OutputRenamer::new(
        ctx.ledger.clone(),
        ctx.paths.tracking_output_dir.clone(),
        &ctx.tracking.extension,
        ctx.clock.clone(),
    );
    let outcome = renamer.publish(local_dir, &label).await;

    let Some(name) = outcome.published_name.clone() else {
        let reason = outcome
            .reason
            .clone()
            .unwrap_or_else(|| label.missing_output_message(&outcome.creation_time));
        errors.record(&reason).await?;
        return Ok(RunReport::failed(RunKind::TrackingPublish, reason).with_groups(groups));
    };

    tracking_log
        .append(&TrackingLogEntry {
            filename: name.clone(),
            creation_time: outcome.creation_time.clone(),
            groups_in_it: TrackingLogEntry::join_groups(&groups),
            success: true,
        })
        .await?;

    status
        .record_run(&groups, |group| index.lookup(group).map(str::to_string))
        .await?;

    tracing::info!(file = %name, groups = groups.len(), "Tracking run published");
    let mut report = RunReport::succeeded(
        RunKind::TrackingPublish,
        format!("{} group(s) published as {}", groups.len(), name),
    )
    .with_groups(groups);
    report.published_name = Some(name);
    Ok(report)
}
