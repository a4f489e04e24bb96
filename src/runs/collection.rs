use super::{record_fault, RunContext, RunKind, RunReport};
use crate::ledger::{
    CollectionLogEntry, GroupLabel, GroupSequencer, JsonLog, LedgerError, OutputRenamer, NO_FILE,
};
use std::path::Path;
use tracing::Instrument;
use uuid::Uuid;

/// Assign the next group number to the crawler output in `local_dir`,
/// publish it and log the outcome.
pub async fn run_collection(ctx: &RunContext, local_dir: &Path) -> RunReport {
    let span = tracing::info_span!("collection", run_id = %Uuid::new_v4());
    let errors = ctx.error_log(ctx.paths.collection_error_log());

    async {
        match collect(ctx, local_dir).await {
            Ok(report) => report,
            Err(fault) => record_fault(RunKind::Collection, &errors, fault).await,
        }
    }
    .instrument(span)
    .await
}

async fn collect(ctx: &RunContext, local_dir: &Path) -> Result<RunReport, LedgerError> {
    // A log that can't take the entry must stop the run before a group
    // number is consumed or anything is uploaded.
    let log: JsonLog<CollectionLogEntry> =
        JsonLog::new(ctx.ledger.clone(), ctx.paths.collection_log());
    log.check().await?;

    let sequencer = GroupSequencer::new(ctx.ledger.clone(), ctx.paths.group_number());
    let group = sequencer.next().await?;

    let renamer = OutputRenamer::new(
        ctx.ledger.clone(),
        ctx.paths.collection_output_dir.clone(),
        &ctx.tracking.extension,
        ctx.clock.clone(),
    );
    let outcome = renamer.publish(local_dir, &GroupLabel::Single(group)).await;

    log.append(&CollectionLogEntry {
        file_name: outcome
            .published_name
            .clone()
            .unwrap_or_else(|| NO_FILE.to_string()),
        creation_time: outcome.creation_time.clone(),
        group_number: group,
        success: outcome.success,
    })
    .await?;

    let report = match (&outcome.published_name, &outcome.reason) {
        (Some(name), _) => {
            tracing::info!(group = %group, file = %name, "Collection run published");
            let mut report =
                RunReport::succeeded(RunKind::Collection, format!("group {} published as {}", group, name));
            report.published_name = Some(name.clone());
            report
        }
        (None, reason) => {
            let reason = reason
                .clone()
                .unwrap_or_else(|| GroupLabel::Single(group).missing_output_message(&outcome.creation_time));
            ctx.error_log(ctx.paths.collection_error_log())
                .record(&reason)
                .await?;
            RunReport::failed(RunKind::Collection, reason)
        }
    };

    Ok(report.with_groups(vec![group]))
}
