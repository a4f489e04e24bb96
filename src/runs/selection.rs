use super::{record_fault, RunContext, RunKind, RunReport};
use crate::ledger::window::parse_collection_log;
use crate::ledger::{IdAggregator, LedgerError, WindowSelector};
use chrono::NaiveDateTime;
use tracing::Instrument;
use uuid::Uuid;

/// Decide which groups to track and write the combined id list the fetch
/// layer works from. `now` overrides the run clock.
pub async fn run_selection(ctx: &RunContext, now: Option<NaiveDateTime>) -> RunReport {
    let span = tracing::info_span!("selection", run_id = %Uuid::new_v4());
    let errors = ctx.error_log(ctx.paths.tracking_error_log());

    async {
        match select(ctx, now).await {
            Ok(report) => report,
            Err(fault) => record_fault(RunKind::Selection, &errors, fault).await,
        }
    }
    .instrument(span)
    .await
}

async fn select(ctx: &RunContext, now: Option<NaiveDateTime>) -> Result<RunReport, LedgerError> {
    let now = now.unwrap_or_else(|| ctx.clock.now());
    let log_path = ctx.paths.collection_log();

    let log_text = ctx.ledger.read_text(&log_path).await?;
    let collected: Vec<_> = parse_collection_log(&log_path, log_text.as_deref())
        .into_iter()
        .filter(|entry| entry.success)
        .collect();

    let selection = WindowSelector::new(ctx.tracking.window).select(&collected, now);
    tracing::info!(
        considered = collected.len(),
        selected = selection.len(),
        groups = ?selection.groups,
        "Selected groups to track"
    );

    ctx.ledger
        .write_text(&ctx.paths.groups_to_track(), &selection.file_names_text())
        .await?;
    ctx.ledger
        .write_text(&ctx.paths.group_range(), &selection.groups_text())
        .await?;

    let outcome = IdAggregator::new(ctx.tracking.id_field.clone())
        .aggregate_from_store(
            &ctx.ledger,
            &ctx.paths.collection_output_dir,
            &selection.file_names,
        )
        .await;
    if outcome.files_skipped > 0 || outcome.lines_skipped > 0 {
        tracing::warn!(
            files_skipped = outcome.files_skipped,
            lines_skipped = outcome.lines_skipped,
            "Some records could not be read"
        );
    }

    ctx.ledger
        .write_text(&ctx.paths.combined_post_ids(), &outcome.ids.to_text())
        .await?;
    tracing::info!(post_ids = outcome.ids.len(), path = %ctx.paths.combined_post_ids(), "Saved post ids");

    let summary = if selection.is_empty() {
        "no groups inside the tracking window".to_string()
    } else {
        format!(
            "{} group(s) selected, {} post id(s) to track",
            selection.len(),
            outcome.ids.len()
        )
    };
    let mut report = RunReport::succeeded(RunKind::Selection, summary).with_groups(selection.groups);
    report.post_ids = outcome.ids.len();
    Ok(report)
}
