//! The orchestrator: read the sheet, grade every row in order, write back.
//!
//! One rule governs everything here: a row failure is that row's problem.
//! Each row runs source → normalize → assess → reconcile with a
//! short-circuit on the first stage error, the failure becomes a sentinel
//! result, and the loop moves on. Only schema and setup problems (no photo
//! column, unreadable file, no provider) abort a run, and they do so
//! before any row has been touched.

use crate::config::GradingConfig;
use crate::dataset::Sheet;
use crate::error::GradeError;
use crate::oracle::resolve_oracle;
use crate::pipeline::assess::AssessmentClient;
use crate::pipeline::source::SourceResolver;
use crate::pipeline::{normalize, reconcile};
use crate::schema::{Field, RowOutcome, RunReport, RunStats, SkipReason, RESULT_COLUMNS};
use crate::storage::{DriveStore, FileStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Grade every row of a CSV sheet, updating it in place.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `path` — CSV file with a header row and a photo-reference column
/// * `config` — Grading configuration
///
/// # Returns
/// `Ok(RunReport)` on success, even if some rows failed
/// (check `report.stats.failed_rows`).
///
/// # Errors
/// Returns `Err(GradeError)` only for run-fatal problems:
/// - The file cannot be read or written
/// - No column name contains "photo"
/// - No scoring oracle could be resolved
pub async fn run(path: impl AsRef<Path>, config: &GradingConfig) -> Result<RunReport, GradeError> {
    let path = path.as_ref();
    info!("Starting grading run: {}", path.display());

    let mut sheet = Sheet::read_csv(path)?;
    let report = grade_sheet(&mut sheet, config).await?;
    sheet.write_csv(path)?;

    info!("Sheet written back to {}", path.display());
    Ok(report)
}

/// Grade every row of an in-memory sheet.
///
/// The sheet is mutated: result columns are created if missing and every
/// attempted row gets its six result cells (and its timestamp, when
/// configured) filled in. Callers own persistence.
pub async fn grade_sheet(
    sheet: &mut Sheet,
    config: &GradingConfig,
) -> Result<RunReport, GradeError> {
    let total_start = Instant::now();

    // ── Step 1: Detect schema ────────────────────────────────────────────
    sheet.tidy_headers();
    let photo_col = sheet.photo_column()?;
    debug!("photo-reference column at index {}", photo_col);

    // ── Step 2: Ensure output columns ────────────────────────────────────
    let result_cols = sheet.ensure_columns(&RESULT_COLUMNS);
    let timestamp_col = config
        .timestamp_column
        .as_ref()
        .map(|name| sheet.ensure_columns(&[name.as_str()])[0]);

    // ── Step 3: Build collaborators ──────────────────────────────────────
    let oracle = resolve_oracle(config)?;
    let store: Arc<dyn FileStore> = match &config.file_store {
        Some(store) => Arc::clone(store),
        None => Arc::new(DriveStore::from_env()?),
    };
    let resolver = SourceResolver::new(store, config)?;
    let client = AssessmentClient::new(oracle, config.composition_check);

    let total_rows = sheet.len();
    info!("Sheet has {} data rows", total_rows);
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total_rows);
    }

    // ── Step 4: Grade rows in sheet order ────────────────────────────────
    let mut outcomes = Vec::with_capacity(total_rows);
    let mut stats = RunStats {
        total_rows,
        ..Default::default()
    };

    for row in 0..total_rows {
        let row_num = row + 1;

        if let Some(ts_col) = timestamp_col {
            if !sheet.cell(row, ts_col).trim().is_empty() {
                debug!("row {}: already processed, skipping", row_num);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_row_skipped(row_num, total_rows, "already processed");
                }
                stats.skipped_rows += 1;
                outcomes.push(RowOutcome::Skipped {
                    reason: SkipReason::AlreadyProcessed,
                });
                continue;
            }
        }

        let reference = sheet.cell(row, photo_col).trim().to_string();
        if reference.is_empty() {
            debug!("row {}: blank photo reference, skipping", row_num);
            if let Some(ref cb) = config.progress_callback {
                cb.on_row_skipped(row_num, total_rows, "blank photo reference");
            }
            stats.skipped_rows += 1;
            outcomes.push(RowOutcome::Skipped {
                reason: SkipReason::BlankReference,
            });
            continue;
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_row_start(row_num, total_rows);
        }

        let (outcome, usage) = grade_row(&resolver, &client, config, &reference).await;
        stats.total_prompt_tokens += usage.prompt_tokens;
        stats.total_completion_tokens += usage.completion_tokens;
        stats.oracle_duration_ms += usage.oracle_ms;

        match &outcome {
            RowOutcome::Scored(result) => {
                stats.scored_rows += 1;
                info!(
                    "row {}/{}: scored, overall {}",
                    row_num, total_rows, result.overall_score
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_row_scored(row_num, total_rows, &result.overall_score);
                }
            }
            RowOutcome::Failed { error } => {
                stats.failed_rows += 1;
                warn!("row {}/{}: {}", row_num, total_rows, error);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_row_failed(row_num, total_rows, &error.to_string());
                }
            }
            RowOutcome::Skipped { .. } => {}
        }

        if let Some(result) = outcome.writeback() {
            for (field, col) in Field::ALL.iter().zip(&result_cols) {
                sheet.set_cell(row, *col, result.field(*field));
            }
            if let Some(ts_col) = timestamp_col {
                sheet.set_cell(row, ts_col, chrono::Utc::now().to_rfc3339());
            }
        }

        outcomes.push(outcome);
    }

    // ── Step 5: Compute stats ────────────────────────────────────────────
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Grading complete: {} scored, {} failed, {} skipped of {} rows in {}ms",
        stats.scored_rows, stats.failed_rows, stats.skipped_rows, total_rows, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total_rows, stats.scored_rows);
    }

    Ok(RunReport { outcomes, stats })
}

#[derive(Default)]
struct RowUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    oracle_ms: u64,
}

/// Run the four pipeline stages for one row.
///
/// Always returns an outcome — errors stop at this boundary.
async fn grade_row(
    resolver: &SourceResolver,
    client: &AssessmentClient,
    config: &GradingConfig,
    reference: &str,
) -> (RowOutcome, RowUsage) {
    let mut usage = RowUsage::default();

    let bytes = match resolver.fetch(reference).await {
        Ok(bytes) => bytes,
        Err(error) => return (RowOutcome::Failed { error }, usage),
    };

    let canonical = match normalize::normalize(bytes, config.dpi, config.jpeg_quality).await {
        Ok(canonical) => canonical,
        Err(error) => return (RowOutcome::Failed { error }, usage),
    };

    let assessment = match client.assess(&canonical).await {
        Ok(assessment) => assessment,
        Err(error) => return (RowOutcome::Failed { error }, usage),
    };
    usage.prompt_tokens = assessment.prompt_tokens as u64;
    usage.completion_tokens = assessment.completion_tokens as u64;
    usage.oracle_ms = assessment.oracle_ms;

    let result = reconcile::reconcile(&assessment.raw);
    (RowOutcome::Scored(result), usage)
}
