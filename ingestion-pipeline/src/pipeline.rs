//! Region ingestion: walks the dump directory and streams every archive
//! through decode → frame → match → sink, one file at a time.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::error::AppError;
use common::storage::db::{region_table_name, SurrealDbClient};
use common::utils::config::AppConfig;
use common::utils::regions::RegionQuery;
use state_machines::core::GuardError;
use tracing::{error, info, warn};

use crate::decode::DecoderTuning;
use crate::lines::LineFramer;
use crate::record::{evaluate_line, LineOutcome, SkipReason};
use crate::sink::SubmissionSink;
use crate::state::opened;

pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    config: AppConfig,
}

/// Counters for one processed archive.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileReport {
    pub records_seen: u64,
    pub records_matched: u64,
    /// Decode ceiling breach or invalid frame; whatever was buffered before
    /// the failure was still flushed.
    pub aborted: bool,
}

/// Aggregated counters for one region's run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegionReport {
    pub files_processed: u64,
    pub files_failed: u64,
    pub records_seen: u64,
    pub records_matched: u64,
    pub batches_committed: u64,
    pub rows_committed: u64,
}

impl IngestionPipeline {
    pub fn new(db: Arc<SurrealDbClient>, config: AppConfig) -> Self {
        Self { db, config }
    }

    fn tuning(&self) -> DecoderTuning {
        DecoderTuning {
            chunk_bytes: self.config.decode_chunk_bytes,
            ceiling_bytes: self.config.decode_ceiling_bytes,
        }
    }

    /// Ingest every archive in the dump directory for one region. Failures
    /// below region level (a file, a line, a batch) are contained and logged;
    /// only store/table provisioning errors surface to the caller.
    #[tracing::instrument(skip_all, fields(region = %region.region_name))]
    pub async fn ingest_region(&self, region: &RegionQuery) -> Result<RegionReport, AppError> {
        let table = region_table_name(&region.region_name)?;
        let archives = list_archives(Path::new(&self.config.dump_dir))?;
        info!(
            terms = region.terms.len(),
            archives = archives.len(),
            table = %table,
            "starting region ingestion"
        );

        let mut sink = SubmissionSink::new(
            Arc::clone(&self.db),
            table,
            self.config.insert_chunk_size,
        );
        sink.ensure_table().await?;
        let mut report = RegionReport::default();

        for path in &archives {
            match self.ingest_file(path, region, &mut sink).await {
                Ok(file) => {
                    if file.aborted {
                        report.files_failed += 1;
                    } else {
                        report.files_processed += 1;
                    }
                    report.records_seen += file.records_seen;
                    report.records_matched += file.records_matched;
                }
                Err(err) => {
                    report.files_failed += 1;
                    error!(file = %path.display(), error = %err, "skipping unreadable archive");
                }
            }
        }

        report.batches_committed = sink.batches_committed();
        report.rows_committed = sink.rows_committed();
        info!(
            files = report.files_processed,
            failed = report.files_failed,
            records = report.records_seen,
            matched = report.records_matched,
            rows = report.rows_committed,
            "region ingestion finished"
        );
        Ok(report)
    }

    #[tracing::instrument(skip_all, fields(file = %path.display()))]
    async fn ingest_file(
        &self,
        path: &Path,
        region: &RegionQuery,
        sink: &mut SubmissionSink,
    ) -> Result<FileReport, AppError> {
        info!("searching archive");
        let mut framer = LineFramer::open(path, self.tuning())?;
        let machine = opened()
            .stream()
            .map_err(|(_, guard)| map_guard_error("stream", &guard))?;
        let mut report = FileReport::default();
        let mut decode_failure = None;

        for item in &mut framer {
            let (line, offset) = match item {
                Ok(pair) => pair,
                Err(err) => {
                    decode_failure = Some(err);
                    break;
                }
            };
            report.records_seen += 1;

            match evaluate_line(&line, region) {
                LineOutcome::Matched(submission) => {
                    report.records_matched += 1;
                    sink.add(*submission).await;
                }
                LineOutcome::Unmatched => {}
                LineOutcome::Skipped(SkipReason::MalformedJson(err)) => {
                    warn!(offset, error = %err, "skipping undecodable record");
                }
                LineOutcome::Skipped(SkipReason::BadTimestamp) => {
                    warn!(offset, "skipping matched record with unusable created_utc");
                }
                LineOutcome::Skipped(SkipReason::MissingField(_)) => {}
            }
        }

        // The remainder goes out even when the stream died early.
        sink.flush().await;

        match decode_failure {
            Some(err) => {
                report.aborted = true;
                error!(
                    records = report.records_seen,
                    error = %err,
                    "archive abandoned mid-stream"
                );
                machine
                    .abort()
                    .map_err(|(_, guard)| map_guard_error("abort", &guard))?
                    .close()
                    .map_err(|(_, guard)| map_guard_error("close", &guard))?
            }
            None => machine
                .drain()
                .map_err(|(_, guard)| map_guard_error("drain", &guard))?
                .close()
                .map_err(|(_, guard)| map_guard_error("close", &guard))?,
        };

        info!(
            records = report.records_seen,
            matched = report.records_matched,
            "archive finished"
        );
        Ok(report)
    }
}

fn list_archives(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut archives = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "zst") {
            archives.push(path);
        }
    }
    Ok(archives)
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid archive lifecycle transition during {event}: {guard:?}"
    ))
}
