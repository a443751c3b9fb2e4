//! Bounded batch writes into one region table.

use std::sync::Arc;

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::submission::Submission;
use tracing::{error, info};

/// Buffers matched submissions and commits them `capacity` rows at a time, so
/// at most `capacity` unflushed rows are ever held in memory. A failed commit
/// loses that batch only; later batches are unaffected.
pub struct SubmissionSink {
    db: Arc<SurrealDbClient>,
    table: String,
    capacity: usize,
    buffer: Vec<Submission>,
    batches_committed: u64,
    rows_committed: u64,
}

impl SubmissionSink {
    pub fn new(db: Arc<SurrealDbClient>, table: impl Into<String>, capacity: usize) -> Self {
        Self {
            db,
            table: table.into(),
            capacity: capacity.max(1),
            buffer: Vec::new(),
            batches_committed: 0,
            rows_committed: 0,
        }
    }

    /// Idempotent provisioning of this sink's region table; safe to call on
    /// every run. A failure here is fatal to the region, unlike flush errors.
    pub async fn ensure_table(&self) -> Result<(), AppError> {
        self.db.ensure_region_table(&self.table).await
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn batches_committed(&self) -> u64 {
        self.batches_committed
    }

    pub fn rows_committed(&self) -> u64 {
        self.rows_committed
    }

    /// Queue one submission, committing the buffer once it reaches capacity.
    pub async fn add(&mut self, submission: Submission) {
        self.buffer.push(submission);
        if self.buffer.len() >= self.capacity {
            self.flush().await;
        }
    }

    /// Commit and clear whatever is buffered. A store failure (duplicate id,
    /// connection loss) is logged and the batch dropped so the stream keeps
    /// moving.
    pub async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.buffer);
        let rows = batch.len();

        match self.db.insert_submissions(&self.table, batch).await {
            Ok(inserted) => {
                self.batches_committed += 1;
                self.rows_committed += inserted as u64;
                info!(table = %self.table, rows = inserted, "committed submission batch");
            }
            Err(err) => {
                error!(
                    table = %self.table,
                    rows,
                    error = %err,
                    "dropping submission batch after failed insert"
                );
            }
        }
    }
}
