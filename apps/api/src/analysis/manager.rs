//! Analysis Record Manager — owns the record lifecycle.
//!
//! `request_scan` writes the `pending` record synchronously and hands a
//! [`ScanJob`] to the background worker; the HTTP response never waits for the
//! model. Each job owns exactly one record id, so records need no locking.
//!
//! State machine: `pending → completed | failed`, and a re-scan moves
//! `completed | failed → pending` on the same id.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analysis::store::AnalysisStore;
use crate::ats::normalizer::normalize_resume;
use crate::ats::scorer::{score_resume, ScanRequest};
use crate::errors::AppError;
use crate::llm_client::LlmBackend;
use crate::models::analysis::{AnalysisRecord, AtsScores};
use crate::models::resume::ResumeDocument;

const SCAN_QUEUE_CAPACITY: usize = 256;
/// The final write is retried once before the result is given up.
const PERSIST_ATTEMPTS: u32 = 2;
const PERSIST_RETRY_DELAY: Duration = Duration::from_millis(250);

/// One unit of background scoring work.
#[derive(Debug, Clone)]
pub struct ScanJob {
    pub analysis_id: Uuid,
    pub user_id: Uuid,
    /// Snapshot of the resume at request time.
    pub resume: ResumeDocument,
    pub job_description: Option<String>,
    pub job_application_id: Option<String>,
}

/// Caller options for a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Existing record to re-scan. A new record is created when absent.
    pub analysis_id: Option<Uuid>,
    pub job_description: Option<String>,
    pub job_application_id: Option<String>,
}

/// Everything the background worker needs to run a scan.
pub struct ScanWorker {
    pub store: Arc<dyn AnalysisStore>,
    pub llm: Arc<dyn LlmBackend>,
    pub disagreement_threshold: i64,
}

/// Request-side handle, cloned into every handler through `AppState`.
#[derive(Clone)]
pub struct AnalysisManager {
    store: Arc<dyn AnalysisStore>,
    queue: mpsc::Sender<ScanJob>,
}

impl AnalysisManager {
    /// Builds the manager and the receiving end of its queue. Pass the
    /// receiver to [`start_scan_worker`].
    pub fn new(store: Arc<dyn AnalysisStore>) -> (Self, mpsc::Receiver<ScanJob>) {
        let (queue, rx) = mpsc::channel(SCAN_QUEUE_CAPACITY);
        (Self { store, queue }, rx)
    }

    /// Creates (or resets) the record and dispatches scoring. Returns the
    /// record in `pending` state.
    pub async fn request_scan(
        &self,
        user_id: Uuid,
        resume: ResumeDocument,
        options: ScanOptions,
    ) -> Result<AnalysisRecord, AppError> {
        if normalize_resume(&resume).is_empty() {
            return Err(AppError::Validation(
                "Resume has no content to analyse".to_string(),
            ));
        }

        let job_description = options
            .job_description
            .map(|jd| jd.trim().to_string())
            .filter(|jd| !jd.is_empty());

        let record = match options.analysis_id {
            Some(id) => self
                .reset_existing(
                    id,
                    user_id,
                    job_description.as_deref(),
                    options.job_application_id.as_deref(),
                )
                .await?,
            None => {
                let record = AnalysisRecord::pending(
                    user_id,
                    job_description,
                    options.job_application_id,
                );
                self.store.insert(&record).await?;
                record
            }
        };

        let job = ScanJob {
            analysis_id: record.id,
            user_id,
            resume,
            job_description: record.job_description.clone(),
            job_application_id: record.job_application_id.clone(),
        };

        if self.queue.send(job).await.is_err() {
            error!("Scan worker is not running; analysis {} cannot be scored", record.id);
            let message = "Scan worker unavailable";
            self.store
                .fail(
                    record.id,
                    message,
                    &AtsScores::failed(message, record.job_application_id.clone()),
                )
                .await?;
            return Err(AppError::Internal(anyhow::anyhow!(message)));
        }

        info!("Scan dispatched for analysis {} (user {})", record.id, user_id);
        Ok(record)
    }

    async fn reset_existing(
        &self,
        id: Uuid,
        user_id: Uuid,
        job_description: Option<&str>,
        job_application_id: Option<&str>,
    ) -> Result<AnalysisRecord, AppError> {
        if let Some(record) = self
            .store
            .reset_to_pending(id, user_id, job_description, job_application_id)
            .await?
        {
            return Ok(record);
        }
        match self.store.get(id, user_id).await? {
            Some(_) => Err(AppError::Conflict(format!(
                "Analysis {id} is already being processed"
            ))),
            None => Err(AppError::NotFound(format!("Analysis {id} not found"))),
        }
    }

    pub async fn get(&self, id: Uuid, user_id: Uuid) -> Result<AnalysisRecord, AppError> {
        self.store
            .get(id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Analysis {id} not found")))
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>, AppError> {
        Ok(self.store.list_for_user(user_id).await?)
    }

    /// Owner-only delete. An in-flight scan for the record finishes and its
    /// write finds nothing to update.
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        if self.store.delete(id, user_id).await? {
            info!("Deleted analysis {id}");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Analysis {id} not found")))
        }
    }
}

/// Starts the background scan worker. Each job runs as its own task; when
/// every [`AnalysisManager`] is dropped the queue closes, in-flight scans are
/// drained and the returned handle completes.
pub fn start_scan_worker(
    worker: Arc<ScanWorker>,
    mut rx: mpsc::Receiver<ScanJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Background scan worker started");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                job = rx.recv() => match job {
                    Some(job) => {
                        let worker = worker.clone();
                        in_flight.spawn(async move { worker.run_scan(job).await });
                    }
                    None => break,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!("Scan task aborted: {e}");
                    }
                }
            }
        }

        if !in_flight.is_empty() {
            info!("Scan queue closed; waiting for {} in-flight scans", in_flight.len());
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!("Scan task aborted: {e}");
            }
        }
        info!("Background scan worker stopped");
    })
}

impl ScanWorker {
    /// Scores one job and writes the result back. Never panics or returns an
    /// error: failures end up on the record or in the log.
    pub async fn run_scan(&self, job: ScanJob) {
        let id = job.analysis_id;
        debug!("Scoring analysis {id} for user {}", job.user_id);
        let request = ScanRequest {
            resume: &job.resume,
            job_description: job.job_description.as_deref(),
            job_application_id: job.job_application_id.as_deref(),
            disagreement_threshold: self.disagreement_threshold,
        };

        match score_resume(self.llm.as_ref(), request).await {
            Ok(outcome) => {
                if let Some(soft) = &outcome.ats_scores.error {
                    warn!("Analysis {id} completed without an ATS score: {soft}");
                }
                let written = persist(id, || self.store.complete(id, &outcome)).await;
                if written {
                    info!("Analysis {id} completed (score {:?})", outcome.score);
                }
            }
            Err(e) => {
                let error_info = e.to_string();
                warn!("Analysis {id} failed: {error_info}");
                let ats_scores = AtsScores::failed(&error_info, job.job_application_id.clone());
                persist(id, || self.store.fail(id, &error_info, &ats_scores)).await;
            }
        }
    }
}

/// Runs the final record write, retrying once. Returns whether it landed.
async fn persist<F, Fut>(id: Uuid, mut write: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    for attempt in 1..=PERSIST_ATTEMPTS {
        match write().await {
            Ok(()) => return true,
            Err(e) if attempt < PERSIST_ATTEMPTS => {
                warn!("Writing analysis {id} failed (attempt {attempt}), retrying: {e:#}");
                tokio::time::sleep(PERSIST_RETRY_DELAY).await;
            }
            Err(e) => {
                error!("Giving up on writing analysis {id}; result lost: {e:#}");
            }
        }
    }
    false
}
