//! Background work: an in-process queue drained by a worker task, plus the
//! scheduler that feeds it.

pub mod export;
pub mod mailer;
pub mod scheduler;
pub mod tasks;

use std::{path::PathBuf, sync::Arc};

use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tracing::{error, info};

use crate::error::AppError;
use mailer::{MailError, Mailer};

/// Jobs allowed to run at the same time.
const WORKER_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Job queue is closed")]
    QueueClosed,
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    DailyReminder,
    MonthlyReport,
    ExportUserSummary { user_id: i64 },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::DailyReminder => "daily_reminder",
            Job::MonthlyReport => "monthly_report",
            Job::ExportUserSummary { .. } => "export_user_summary",
        }
    }
}

/// Everything a job needs, cloned into each run.
#[derive(Clone)]
pub struct JobContext {
    pub pool: SqlitePool,
    pub mailer: Arc<dyn Mailer>,
    pub export_dir: PathBuf,
    pub base_url: String,
}

/// Sending half of the job queue. Enqueueing never waits for the job.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl JobQueue {
    /// Spawns the worker and returns a handle to feed it.
    /// Must be called from within a Tokio runtime.
    pub fn start(ctx: JobContext) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(rx, ctx));
        Self { tx }
    }

    pub fn enqueue(&self, job: Job) -> Result<(), JobError> {
        self.tx.send(job).map_err(|_| JobError::QueueClosed)?;
        info!(job = job.name(), "job enqueued");
        Ok(())
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Job>, ctx: JobContext) {
    let permits = Arc::new(Semaphore::new(WORKER_CONCURRENCY));
    info!("Job worker started");

    while let Some(job) = rx.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match execute(&ctx, job).await {
                Ok(summary) => info!(job = job.name(), "{}", summary),
                Err(e) => error!(job = job.name(), error = %e, "job failed"),
            }
        });
    }

    info!("Job worker stopped");
}

/// Runs one job to completion and returns a one-line summary.
pub async fn execute(ctx: &JobContext, job: Job) -> Result<String, JobError> {
    match job {
        Job::DailyReminder => {
            let sent = tasks::send_quiz_reminder(ctx).await?;
            Ok(format!("Daily Quiz Reminders sent to {sent} users."))
        }
        Job::MonthlyReport => {
            let sent = tasks::send_monthly_reports(ctx).await?;
            Ok(format!("Monthly Reports sent to {sent} users."))
        }
        Job::ExportUserSummary { user_id } => {
            let outcome = export::export_user_summary(&ctx.pool, &ctx.export_dir, user_id).await;
            Ok(format!("Export for user {user_id}: {outcome:?}"))
        }
    }
}
