// src/handlers/jobs.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::{
    error::AppError,
    jobs::{Job, JobQueue},
    utils::jwt::AdminUser,
};

fn accepted(job: Job) -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Job queued",
            "job": job.name(),
        })),
    )
}

/// Sends the daily reminder now instead of waiting for the schedule.
/// Admin only.
pub async fn trigger_daily_reminder(
    _admin: AdminUser,
    State(jobs): State<JobQueue>,
) -> Result<impl IntoResponse, AppError> {
    jobs.enqueue(Job::DailyReminder)?;
    Ok(accepted(Job::DailyReminder))
}

/// Sends the monthly reports now.
/// Admin only.
pub async fn trigger_monthly_report(
    _admin: AdminUser,
    State(jobs): State<JobQueue>,
) -> Result<impl IntoResponse, AppError> {
    jobs.enqueue(Job::MonthlyReport)?;
    Ok(accepted(Job::MonthlyReport))
}
