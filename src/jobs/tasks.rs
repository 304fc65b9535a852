//! Mail jobs.

use super::{
    JobContext, JobError,
    export::{CSV_CONTENT_TYPE, ExportOutcome, export_user_summary},
    mailer::{Attachment, OutgoingEmail},
};
use crate::db::queries::active_learners;

pub const REMINDER_SUBJECT: &str = "Daily Quiz Reminder";
pub const REPORT_SUBJECT: &str = "Your Monthly Performance Report";

/// Emails every active non-admin user. A failed send aborts the run.
pub async fn send_quiz_reminder(ctx: &JobContext) -> Result<usize, JobError> {
    let users = active_learners(&ctx.pool).await?;

    for user in &users {
        let email = OutgoingEmail {
            to: user.email.clone(),
            subject: REMINDER_SUBJECT.to_string(),
            body: format!(
                "Hello {},\n\nDon't forget to attempt today's quiz!\n\nVisit {} to get started.\n\nHappy Learning!",
                user.full_name, ctx.base_url
            ),
            attachment: None,
        };
        ctx.mailer.send(&email).await?;
    }

    tracing::info!("Daily Quiz Reminders sent to {} users.", users.len());
    Ok(users.len())
}

/// Regenerates each active non-admin user's summary export and mails it.
///
/// Export problems end up in the message body; mail failures abort the run.
pub async fn send_monthly_reports(ctx: &JobContext) -> Result<usize, JobError> {
    let users = active_learners(&ctx.pool).await?;

    for user in &users {
        let outcome = export_user_summary(&ctx.pool, &ctx.export_dir, user.id).await;

        let (message, attachment) = match outcome {
            ExportOutcome::Written { file_path, .. } => match tokio::fs::read(&file_path).await {
                Ok(data) => (
                    "Your monthly performance report is attached.".to_string(),
                    Some(Attachment {
                        filename: format!("user_{}_summary.csv", user.id),
                        content_type: CSV_CONTENT_TYPE.to_string(),
                        data,
                    }),
                ),
                Err(e) => (format!("Error generating performance report: {e}"), None),
            },
            ExportOutcome::NoScores => (
                "You have not attempted any quizzes yet, so there is no report this month.".to_string(),
                None,
            ),
            ExportOutcome::Failed { error } => {
                (format!("Error generating performance report: {error}"), None)
            }
        };

        let email = OutgoingEmail {
            to: user.email.clone(),
            subject: REPORT_SUBJECT.to_string(),
            body: format!("Hello {},\n\n{}\n\nKeep improving!", user.full_name, message),
            attachment,
        };
        ctx.mailer.send(&email).await?;
    }

    tracing::info!("Monthly Reports sent to {} users.", users.len());
    Ok(users.len())
}
