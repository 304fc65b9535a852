// tests/job_tests.rs

mod common;

use std::time::Duration;

use chrono::{FixedOffset, Utc};
use common::spawn_app;
use quiz_master::jobs::{
    Job, JobQueue, execute,
    export::{ExportOutcome, export_user_summary},
    scheduler::{Schedule, ScheduledJob, Scheduler, last_run},
    tasks::{REMINDER_SUBJECT, REPORT_SUBJECT},
};
use serde_json::json;

#[tokio::test]
async fn reminder_goes_to_active_non_admin_users() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, active_email, _) = app.register_user("Active").await;
    let (inactive_id, _, _) = app.register_user("Inactive").await;

    app.put(
        &format!("/api/users/{inactive_id}"),
        &admin,
        json!({ "active": false }),
    )
    .await;

    let summary = execute(&app.jobs, Job::DailyReminder).await.unwrap();
    assert_eq!(summary, "Daily Quiz Reminders sent to 1 users.");

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, active_email);
    assert_eq!(sent[0].subject, REMINDER_SUBJECT);
    assert!(sent[0].body.contains("Hello Active"));
}

#[tokio::test]
async fn monthly_report_attaches_export_when_available() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, with_scores, token) = app.register_user("Busy").await;
    let (_, without_scores, _) = app.register_user("Idle").await;
    let (_, _, quiz_id) = app.seed_quiz(&admin, "Maths", 4).await;

    app.post("/api/scores", &token, json!({ "quiz_id": quiz_id, "total_scored": 3 }))
        .await;

    execute(&app.jobs, Job::MonthlyReport).await.unwrap();

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.subject == REPORT_SUBJECT));

    let busy = sent.iter().find(|m| m.to == with_scores).unwrap();
    let attachment = busy.attachment.as_ref().expect("report attached");
    assert_eq!(attachment.content_type, "text/csv");
    assert!(String::from_utf8_lossy(&attachment.data).starts_with("Quiz ID,User ID"));

    let idle = sent.iter().find(|m| m.to == without_scores).unwrap();
    assert!(idle.attachment.is_none());
}

#[tokio::test]
async fn export_without_scores_writes_nothing() {
    let app = spawn_app().await;
    let (user_id, _, _) = app.register_user("Nothing Yet").await;

    let outcome = export_user_summary(&app.pool, app.export_dir.path(), user_id).await;

    assert_eq!(outcome, ExportOutcome::NoScores);
    assert!(!app
        .export_dir
        .path()
        .join(format!("user_{user_id}_summary.csv"))
        .exists());
}

#[tokio::test]
async fn export_failure_is_returned_not_raised() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (user_id, _, token) = app.register_user("Blocked").await;
    let (_, _, quiz_id) = app.seed_quiz(&admin, "Maths", 4).await;
    app.post("/api/scores", &token, json!({ "quiz_id": quiz_id, "total_scored": 3 }))
        .await;

    // A regular file where the export directory should be.
    let blocker = app.export_dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"x").unwrap();

    let outcome = export_user_summary(&app.pool, &blocker, user_id).await;
    assert!(matches!(outcome, ExportOutcome::Failed { .. }));
}

#[tokio::test]
async fn scheduler_records_baseline_then_catches_up_once() {
    let app = spawn_app().await;
    app.register_user("Reminded").await;

    let queue = JobQueue::start(app.jobs.clone());
    let scheduled = ScheduledJob {
        job: Job::DailyReminder,
        schedule: Schedule::Daily { hour: 9, minute: 0 },
    };
    let scheduler = Scheduler::new(
        app.pool.clone(),
        queue,
        FixedOffset::east_opt(0).unwrap(),
        vec![scheduled],
    );

    // First start: nothing is owed, only a baseline is stored.
    let now = Utc::now();
    assert!(!scheduler.catch_up(&scheduled, now).await.unwrap());
    assert!(last_run(&app.pool, "daily_reminder").await.unwrap().is_some());

    // Pretend the process was down for two days.
    let two_days_ago = now - chrono::Duration::days(2);
    sqlx::query("UPDATE job_runs SET last_run_at = ? WHERE job_name = 'daily_reminder'")
        .bind(two_days_ago)
        .execute(&app.pool)
        .await
        .unwrap();

    assert!(scheduler.catch_up(&scheduled, now).await.unwrap());
    // The missed slots collapse into a single run.
    assert!(!scheduler.catch_up(&scheduled, now).await.unwrap());

    let mut delivered = 0;
    for _ in 0..100 {
        delivered = app.mailer.sent().len();
        if delivered > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(delivered, 1);
}
