//! CSV renderings of a user's attempts.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlx::SqlitePool;

use super::JobError;
use crate::{
    analytics::summary::{QuizSummary, summarize_quizzes},
    db::queries::{ScoreFilter, fetch_score_records},
    models::score::ScoreRecord,
};

pub const CSV_CONTENT_TYPE: &str = "text/csv";

const SUMMARY_HEADER: [&str; 8] = [
    "Quiz ID",
    "User ID",
    "Full Name",
    "Subject",
    "Chapter",
    "Total Attempts",
    "Highest Score",
    "Average Score",
];

const ATTEMPTS_HEADER: [&str; 5] = ["Quiz ID", "Subject", "Chapter", "Date Attempted", "Score"];

/// Result of an export run. Failures are reported here instead of raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportOutcome {
    Written { file_path: String, rows: usize },
    NoScores,
    Failed { error: String },
}

/// `{export_dir}/user_{id}_summary.csv`
pub fn export_path(export_dir: &Path, user_id: i64) -> PathBuf {
    export_dir.join(format!("user_{user_id}_summary.csv"))
}

pub fn summary_csv(rows: &[QuizSummary]) -> Result<Vec<u8>, JobError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(SUMMARY_HEADER)?;
    for row in rows {
        writer.write_record([
            row.quiz_id.to_string(),
            row.user_id.to_string(),
            row.full_name.clone(),
            row.subject_name.clone(),
            row.chapter_name.clone(),
            row.total_attempts.to_string(),
            row.highest_score.to_string(),
            row.average_score.to_string(),
        ])?;
    }
    writer.into_inner().map_err(|e| JobError::Io(e.into_error()))
}

/// Attempt list for download, one line per attempt in the given order.
pub fn attempts_csv(scores: &[ScoreRecord]) -> Result<Vec<u8>, JobError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(ATTEMPTS_HEADER)?;
    for score in scores {
        writer.write_record([
            score.quiz_id.to_string(),
            score.subject_name.clone(),
            score.chapter_name.clone(),
            score
                .time_stamp_of_attempt
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            score.total_scored.to_string(),
        ])?;
    }
    writer.into_inner().map_err(|e| JobError::Io(e.into_error()))
}

async fn write_summary(
    pool: &SqlitePool,
    export_dir: &Path,
    user_id: i64,
) -> Result<ExportOutcome, JobError> {
    let scores = fetch_score_records(pool, ScoreFilter::user(user_id)).await?;
    if scores.is_empty() {
        return Ok(ExportOutcome::NoScores);
    }

    let rows = summarize_quizzes(&scores);
    let data = summary_csv(&rows)?;

    tokio::fs::create_dir_all(export_dir).await?;
    let path = export_path(export_dir, user_id);
    tokio::fs::write(&path, data).await?;

    Ok(ExportOutcome::Written {
        file_path: path.to_string_lossy().into_owned(),
        rows: rows.len(),
    })
}

/// Recomputes the user's per-quiz summary and overwrites their export file.
pub async fn export_user_summary(pool: &SqlitePool, export_dir: &Path, user_id: i64) -> ExportOutcome {
    match write_summary(pool, export_dir, user_id).await {
        Ok(outcome) => {
            tracing::info!(user_id, ?outcome, "summary export finished");
            outcome
        }
        Err(e) => {
            tracing::error!(user_id, "summary export failed: {}", e);
            ExportOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_csv_has_header_and_rows() {
        let rows = vec![QuizSummary {
            quiz_id: 4,
            user_id: 2,
            full_name: "Asha Rao".into(),
            subject_name: "Maths".into(),
            chapter_name: "Algebra, Part 1".into(),
            total_attempts: 3,
            highest_score: 9,
            average_score: 6.33,
        }];
        let text = String::from_utf8(summary_csv(&rows).unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Quiz ID,User ID,Full Name,Subject,Chapter,Total Attempts,Highest Score,Average Score")
        );
        assert_eq!(lines.next(), Some("4,2,Asha Rao,Maths,\"Algebra, Part 1\",3,9,6.33"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_attempts_still_have_header() {
        let text = String::from_utf8(attempts_csv(&[]).unwrap()).unwrap();
        assert_eq!(text, "Quiz ID,Subject,Chapter,Date Attempted,Score\n");
    }

    #[test]
    fn export_file_is_keyed_by_user() {
        let path = export_path(Path::new("exports"), 12);
        assert_eq!(path, Path::new("exports/user_12_summary.csv"));
    }
}
