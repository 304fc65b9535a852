// src/models/score.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'scores' table in the database. One row per attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Score {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub time_stamp_of_attempt: DateTime<Utc>,
    pub total_scored: i64,
}

/// A score joined with everything the leaderboard and summaries need:
/// the quiz's question count, chapter and subject names, and the user's name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScoreRecord {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub chapter_id: i64,
    pub chapter_name: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub num_questions: i64,
    pub total_scored: i64,
    pub time_stamp_of_attempt: DateTime<Utc>,
}

/// DTO for recording an attempt. The user is taken from the bearer token.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateScoreRequest {
    pub quiz_id: i64,
    #[validate(range(min = 0, message = "total_scored cannot be negative"))]
    pub total_scored: i64,
}
