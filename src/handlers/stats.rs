// src/handlers/stats.rs

use axum::{extract::State, response::IntoResponse};
use serde::Serialize;
use sqlx::FromRow;

use super::{db_error, long_ttl};
use crate::{
    cache::{Entity, Tag},
    error::AppError,
    state::AppState,
    utils::jwt::AdminUser,
};

#[derive(Debug, Serialize, FromRow)]
pub struct QuizAttempts {
    pub quiz_id: i64,
    pub quiz_name: String,
    pub attempts: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct SubjectAttempts {
    pub subject_name: String,
    pub attempts: i64,
}

/// Attempt counts per quiz, busiest first.
/// Admin only.
pub async fn quiz_attempts(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let pool = state.pool.clone();
    state
        .cache
        .get_or_load("stats_quiz_attempts".to_string(), long_ttl(&state.config), || async move {
            let rows = sqlx::query_as::<_, QuizAttempts>(
                r#"
                SELECT
                    q.id AS quiz_id,
                    c.name || ' (' || q.date_of_quiz || ')' AS quiz_name,
                    COUNT(sc.id) AS attempts
                FROM quizzes q
                JOIN chapters c ON c.id = q.chapter_id
                JOIN scores sc ON sc.quiz_id = q.id
                GROUP BY q.id, c.name, q.date_of_quiz
                ORDER BY attempts DESC, q.id
                "#,
            )
            .fetch_all(&pool)
            .await
            .map_err(db_error("count quiz attempts"))?;

            let tags = vec![
                Tag::Table(Entity::Score),
                Tag::Table(Entity::Quiz),
                Tag::Table(Entity::Chapter),
            ];
            Ok((rows, tags))
        })
        .await
}

/// Attempt counts per subject, busiest first.
/// Admin only.
pub async fn subject_attempts(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let pool = state.pool.clone();
    state
        .cache
        .get_or_load("stats_subject_attempts".to_string(), long_ttl(&state.config), || async move {
            let rows = sqlx::query_as::<_, SubjectAttempts>(
                r#"
                SELECT s.name AS subject_name, COUNT(sc.id) AS attempts
                FROM subjects s
                JOIN chapters c ON c.subject_id = s.id
                JOIN quizzes q ON q.chapter_id = c.id
                JOIN scores sc ON sc.quiz_id = q.id
                GROUP BY s.id, s.name
                ORDER BY attempts DESC, s.name
                "#,
            )
            .fetch_all(&pool)
            .await
            .map_err(db_error("count subject attempts"))?;

            let tags = vec![
                Tag::Table(Entity::Score),
                Tag::Table(Entity::Subject),
                Tag::Table(Entity::Chapter),
                Tag::Table(Entity::Quiz),
            ];
            Ok((rows, tags))
        })
        .await
}
