// src/handlers/score.rs

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use super::{db_error, short_ttl};
use crate::{
    analytics::summary::summarize_quizzes,
    cache::{Entity, Tag},
    db::queries::{Parent, ScoreFilter, ensure_parent, fetch_score_records},
    error::AppError,
    jobs::export::{CSV_CONTENT_TYPE, attempts_csv},
    models::score::{CreateScoreRequest, Score},
    state::AppState,
    utils::{
        json::AppJson,
        jwt::{AdminUser, AuthUser},
    },
};

/// What a per-user score view is derived from: the user's own attempts
/// (score writes touch the owner's row) and the names shown beside them.
pub(crate) fn user_score_tags(user_id: i64) -> Vec<Tag> {
    vec![
        Tag::Row(Entity::User, user_id),
        Tag::Table(Entity::Subject),
        Tag::Table(Entity::Chapter),
        Tag::Table(Entity::Quiz),
    ]
}

/// Records an attempt for the calling user.
pub async fn create_score(
    user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateScoreRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_parent(&state.pool, Parent::Quiz, payload.quiz_id).await?;

    let score = sqlx::query_as::<_, Score>(
        r#"
        INSERT INTO scores (quiz_id, user_id, time_stamp_of_attempt, total_scored)
        VALUES (?, ?, ?, ?)
        RETURNING id, quiz_id, user_id, time_stamp_of_attempt, total_scored
        "#,
    )
    .bind(payload.quiz_id)
    .bind(user.id)
    .bind(Utc::now())
    .bind(payload.total_scored)
    .fetch_one(&state.pool)
    .await
    .map_err(db_error("record score"))?;

    let mut tags = Tag::written(Entity::Score, score.id).to_vec();
    tags.push(Tag::Row(Entity::User, user.id));
    state.cache.invalidate(tags);

    tracing::info!(
        user_id = user.id,
        quiz_id = score.quiz_id,
        total = score.total_scored,
        "Score recorded"
    );

    Ok((StatusCode::CREATED, Json(score)))
}

/// Every attempt in the system, newest first.
/// Admin only.
pub async fn list_scores(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let scores = fetch_score_records(&state.pool, ScoreFilter::default())
        .await
        .map_err(db_error("list scores"))?;
    Ok(Json(scores))
}

/// One line per quiz the user attempted, with best and mean score.
pub async fn user_scores(
    user: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.ensure_self_or_admin(user_id)?;

    let pool = state.pool.clone();
    state
        .cache
        .get_or_load(format!("scores_user_{user_id}"), short_ttl(&state.config), || async move {
            let scores = fetch_score_records(&pool, ScoreFilter::user(user_id))
                .await
                .map_err(db_error("list user scores"))?;
            Ok((summarize_quizzes(&scores), user_score_tags(user_id)))
        })
        .await
}

/// All of a user's attempts at one quiz, newest first.
pub async fn user_quiz_attempts(
    user: AuthUser,
    State(state): State<AppState>,
    Path((user_id, quiz_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    user.ensure_self_or_admin(user_id)?;

    let filter = ScoreFilter {
        user_id: Some(user_id),
        quiz_id: Some(quiz_id),
    };
    let scores = fetch_score_records(&state.pool, filter)
        .await
        .map_err(db_error("list quiz attempts"))?;

    Ok(Json(scores))
}

/// The user's most recent attempt at a quiz.
pub async fn latest_score(
    user: AuthUser,
    State(state): State<AppState>,
    Path((quiz_id, user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    user.ensure_self_or_admin(user_id)?;

    let filter = ScoreFilter {
        user_id: Some(user_id),
        quiz_id: Some(quiz_id),
    };
    let latest = fetch_score_records(&state.pool, filter)
        .await
        .map_err(db_error("fetch latest score"))?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound("No attempts found".to_string()))?;

    Ok(Json(latest))
}

/// Downloads the user's attempts as CSV.
pub async fn user_scores_csv(
    user: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.ensure_self_or_admin(user_id)?;

    let scores = fetch_score_records(&state.pool, ScoreFilter::user(user_id))
        .await
        .map_err(db_error("list user scores"))?;
    let data = attempts_csv(&scores)?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"user_{user_id}_scores.csv\""
    ))
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(CSV_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    ))
}
