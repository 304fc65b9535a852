// src/handlers/leaderboard.rs

use axum::{
    Json,
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::{db_error, long_ttl, score::user_score_tags, short_ttl};
use crate::{
    analytics::{leaderboard::build_leaderboard, summary::user_summary},
    cache::{Entity, Tag},
    db::queries::{ScoreFilter, fetch_score_records, fetch_user},
    error::AppError,
    jobs::{Job, export::export_path},
    state::AppState,
    utils::jwt::AuthUser,
};

/// Ranks every user who has attempted a quiz.
pub async fn get_leaderboard(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let pool = state.pool.clone();
    state
        .cache
        .get_or_load("leaderboard".to_string(), long_ttl(&state.config), || async move {
            let scores = fetch_score_records(&pool, ScoreFilter::default())
                .await
                .map_err(db_error("load leaderboard scores"))?;

            if scores.is_empty() {
                return Err(AppError::NotFound("No scores found".to_string()));
            }

            let tags = vec![
                Tag::Table(Entity::Score),
                Tag::Table(Entity::User),
                Tag::Table(Entity::Quiz),
                Tag::Table(Entity::Question),
            ];
            Ok((build_leaderboard(&scores), tags))
        })
        .await
}

/// Per-quiz summary plus subject and weekly averages for one user.
pub async fn get_user_summary(
    user: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.ensure_self_or_admin(user_id)?;

    let pool = state.pool.clone();
    state
        .cache
        .get_or_load(format!("user_summary_{user_id}"), short_ttl(&state.config), || async move {
            fetch_user(&pool, user_id)
                .await
                .map_err(db_error("fetch user"))?
                .ok_or(AppError::NotFound("User not found".to_string()))?;

            let scores = fetch_score_records(&pool, ScoreFilter::user(user_id))
                .await
                .map_err(db_error("load user scores"))?;

            Ok((user_summary(user_id, &scores), user_score_tags(user_id)))
        })
        .await
}

/// Queues a CSV export of the user's summary. Poll the GET route for the file.
pub async fn start_export(
    user: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.ensure_self_or_admin(user_id)?;

    fetch_user(&state.pool, user_id)
        .await
        .map_err(db_error("fetch user"))?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    state.jobs.enqueue(Job::ExportUserSummary { user_id })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Export started",
            "user_id": user_id,
        })),
    ))
}

/// Serves the last export written for the user, 404 until one exists.
pub async fn download_export(
    user: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    request: Request,
) -> Result<Response, AppError> {
    user.ensure_self_or_admin(user_id)?;

    let path = export_path(std::path::Path::new(&state.config.export_dir), user_id);
    let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
    if !exists {
        return Err(AppError::NotFound("Export not found".to_string()));
    }

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    let mut response = response.into_response();
    if response.status() == StatusCode::OK {
        let disposition = HeaderValue::from_str(&format!(
            "attachment; filename=\"user_{user_id}_summary.csv\""
        ))
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, disposition);
    }

    Ok(response)
}
