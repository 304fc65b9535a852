// src/handlers/quiz.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use super::{db_error, short_ttl};
use crate::{
    cache::{Entity, Tag},
    db::{
        cascade,
        queries::{Parent, QUIZ_DETAILS_SELECT, ensure_parent, fetch_quiz_details},
    },
    error::AppError,
    models::quiz::{CreateQuizRequest, Quiz, QuizDetails, QuizListParams, UpdateQuizRequest},
    state::AppState,
    utils::{
        html::clean_html,
        json::AppJson,
        jwt::{AdminUser, AuthUser},
    },
};

/// Tables whose changes show up in a quiz payload.
const QUIZ_LIST_TAGS: [Tag; 4] = [
    Tag::Table(Entity::Quiz),
    Tag::Table(Entity::Chapter),
    Tag::Table(Entity::Subject),
    Tag::Table(Entity::Question),
];

async fn details_or_404(state: &AppState, id: i64) -> Result<QuizDetails, AppError> {
    fetch_quiz_details(&state.pool, id)
        .await
        .map_err(db_error("fetch quiz"))?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

/// Lists quizzes with chapter/subject names and question counts,
/// optionally only those of `?chapter_id=`.
pub async fn list_quizzes(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<QuizListParams>,
) -> Result<impl IntoResponse, AppError> {
    let key = match params.chapter_id {
        Some(chapter_id) => format!("quiz_list_chapter_{chapter_id}"),
        None => "quizzes_list".to_string(),
    };

    let pool = state.pool.clone();
    state
        .cache
        .get_or_load(key, short_ttl(&state.config), || async move {
            let quizzes = match params.chapter_id {
                Some(chapter_id) => {
                    sqlx::query_as::<_, QuizDetails>(&format!(
                        "{QUIZ_DETAILS_SELECT} WHERE q.chapter_id = ? ORDER BY q.date_of_quiz, q.id"
                    ))
                    .bind(chapter_id)
                    .fetch_all(&pool)
                    .await
                }
                None => {
                    sqlx::query_as::<_, QuizDetails>(&format!(
                        "{QUIZ_DETAILS_SELECT} ORDER BY q.date_of_quiz, q.id"
                    ))
                    .fetch_all(&pool)
                    .await
                }
            }
            .map_err(db_error("list quizzes"))?;

            Ok((quizzes, QUIZ_LIST_TAGS.to_vec()))
        })
        .await
}

pub async fn get_quiz(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let loader = state.clone();
    state
        .cache
        .get_or_load(format!("quiz_{id}"), short_ttl(&state.config), || async move {
            let quiz = details_or_404(&loader, id).await?;
            let tags = vec![
                Tag::Row(Entity::Quiz, id),
                Tag::Row(Entity::Chapter, quiz.chapter_id),
                Tag::Row(Entity::Subject, quiz.subject_id),
            ];
            Ok((quiz, tags))
        })
        .await
}

/// Creates a quiz under an existing chapter.
/// Admin only.
pub async fn create_quiz(
    _admin: AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_parent(&state.pool, Parent::Chapter, payload.chapter_id).await?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO quizzes (chapter_id, date_of_quiz, time_duration, remarks)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(payload.chapter_id)
    .bind(payload.date_of_quiz)
    .bind(&payload.time_duration)
    .bind(clean_html(&payload.remarks))
    .fetch_one(&state.pool)
    .await
    .map_err(db_error("create quiz"))?;

    let mut tags = Tag::written(Entity::Quiz, id).to_vec();
    tags.push(Tag::Row(Entity::Chapter, payload.chapter_id));
    state.cache.invalidate(tags);

    let quiz = details_or_404(&state, id).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Merge-updates a quiz.
/// Admin only.
pub async fn update_quiz(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut quiz = sqlx::query_as::<_, Quiz>(
        "SELECT id, chapter_id, date_of_quiz, time_duration, remarks FROM quizzes WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await
    .map_err(db_error("fetch quiz"))?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))?;
    let old_chapter_id = quiz.chapter_id;

    if let Some(chapter_id) = payload.chapter_id {
        if chapter_id != old_chapter_id {
            ensure_parent(&state.pool, Parent::Chapter, chapter_id).await?;
        }
    }

    payload.apply(&mut quiz);
    quiz.remarks = clean_html(&quiz.remarks);

    sqlx::query(
        "UPDATE quizzes SET chapter_id = ?, date_of_quiz = ?, time_duration = ?, remarks = ? WHERE id = ?",
    )
    .bind(quiz.chapter_id)
    .bind(quiz.date_of_quiz)
    .bind(&quiz.time_duration)
    .bind(&quiz.remarks)
    .bind(id)
    .execute(&state.pool)
    .await
    .map_err(db_error("update quiz"))?;

    let mut tags = Tag::written(Entity::Quiz, id).to_vec();
    tags.push(Tag::Row(Entity::Chapter, old_chapter_id));
    tags.push(Tag::Row(Entity::Chapter, quiz.chapter_id));
    state.cache.invalidate(tags);

    let details = details_or_404(&state, id).await?;
    Ok(Json(details))
}

/// Deletes a quiz along with its questions and recorded attempts.
/// Admin only.
pub async fn delete_quiz(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let removed = cascade::delete_quiz(&mut *tx, id)
        .await
        .map_err(db_error("delete quiz"))?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;
    tx.commit().await?;

    state.cache.invalidate(removed.tags());

    Ok(StatusCode::NO_CONTENT)
}
