// src/handlers/subject.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use super::{db_error, short_ttl};
use crate::{
    cache::{Entity, Tag},
    db::cascade,
    error::{AppError, is_unique_violation},
    models::{
        chapter::Chapter,
        subject::{CreateSubjectRequest, Subject, SubjectWithChapters, UpdateSubjectRequest},
    },
    state::AppState,
    utils::{
        html::clean_html,
        json::AppJson,
        jwt::{AdminUser, AuthUser},
    },
};

fn duplicate_name(name: &str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Subject '{}' already exists", name))
        } else {
            tracing::error!("Failed to save subject: {:?}", e);
            AppError::from(e)
        }
    }
}

/// Lists all subjects, each with its chapters.
pub async fn list_subjects(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let pool = state.pool.clone();
    state
        .cache
        .get_or_load("subjects_list".to_string(), short_ttl(&state.config), || async move {
            let subjects = sqlx::query_as::<_, Subject>(
                "SELECT id, name, description FROM subjects ORDER BY id",
            )
            .fetch_all(&pool)
            .await
            .map_err(db_error("list subjects"))?;

            let chapters = sqlx::query_as::<_, Chapter>(
                "SELECT id, name, description, subject_id FROM chapters ORDER BY id",
            )
            .fetch_all(&pool)
            .await
            .map_err(db_error("list chapters"))?;

            let mut by_subject: HashMap<i64, Vec<Chapter>> = HashMap::new();
            for chapter in chapters {
                by_subject.entry(chapter.subject_id).or_default().push(chapter);
            }

            let body: Vec<SubjectWithChapters> = subjects
                .into_iter()
                .map(|subject| SubjectWithChapters {
                    chapters: by_subject.remove(&subject.id).unwrap_or_default(),
                    subject,
                })
                .collect();

            Ok((body, vec![Tag::Table(Entity::Subject), Tag::Table(Entity::Chapter)]))
        })
        .await
}

/// Gets one subject with its chapters.
pub async fn get_subject(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let pool = state.pool.clone();
    state
        .cache
        .get_or_load(format!("subject_{id}"), short_ttl(&state.config), || async move {
            let subject = sqlx::query_as::<_, Subject>(
                "SELECT id, name, description FROM subjects WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&pool)
            .await
            .map_err(db_error("fetch subject"))?
            .ok_or(AppError::NotFound("Subject not found".to_string()))?;

            let chapters = sqlx::query_as::<_, Chapter>(
                "SELECT id, name, description, subject_id FROM chapters WHERE subject_id = ? ORDER BY id",
            )
            .bind(id)
            .fetch_all(&pool)
            .await
            .map_err(db_error("list chapters"))?;

            let mut tags = vec![Tag::Row(Entity::Subject, id)];
            tags.extend(chapters.iter().map(|c| Tag::Row(Entity::Chapter, c.id)));

            Ok((SubjectWithChapters { subject, chapters }, tags))
        })
        .await
}

/// Creates a subject.
/// Admin only.
pub async fn create_subject(
    _admin: AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let subject = sqlx::query_as::<_, Subject>(
        "INSERT INTO subjects (name, description) VALUES (?, ?) RETURNING id, name, description",
    )
    .bind(&payload.name)
    .bind(clean_html(&payload.description))
    .fetch_one(&state.pool)
    .await
    .map_err(duplicate_name(&payload.name))?;

    state.cache.invalidate(Tag::written(Entity::Subject, subject.id));
    tracing::info!("Subject created: {} ({})", subject.name, subject.id);

    Ok((StatusCode::CREATED, Json(subject)))
}

/// Merge-updates a subject.
/// Admin only.
pub async fn update_subject(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut subject = sqlx::query_as::<_, Subject>(
        "SELECT id, name, description FROM subjects WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await
    .map_err(db_error("fetch subject"))?
    .ok_or(AppError::NotFound("Subject not found".to_string()))?;

    payload.apply(&mut subject);
    subject.description = clean_html(&subject.description);

    sqlx::query("UPDATE subjects SET name = ?, description = ? WHERE id = ?")
        .bind(&subject.name)
        .bind(&subject.description)
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(duplicate_name(&subject.name))?;

    state.cache.invalidate(Tag::written(Entity::Subject, id));

    Ok(Json(subject))
}

/// Deletes a subject and everything beneath it in one transaction.
/// Admin only.
pub async fn delete_subject(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let removed = cascade::delete_subject(&mut *tx, id)
        .await
        .map_err(db_error("delete subject"))?
        .ok_or(AppError::NotFound("Subject not found".to_string()))?;
    tx.commit().await?;

    state.cache.invalidate(removed.tags());
    tracing::info!(
        subject_id = id,
        chapters = removed.chapters.len(),
        quizzes = removed.quizzes.len(),
        "Subject deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
