// src/handlers/chapter.rs

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
        queries::{Parent, ensure_parent},
    },
    error::AppError,
    models::chapter::{Chapter, ChapterListParams, CreateChapterRequest, UpdateChapterRequest},
    state::AppState,
    utils::{
        html::clean_html,
        json::AppJson,
        jwt::{AdminUser, AuthUser},
    },
};

const CHAPTER_SELECT: &str = "SELECT id, name, description, subject_id FROM chapters";

async fn fetch_chapter(state: &AppState, id: i64) -> Result<Chapter, AppError> {
    sqlx::query_as::<_, Chapter>(&format!("{CHAPTER_SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&state.pool)
        .await
        .map_err(db_error("fetch chapter"))?
        .ok_or(AppError::NotFound("Chapter not found".to_string()))
}

/// Lists chapters, optionally only those of `?subject_id=`.
pub async fn list_chapters(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ChapterListParams>,
) -> Result<impl IntoResponse, AppError> {
    let key = match params.subject_id {
        Some(subject_id) => format!("chapter_list_subject_{subject_id}"),
        None => "chapters_list".to_string(),
    };

    let pool = state.pool.clone();
    state
        .cache
        .get_or_load(key, short_ttl(&state.config), || async move {
            let chapters = match params.subject_id {
                Some(subject_id) => {
                    sqlx::query_as::<_, Chapter>(&format!(
                        "{CHAPTER_SELECT} WHERE subject_id = ? ORDER BY id"
                    ))
                    .bind(subject_id)
                    .fetch_all(&pool)
                    .await
                }
                None => {
                    sqlx::query_as::<_, Chapter>(&format!("{CHAPTER_SELECT} ORDER BY id"))
                        .fetch_all(&pool)
                        .await
                }
            }
            .map_err(db_error("list chapters"))?;

            Ok((chapters, vec![Tag::Table(Entity::Chapter)]))
        })
        .await
}

pub async fn get_chapter(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let loader = state.clone();
    state
        .cache
        .get_or_load(format!("chapter_{id}"), short_ttl(&state.config), || async move {
            let chapter = fetch_chapter(&loader, id).await?;
            Ok((chapter, vec![Tag::Row(Entity::Chapter, id)]))
        })
        .await
}

/// Creates a chapter under an existing subject.
/// Admin only.
pub async fn create_chapter(
    _admin: AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateChapterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_parent(&state.pool, Parent::Subject, payload.subject_id).await?;

    let chapter = sqlx::query_as::<_, Chapter>(
        r#"
        INSERT INTO chapters (name, description, subject_id)
        VALUES (?, ?, ?)
        RETURNING id, name, description, subject_id
        "#,
    )
    .bind(&payload.name)
    .bind(clean_html(&payload.description))
    .bind(payload.subject_id)
    .fetch_one(&state.pool)
    .await
    .map_err(db_error("create chapter"))?;

    let mut tags = Tag::written(Entity::Chapter, chapter.id).to_vec();
    tags.push(Tag::Row(Entity::Subject, chapter.subject_id));
    state.cache.invalidate(tags);

    Ok((StatusCode::CREATED, Json(chapter)))
}

/// Merge-updates a chapter; fields not in the body keep their values.
/// Admin only.
pub async fn update_chapter(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateChapterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut chapter = fetch_chapter(&state, id).await?;
    let old_subject_id = chapter.subject_id;

    if let Some(subject_id) = payload.subject_id {
        if subject_id != old_subject_id {
            ensure_parent(&state.pool, Parent::Subject, subject_id).await?;
        }
    }

    payload.apply(&mut chapter);
    chapter.description = clean_html(&chapter.description);

    sqlx::query("UPDATE chapters SET name = ?, description = ?, subject_id = ? WHERE id = ?")
        .bind(&chapter.name)
        .bind(&chapter.description)
        .bind(chapter.subject_id)
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(db_error("update chapter"))?;

    let mut tags = Tag::written(Entity::Chapter, id).to_vec();
    tags.push(Tag::Row(Entity::Subject, old_subject_id));
    tags.push(Tag::Row(Entity::Subject, chapter.subject_id));
    state.cache.invalidate(tags);

    Ok(Json(chapter))
}

/// Deletes a chapter with its quizzes, their questions and attempts.
/// Admin only.
pub async fn delete_chapter(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let removed = cascade::delete_chapter(&mut *tx, id)
        .await
        .map_err(db_error("delete chapter"))?
        .ok_or(AppError::NotFound("Chapter not found".to_string()))?;
    tx.commit().await?;

    state.cache.invalidate(removed.tags());

    Ok(StatusCode::NO_CONTENT)
}
