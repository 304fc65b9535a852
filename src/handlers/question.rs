// src/handlers/question.rs

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
    db::queries::{Parent, ensure_parent},
    error::AppError,
    models::question::{CreateQuestionRequest, Question, QuestionListParams, UpdateQuestionRequest},
    state::AppState,
    utils::{
        html::clean_html,
        json::AppJson,
        jwt::{AdminUser, AuthUser},
    },
};

const QUESTION_SELECT: &str = r#"
    SELECT id, quiz_id, question_title, question_statement,
           option1, option2, option3, option4, correct_option
    FROM questions
"#;

async fn fetch_question(state: &AppState, id: i64) -> Result<Question, AppError> {
    sqlx::query_as::<_, Question>(&format!("{QUESTION_SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&state.pool)
        .await
        .map_err(db_error("fetch question"))?
        .ok_or(AppError::NotFound("Question not found".to_string()))
}

/// Tags made stale by a write to a question: its own, plus the owning quiz
/// whose question count changes.
fn question_written(id: i64, quiz_id: i64) -> Vec<Tag> {
    let mut tags = Tag::written(Entity::Question, id).to_vec();
    tags.push(Tag::Row(Entity::Quiz, quiz_id));
    tags
}

/// Lists questions, optionally only those of `?quiz_id=`.
pub async fn list_questions(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let key = match params.quiz_id {
        Some(quiz_id) => format!("question_list_quiz_{quiz_id}"),
        None => "questions_list".to_string(),
    };

    let pool = state.pool.clone();
    state
        .cache
        .get_or_load(key, short_ttl(&state.config), || async move {
            let questions = match params.quiz_id {
                Some(quiz_id) => {
                    sqlx::query_as::<_, Question>(&format!(
                        "{QUESTION_SELECT} WHERE quiz_id = ? ORDER BY id"
                    ))
                    .bind(quiz_id)
                    .fetch_all(&pool)
                    .await
                }
                None => {
                    sqlx::query_as::<_, Question>(&format!("{QUESTION_SELECT} ORDER BY id"))
                        .fetch_all(&pool)
                        .await
                }
            }
            .map_err(db_error("list questions"))?;

            Ok((questions, vec![Tag::Table(Entity::Question)]))
        })
        .await
}

pub async fn get_question(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let loader = state.clone();
    state
        .cache
        .get_or_load(format!("question_{id}"), short_ttl(&state.config), || async move {
            let question = fetch_question(&loader, id).await?;
            Ok((question, vec![Tag::Row(Entity::Question, id)]))
        })
        .await
}

/// Adds a question to an existing quiz.
/// Admin only.
pub async fn create_question(
    _admin: AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_parent(&state.pool, Parent::Quiz, payload.quiz_id).await?;

    let question = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions
            (quiz_id, question_title, question_statement,
             option1, option2, option3, option4, correct_option)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id, quiz_id, question_title, question_statement,
                  option1, option2, option3, option4, correct_option
        "#,
    )
    .bind(payload.quiz_id)
    .bind(&payload.question_title)
    .bind(clean_html(&payload.question_statement))
    .bind(&payload.option1)
    .bind(&payload.option2)
    .bind(&payload.option3)
    .bind(&payload.option4)
    .bind(payload.correct_option)
    .fetch_one(&state.pool)
    .await
    .map_err(db_error("create question"))?;

    state
        .cache
        .invalidate(question_written(question.id, question.quiz_id));

    Ok((StatusCode::CREATED, Json(question)))
}

/// Merge-updates a question.
/// Admin only.
pub async fn update_question(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut question = fetch_question(&state, id).await?;
    payload.apply(&mut question);
    question.question_statement = clean_html(&question.question_statement);

    sqlx::query(
        r#"
        UPDATE questions
        SET question_title = ?, question_statement = ?,
            option1 = ?, option2 = ?, option3 = ?, option4 = ?, correct_option = ?
        WHERE id = ?
        "#,
    )
    .bind(&question.question_title)
    .bind(&question.question_statement)
    .bind(&question.option1)
    .bind(&question.option2)
    .bind(&question.option3)
    .bind(&question.option4)
    .bind(question.correct_option)
    .bind(id)
    .execute(&state.pool)
    .await
    .map_err(db_error("update question"))?;

    state
        .cache
        .invalidate(question_written(id, question.quiz_id));

    Ok(Json(question))
}

/// Admin only.
pub async fn delete_question(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz_id: i64 = sqlx::query_scalar("DELETE FROM questions WHERE id = ? RETURNING quiz_id")
        .bind(id)
        .fetch_optional(&state.pool)
        .await
        .map_err(db_error("delete question"))?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    state.cache.invalidate(question_written(id, quiz_id));

    Ok(StatusCode::NO_CONTENT)
}
