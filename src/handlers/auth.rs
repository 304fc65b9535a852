// src/handlers/auth.rs

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use super::db_error;
use crate::{
    cache::{Entity, Tag},
    db::queries::{fetch_user, fetch_user_by_email, grant_role, user_roles, with_roles},
    error::{AppError, is_unique_violation},
    models::{
        role::USER_ROLE,
        user::{LoginRequest, RegisterRequest, User},
    },
    state::AppState,
    utils::{
        hash::{hash_password, verify_password},
        json::AppJson,
        jwt::{AdminUser, AuthUser, sign_jwt},
    },
};

/// Registers a new user with the "User" role.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let mut tx = state.pool.begin().await?;
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password, full_name, qualification, dob, active)
        VALUES (?, ?, ?, ?, ?, 1)
        RETURNING id, email, password, full_name, qualification, dob, active
        "#,
    )
    .bind(&payload.email)
    .bind(hashed_password)
    .bind(&payload.full_name)
    .bind(&payload.qualification)
    .bind(payload.dob)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Email '{}' is already registered", payload.email))
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    grant_role(&mut *tx, user.id, USER_ROLE)
        .await
        .map_err(db_error("grant role"))?;
    tx.commit().await?;

    state.cache.invalidate(Tag::written(Entity::User, user.id));
    tracing::info!("User registered: {}", user.email);

    let user = with_roles(&state.pool, user)
        .await
        .map_err(db_error("load roles"))?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// The token carries the user's id and role names. Inactive accounts are
/// refused.
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = fetch_user_by_email(&state.pool, &payload.email)
        .await
        .map_err(db_error("look up login"))?
        .ok_or(AppError::AuthError("Invalid email or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    if !user.active {
        return Err(AppError::AuthError("Account is inactive".to_string()));
    }

    let roles = user_roles(&state.pool, user.id)
        .await
        .map_err(db_error("load roles"))?;

    let token = sign_jwt(
        user.id,
        &roles,
        &state.config.jwt_secret,
        state.config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user": {
            "id": user.id,
            "email": user.email,
            "full_name": user.full_name,
            "roles": roles,
        }
    })))
}

/// Admin landing endpoint.
pub async fn admin_dashboard(AdminUser(admin): AdminUser) -> impl IntoResponse {
    Json(json!({
        "message": "Welcome, Admin!",
        "user_id": admin.id,
    }))
}

/// The caller's own account.
pub async fn user_dashboard(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let account = fetch_user(&state.pool, user.id)
        .await
        .map_err(db_error("fetch user"))?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let account = with_roles(&state.pool, account)
        .await
        .map_err(db_error("load roles"))?;
    Ok(Json(account))
}
