// src/handlers/user.rs

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
        queries::{fetch_user, fetch_user_by_email, user_roles, with_roles},
    },
    error::{AppError, is_unique_violation},
    models::user::{AdminUpdateUserRequest, ProfileQuery, UpdateProfileRequest, User, UserWithRoles},
    state::AppState,
    utils::{
        json::AppJson,
        jwt::{AdminUser, AuthUser},
    },
};

async fn user_or_404(state: &AppState, id: i64) -> Result<User, AppError> {
    fetch_user(&state.pool, id)
        .await
        .map_err(db_error("fetch user"))?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

async fn save_user(state: &AppState, user: &User) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, full_name = ?, qualification = ?, dob = ?, active = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.qualification)
    .bind(user.dob)
    .bind(user.active)
    .bind(user.id)
    .execute(&state.pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Email already in use".to_string())
        } else {
            tracing::error!("Failed to update user: {:?}", e);
            AppError::from(e)
        }
    })?;

    state.cache.invalidate(Tag::written(Entity::User, user.id));
    Ok(())
}

/// Lists all users with their roles.
/// Admin only.
pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let pool = state.pool.clone();
    state
        .cache
        .get_or_load("users_list".to_string(), short_ttl(&state.config), || async move {
            let users = sqlx::query_as::<_, User>(
                "SELECT id, email, password, full_name, qualification, dob, active FROM users ORDER BY id",
            )
            .fetch_all(&pool)
            .await
            .map_err(db_error("list users"))?;

            let mut body: Vec<UserWithRoles> = Vec::with_capacity(users.len());
            for user in users {
                body.push(with_roles(&pool, user).await.map_err(db_error("load roles"))?);
            }

            Ok((body, vec![Tag::Table(Entity::User)]))
        })
        .await
}

/// Admin only.
pub async fn get_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = user_or_404(&state, id).await?;
    let user = with_roles(&state.pool, user)
        .await
        .map_err(db_error("load roles"))?;
    Ok(Json(user))
}

/// Updates name, qualification, date of birth or the active flag.
/// Admin only.
pub async fn update_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut user = user_or_404(&state, id).await?;
    payload.apply(&mut user);
    save_user(&state, &user).await?;

    let user = with_roles(&state.pool, user)
        .await
        .map_err(db_error("load roles"))?;
    Ok(Json(user))
}

/// Deletes a user together with their attempts and role links.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == admin.id {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let mut tx = state.pool.begin().await?;
    let removed = cascade::delete_user(&mut *tx, id)
        .await
        .map_err(db_error("delete user"))?
        .ok_or(AppError::NotFound("User not found".to_string()))?;
    tx.commit().await?;

    state.cache.invalidate(removed.tags());
    tracing::info!(user_id = id, scores = removed.scores.len(), "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Looks a profile up by email. Users may only look up themselves.
pub async fn get_profile(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> Result<impl IntoResponse, AppError> {
    let profile = fetch_user_by_email(&state.pool, &query.email)
        .await
        .map_err(db_error("fetch profile"))?;

    // Non-admins get 403 for unknown emails too.
    let profile = match profile {
        Some(profile) => {
            user.ensure_self_or_admin(profile.id)?;
            profile
        }
        None if user.is_admin() => {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        None => return Err(AppError::Forbidden("You may only access your own records".to_string())),
    };

    let roles = user_roles(&state.pool, profile.id)
        .await
        .map_err(db_error("load roles"))?;
    Ok(Json(UserWithRoles {
        user: profile,
        roles,
    }))
}

/// Updates the caller's own profile. A new email must not belong to anyone else.
pub async fn update_profile(
    user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut profile = user_or_404(&state, user.id).await?;

    if let Some(email) = payload.email.as_deref() {
        if email != profile.email {
            let taken = fetch_user_by_email(&state.pool, email)
                .await
                .map_err(db_error("check email"))?;
            if taken.is_some() {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
        }
    }

    payload.apply(&mut profile);
    save_user(&state, &profile).await?;

    let profile = with_roles(&state.pool, profile)
        .await
        .map_err(db_error("load roles"))?;
    Ok(Json(profile))
}
