// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    config::Config,
    db::queries::{fetch_user, user_roles},
    error::AppError,
    models::role::ADMIN_ROLE,
};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Role names held by the user ("Admin", "User").
    pub roles: Vec<String>,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// Signs a new JWT for the user.
pub fn sign_jwt(
    id: i64,
    roles: &[String],
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_string(),
        roles: roles.to_vec(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Authenticated caller, extracted from `Authorization: Bearer <token>`.
///
/// Any handler taking an `AuthUser` argument is a protected route; requests
/// without a valid token are rejected with 401 before the handler runs.
/// The account must still exist and be active, and roles are read from the
/// database rather than trusted from the token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }

    /// Users may read their own data; admins may read anyone's.
    pub fn ensure_self_or_admin(&self, user_id: i64) -> Result<(), AppError> {
        if self.id == user_id || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You may only access your own records".to_string(),
            ))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    Config: FromRef<S>,
    SqlitePool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = Config::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::AuthError("Missing bearer token".to_string()))?;

        let claims = verify_jwt(token, &config.jwt_secret)?;
        let id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

        let pool = SqlitePool::from_ref(state);
        let account = fetch_user(&pool, id).await.map_err(|e| {
            tracing::error!("Failed to load token owner: {:?}", e);
            AppError::from(e)
        })?;
        match account {
            Some(account) if account.active => {}
            _ => return Err(AppError::AuthError("Account is disabled or removed".to_string())),
        }

        let roles = user_roles(&pool, id).await.map_err(|e| {
            tracing::error!("Failed to load roles: {:?}", e);
            AppError::from(e)
        })?;

        Ok(AuthUser { id, roles })
    }
}

/// Authenticated caller holding the "Admin" role; 403 otherwise.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    Config: FromRef<S>,
    SqlitePool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AppError::Forbidden("Admin role required".to_string()));
        }

        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let roles = vec!["User".to_string()];
        let token = sign_jwt(42, &roles, "secret", 60).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.roles, roles);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = sign_jwt(1, &[], "secret", 60).unwrap();
        assert!(matches!(verify_jwt(&token, "other"), Err(AppError::AuthError(_))));
    }

    #[test]
    fn self_or_admin() {
        let user = AuthUser { id: 5, roles: vec!["User".into()] };
        assert!(user.ensure_self_or_admin(5).is_ok());
        assert!(matches!(user.ensure_self_or_admin(6), Err(AppError::Forbidden(_))));

        let admin = AuthUser { id: 1, roles: vec!["Admin".into()] };
        assert!(admin.ensure_self_or_admin(6).is_ok());
    }
}
