//! Pool construction, migrations, seeding, and queries shared between
//! handlers and background jobs.

pub mod cascade;
pub mod queries;

use std::{str::FromStr, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{
    config::Config,
    error::AppError,
    models::role::{ADMIN_ROLE, DEFAULT_ROLES, USER_ROLE},
    utils::hash::hash_password,
};

/// Connects to the database, retrying while it comes up.
pub async fn connect_with_retry(config: &Config) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let mut retry_count = 0;
    loop {
        match SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options.clone())
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    return Err(e);
                }
                tracing::warn!(
                    "Database not ready, retrying in 2s... (Attempt {})",
                    retry_count
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Runs migrations, then seeds roles and the configured admin account.
pub async fn prepare(pool: &SqlitePool, config: &Config) -> Result<(), AppError> {
    migrate(pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    seed_roles(pool).await?;
    seed_admin_user(pool, config).await?;
    Ok(())
}

/// Ensures the "Admin" and "User" roles exist.
pub async fn seed_roles(pool: &SqlitePool) -> Result<(), AppError> {
    for (name, description) in DEFAULT_ROLES {
        sqlx::query("INSERT OR IGNORE INTO roles (name, description) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Creates the admin account from `ADMIN_EMAIL` / `ADMIN_PASSWORD` if it
/// does not exist yet. Admins also hold the "User" role.
pub async fn seed_admin_user(pool: &SqlitePool, config: &Config) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Ok(());
    }

    tracing::info!("Seeding admin user: {}", email);
    let hashed_password = hash_password(password)?;

    let mut tx = pool.begin().await?;
    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (email, password, full_name, qualification, active)
         VALUES (?, ?, 'Admin User', 'Supervisor', 1)
         RETURNING id",
    )
    .bind(email)
    .bind(hashed_password)
    .fetch_one(&mut *tx)
    .await?;

    for role in [ADMIN_ROLE, USER_ROLE] {
        queries::grant_role(&mut *tx, user_id, role).await?;
    }
    tx.commit().await?;

    tracing::info!("Admin user created successfully.");
    Ok(())
}
