// src/handlers/mod.rs

pub mod auth;
pub mod chapter;
pub mod jobs;
pub mod leaderboard;
pub mod question;
pub mod quiz;
pub mod score;
pub mod stats;
pub mod subject;
pub mod user;

use std::time::Duration;

use crate::{config::Config, error::AppError};

/// Expiry for entity and list responses.
pub(crate) fn short_ttl(config: &Config) -> Duration {
    Duration::from_secs(config.cache_ttl_secs)
}

/// Expiry for aggregates (leaderboard, statistics).
pub(crate) fn long_ttl(config: &Config) -> Duration {
    Duration::from_secs(config.cache_long_ttl_secs)
}

/// Logs a database failure and turns it into a 500.
pub(crate) fn db_error(action: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!("Failed to {}: {:?}", action, e);
        AppError::from(e)
    }
}
