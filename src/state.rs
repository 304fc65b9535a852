use crate::{cache::ResponseCache, config::Config, jobs::JobQueue};
use axum::extract::FromRef;
use sqlx::SqlitePool;

/// Application context handed to every handler. Constructed once in `main`
/// (or a test harness); nothing in the crate reaches for global state.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub cache: ResponseCache,
    pub jobs: JobQueue,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ResponseCache {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}

impl FromRef<AppState> for JobQueue {
    fn from_ref(state: &AppState) -> Self {
        state.jobs.clone()
    }
}
