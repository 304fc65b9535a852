// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, chapter, jobs, leaderboard, question, quiz, score, stats, subject, user},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Every route lives under `/api`.
/// * Register and login are rate limited per client IP, so the server must be
///   started with `into_make_service_with_connect_info::<SocketAddr>()`.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let mut origins = vec![
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];
    if let Ok(base) = HeaderValue::from_str(state.config.base_url.trim_end_matches('/')) {
        if !origins.contains(&base) {
            origins.push(base);
        }
    }

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(state.config.rate_limit_per_second.max(1))
            .burst_size(state.config.rate_limit_burst.max(1))
            .finish()
            .expect("rate limit settings are non-zero"),
    );

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(GovernorLayer::new(governor_conf));

    let catalog_routes = Router::new()
        .route(
            "/subjects",
            get(subject::list_subjects).post(subject::create_subject),
        )
        .route(
            "/subjects/{id}",
            get(subject::get_subject)
                .put(subject::update_subject)
                .delete(subject::delete_subject),
        )
        .route(
            "/chapters",
            get(chapter::list_chapters).post(chapter::create_chapter),
        )
        .route(
            "/chapters/{id}",
            get(chapter::get_chapter)
                .put(chapter::update_chapter)
                .delete(chapter::delete_chapter),
        )
        .route("/quizzes", get(quiz::list_quizzes).post(quiz::create_quiz))
        .route(
            "/quizzes/{id}",
            get(quiz::get_quiz)
                .put(quiz::update_quiz)
                .delete(quiz::delete_quiz),
        )
        .route(
            "/questions",
            get(question::list_questions).post(question::create_question),
        )
        .route(
            "/questions/{id}",
            get(question::get_question)
                .put(question::update_question)
                .delete(question::delete_question),
        );

    let score_routes = Router::new()
        .route("/scores", get(score::list_scores).post(score::create_score))
        .route("/scores/latest/{quiz_id}/{user_id}", get(score::latest_score))
        .route("/scores/{user_id}", get(score::user_scores))
        .route("/scores/{user_id}/csv", get(score::user_scores_csv))
        .route("/scores/{user_id}/{quiz_id}", get(score::user_quiz_attempts))
        .route("/leaderboard", get(leaderboard::get_leaderboard))
        .route("/user-summary/{user_id}", get(leaderboard::get_user_summary))
        .route(
            "/user-summary/export/{user_id}",
            get(leaderboard::download_export).post(leaderboard::start_export),
        )
        .route("/stats/quiz-attempts", get(stats::quiz_attempts))
        .route("/stats/subject-attempts", get(stats::subject_attempts));

    let user_routes = Router::new()
        .route("/admin", get(auth::admin_dashboard))
        .route("/user", get(auth::user_dashboard))
        .route("/users", get(user::list_users))
        .route(
            "/users/{id}",
            get(user::get_user)
                .put(user::update_user)
                .delete(user::delete_user),
        )
        .route("/get-profile", get(user::get_profile))
        .route("/update-profile", put_profile())
        .route(
            "/admin/jobs/daily-reminder",
            post(jobs::trigger_daily_reminder),
        )
        .route(
            "/admin/jobs/monthly-report",
            post(jobs::trigger_monthly_report),
        );

    let api = Router::new()
        .merge(auth_routes)
        .merge(catalog_routes)
        .merge(score_routes)
        .merge(user_routes);

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// The profile form submits with either verb.
fn put_profile() -> axum::routing::MethodRouter<AppState> {
    axum::routing::put(user::update_profile).post(user::update_profile)
}
