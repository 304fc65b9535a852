// tests/common/mod.rs
#![allow(dead_code)]

use std::{
    net::SocketAddr,
    path::PathBuf,
    str::FromStr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use quiz_master::{
    cache::ResponseCache,
    config::Config,
    db,
    jobs::{
        JobContext, JobQueue,
        mailer::{MailError, Mailer, OutgoingEmail},
    },
    routes,
    state::AppState,
};
use serde_json::{Value, json};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tempfile::TempDir;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin123";

/// Collects mail instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub pool: SqlitePool,
    pub cache: ResponseCache,
    pub mailer: Arc<RecordingMailer>,
    pub jobs: JobContext,
    pub export_dir: TempDir,
}

/// In-memory database kept alive on a single connection.
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory SQLite")
}

/// Helper function to spawn the app on a random port for testing.
pub async fn spawn_app() -> TestApp {
    let export_dir = tempfile::tempdir().expect("Failed to create export dir");

    let mut config = Config::new("sqlite::memory:", "test_secret_for_integration_tests");
    config.jwt_expiration = 600;
    config.rust_log = "error".to_string();
    config.admin_email = Some(ADMIN_EMAIL.to_string());
    config.admin_password = Some(ADMIN_PASSWORD.to_string());
    config.export_dir = export_dir.path().to_string_lossy().into_owned();
    config.rate_limit_burst = 1000;
    config.schedule.enabled = false;

    let pool = memory_pool().await;
    db::prepare(&pool, &config)
        .await
        .expect("Failed to prepare database");

    let mailer = Arc::new(RecordingMailer::default());
    let jobs = JobContext {
        pool: pool.clone(),
        mailer: mailer.clone(),
        export_dir: PathBuf::from(&config.export_dir),
        base_url: config.base_url.clone(),
    };

    let cache = ResponseCache::new();
    let state = AppState {
        pool: pool.clone(),
        config,
        cache: cache.clone(),
        jobs: JobQueue::start(jobs.clone()),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
        pool,
        cache,
        mailer,
        jobs,
        export_dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200, "login failed for {email}");

        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Registers a fresh user and logs in. Returns (id, email, token).
    pub async fn register_user(&self, full_name: &str) -> (i64, String, String) {
        let email = format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);
        let response = self
            .client
            .post(self.url("/api/register"))
            .json(&json!({
                "email": email,
                "password": "password123",
                "full_name": full_name,
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);

        let body: Value = response.json().await.unwrap();
        let id = body["id"].as_i64().unwrap();
        let token = self.login(&email, "password123").await;
        (id, email, token)
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// POSTs and returns the created id, asserting 201.
    pub async fn create(&self, path: &str, token: &str, body: Value) -> i64 {
        let response = self.post(path, token, body).await;
        assert_eq!(response.status().as_u16(), 201, "POST {path} failed");
        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    /// Subject → chapter → quiz with `questions` questions. Returns
    /// (subject_id, chapter_id, quiz_id).
    pub async fn seed_quiz(&self, token: &str, subject: &str, questions: usize) -> (i64, i64, i64) {
        let subject_id = self
            .create(
                "/api/subjects",
                token,
                json!({ "name": subject, "description": "Seeded" }),
            )
            .await;
        let chapter_id = self
            .create(
                "/api/chapters",
                token,
                json!({ "name": format!("{subject} basics"), "subject_id": subject_id }),
            )
            .await;
        let quiz_id = self
            .create(
                "/api/quizzes",
                token,
                json!({
                    "chapter_id": chapter_id,
                    "date_of_quiz": "2025-03-01",
                    "time_duration": "00:30",
                    "remarks": "Warm-up",
                }),
            )
            .await;

        for n in 0..questions {
            self.create(
                "/api/questions",
                token,
                json!({
                    "quiz_id": quiz_id,
                    "question_title": format!("Q{}", n + 1),
                    "question_statement": "Pick one",
                    "option1": "A",
                    "option2": "B",
                    "option3": "C",
                    "option4": "D",
                    "correct_option": 1,
                }),
            )
            .await;
        }

        (subject_id, chapter_id, quiz_id)
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}
