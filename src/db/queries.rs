use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::{
        quiz::QuizDetails,
        role::ADMIN_ROLE,
        score::ScoreRecord,
        user::{User, UserWithRoles},
    },
};

/// Quiz row with chapter/subject names and the live question count.
pub const QUIZ_DETAILS_SELECT: &str = r#"
    SELECT
        q.id, q.chapter_id, c.name AS chapter_name,
        s.id AS subject_id, s.name AS subject_name,
        q.date_of_quiz, q.time_duration, q.remarks,
        (SELECT COUNT(*) FROM questions qs WHERE qs.quiz_id = q.id) AS num_questions
    FROM quizzes q
    JOIN chapters c ON c.id = q.chapter_id
    JOIN subjects s ON s.id = c.subject_id
"#;

const SCORE_RECORD_SELECT: &str = r#"
    SELECT
        sc.id, sc.quiz_id, sc.user_id, u.full_name,
        c.id AS chapter_id, c.name AS chapter_name,
        s.id AS subject_id, s.name AS subject_name,
        (SELECT COUNT(*) FROM questions qs WHERE qs.quiz_id = sc.quiz_id) AS num_questions,
        sc.total_scored, sc.time_stamp_of_attempt
    FROM scores sc
    JOIN quizzes q ON q.id = sc.quiz_id
    JOIN chapters c ON c.id = q.chapter_id
    JOIN subjects s ON s.id = c.subject_id
    JOIN users u ON u.id = sc.user_id
"#;

/// Which attempts to load.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreFilter {
    pub user_id: Option<i64>,
    pub quiz_id: Option<i64>,
}

impl ScoreFilter {
    pub fn user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            quiz_id: None,
        }
    }
}

/// Loads enriched attempts, newest first.
pub async fn fetch_score_records(
    pool: &SqlitePool,
    filter: ScoreFilter,
) -> Result<Vec<ScoreRecord>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(SCORE_RECORD_SELECT);
    builder.push(" WHERE 1 = 1");
    if let Some(user_id) = filter.user_id {
        builder.push(" AND sc.user_id = ");
        builder.push_bind(user_id);
    }
    if let Some(quiz_id) = filter.quiz_id {
        builder.push(" AND sc.quiz_id = ");
        builder.push_bind(quiz_id);
    }
    builder.push(" ORDER BY sc.time_stamp_of_attempt DESC, sc.id DESC");

    builder
        .build_query_as::<ScoreRecord>()
        .fetch_all(pool)
        .await
}

pub async fn fetch_quiz_details(
    pool: &SqlitePool,
    quiz_id: i64,
) -> Result<Option<QuizDetails>, sqlx::Error> {
    sqlx::query_as::<_, QuizDetails>(&format!("{QUIZ_DETAILS_SELECT} WHERE q.id = ?"))
        .bind(quiz_id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_user(pool: &SqlitePool, user_id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password, full_name, qualification, dob, active FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password, full_name, qualification, dob, active FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn user_roles(pool: &SqlitePool, user_id: i64) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT r.name
        FROM roles r
        JOIN roles_users ru ON ru.role_id = r.id
        WHERE ru.user_id = ?
        ORDER BY r.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn with_roles(pool: &SqlitePool, user: User) -> Result<UserWithRoles, sqlx::Error> {
    let roles = user_roles(pool, user.id).await?;
    Ok(UserWithRoles { user, roles })
}

/// Links an existing role (by name) to a user. Idempotent.
pub async fn grant_role(
    conn: &mut SqliteConnection,
    user_id: i64,
    role: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT OR IGNORE INTO roles_users (user_id, role_id)
         SELECT ?, id FROM roles WHERE name = ?",
    )
    .bind(user_id)
    .bind(role)
    .execute(conn)
    .await?;
    Ok(())
}

/// Active users without the admin role: the audience of reminder and report mail.
pub async fn active_learners(pool: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.email, u.password, u.full_name, u.qualification, u.dob, u.active
        FROM users u
        WHERE u.active = 1
          AND NOT EXISTS (
              SELECT 1 FROM roles_users ru
              JOIN roles r ON r.id = ru.role_id
              WHERE ru.user_id = u.id AND r.name = ?
          )
        ORDER BY u.id
        "#,
    )
    .bind(ADMIN_ROLE)
    .fetch_all(pool)
    .await
}

/// Parent tables a foreign key may point at.
#[derive(Debug, Clone, Copy)]
pub enum Parent {
    Subject,
    Chapter,
    Quiz,
}

impl Parent {
    fn table(self) -> &'static str {
        match self {
            Parent::Subject => "subjects",
            Parent::Chapter => "chapters",
            Parent::Quiz => "quizzes",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Parent::Subject => "Subject",
            Parent::Chapter => "Chapter",
            Parent::Quiz => "Quiz",
        }
    }
}

/// Rejects a create/update whose foreign key points at a missing row.
pub async fn ensure_parent(pool: &SqlitePool, parent: Parent, id: i64) -> Result<(), AppError> {
    let found: Option<i64> =
        sqlx::query_scalar(&format!("SELECT id FROM {} WHERE id = ?", parent.table()))
            .bind(id)
            .fetch_optional(pool)
            .await?;

    match found {
        Some(_) => Ok(()),
        None => Err(AppError::BadRequest(format!(
            "{} {} does not exist",
            parent.label(),
            id
        ))),
    }
}
