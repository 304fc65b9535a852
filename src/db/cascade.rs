//! Cascading deletes.
//!
//! Each function runs inside the caller's transaction, so a failure half-way
//! rolls back every delete. They return what was removed so the caller can
//! invalidate the matching cache tags after commit.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::cache::{Entity, Tag};

#[derive(Debug, Default)]
pub struct Removed {
    pub subjects: Vec<i64>,
    pub chapters: Vec<i64>,
    pub quizzes: Vec<i64>,
    pub questions: Vec<i64>,
    pub scores: Vec<i64>,
    pub users: Vec<i64>,
    /// Surviving rows whose cached views embedded something removed.
    pub touched: Vec<Tag>,
}

impl Removed {
    pub fn tags(&self) -> Vec<Tag> {
        let groups = [
            (Entity::Subject, &self.subjects),
            (Entity::Chapter, &self.chapters),
            (Entity::Quiz, &self.quizzes),
            (Entity::Question, &self.questions),
            (Entity::Score, &self.scores),
            (Entity::User, &self.users),
        ];

        let mut tags: Vec<Tag> = groups
            .into_iter()
            .flat_map(|(entity, ids)| ids.iter().flat_map(move |id| Tag::written(entity, *id)))
            .collect();
        tags.extend(self.touched.iter().copied());
        tags
    }
}

async fn select_ids(
    conn: &mut SqliteConnection,
    select: &str,
    ids: &[i64],
) -> Result<Vec<i64>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<Sqlite>::new(select);
    builder.push(" IN (");
    let mut separated = builder.separated(",");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    builder.build_query_scalar::<i64>().fetch_all(&mut *conn).await
}

async fn delete_in(
    conn: &mut SqliteConnection,
    delete: &str,
    ids: &[i64],
) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Sqlite>::new(delete);
    builder.push(" IN (");
    let mut separated = builder.separated(",");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    Ok(builder.build().execute(&mut *conn).await?.rows_affected())
}

/// Deletes quizzes with their questions and attempts.
async fn delete_quizzes(
    conn: &mut SqliteConnection,
    quiz_ids: &[i64],
    removed: &mut Removed,
) -> Result<(), sqlx::Error> {
    let questions = select_ids(conn, "SELECT id FROM questions WHERE quiz_id", quiz_ids).await?;
    let scores = select_ids(conn, "SELECT id FROM scores WHERE quiz_id", quiz_ids).await?;
    let score_users =
        select_ids(conn, "SELECT DISTINCT user_id FROM scores WHERE quiz_id", quiz_ids).await?;

    delete_in(conn, "DELETE FROM scores WHERE quiz_id", quiz_ids).await?;
    delete_in(conn, "DELETE FROM questions WHERE quiz_id", quiz_ids).await?;
    delete_in(conn, "DELETE FROM quizzes WHERE id", quiz_ids).await?;

    removed.quizzes.extend_from_slice(quiz_ids);
    removed.questions.extend(questions);
    removed.scores.extend(scores);
    removed
        .touched
        .extend(score_users.into_iter().map(|id| Tag::Row(Entity::User, id)));
    Ok(())
}

/// Deletes chapters and everything beneath them.
async fn delete_chapters(
    conn: &mut SqliteConnection,
    chapter_ids: &[i64],
    removed: &mut Removed,
) -> Result<(), sqlx::Error> {
    let quizzes = select_ids(conn, "SELECT id FROM quizzes WHERE chapter_id", chapter_ids).await?;
    delete_quizzes(conn, &quizzes, removed).await?;
    delete_in(conn, "DELETE FROM chapters WHERE id", chapter_ids).await?;
    removed.chapters.extend_from_slice(chapter_ids);
    Ok(())
}

/// Subject → chapters → quizzes → questions and scores.
/// Returns `None` if the subject does not exist.
pub async fn delete_subject(
    conn: &mut SqliteConnection,
    subject_id: i64,
) -> Result<Option<Removed>, sqlx::Error> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM subjects WHERE id = ?")
        .bind(subject_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Ok(None);
    }

    let mut removed = Removed::default();
    let chapters = select_ids(conn, "SELECT id FROM chapters WHERE subject_id", &[subject_id]).await?;
    delete_chapters(conn, &chapters, &mut removed).await?;

    sqlx::query("DELETE FROM subjects WHERE id = ?")
        .bind(subject_id)
        .execute(&mut *conn)
        .await?;
    removed.subjects.push(subject_id);

    Ok(Some(removed))
}

/// Chapter → quizzes → questions and scores.
pub async fn delete_chapter(
    conn: &mut SqliteConnection,
    chapter_id: i64,
) -> Result<Option<Removed>, sqlx::Error> {
    let subject_id: Option<i64> = sqlx::query_scalar("SELECT subject_id FROM chapters WHERE id = ?")
        .bind(chapter_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(subject_id) = subject_id else {
        return Ok(None);
    };

    let mut removed = Removed::default();
    delete_chapters(conn, &[chapter_id], &mut removed).await?;
    removed.touched.push(Tag::Row(Entity::Subject, subject_id));

    Ok(Some(removed))
}

/// Quiz → questions and scores.
pub async fn delete_quiz(
    conn: &mut SqliteConnection,
    quiz_id: i64,
) -> Result<Option<Removed>, sqlx::Error> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM quizzes WHERE id = ?")
        .bind(quiz_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Ok(None);
    }

    let mut removed = Removed::default();
    delete_quizzes(conn, &[quiz_id], &mut removed).await?;
    Ok(Some(removed))
}

/// User → scores and role links.
pub async fn delete_user(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Option<Removed>, sqlx::Error> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Ok(None);
    }

    let mut removed = Removed::default();
    removed.scores = select_ids(conn, "SELECT id FROM scores WHERE user_id", &[user_id]).await?;
    delete_in(conn, "DELETE FROM scores WHERE user_id", &[user_id]).await?;
    delete_in(conn, "DELETE FROM roles_users WHERE user_id", &[user_id]).await?;
    delete_in(conn, "DELETE FROM users WHERE id", &[user_id]).await?;
    removed.users.push(user_id);

    Ok(Some(removed))
}
