// src/models/subject.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::chapter::Chapter;

/// Represents the 'subjects' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    /// Unique across subjects.
    pub name: String,
    pub description: String,
}

/// Subject payload returned by the API: the row plus its chapters.
#[derive(Debug, Serialize)]
pub struct SubjectWithChapters {
    #[serde(flatten)]
    pub subject: Subject,
    pub chapters: Vec<Chapter>,
}

/// DTO for creating a new subject.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubjectRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
}

/// DTO for updating a subject. Absent fields are unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateSubjectRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

impl UpdateSubjectRequest {
    pub fn apply(self, subject: &mut Subject) {
        if let Some(name) = self.name {
            subject.name = name;
        }
        if let Some(description) = self.description {
            subject.description = description;
        }
    }
}
