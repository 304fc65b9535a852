// src/models/chapter.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'chapters' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Owning subject; always set.
    pub subject_id: i64,
}

/// Query parameters for listing chapters.
#[derive(Debug, Deserialize)]
pub struct ChapterListParams {
    pub subject_id: Option<i64>,
}

/// DTO for creating a new chapter.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChapterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    pub subject_id: i64,
}

/// DTO for updating a chapter. Absent fields are unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateChapterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub subject_id: Option<i64>,
}

impl UpdateChapterRequest {
    pub fn apply(self, chapter: &mut Chapter) {
        if let Some(name) = self.name {
            chapter.name = name;
        }
        if let Some(description) = self.description {
            chapter.description = description;
        }
        if let Some(subject_id) = self.subject_id {
            chapter.subject_id = subject_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_without_subject_keeps_subject() {
        let mut chapter = Chapter {
            id: 3,
            name: "Limits".into(),
            description: "Intro".into(),
            subject_id: 7,
        };
        let update: UpdateChapterRequest = serde_json::from_str(r#"{"name":"Updated"}"#).unwrap();
        update.apply(&mut chapter);

        assert_eq!(chapter.name, "Updated");
        assert_eq!(chapter.subject_id, 7);
        assert_eq!(chapter.description, "Intro");
    }
}
