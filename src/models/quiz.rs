// src/models/quiz.rs

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// `H:MM` or `HH:MM`.
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}:[0-5]\d$").expect("valid duration regex"));

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub chapter_id: i64,
    pub date_of_quiz: NaiveDate,
    pub time_duration: Option<String>,
    pub remarks: String,
}

/// Quiz joined with its chapter and subject plus the live question count.
/// None of the derived columns are stored.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizDetails {
    pub id: i64,
    pub chapter_id: i64,
    pub chapter_name: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub date_of_quiz: NaiveDate,
    pub time_duration: Option<String>,
    pub remarks: String,
    pub num_questions: i64,
}

/// Query parameters for listing quizzes.
#[derive(Debug, Deserialize)]
pub struct QuizListParams {
    pub chapter_id: Option<i64>,
}

/// DTO for creating a new quiz. `date_of_quiz` is `YYYY-MM-DD`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    pub chapter_id: i64,
    pub date_of_quiz: NaiveDate,
    #[validate(custom(function = validate_duration))]
    pub time_duration: Option<String>,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub remarks: String,
}

/// DTO for updating a quiz. Absent fields are unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    pub chapter_id: Option<i64>,
    pub date_of_quiz: Option<NaiveDate>,
    #[validate(custom(function = validate_duration))]
    pub time_duration: Option<String>,
    #[validate(length(max = 5000))]
    pub remarks: Option<String>,
}

impl UpdateQuizRequest {
    pub fn apply(self, quiz: &mut Quiz) {
        if let Some(chapter_id) = self.chapter_id {
            quiz.chapter_id = chapter_id;
        }
        if let Some(date_of_quiz) = self.date_of_quiz {
            quiz.date_of_quiz = date_of_quiz;
        }
        if let Some(time_duration) = self.time_duration {
            quiz.time_duration = Some(time_duration);
        }
        if let Some(remarks) = self.remarks {
            quiz.remarks = remarks;
        }
    }
}

fn validate_duration(duration: &str) -> Result<(), validator::ValidationError> {
    if !DURATION_RE.is_match(duration) {
        return Err(validator::ValidationError::new("duration_must_be_hh_mm"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_format() {
        assert!(validate_duration("00:30").is_ok());
        assert!(validate_duration("1:05").is_ok());
        assert!(validate_duration("30 minutes").is_err());
        assert!(validate_duration("10:75").is_err());
    }

    #[test]
    fn create_request_parses_iso_date() {
        let req: CreateQuizRequest = serde_json::from_str(
            r#"{"chapter_id": 1, "date_of_quiz": "2025-03-01", "time_duration": "00:20"}"#,
        )
        .unwrap();
        assert_eq!(req.date_of_quiz, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert!(req.remarks.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn update_merges() {
        let mut quiz = Quiz {
            id: 1,
            chapter_id: 2,
            date_of_quiz: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            time_duration: Some("00:10".into()),
            remarks: "old".into(),
        };
        UpdateQuizRequest {
            remarks: Some("new".into()),
            ..Default::default()
        }
        .apply(&mut quiz);
        assert_eq!(quiz.remarks, "new");
        assert_eq!(quiz.chapter_id, 2);
        assert_eq!(quiz.time_duration.as_deref(), Some("00:10"));
    }
}
