// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question_title: String,
    pub question_statement: String,
    pub option1: String,
    pub option2: String,
    pub option3: String,
    pub option4: String,
    /// 1-based index into option1..option4.
    pub correct_option: i64,
}

/// Query parameters for listing questions.
#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    pub quiz_id: Option<i64>,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub quiz_id: i64,
    #[validate(length(min = 1, max = 100))]
    pub question_title: String,
    #[validate(length(min = 1, max = 5000))]
    pub question_statement: String,
    #[validate(length(min = 1, max = 300))]
    pub option1: String,
    #[validate(length(min = 1, max = 300))]
    pub option2: String,
    #[validate(length(min = 1, max = 300))]
    pub option3: String,
    #[validate(length(min = 1, max = 300))]
    pub option4: String,
    #[validate(range(min = 1, max = 4, message = "correct_option must be between 1 and 4"))]
    pub correct_option: i64,
}

/// DTO for updating a question. Absent fields are unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 100))]
    pub question_title: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub question_statement: Option<String>,
    #[validate(length(min = 1, max = 300))]
    pub option1: Option<String>,
    #[validate(length(min = 1, max = 300))]
    pub option2: Option<String>,
    #[validate(length(min = 1, max = 300))]
    pub option3: Option<String>,
    #[validate(length(min = 1, max = 300))]
    pub option4: Option<String>,
    #[validate(range(min = 1, max = 4, message = "correct_option must be between 1 and 4"))]
    pub correct_option: Option<i64>,
}

impl UpdateQuestionRequest {
    pub fn apply(self, question: &mut Question) {
        if let Some(v) = self.question_title {
            question.question_title = v;
        }
        if let Some(v) = self.question_statement {
            question.question_statement = v;
        }
        if let Some(v) = self.option1 {
            question.option1 = v;
        }
        if let Some(v) = self.option2 {
            question.option2 = v;
        }
        if let Some(v) = self.option3 {
            question.option3 = v;
        }
        if let Some(v) = self.option4 {
            question.option4 = v;
        }
        if let Some(v) = self.correct_option {
            question.correct_option = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_option_out_of_range_rejected() {
        let req: CreateQuestionRequest = serde_json::from_value(serde_json::json!({
            "quiz_id": 1,
            "question_title": "Q1",
            "question_statement": "2 + 2 = ?",
            "option1": "3", "option2": "4", "option3": "5", "option4": "22",
            "correct_option": 5
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn missing_option_fails_to_parse() {
        let parsed = serde_json::from_value::<CreateQuestionRequest>(serde_json::json!({
            "quiz_id": 1,
            "question_title": "Q1",
            "question_statement": "?",
            "option1": "a", "option2": "b", "option3": "c",
            "correct_option": 1
        }));
        assert!(parsed.is_err());
    }
}
