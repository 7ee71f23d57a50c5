// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub exam_id: i64,
    pub question_text: String,
    pub point_value: i64,

    /// Display position within the exam, 1-based.
    pub order_index: i64,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'options' table in the database.
/// Exactly one correct option per question is a convention maintained by
/// the correct-option operation, not a schema constraint.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: i64,
    pub option_text: String,
    pub is_correct: bool,
}

/// Owner view: question with all of its options, including answer flags.
#[derive(Debug, Serialize)]
pub struct QuestionWithOptions {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<AnswerOption>,
}

/// Student view of an option: the `is_correct` flag never leaves the server
/// while an attempt is live.
#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub id: i64,
    pub option_text: String,
}

/// Student view of a question inside the exam room.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    pub point_value: i64,
    pub order_index: i64,
    pub options: Vec<PublicOption>,
}

/// DTO for one option of a new question.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct NewOption {
    #[validate(length(min = 1, max = 500, message = "Option text must not be empty."))]
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for creating a single question with its options.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Question text length must be between 1 and 2000 characters."
    ))]
    pub question_text: String,
    #[validate(range(min = 1, max = 100, message = "Point value must be between 1 and 100."))]
    pub point_value: i64,
    #[validate(
        nested,
        length(min = 2, max = 10, message = "A question needs between 2 and 10 options.")
    )]
    pub options: Vec<NewOption>,
}

/// DTO for bulk-adding blank answer-sheet questions.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkAddRequest {
    #[validate(range(min = 1, max = 100, message = "Count must be between 1 and 100."))]
    pub count: i64,
}

/// DTO for marking the correct option of a question.
#[derive(Debug, Deserialize)]
pub struct SetCorrectOptionRequest {
    pub option_id: i64,
}
