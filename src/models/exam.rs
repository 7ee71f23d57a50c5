// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub school_id: i64,
    pub duration_minutes: i64,

    /// Short code students enter to locate the exam.
    /// Generated server-side; uniqueness is not enforced.
    pub access_code: String,

    /// Optional link to the question sheet PDF.
    pub pdf_url: Option<String>,

    /// Students can only enter published exams.
    pub is_published: bool,

    pub created_by: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new exam. The access code is never client-supplied.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 characters."
    ))]
    pub title: String,
    pub school_id: i64,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes."))]
    pub duration_minutes: i64,
    #[validate(url(message = "pdf_url must be a valid URL."))]
    pub pdf_url: Option<String>,
}

/// DTO for updating an exam. Fields are optional; publish state toggles here.
#[derive(Debug, Deserialize)]
pub struct UpdateExamRequest {
    pub title: Option<String>,
    pub duration_minutes: Option<i64>,
    pub pdf_url: Option<String>,
    pub is_published: Option<bool>,
}

/// DTO for the student access-code entry form.
#[derive(Debug, Deserialize, Validate)]
pub struct EnterExamRequest {
    #[validate(length(min = 1, max = 50, message = "Please enter an access code."))]
    pub access_code: String,
}

/// Outcome of access-code entry: a new session, a resumed one, or a
/// completed attempt the client should route to the result view.
#[derive(Debug, Serialize)]
pub struct EnterExamResponse {
    pub attempt_id: i64,
    pub exam_id: i64,
    pub status: String,
    pub resumed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}
