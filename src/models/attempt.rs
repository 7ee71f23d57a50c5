// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::question::PublicQuestion;

pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";

/// Represents the 'attempts' table in the database.
/// One row per (exam, student), created lazily on first entry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub exam_id: i64,
    pub user_id: i64,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,

    /// 'in_progress' or 'completed'. Once completed, the attempt is
    /// immutable from the student's perspective.
    pub status: String,

    /// Final score, set server-side on submission.
    pub score: Option<f64>,
}

impl Attempt {
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}

/// Represents one row of the 'answers' table: the student's saved choice
/// for a question, upserted on every selection.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SavedAnswer {
    pub question_id: i64,
    pub selected_option_id: i64,
}

/// DTO for saving an answer in the exam room.
#[derive(Debug, Deserialize)]
pub struct SaveAnswerRequest {
    pub question_id: i64,
    pub selected_option_id: i64,
}

/// Full exam-room state: everything the client needs to (re)build the
/// session after the initial load or a page refresh.
#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub attempt_id: i64,
    pub exam_id: i64,
    pub exam_title: String,
    pub pdf_url: Option<String>,
    pub duration_minutes: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Seconds until the deadline, clamped at zero.
    pub remaining_seconds: i64,
    pub questions: Vec<PublicQuestion>,
    pub answers: Vec<SavedAnswer>,
}

/// DTO returned by the submit operation.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub attempt_id: i64,
    pub final_score: f64,
    pub status: String,
    /// True when this call found the attempt already completed and
    /// returned the stored score instead of grading again.
    pub already_submitted: bool,
}

/// One row of the aggregated teacher results view: attempts joined with
/// student identity.
#[derive(Debug, Serialize, FromRow)]
pub struct ExamResultRow {
    pub attempt_id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    pub score: Option<f64>,
    pub status: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Per-question line of the result review.
#[derive(Debug, Serialize)]
pub struct ResultDetail {
    pub question_id: i64,
    pub question_text: String,
    pub point_value: i64,
    pub selected_option: Option<String>,
    pub correct_option: Option<String>,
    pub is_correct: bool,
}

/// Result view for a single attempt.
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub attempt_id: i64,
    pub exam_title: String,
    pub status: String,
    pub score: Option<f64>,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub details: Vec<ResultDetail>,
}
