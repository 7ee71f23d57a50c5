// src/handlers/questions.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{BulkAddRequest, CreateQuestionRequest, Question, SetCorrectOptionRequest},
    utils::{html::clean_html, jwt::Claims},
};

use super::exams::owned_exam;

/// Labels for the blank answer-sheet options created by bulk add.
const SHEET_OPTIONS: [&str; 5] = ["A", "B", "C", "D", "E"];

async fn next_order_index(pool: &SqlitePool, exam_id: i64) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE exam_id = ?")
        .bind(exam_id)
        .fetch_one(pool)
        .await?;
    Ok(count + 1)
}

/// Adds a single question with its options to an exam.
///
/// Exactly one option must be marked correct. Question and option text
/// is sanitized before storage since it is rendered back to students.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    // Grading assumes one answer-key row per question; more than one
    // correct option would inflate the total points.
    if payload.options.iter().filter(|o| o.is_correct).count() != 1 {
        return Err(AppError::BadRequest(
            "Select exactly one correct answer".to_string(),
        ));
    }

    let exam = owned_exam(&pool, exam_id, claims.user_id()).await?;
    let order_index = next_order_index(&pool, exam.id).await?;

    let question = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions (exam_id, question_text, point_value, order_index, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(exam.id)
    .bind(clean_html(&payload.question_text))
    .bind(payload.point_value)
    .bind(order_index)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await?;

    for option in &payload.options {
        sqlx::query("INSERT INTO options (question_id, option_text, is_correct) VALUES (?, ?, ?)")
            .bind(question.id)
            .bind(clean_html(&option.option_text))
            .bind(option.is_correct)
            .execute(&pool)
            .await?;
    }

    Ok((StatusCode::CREATED, Json(question)))
}

/// Bulk-adds N blank answer-sheet questions, each with options A-E and no
/// correct answer selected yet.
///
/// Inserts run sequentially and are deliberately not wrapped in a
/// transaction: a mid-loop failure leaves the already-created questions
/// in place for the teacher to keep or clean up.
pub async fn bulk_add_questions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<BulkAddRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let exam = owned_exam(&pool, exam_id, claims.user_id()).await?;
    let start_index = next_order_index(&pool, exam.id).await?;

    let mut created = Vec::with_capacity(payload.count as usize);

    for i in 0..payload.count {
        let order_index = start_index + i;

        let question_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO questions (exam_id, question_text, point_value, order_index, created_at)
            VALUES (?, ?, 1, ?, ?)
            RETURNING id
            "#,
        )
        .bind(exam.id)
        .bind(format!("Question {}", order_index))
        .bind(order_index)
        .bind(chrono::Utc::now())
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!(
                "Bulk add failed after {} of {} questions: {:?}",
                i,
                payload.count,
                e
            );
            AppError::from(e)
        })?;

        for label in SHEET_OPTIONS {
            sqlx::query(
                "INSERT INTO options (question_id, option_text, is_correct) VALUES (?, ?, FALSE)",
            )
            .bind(question_id)
            .bind(label)
            .execute(&pool)
            .await?;
        }

        created.push(question_id);
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "created": created.len(), "question_ids": created })),
    ))
}

/// Marks one option of a question as the correct answer.
///
/// A single statement flips the chosen option's flag on and every
/// sibling's off, so afterwards exactly one option of the question is
/// correct.
pub async fn set_correct_option(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<i64>,
    Json(payload): Json<SetCorrectOptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = ?")
        .bind(question_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    owned_exam(&pool, question.exam_id, claims.user_id()).await?;

    let belongs: Option<i64> =
        sqlx::query_scalar("SELECT id FROM options WHERE id = ? AND question_id = ?")
            .bind(payload.option_id)
            .bind(question.id)
            .fetch_optional(&pool)
            .await?;

    if belongs.is_none() {
        return Err(AppError::BadRequest(
            "Option does not belong to this question".to_string(),
        ));
    }

    sqlx::query("UPDATE options SET is_correct = (id = ?) WHERE question_id = ?")
        .bind(payload.option_id)
        .bind(question.id)
        .execute(&pool)
        .await?;

    Ok(Json(serde_json::json!({ "question_id": question.id, "correct_option_id": payload.option_id })))
}

/// Deletes a question. Its options and any saved answers cascade.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = ?")
        .bind(question_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    owned_exam(&pool, question.exam_id, claims.user_id()).await?;

    sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(question.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
