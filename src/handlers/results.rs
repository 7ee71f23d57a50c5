// src/handlers/results.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, ExamResultRow, ResultDetail, ResultResponse, SavedAnswer},
        exam::Exam,
        question::{AnswerOption, Question},
    },
    utils::jwt::Claims,
};

use super::exams::owned_exam;

/// Aggregated results for an exam: every attempt joined with the
/// student's identity, best score first. Teacher only, own exams only.
pub async fn exam_results(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, exam_id, claims.user_id()).await?;

    let rows = sqlx::query_as::<_, ExamResultRow>(
        r#"
        SELECT a.id AS attempt_id, a.user_id, u.full_name, u.email,
               a.score, a.status, a.start_time, a.end_time
        FROM attempts a
        JOIN users u ON u.id = a.user_id
        WHERE a.exam_id = ?
        ORDER BY a.score DESC
        "#,
    )
    .bind(exam.id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch exam results: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(serde_json::json!({
        "exam": exam,
        "attempts": rows,
    })))
}

/// Resets a student's attempt so the exam can be retaken: deletes the
/// saved answers and the attempt row itself. Privileged operation,
/// restricted to the teacher who owns the exam.
pub async fn reset_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>("SELECT * FROM attempts WHERE id = ?")
        .bind(attempt_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    owned_exam(&pool, attempt.exam_id, claims.user_id()).await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM answers WHERE attempt_id = ?")
        .bind(attempt.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM attempts WHERE id = ?")
        .bind(attempt.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(attempt_id = attempt.id, "Attempt reset by teacher");

    Ok(Json(serde_json::json!({ "reset": true, "attempt_id": attempt.id })))
}

/// Detailed result view for one attempt: score plus a per-question review
/// of the chosen and correct options.
///
/// Readable by the student who owns the attempt once it is completed, or
/// by the teacher who owns the exam at any time.
pub async fn attempt_result(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>("SELECT * FROM attempts WHERE id = ?")
        .bind(attempt_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    let exam = sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = ?")
        .bind(attempt.exam_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    let user_id = claims.user_id();
    let is_owner_student = attempt.user_id == user_id;
    let is_owner_teacher = claims.role == "teacher" && exam.created_by == user_id;

    if !is_owner_student && !is_owner_teacher {
        return Err(AppError::Forbidden(
            "You cannot view this result".to_string(),
        ));
    }

    // The review exposes the correct options, so a student cannot open it
    // while the attempt is live. The owning teacher may.
    if !attempt.is_completed() && !is_owner_teacher {
        return Err(AppError::Conflict(
            "This attempt is not completed yet".to_string(),
        ));
    }

    let questions = sqlx::query_as::<_, Question>(
        "SELECT * FROM questions WHERE exam_id = ? ORDER BY order_index, created_at",
    )
    .bind(exam.id)
    .fetch_all(&pool)
    .await?;

    let options = sqlx::query_as::<_, AnswerOption>(
        r#"
        SELECT o.* FROM options o
        JOIN questions q ON q.id = o.question_id
        WHERE q.exam_id = ?
        "#,
    )
    .bind(exam.id)
    .fetch_all(&pool)
    .await?;

    let saved = sqlx::query_as::<_, SavedAnswer>(
        "SELECT question_id, selected_option_id FROM answers WHERE attempt_id = ?",
    )
    .bind(attempt.id)
    .fetch_all(&pool)
    .await?;

    let answer_map: HashMap<i64, i64> = saved
        .into_iter()
        .map(|a| (a.question_id, a.selected_option_id))
        .collect();

    let details: Vec<ResultDetail> = questions
        .into_iter()
        .map(|q| {
            let selected_id = answer_map.get(&q.id).copied();
            let selected = options
                .iter()
                .find(|o| Some(o.id) == selected_id)
                .map(|o| o.option_text.clone());
            let correct = options
                .iter()
                .find(|o| o.question_id == q.id && o.is_correct);

            ResultDetail {
                question_id: q.id,
                question_text: q.question_text,
                point_value: q.point_value,
                is_correct: match (selected_id, correct) {
                    (Some(sel), Some(c)) => sel == c.id,
                    _ => false,
                },
                correct_option: correct.map(|o| o.option_text.clone()),
                selected_option: selected,
            }
        })
        .collect();

    Ok(Json(ResultResponse {
        attempt_id: attempt.id,
        exam_title: exam.title,
        status: attempt.status,
        score: attempt.score,
        start_time: attempt.start_time,
        end_time: attempt.end_time,
        details,
    }))
}
