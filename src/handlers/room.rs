// src/handlers/room.rs
//
// The exam-room session surface: access-code entry, room state, answer
// autosave and submission. The client owns the visible countdown; every
// timing decision here is re-derived from the attempt's stored start time,
// so a page reload reconstructs the session without resetting the clock.

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{
            Attempt, RoomResponse, SaveAnswerRequest, SavedAnswer, STATUS_COMPLETED,
            STATUS_IN_PROGRESS, SubmitResponse,
        },
        exam::{EnterExamRequest, EnterExamResponse, Exam},
        question::{AnswerOption, PublicOption, PublicQuestion, Question},
    },
    services::{
        grading::{self, AnswerKey},
        notify::{Notifier, TeacherNotification},
        session,
    },
    utils::{access_code, jwt::Claims},
};

/// Fetches an attempt and verifies it belongs to the caller.
async fn own_attempt(
    pool: &SqlitePool,
    attempt_id: i64,
    user_id: i64,
) -> Result<Attempt, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>("SELECT * FROM attempts WHERE id = ?")
        .bind(attempt_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.user_id != user_id {
        return Err(AppError::Forbidden(
            "This attempt belongs to another student".to_string(),
        ));
    }

    Ok(attempt)
}

/// Student entry by access code: idempotent get-or-create with three
/// outcomes.
///
/// * No exam matches the normalized code: 404.
/// * Exam exists but is unpublished: 409, the student must wait.
/// * Otherwise the attempt for (exam, student) is resumed, or created
///   with `start_time = now` if this is the first entry. A completed
///   attempt is returned as-is so the client routes to the result view
///   instead of the room.
pub async fn enter_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<EnterExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let code = access_code::normalize(&payload.access_code);

    let exam = sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE access_code = ?")
        .bind(&code)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound(
            "Exam not found! Please check the code.".to_string(),
        ))?;

    if !exam.is_published {
        return Err(AppError::Conflict(
            "This exam is not yet active (Draft mode). Please ask your teacher to publish it."
                .to_string(),
        ));
    }

    let user_id = claims.user_id();

    let existing =
        sqlx::query_as::<_, Attempt>("SELECT * FROM attempts WHERE exam_id = ? AND user_id = ?")
            .bind(exam.id)
            .bind(user_id)
            .fetch_optional(&pool)
            .await?;

    let response = match existing {
        Some(attempt) if attempt.is_completed() => EnterExamResponse {
            attempt_id: attempt.id,
            exam_id: exam.id,
            status: attempt.status,
            resumed: false,
            score: attempt.score,
        },
        Some(attempt) => EnterExamResponse {
            attempt_id: attempt.id,
            exam_id: exam.id,
            status: attempt.status,
            resumed: true,
            score: None,
        },
        None => {
            let inserted = sqlx::query_as::<_, Attempt>(
                r#"
                INSERT INTO attempts (exam_id, user_id, start_time, status)
                VALUES (?, ?, ?, ?)
                RETURNING *
                "#,
            )
            .bind(exam.id)
            .bind(user_id)
            .bind(Utc::now())
            .bind(STATUS_IN_PROGRESS)
            .fetch_one(&pool)
            .await;

            match inserted {
                Ok(attempt) => {
                    tracing::info!(attempt_id = attempt.id, exam_id = exam.id, "Attempt started");

                    EnterExamResponse {
                        attempt_id: attempt.id,
                        exam_id: exam.id,
                        status: attempt.status,
                        resumed: false,
                        score: None,
                    }
                }
                // Two simultaneous first entries can both pass the lookup
                // above; UNIQUE(exam_id, user_id) stops the second INSERT,
                // which then resumes the winner's attempt.
                Err(e) if e.to_string().contains("UNIQUE constraint") => {
                    let attempt = sqlx::query_as::<_, Attempt>(
                        "SELECT * FROM attempts WHERE exam_id = ? AND user_id = ?",
                    )
                    .bind(exam.id)
                    .bind(user_id)
                    .fetch_one(&pool)
                    .await?;

                    EnterExamResponse {
                        attempt_id: attempt.id,
                        exam_id: exam.id,
                        status: attempt.status.clone(),
                        resumed: !attempt.is_completed(),
                        score: attempt.score.filter(|_| attempt.is_completed()),
                    }
                }
                Err(e) => return Err(AppError::from(e)),
            }
        }
    };

    Ok(Json(response))
}

/// Full exam-room state for an attempt: exam, ordered questions with the
/// answer flags stripped, previously saved answers and the remaining time.
///
/// A completed attempt still resolves (status tells the client to route
/// to the result view); it never re-enters the active session.
pub async fn get_room(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = own_attempt(&pool, attempt_id, claims.user_id()).await?;

    let exam = sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = ?")
        .bind(attempt.exam_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

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
        ORDER BY o.id
        "#,
    )
    .bind(exam.id)
    .fetch_all(&pool)
    .await?;

    let public_questions: Vec<PublicQuestion> = questions
        .into_iter()
        .map(|q| PublicQuestion {
            options: options
                .iter()
                .filter(|o| o.question_id == q.id)
                .map(|o| PublicOption {
                    id: o.id,
                    option_text: o.option_text.clone(),
                })
                .collect(),
            id: q.id,
            question_text: q.question_text,
            point_value: q.point_value,
            order_index: q.order_index,
        })
        .collect();

    let answers = sqlx::query_as::<_, SavedAnswer>(
        "SELECT question_id, selected_option_id FROM answers WHERE attempt_id = ?",
    )
    .bind(attempt.id)
    .fetch_all(&pool)
    .await?;

    let remaining_seconds = if attempt.is_completed() {
        0
    } else {
        session::remaining_seconds(attempt.start_time, exam.duration_minutes, Utc::now())
    };

    Ok(Json(RoomResponse {
        attempt_id: attempt.id,
        exam_id: exam.id,
        exam_title: exam.title,
        pdf_url: exam.pdf_url,
        duration_minutes: exam.duration_minutes,
        status: attempt.status,
        score: attempt.score,
        remaining_seconds,
        questions: public_questions,
        answers,
    }))
}

/// Saves (upserts) the student's choice for one question.
///
/// Keyed on (attempt_id, question_id), so re-selecting simply replaces
/// the previous choice. Rejected once the attempt is completed or the
/// deadline plus grace window has passed.
pub async fn save_answer(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = own_attempt(&pool, attempt_id, claims.user_id()).await?;

    if attempt.is_completed() {
        return Err(AppError::Conflict(
            "This attempt is already completed".to_string(),
        ));
    }

    let exam = sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = ?")
        .bind(attempt.exam_id)
        .fetch_one(&pool)
        .await?;

    if !session::accepts_answers(attempt.start_time, exam.duration_minutes, Utc::now()) {
        return Err(AppError::Conflict("Time is up for this exam".to_string()));
    }

    // The option must belong to the question, and the question to this exam.
    let valid: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT o.id FROM options o
        JOIN questions q ON q.id = o.question_id
        WHERE o.id = ? AND q.id = ? AND q.exam_id = ?
        "#,
    )
    .bind(payload.selected_option_id)
    .bind(payload.question_id)
    .bind(exam.id)
    .fetch_optional(&pool)
    .await?;

    if valid.is_none() {
        return Err(AppError::BadRequest(
            "Option does not belong to this exam's question".to_string(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO answers (attempt_id, question_id, selected_option_id)
        VALUES (?, ?, ?)
        ON CONFLICT(attempt_id, question_id)
        DO UPDATE SET selected_option_id = excluded.selected_option_id
        "#,
    )
    .bind(attempt.id)
    .bind(payload.question_id)
    .bind(payload.selected_option_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!(attempt_id = attempt.id, "Failed to save answer: {:?}", e);
        AppError::from(e)
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Row shape for the notification lookup.
#[derive(sqlx::FromRow)]
struct NotificationInfo {
    exam_title: String,
    teacher_id: i64,
    teacher_name: String,
    student_name: String,
}

/// Submits an attempt and grades it server-side.
///
/// * The status flip `in_progress -> completed` is one conditional
///   UPDATE, so when the timer-expiry and manual paths race, exactly one
///   of them scores the attempt.
/// * A call on an already-completed attempt returns the stored score
///   unchanged; a retry never double-counts.
/// * The first successful submission fires the teacher notification on a
///   detached task; its outcome never affects this response.
pub async fn submit_attempt(
    State(pool): State<SqlitePool>,
    State(notifier): State<Notifier>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = own_attempt(&pool, attempt_id, claims.user_id()).await?;

    let keys = sqlx::query_as::<_, AnswerKey>(
        r#"
        SELECT q.id AS question_id, q.point_value, o.id AS correct_option_id
        FROM questions q
        JOIN options o ON o.question_id = q.id AND o.is_correct = TRUE
        WHERE q.exam_id = ?
        "#,
    )
    .bind(attempt.exam_id)
    .fetch_all(&pool)
    .await?;

    let saved = sqlx::query_as::<_, SavedAnswer>(
        "SELECT question_id, selected_option_id FROM answers WHERE attempt_id = ?",
    )
    .bind(attempt.id)
    .fetch_all(&pool)
    .await?;

    let answers: HashMap<i64, i64> = saved
        .into_iter()
        .map(|a| (a.question_id, a.selected_option_id))
        .collect();

    let score = grading::grade(&keys, &answers);

    let updated = sqlx::query(
        r#"
        UPDATE attempts
        SET status = ?, end_time = ?, score = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(STATUS_COMPLETED)
    .bind(Utc::now())
    .bind(score.percentage)
    .bind(attempt.id)
    .bind(STATUS_IN_PROGRESS)
    .execute(&pool)
    .await?
    .rows_affected();

    if updated == 0 {
        // Lost the race (or an outright retry): someone already completed
        // this attempt. Hand back the stored score.
        let current = sqlx::query_as::<_, Attempt>("SELECT * FROM attempts WHERE id = ?")
            .bind(attempt.id)
            .fetch_one(&pool)
            .await?;

        return Ok(Json(SubmitResponse {
            attempt_id: current.id,
            final_score: current.score.unwrap_or(0.0),
            status: current.status,
            already_submitted: true,
        }));
    }

    tracing::info!(
        attempt_id = attempt.id,
        score = score.percentage,
        correct = score.correct_count,
        "Attempt submitted"
    );

    spawn_teacher_notification(
        pool.clone(),
        notifier,
        attempt.exam_id,
        attempt.user_id,
        score.percentage,
    );

    Ok(Json(SubmitResponse {
        attempt_id: attempt.id,
        final_score: score.percentage,
        status: STATUS_COMPLETED.to_string(),
        already_submitted: false,
    }))
}

/// Fire-and-forget notification to the exam's teacher. Runs detached from
/// the submission flow; any failure is logged and swallowed.
fn spawn_teacher_notification(
    pool: SqlitePool,
    notifier: Notifier,
    exam_id: i64,
    student_id: i64,
    final_score: f64,
) {
    tokio::spawn(async move {
        let info = sqlx::query_as::<_, NotificationInfo>(
            r#"
            SELECT e.title AS exam_title, e.created_by AS teacher_id,
                   t.full_name AS teacher_name, s.full_name AS student_name
            FROM exams e
            JOIN users t ON t.id = e.created_by
            JOIN users s ON s.id = ?
            WHERE e.id = ?
            "#,
        )
        .bind(student_id)
        .bind(exam_id)
        .fetch_optional(&pool)
        .await;

        match info {
            Ok(Some(info)) => {
                notifier
                    .send(TeacherNotification {
                        teacher_id: info.teacher_id,
                        teacher_name: info.teacher_name,
                        student_name: info.student_name,
                        exam_title: info.exam_title,
                        score: final_score,
                    })
                    .await;
            }
            Ok(None) => {
                tracing::warn!(exam_id, "Notification lookup found no exam (non-critical)");
            }
            Err(e) => {
                tracing::warn!("Notification lookup failed (non-critical): {}", e);
            }
        }
    });
}
