// src/handlers/exams.rs

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
    models::{
        exam::{CreateExamRequest, Exam, UpdateExamRequest},
        question::{AnswerOption, Question, QuestionWithOptions},
        school::School,
    },
    utils::{access_code, jwt::Claims},
};

/// Fetches an exam and verifies the caller owns it.
/// Shared by the authoring, results and reset handlers.
pub async fn owned_exam(
    pool: &SqlitePool,
    exam_id: i64,
    user_id: i64,
) -> Result<Exam, AppError> {
    let exam = sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = ?")
        .bind(exam_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    if exam.created_by != user_id {
        return Err(AppError::Forbidden(
            "You do not own this exam".to_string(),
        ));
    }

    Ok(exam)
}

/// Lists schools for the create-exam form.
pub async fn list_schools(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let schools = sqlx::query_as::<_, School>("SELECT * FROM schools ORDER BY name")
        .fetch_all(&pool)
        .await?;

    Ok(Json(schools))
}

/// Creates a new exam in draft state.
///
/// The access code is generated server-side from the school and title
/// initials plus a timestamp and random suffix; it is returned to the
/// teacher in the created exam payload.
pub async fn create_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let school = sqlx::query_as::<_, School>("SELECT * FROM schools WHERE id = ?")
        .bind(payload.school_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("School not found".to_string()))?;

    let code = access_code::generate(&school.name, &payload.title);

    let exam = sqlx::query_as::<_, Exam>(
        r#"
        INSERT INTO exams (title, school_id, duration_minutes, access_code, pdf_url, is_published, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, FALSE, ?, ?)
        RETURNING *
        "#,
    )
    .bind(payload.title.trim())
    .bind(payload.school_id)
    .bind(payload.duration_minutes)
    .bind(&code)
    .bind(&payload.pdf_url)
    .bind(claims.user_id())
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create exam: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!(exam_id = exam.id, access_code = %exam.access_code, "Exam created");

    Ok((StatusCode::CREATED, Json(exam)))
}

/// Lists the caller's exams, newest first.
pub async fn list_exams(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let exams = sqlx::query_as::<_, Exam>(
        "SELECT * FROM exams WHERE created_by = ? ORDER BY created_at DESC",
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(exams))
}

/// Retrieves one of the caller's exams with its full question list,
/// options and answer flags included (owner view).
pub async fn get_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, id, claims.user_id()).await?;

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

    let with_options: Vec<QuestionWithOptions> = questions
        .into_iter()
        .map(|question| {
            let options = options
                .iter()
                .filter(|o| o.question_id == question.id)
                .cloned()
                .collect();
            QuestionWithOptions { question, options }
        })
        .collect();

    Ok(Json(serde_json::json!({
        "exam": exam,
        "questions": with_options,
    })))
}

/// Updates exam metadata. Fields are optional; this is also where the
/// publish/unpublish toggle lives.
pub async fn update_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, id, claims.user_id()).await?;

    // Perform updates sequentially if fields are present
    if let Some(new_title) = payload.title {
        sqlx::query("UPDATE exams SET title = ? WHERE id = ?")
            .bind(new_title.trim())
            .bind(exam.id)
            .execute(&pool)
            .await?;
    }

    if let Some(new_duration) = payload.duration_minutes {
        if new_duration < 1 {
            return Err(AppError::BadRequest(
                "Duration must be at least one minute".to_string(),
            ));
        }
        sqlx::query("UPDATE exams SET duration_minutes = ? WHERE id = ?")
            .bind(new_duration)
            .bind(exam.id)
            .execute(&pool)
            .await?;
    }

    if let Some(new_pdf_url) = payload.pdf_url {
        sqlx::query("UPDATE exams SET pdf_url = ? WHERE id = ?")
            .bind(new_pdf_url)
            .bind(exam.id)
            .execute(&pool)
            .await?;
    }

    if let Some(published) = payload.is_published {
        sqlx::query("UPDATE exams SET is_published = ? WHERE id = ?")
            .bind(published)
            .bind(exam.id)
            .execute(&pool)
            .await?;
    }

    let updated = sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = ?")
        .bind(exam.id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(updated))
}

/// Deletes an exam. Questions, options, attempts and answers cascade.
pub async fn delete_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, id, claims.user_id()).await?;

    sqlx::query("DELETE FROM exams WHERE id = ?")
        .bind(exam.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
