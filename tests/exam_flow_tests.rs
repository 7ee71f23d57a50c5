// tests/exam_flow_tests.rs
//
// End-to-end student session: access-code entry, the exam room, answer
// autosave, submission and results.

use smarttryout::{config::Config, routes, services::notify::Notifier, state::AppState};
use sqlx::sqlite::SqlitePoolOptions;

async fn spawn_app() -> String {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "exam_flow_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        notify_url: None,
    };

    let state = AppState {
        pool,
        config,
        notifier: Notifier::new(None),
    };

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn register_and_login(client: &reqwest::Client, address: &str, role: &str) -> String {
    let email = format!("u_{}@test.io", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "email": email,
            "password": password,
            "full_name": format!("Test {}", role),
            "role": role,
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(resp.status().as_u16(), 201);

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .unwrap();

    login["token"].as_str().expect("Token not found").to_string()
}

/// Creates an exam with two single-point questions (correct answers both
/// "A") and publishes it. Returns (exam_id, access_code).
async fn seed_published_exam(
    client: &reqwest::Client,
    address: &str,
    teacher: &str,
) -> (i64, String) {
    let exam: serde_json::Value = client
        .post(format!("{}/api/exams", address))
        .bearer_auth(teacher)
        .json(&serde_json::json!({
            "title": "History Tryout",
            "school_id": 1,
            "duration_minutes": 60,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let exam_id = exam["id"].as_i64().unwrap();
    let access_code = exam["access_code"].as_str().unwrap().to_string();

    for text in ["First question", "Second question"] {
        let resp = client
            .post(format!("{}/api/exams/{}/questions", address, exam_id))
            .bearer_auth(teacher)
            .json(&serde_json::json!({
                "question_text": text,
                "point_value": 1,
                "options": [
                    { "option_text": "A", "is_correct": true },
                    { "option_text": "B", "is_correct": false },
                    { "option_text": "C", "is_correct": false },
                ],
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201);
    }

    let publish = client
        .put(format!("{}/api/exams/{}", address, exam_id))
        .bearer_auth(teacher)
        .json(&serde_json::json!({ "is_published": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(publish.status().as_u16(), 200);

    (exam_id, access_code)
}

#[tokio::test]
async fn unknown_access_code_is_not_found() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let student = register_and_login(&client, &address, "student").await;

    let response = client
        .post(format!("{}/api/attempts/enter", address))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "access_code": "NOSUCHCODE" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn unpublished_exam_is_not_active() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let teacher = register_and_login(&client, &address, "teacher").await;
    let student = register_and_login(&client, &address, "student").await;

    let exam: serde_json::Value = client
        .post(format!("{}/api/exams", address))
        .bearer_auth(&teacher)
        .json(&serde_json::json!({
            "title": "Draft Exam",
            "school_id": 1,
            "duration_minutes": 60,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/attempts/enter", address))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "access_code": exam["access_code"] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn access_code_entry_ignores_case_and_whitespace() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let teacher = register_and_login(&client, &address, "teacher").await;
    let student = register_and_login(&client, &address, "student").await;
    let (exam_id, access_code) = seed_published_exam(&client, &address, &teacher).await;

    let sloppy = format!("  {}  ", access_code.to_lowercase());

    let entry: serde_json::Value = client
        .post(format!("{}/api/attempts/enter", address))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "access_code": sloppy }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(entry["exam_id"].as_i64().unwrap(), exam_id);
    assert_eq!(entry["status"], "in_progress");
    assert_eq!(entry["resumed"], false);
}

#[tokio::test]
async fn entering_twice_resumes_the_same_attempt() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let teacher = register_and_login(&client, &address, "teacher").await;
    let student = register_and_login(&client, &address, "student").await;
    let (_exam_id, access_code) = seed_published_exam(&client, &address, &teacher).await;

    let enter = |code: String, token: String| {
        let client = client.clone();
        let address = address.clone();
        async move {
            client
                .post(format!("{}/api/attempts/enter", address))
                .bearer_auth(&token)
                .json(&serde_json::json!({ "access_code": code }))
                .send()
                .await
                .unwrap()
                .json::<serde_json::Value>()
                .await
                .unwrap()
        }
    };

    let first = enter(access_code.clone(), student.clone()).await;
    let second = enter(access_code.clone(), student.clone()).await;

    assert_eq!(first["attempt_id"], second["attempt_id"]);
    assert_eq!(second["resumed"], true);
}

#[tokio::test]
async fn answers_round_trip_across_room_reload() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let teacher = register_and_login(&client, &address, "teacher").await;
    let student = register_and_login(&client, &address, "student").await;
    let (_exam_id, access_code) = seed_published_exam(&client, &address, &teacher).await;

    let entry: serde_json::Value = client
        .post(format!("{}/api/attempts/enter", address))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "access_code": access_code }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = entry["attempt_id"].as_i64().unwrap();

    let room: serde_json::Value = client
        .get(format!("{}/api/attempts/{}", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Fresh room: full clock, no answers, answer flags stripped
    let remaining = room["remaining_seconds"].as_i64().unwrap();
    assert!(remaining > 3590 && remaining <= 3600);
    assert_eq!(room["answers"].as_array().unwrap().len(), 0);
    let questions = room["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert!(questions[0]["options"][0].get("is_correct").is_none());

    // Answer question 1 with B, then change to A (upsert), answer 2 with C
    let q1 = questions[0]["id"].as_i64().unwrap();
    let q2 = questions[1]["id"].as_i64().unwrap();
    let q1_a = questions[0]["options"][0]["id"].as_i64().unwrap();
    let q1_b = questions[0]["options"][1]["id"].as_i64().unwrap();
    let q2_c = questions[1]["options"][2]["id"].as_i64().unwrap();

    for (question_id, option_id) in [(q1, q1_b), (q1, q1_a), (q2, q2_c)] {
        let resp = client
            .put(format!("{}/api/attempts/{}/answer", address, attempt_id))
            .bearer_auth(&student)
            .json(&serde_json::json!({
                "question_id": question_id,
                "selected_option_id": option_id,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 204);
    }

    // Reload the room: saved answers reconstruct local state exactly
    let room: serde_json::Value = client
        .get(format!("{}/api/attempts/{}", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let answers = room["answers"].as_array().unwrap();
    assert_eq!(answers.len(), 2);
    let find = |qid: i64| {
        answers
            .iter()
            .find(|a| a["question_id"].as_i64() == Some(qid))
            .map(|a| a["selected_option_id"].as_i64().unwrap())
    };
    assert_eq!(find(q1), Some(q1_a));
    assert_eq!(find(q2), Some(q2_c));
}

#[tokio::test]
async fn submit_grades_once_and_is_idempotent() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let teacher = register_and_login(&client, &address, "teacher").await;
    let student = register_and_login(&client, &address, "student").await;
    let (_exam_id, access_code) = seed_published_exam(&client, &address, &teacher).await;

    let entry: serde_json::Value = client
        .post(format!("{}/api/attempts/enter", address))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "access_code": access_code }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = entry["attempt_id"].as_i64().unwrap();

    let room: serde_json::Value = client
        .get(format!("{}/api/attempts/{}", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let questions = room["questions"].as_array().unwrap();

    // Answer question 1 correctly (A), question 2 wrong (B): 50%
    for (q, opt_idx) in questions.iter().zip([0usize, 1usize]) {
        let resp = client
            .put(format!("{}/api/attempts/{}/answer", address, attempt_id))
            .bearer_auth(&student)
            .json(&serde_json::json!({
                "question_id": q["id"],
                "selected_option_id": q["options"][opt_idx]["id"],
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 204);
    }

    let submit: serde_json::Value = client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(submit["final_score"].as_f64().unwrap(), 50.0);
    assert_eq!(submit["status"], "completed");
    assert_eq!(submit["already_submitted"], false);

    // A retried call returns the stored score unchanged, without regrading
    let retry: serde_json::Value = client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(retry["final_score"].as_f64().unwrap(), 50.0);
    assert_eq!(retry["already_submitted"], true);

    // Saving an answer after completion is rejected
    let late = client
        .put(format!("{}/api/attempts/{}/answer", address, attempt_id))
        .bearer_auth(&student)
        .json(&serde_json::json!({
            "question_id": questions[0]["id"],
            "selected_option_id": questions[0]["options"][1]["id"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(late.status().as_u16(), 409);

    // Re-entering by code reports the completed attempt instead of a new session
    let reenter: serde_json::Value = client
        .post(format!("{}/api/attempts/enter", address))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "access_code": access_code }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(reenter["status"], "completed");
    assert_eq!(reenter["score"].as_f64().unwrap(), 50.0);
}

#[tokio::test]
async fn simultaneous_first_entries_share_one_attempt() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let teacher = register_and_login(&client, &address, "teacher").await;
    let student = register_and_login(&client, &address, "student").await;
    let (_exam_id, access_code) = seed_published_exam(&client, &address, &teacher).await;

    // Two tabs entering at once: both must land on the same attempt row.
    let enter = || {
        client
            .post(format!("{}/api/attempts/enter", address))
            .bearer_auth(&student)
            .json(&serde_json::json!({ "access_code": access_code }))
            .send()
    };

    let (a, b) = tokio::join!(enter(), enter());
    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.status().as_u16(), 200);
    assert_eq!(b.status().as_u16(), 200);

    let a: serde_json::Value = a.json().await.unwrap();
    let b: serde_json::Value = b.json().await.unwrap();
    assert_eq!(a["attempt_id"], b["attempt_id"]);
}

#[tokio::test]
async fn result_review_waits_for_completion() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let teacher = register_and_login(&client, &address, "teacher").await;
    let student = register_and_login(&client, &address, "student").await;
    let (_exam_id, access_code) = seed_published_exam(&client, &address, &teacher).await;

    let entry: serde_json::Value = client
        .post(format!("{}/api/attempts/enter", address))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "access_code": access_code }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = entry["attempt_id"].as_i64().unwrap();

    // The review names the correct options, so the student cannot open it
    // while the attempt is in progress
    let denied = client
        .get(format!("{}/api/attempts/{}/result", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status().as_u16(), 409);

    // The owning teacher may look at any time
    let allowed = client
        .get(format!("{}/api/attempts/{}/result", address, attempt_id))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status().as_u16(), 200);

    // After submission the student sees the review
    client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();

    let result = client
        .get(format!("{}/api/attempts/{}/result", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(result.status().as_u16(), 200);
}

#[tokio::test]
async fn result_review_and_teacher_results() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let teacher = register_and_login(&client, &address, "teacher").await;
    let student = register_and_login(&client, &address, "student").await;
    let (exam_id, access_code) = seed_published_exam(&client, &address, &teacher).await;

    let entry: serde_json::Value = client
        .post(format!("{}/api/attempts/enter", address))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "access_code": access_code }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = entry["attempt_id"].as_i64().unwrap();

    let room: serde_json::Value = client
        .get(format!("{}/api/attempts/{}", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let questions = room["questions"].as_array().unwrap();

    // Answer both correctly
    for q in questions {
        client
            .put(format!("{}/api/attempts/{}/answer", address, attempt_id))
            .bearer_auth(&student)
            .json(&serde_json::json!({
                "question_id": q["id"],
                "selected_option_id": q["options"][0]["id"],
            }))
            .send()
            .await
            .unwrap();
    }

    client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();

    // Student sees the detailed review
    let result: serde_json::Value = client
        .get(format!("{}/api/attempts/{}/result", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(result["score"].as_f64().unwrap(), 100.0);
    let details = result["details"].as_array().unwrap();
    assert_eq!(details.len(), 2);
    assert!(details.iter().all(|d| d["is_correct"] == true));
    assert!(details.iter().all(|d| d["correct_option"] == "A"));

    // Teacher sees the aggregated results with identity info
    let results: serde_json::Value = client
        .get(format!("{}/api/exams/{}/results", address, exam_id))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let attempts = results["attempts"].as_array().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["attempt_id"].as_i64().unwrap(), attempt_id);
    assert_eq!(attempts[0]["score"].as_f64().unwrap(), 100.0);
    assert_eq!(attempts[0]["full_name"], "Test student");

    // Another student cannot read this result
    let stranger = register_and_login(&client, &address, "student").await;
    let response = client
        .get(format!("{}/api/attempts/{}/result", address, attempt_id))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn reset_allows_a_retake() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let teacher = register_and_login(&client, &address, "teacher").await;
    let student = register_and_login(&client, &address, "student").await;
    let (_exam_id, access_code) = seed_published_exam(&client, &address, &teacher).await;

    let entry: serde_json::Value = client
        .post(format!("{}/api/attempts/enter", address))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "access_code": access_code }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = entry["attempt_id"].as_i64().unwrap();

    client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();

    // Students cannot reset
    let denied = client
        .post(format!("{}/api/attempts/{}/reset", address, attempt_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status().as_u16(), 403);

    let reset = client
        .post(format!("{}/api/attempts/{}/reset", address, attempt_id))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    assert_eq!(reset.status().as_u16(), 200);

    // The student can enter again and gets a brand new attempt
    let entry: serde_json::Value = client
        .post(format!("{}/api/attempts/enter", address))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "access_code": access_code }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_ne!(entry["attempt_id"].as_i64().unwrap(), attempt_id);
    assert_eq!(entry["status"], "in_progress");
    assert_eq!(entry["resumed"], false);
}
