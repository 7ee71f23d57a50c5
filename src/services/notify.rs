// src/services/notify.rs

use serde::Serialize;

/// Payload posted to the teacher notification endpoint after a submission.
#[derive(Debug, Clone, Serialize)]
pub struct TeacherNotification {
    pub teacher_id: i64,
    pub teacher_name: String,
    pub student_name: String,
    pub exam_title: String,
    pub score: f64,
}

/// Best-effort side channel informing a teacher that a student submitted.
///
/// Strictly decoupled from the submission flow: callers spawn `send` on a
/// detached task and never await it on the critical path. Every failure
/// mode ends in a log line, nothing more.
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl Notifier {
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub async fn send(&self, notification: TeacherNotification) {
        let Some(url) = &self.url else {
            tracing::debug!("Notification endpoint not configured, skipping");
            return;
        };

        match self.client.post(url).json(&notification).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(
                    teacher_id = notification.teacher_id,
                    exam = %notification.exam_title,
                    "Teacher notification sent"
                );
            }
            Ok(response) => {
                tracing::warn!(
                    status = %response.status(),
                    "Teacher notification rejected (non-critical)"
                );
            }
            Err(e) => {
                tracing::warn!("Teacher notification failed (non-critical): {}", e);
            }
        }
    }
}
