// src/services/grading.rs

use std::collections::HashMap;

/// Answer key for one question: its weight and the id of the correct option.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnswerKey {
    pub question_id: i64,
    pub point_value: i64,
    pub correct_option_id: i64,
}

/// Grading outcome for an attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub earned_points: i64,
    pub total_points: i64,
    pub correct_count: usize,
    /// 0.0 to 100.0. An exam without questions scores 0.
    pub percentage: f64,
}

/// Grades an attempt: point-weighted percentage of correctly answered
/// questions. Unanswered questions earn nothing; answers to questions
/// outside the key (e.g. deleted mid-attempt) are ignored.
pub fn grade(keys: &[AnswerKey], answers: &HashMap<i64, i64>) -> Score {
    let total_points: i64 = keys.iter().map(|k| k.point_value).sum();

    let mut earned_points = 0;
    let mut correct_count = 0;

    for key in keys {
        if let Some(selected) = answers.get(&key.question_id) {
            if *selected == key.correct_option_id {
                earned_points += key.point_value;
                correct_count += 1;
            }
        }
    }

    let percentage = if total_points == 0 {
        0.0
    } else {
        (earned_points as f64 / total_points as f64) * 100.0
    };

    Score {
        earned_points,
        total_points,
        correct_count,
        percentage,
    }
}
