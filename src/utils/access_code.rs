// src/utils/access_code.rs

use chrono::{DateTime, Datelike, Timelike, Utc};
use rand::Rng;

/// Normalizes a student-entered access code: whitespace-trimmed, uppercased.
/// " math-01 " and "MATH-01" resolve to the same exam.
pub fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Generates a fresh access code for a new exam.
///
/// Scheme: school initials + title initials + DDHHMMSS + 3 random digits.
/// Uniqueness is not guaranteed; a collision under concurrent creation is a
/// known gap of the scheme.
pub fn generate(school_name: &str, title: &str) -> String {
    let suffix = rand::thread_rng().gen_range(0..1000);
    build(school_name, title, Utc::now(), suffix)
}

/// Deterministic core of `generate`, split out so the format is testable.
pub fn build(school_name: &str, title: &str, now: DateTime<Utc>, suffix: u32) -> String {
    let school_part = initials(school_name, "SCH");
    let title_part = initials(title, "EXAM");

    format!(
        "{}{}{:02}{:02}{:02}{:02}{:03}",
        school_part,
        title_part,
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        suffix % 1000
    )
}

/// First three alphanumeric characters of the input, uppercased.
/// Falls back to "XXX" when nothing usable remains.
fn initials(input: &str, fallback: &str) -> String {
    let source = if input.trim().is_empty() { fallback } else { input };

    let cleaned: String = source
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();

    if cleaned.is_empty() {
        "XXX".to_string()
    } else {
        cleaned
    }
}
