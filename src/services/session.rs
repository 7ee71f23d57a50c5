// src/services/session.rs

use chrono::{DateTime, Duration, Utc};

/// Answer saves are still accepted this long past the deadline, covering
/// requests already in flight when the client-side countdown hits zero.
pub const ANSWER_GRACE_SECONDS: i64 = 30;

/// The moment an attempt stops accepting time: start plus the exam duration.
pub fn deadline(start_time: DateTime<Utc>, duration_minutes: i64) -> DateTime<Utc> {
    start_time + Duration::minutes(duration_minutes)
}

/// Seconds left on the attempt's clock at `now`, clamped at zero.
///
/// The countdown itself ticks in the client; the server re-derives the
/// remaining time from the stored start on every room fetch, so a page
/// reload never resets or extends the clock.
pub fn remaining_seconds(
    start_time: DateTime<Utc>,
    duration_minutes: i64,
    now: DateTime<Utc>,
) -> i64 {
    (deadline(start_time, duration_minutes) - now).num_seconds().max(0)
}

/// Whether an answer save at `now` is still inside the answer window
/// (deadline plus grace).
pub fn accepts_answers(
    start_time: DateTime<Utc>,
    duration_minutes: i64,
    now: DateTime<Utc>,
) -> bool {
    now <= deadline(start_time, duration_minutes) + Duration::seconds(ANSWER_GRACE_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn remaining_is_positive_just_before_deadline() {
        // T = S + D - epsilon must stay >= 0 for any small positive epsilon.
        let now = start() + Duration::minutes(60) - Duration::seconds(1);
        assert_eq!(remaining_seconds(start(), 60, now), 1);
    }

    #[test]
    fn remaining_is_exactly_zero_at_deadline() {
        let now = start() + Duration::minutes(60);
        assert_eq!(remaining_seconds(start(), 60, now), 0);
    }

    #[test]
    fn remaining_clamps_after_deadline() {
        let now = start() + Duration::minutes(90);
        assert_eq!(remaining_seconds(start(), 60, now), 0);
    }

    #[test]
    fn full_duration_at_start() {
        assert_eq!(remaining_seconds(start(), 60, start()), 3600);
    }

    #[test]
    fn answers_accepted_within_grace() {
        let just_over = start() + Duration::minutes(60) + Duration::seconds(ANSWER_GRACE_SECONDS);
        assert!(accepts_answers(start(), 60, just_over));

        let too_late =
            start() + Duration::minutes(60) + Duration::seconds(ANSWER_GRACE_SECONDS + 1);
        assert!(!accepts_answers(start(), 60, too_late));
    }
}
