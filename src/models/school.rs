use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'schools' table in the database.
/// Exams are tagged with a school; its initials feed the access code.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct School {
    pub id: i64,
    pub name: String,
}
