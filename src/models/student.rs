use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Batch {
    pub id: String,
    pub label: String,
    pub programme: String,
    pub discipline: String,
    pub year: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBatch {
    pub programme: String,
    pub discipline: String,
    pub year: i32,
}

impl NewBatch {
    /// Label shown to administrators, e.g. `B.Tech CSE 2023`.
    pub fn label(&self) -> String {
        format!("{} {} {}", self.programme, self.discipline, self.year)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: String,
    pub username: String,
    pub current_batch: String,
    pub current_batch_year: i32,
    pub current_semester_no: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudent {
    pub username: String,
    pub current_batch: String,
    pub current_batch_year: i32,
    pub current_semester_no: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchChange {
    pub student_id: String,
    pub new_batch_id: String,
    pub new_batch_year: i32,
}
