use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name: String,
    pub credit: i32,
    /// `None` means the course has no seat limit.
    pub capacity: Option<i64>,
    pub occupied: i64,
    /// Computed by the query that loads the row; `None` when `capacity` is `None`.
    pub seats_available: Option<i64>,
}

impl Course {
    pub fn is_unbounded(&self) -> bool {
        self.capacity.is_none()
    }

    pub fn has_free_seat(&self) -> bool {
        self.is_unbounded() || self.seats_available.is_some_and(|seats| seats > 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourse {
    pub code: String,
    pub name: String,
    pub credit: i32,
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseSlot {
    pub id: String,
    pub name: String,
    pub academic_year: String,
    pub semester_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseSlot {
    pub name: String,
    pub academic_year: String,
    pub semester_type: String,
    pub course_ids: Vec<String>,
}
