use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::state_machine::RequestStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Add,
    Drop,
    Replacement,
}

impl RequestKind {
    /// Drop and Replacement give up a seat in `old_course`.
    pub fn releases_old_course(self) -> bool {
        matches!(self, Self::Drop | Self::Replacement)
    }

    /// Add and Replacement take a seat in `new_course`.
    pub fn takes_new_course(self) -> bool {
        matches!(self, Self::Add | Self::Replacement)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Drop => "drop",
            Self::Replacement => "replacement",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseRequest {
    pub id: String,
    pub student_id: String,
    pub kind: RequestKind,
    pub slot_id: String,
    pub old_course_id: Option<String>,
    pub new_course_id: Option<String>,
    pub academic_year: String,
    pub semester_type: String,
    pub status: RequestStatus,
    pub created_at: String,
    pub processed_at: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseRequest {
    pub student_id: String,
    pub kind: RequestKind,
    pub slot_id: String,
    pub old_course_id: Option<String>,
    pub new_course_id: Option<String>,
}

/// Optional filters for listing requests; unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestFilter {
    pub kind: Option<RequestKind>,
    pub academic_year: Option<String>,
    pub semester_type: Option<String>,
    pub status: Option<RequestStatus>,
}
