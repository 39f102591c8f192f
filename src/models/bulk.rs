use serde::{Deserialize, Serialize};

use crate::state_machine::RequestStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Success,
    Error,
    AlreadyProcessed,
}

/// Outcome for one id of a bulk call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResult {
    pub id: String,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_status: Option<RequestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ItemResult {
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::Success,
            current_status: None,
            detail: None,
        }
    }

    pub fn error(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::Error,
            current_status: None,
            detail: Some(detail.into()),
        }
    }

    pub fn already_processed(id: impl Into<String>, current: RequestStatus) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::AlreadyProcessed,
            current_status: Some(current),
            detail: None,
        }
    }

    pub fn with_status(mut self, current: RequestStatus) -> Self {
        self.current_status = Some(current);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Success
    }
}

/// Ledger returned by every bulk operation. `results` follows input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkResult {
    pub success: usize,
    pub results: Vec<ItemResult>,
}

impl BulkResult {
    pub fn push(&mut self, item: ItemResult) {
        if item.is_success() {
            self.success += 1;
        }
        self.results.push(item);
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ItemStatus::Error)
            .count()
    }
}

/// Per-course tally of one allocation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseAllocation {
    pub course_id: String,
    pub seats_available_at_start: Option<i64>,
    pub admitted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub academic_year: String,
    pub semester_type: String,
    pub processed: usize,
    pub approved: usize,
    pub rejected: usize,
    /// Requests another writer moved out of Pending while the run was in flight.
    pub skipped: usize,
    pub failed: usize,
    pub courses: Vec<CourseAllocation>,
    pub results: Vec<ItemResult>,
}
