use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::repository;
use crate::error::{AppError, store_detail};
use crate::models::{AllocationSummary, CourseAllocation, CourseRequest, ItemResult};
use crate::services::lifecycle::{Applied, RequestLifecycle, SEATS_EXHAUSTED};
use crate::state_machine::{BulkAction, RequestStatus};

const ALLOCATED: &str = "allocated";

/// Assigns contested seats across the Pending Add/Replacement requests of one term.
///
/// Every write goes through [`RequestLifecycle::apply`], so a run racing a manual
/// approval or another run can neither double-apply a transition nor oversell a course.
pub struct AllocationEngine {
    db: SqlitePool,
    lifecycle: RequestLifecycle,
}

impl AllocationEngine {
    pub fn new(db: SqlitePool) -> Self {
        let lifecycle = RequestLifecycle::new(db.clone());
        Self { db, lifecycle }
    }

    pub async fn allocate(
        &self,
        academic_year: &str,
        semester_type: &str,
    ) -> Result<AllocationSummary, AppError> {
        let academic_year = academic_year.trim();
        let semester_type = semester_type.trim();
        if academic_year.is_empty() || semester_type.is_empty() {
            return Err(AppError::Validation(
                "academic_year and semester_type are required".to_string(),
            ));
        }

        let mut summary = AllocationSummary {
            academic_year: academic_year.to_string(),
            semester_type: semester_type.to_string(),
            ..Default::default()
        };

        let candidates =
            repository::fetch_allocation_candidates(&self.db, academic_year, semester_type)
                .await
                .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        if candidates.is_empty() {
            info!(
                "allocation {}/{}: nothing pending",
                academic_year, semester_type
            );
            return Ok(summary);
        }

        info!(
            "allocation {}/{}: {} pending requests",
            academic_year,
            semester_type,
            candidates.len()
        );

        for (course_id, queue) in group_by_target(candidates) {
            if let Some(tally) = self.allocate_course(&course_id, queue, &mut summary).await {
                summary.courses.push(tally);
            }
        }

        summary.processed = summary.approved + summary.rejected;
        info!(
            "allocation {}/{} finished: {} approved, {} rejected, {} skipped, {} failed",
            academic_year,
            semester_type,
            summary.approved,
            summary.rejected,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    /// Admits requests in queue order until the course is full, then rejects the rest.
    ///
    /// If the course itself cannot be read, its requests are recorded as failed,
    /// left Pending, and no tally is returned.
    async fn allocate_course(
        &self,
        course_id: &str,
        queue: Vec<CourseRequest>,
        summary: &mut AllocationSummary,
    ) -> Option<CourseAllocation> {
        let seats_available_at_start = match repository::find_course_by_id(&self.db, course_id).await {
            Ok(course) => course.and_then(|c| c.seats_available),
            Err(e) => {
                warn!("reading course {} failed: {}", course_id, e);
                for request in &queue {
                    self.fail(request, &e, summary);
                }
                return None;
            }
        };

        let mut tally = CourseAllocation {
            course_id: course_id.to_string(),
            seats_available_at_start,
            admitted: 0,
            rejected: 0,
        };
        let mut exhausted = false;

        for request in queue {
            if !exhausted {
                match self
                    .lifecycle
                    .apply(&request, BulkAction::Approve, Some(ALLOCATED))
                    .await
                {
                    Ok(Applied::Done(_)) => {
                        tally.admitted += 1;
                        summary.approved += 1;
                        summary.results.push(
                            ItemResult::success(request.id.as_str())
                                .with_status(RequestStatus::Approved),
                        );
                        continue;
                    }
                    Ok(Applied::SeatsExhausted) => {
                        debug!("course {} is full", course_id);
                        exhausted = true;
                    }
                    Ok(other) => {
                        self.skip(&request, other, summary);
                        continue;
                    }
                    Err(e) => {
                        self.fail(&request, &e, summary);
                        continue;
                    }
                }
            }

            match self
                .lifecycle
                .apply(&request, BulkAction::Reject, Some(SEATS_EXHAUSTED))
                .await
            {
                Ok(Applied::Done(_)) => {
                    tally.rejected += 1;
                    summary.rejected += 1;
                    summary.results.push(
                        ItemResult::error(request.id.as_str(), SEATS_EXHAUSTED)
                            .with_status(RequestStatus::Rejected),
                    );
                }
                Ok(other) => self.skip(&request, other, summary),
                Err(e) => self.fail(&request, &e, summary),
            }
        }

        Some(tally)
    }

    fn skip(&self, request: &CourseRequest, applied: Applied, summary: &mut AllocationSummary) {
        debug!("request {} left to another writer: {:?}", request.id, applied);
        summary.skipped += 1;
        summary
            .results
            .push(applied.into_item(&request.id, BulkAction::Approve));
    }

    fn fail(&self, request: &CourseRequest, err: &sqlx::Error, summary: &mut AllocationSummary) {
        warn!("allocating request {} failed: {}", request.id, err);
        summary.failed += 1;
        summary
            .results
            .push(ItemResult::error(request.id.as_str(), store_detail(err)));
    }
}

/// Buckets requests by target course, keeping arrival order inside each bucket.
fn group_by_target(requests: Vec<CourseRequest>) -> Vec<(String, Vec<CourseRequest>)> {
    let mut groups: Vec<(String, Vec<CourseRequest>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for request in requests {
        let Some(course_id) = request.new_course_id.clone() else {
            continue;
        };
        match index.get(&course_id) {
            Some(&i) => groups[i].1.push(request),
            None => {
                index.insert(course_id.clone(), groups.len());
                groups.push((course_id, vec![request]));
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestKind;

    fn pending(id: &str, course: Option<&str>) -> CourseRequest {
        CourseRequest {
            id: id.to_string(),
            student_id: format!("student-{id}"),
            kind: RequestKind::Replacement,
            slot_id: "slot".to_string(),
            old_course_id: Some("old".to_string()),
            new_course_id: course.map(str::to_string),
            academic_year: "2025-26".to_string(),
            semester_type: "odd".to_string(),
            status: RequestStatus::Pending,
            created_at: "2025-07-01T00:00:00.000000Z".to_string(),
            processed_at: None,
            detail: None,
        }
    }

    #[test]
    fn grouping_preserves_arrival_order() {
        let groups = group_by_target(vec![
            pending("r1", Some("x")),
            pending("r2", Some("y")),
            pending("r3", Some("x")),
            pending("r4", None),
        ]);

        let shape: Vec<(String, Vec<String>)> = groups
            .into_iter()
            .map(|(course, queue)| (course, queue.into_iter().map(|r| r.id).collect()))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("x".to_string(), vec!["r1".to_string(), "r3".to_string()]),
                ("y".to_string(), vec!["r2".to_string()]),
            ]
        );
    }
}
