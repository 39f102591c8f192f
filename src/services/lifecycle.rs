use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{now_timestamp, repository};
use crate::error::{AppError, store_detail};
use crate::models::{BulkResult, CourseRequest, ItemResult, NewCourseRequest, RequestKind};
use crate::services::dedup_ids;
use crate::state_machine::{BulkAction, InvalidTransition, RequestStatus, Transition, transition};

pub const SEATS_EXHAUSTED: &str = "seats_exhausted";
const DUPLICATE_PENDING: &str = "a pending request of this kind already exists for the slot";

/// What happened when one action was applied to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The write committed; carries the new status, `None` after a delete.
    Done(Option<RequestStatus>),
    /// The status read up front does not allow the action.
    Invalid(InvalidTransition),
    /// Another writer moved the request first; `None` if it was deleted.
    Raced(Option<RequestStatus>),
    /// The target course had no free seat; nothing was written.
    SeatsExhausted,
    /// Reverting would create a second pending request for the same slot.
    Duplicate,
}

impl Applied {
    pub fn into_item(self, id: &str, action: BulkAction) -> ItemResult {
        match self {
            Applied::Done(Some(status)) => ItemResult::success(id).with_status(status),
            Applied::Done(None) => ItemResult::success(id),
            Applied::Invalid(err) if action == BulkAction::Delete => {
                ItemResult::error(id, err.to_string()).with_status(err.from)
            }
            Applied::Invalid(err) => ItemResult::already_processed(id, err.from),
            Applied::Raced(Some(current)) if action == BulkAction::Delete => {
                ItemResult::error(id, format!("cannot delete a request that is {}", current))
                    .with_status(current)
            }
            Applied::Raced(Some(current)) => ItemResult::already_processed(id, current),
            Applied::Raced(None) => ItemResult::error(id, "not found"),
            Applied::SeatsExhausted => {
                ItemResult::error(id, SEATS_EXHAUSTED).with_status(RequestStatus::Pending)
            }
            Applied::Duplicate => {
                ItemResult::error(id, DUPLICATE_PENDING).with_status(RequestStatus::Rejected)
            }
        }
    }
}

/// Owns every status change of a course request.
#[derive(Clone)]
pub struct RequestLifecycle {
    db: SqlitePool,
}

impl RequestLifecycle {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Records a new Pending request after checking it against its slot.
    pub async fn submit(&self, req: NewCourseRequest) -> Result<CourseRequest, AppError> {
        validate_course_fields(&req)?;

        if repository::find_student_by_id(&self.db, &req.student_id).await?.is_none() {
            return Err(AppError::Validation(format!(
                "student {} does not exist",
                req.student_id
            )));
        }
        let slot = repository::find_slot_by_id(&self.db, &req.slot_id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("slot {} does not exist", req.slot_id)))?;

        for course_id in [&req.old_course_id, &req.new_course_id].into_iter().flatten() {
            if !repository::slot_admits(&self.db, &slot.id, course_id).await? {
                return Err(AppError::Validation(format!(
                    "course {} is not offered in slot {}",
                    course_id, slot.name
                )));
            }
        }

        let request = CourseRequest {
            id: Uuid::new_v4().to_string(),
            student_id: req.student_id,
            kind: req.kind,
            slot_id: slot.id,
            old_course_id: req.old_course_id,
            new_course_id: req.new_course_id,
            academic_year: slot.academic_year,
            semester_type: slot.semester_type,
            status: RequestStatus::Pending,
            created_at: now_timestamp(),
            processed_at: None,
            detail: None,
        };

        repository::insert_request(&self.db, &request)
            .await
            .map_err(|e| AppError::from_write(e, DUPLICATE_PENDING))?;

        info!(
            "submitted {} request {} for student {}",
            request.kind, request.id, request.student_id
        );
        Ok(request)
    }

    pub async fn transition(
        &self,
        ids: Vec<String>,
        action: BulkAction,
    ) -> Result<BulkResult, AppError> {
        self.transition_with_detail(ids, action, None).await
    }

    /// Applies `action` to every id independently. One item failing never stops the rest.
    pub async fn transition_with_detail(
        &self,
        ids: Vec<String>,
        action: BulkAction,
        detail: Option<String>,
    ) -> Result<BulkResult, AppError> {
        let ids = dedup_ids(ids)?;
        let mut result = BulkResult::default();

        for id in &ids {
            let item = match repository::find_request_by_id(&self.db, id).await {
                Ok(Some(request)) => match self.apply(&request, action, detail.as_deref()).await {
                    Ok(applied) => applied.into_item(id, action),
                    Err(e) => {
                        warn!("{} of request {} failed: {}", action, id, e);
                        ItemResult::error(id.as_str(), store_detail(&e))
                    }
                },
                Ok(None) => ItemResult::error(id.as_str(), "not found"),
                Err(e) => {
                    warn!("loading request {} failed: {}", id, e);
                    ItemResult::error(id.as_str(), store_detail(&e))
                }
            };
            result.push(item);
        }

        info!(
            "bulk {}: {} of {} succeeded, {} failed",
            action,
            result.success,
            ids.len(),
            result.failed()
        );
        Ok(result)
    }

    /// Applies one action to one request: the status compare-and-set and its seat
    /// effects commit together or not at all.
    pub async fn apply(
        &self,
        request: &CourseRequest,
        action: BulkAction,
        detail: Option<&str>,
    ) -> Result<Applied, sqlx::Error> {
        let step = match transition(request.status, action) {
            Ok(step) => step,
            Err(err) => {
                debug!("request {}: {}", request.id, err);
                return Ok(Applied::Invalid(err));
            }
        };

        let mut tx = self.db.begin().await?;

        let next = match step {
            Transition::Remove { from } => {
                if !repository::delete_if_status(&mut *tx, &request.id, from).await? {
                    tx.rollback().await?;
                    return self.raced(&request.id).await;
                }
                None
            }
            Transition::Move { from, to } => {
                let (processed_at, detail) = if to.is_terminal() {
                    (Some(now_timestamp()), detail)
                } else {
                    (None, None)
                };

                let moved = repository::set_status_if(
                    &mut *tx,
                    &request.id,
                    from,
                    to,
                    processed_at.as_deref(),
                    detail,
                )
                .await;
                match moved {
                    Ok(true) => {}
                    Ok(false) => {
                        tx.rollback().await?;
                        return self.raced(&request.id).await;
                    }
                    Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                        tx.rollback().await?;
                        return Ok(Applied::Duplicate);
                    }
                    Err(e) => return Err(e),
                }

                if to == RequestStatus::Approved && !take_seats(&mut *tx, request).await? {
                    tx.rollback().await?;
                    debug!("request {}: {}", request.id, SEATS_EXHAUSTED);
                    return Ok(Applied::SeatsExhausted);
                }
                Some(to)
            }
        };

        tx.commit().await?;
        debug!("request {}: {} applied", request.id, action);
        Ok(Applied::Done(next))
    }

    async fn raced(&self, id: &str) -> Result<Applied, sqlx::Error> {
        let current = repository::find_request_by_id(&self.db, id)
            .await?
            .map(|r| r.status);
        Ok(Applied::Raced(current))
    }
}

/// Seat effects of an approval. Returns false if the new course is full.
async fn take_seats(
    conn: &mut sqlx::SqliteConnection,
    request: &CourseRequest,
) -> Result<bool, sqlx::Error> {
    if request.kind.takes_new_course() {
        if let Some(course_id) = &request.new_course_id {
            if !repository::take_seat(conn, course_id).await? {
                return Ok(false);
            }
        }
    }
    if request.kind.releases_old_course() {
        if let Some(course_id) = &request.old_course_id {
            repository::release_seat(conn, course_id).await?;
        }
    }
    Ok(true)
}

fn validate_course_fields(req: &NewCourseRequest) -> Result<(), AppError> {
    let old = req.old_course_id.as_deref();
    let new = req.new_course_id.as_deref();

    let problem = match (req.kind, old, new) {
        (RequestKind::Add, None, Some(_)) => None,
        (RequestKind::Add, _, _) => Some("add requests need new_course_id and no old_course_id"),
        (RequestKind::Drop, Some(_), None) => None,
        (RequestKind::Drop, _, _) => Some("drop requests need old_course_id and no new_course_id"),
        (RequestKind::Replacement, Some(o), Some(n)) if o == n => {
            Some("replacement must change to a different course")
        }
        (RequestKind::Replacement, Some(_), Some(_)) => None,
        (RequestKind::Replacement, _, _) => {
            Some("replacement requests need both old_course_id and new_course_id")
        }
    };

    match problem {
        Some(msg) => Err(AppError::Validation(msg.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_request(kind: RequestKind, old: Option<&str>, new: Option<&str>) -> NewCourseRequest {
        NewCourseRequest {
            student_id: "s1".to_string(),
            kind,
            slot_id: "slot".to_string(),
            old_course_id: old.map(str::to_string),
            new_course_id: new.map(str::to_string),
        }
    }

    #[test]
    fn course_fields_must_match_kind() {
        assert!(validate_course_fields(&new_request(RequestKind::Add, None, Some("c"))).is_ok());
        assert!(validate_course_fields(&new_request(RequestKind::Add, Some("c"), Some("d"))).is_err());
        assert!(validate_course_fields(&new_request(RequestKind::Drop, Some("c"), None)).is_ok());
        assert!(validate_course_fields(&new_request(RequestKind::Drop, None, None)).is_err());
        assert!(
            validate_course_fields(&new_request(RequestKind::Replacement, Some("c"), Some("d")))
                .is_ok()
        );
        assert!(
            validate_course_fields(&new_request(RequestKind::Replacement, Some("c"), Some("c")))
                .is_err()
        );
        assert!(
            validate_course_fields(&new_request(RequestKind::Replacement, None, Some("d"))).is_err()
        );
    }

    #[test]
    fn invalid_delete_is_an_error_not_already_processed() {
        let err = transition(RequestStatus::Approved, BulkAction::Delete).unwrap_err();
        let item = Applied::Invalid(err).into_item("r1", BulkAction::Delete);
        assert_eq!(item.status, crate::models::ItemStatus::Error);
        assert_eq!(item.current_status, Some(RequestStatus::Approved));

        let err = transition(RequestStatus::Rejected, BulkAction::Approve).unwrap_err();
        let item = Applied::Invalid(err).into_item("r2", BulkAction::Approve);
        assert_eq!(item.status, crate::models::ItemStatus::AlreadyProcessed);
        assert_eq!(item.current_status, Some(RequestStatus::Rejected));
    }
}
