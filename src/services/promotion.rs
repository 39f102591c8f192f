use std::collections::HashSet;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::repository;
use crate::error::{AppError, store_detail};
use crate::models::{BatchChange, BulkResult, ItemResult};
use crate::services::dedup_ids;

const UNCHANGED: &str = "unchanged";

/// Bulk edits to a student's semester and batch. Each student is its own unit of work.
pub struct StudentPromotion {
    db: SqlitePool,
}

impl StudentPromotion {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Moves each student up one semester. Resubmitting promotes again.
    pub async fn promote(&self, student_ids: Vec<String>) -> Result<BulkResult, AppError> {
        let ids = dedup_ids(student_ids)?;
        let mut result = BulkResult::default();

        for id in &ids {
            let item = match repository::increment_semester(&self.db, id).await {
                Ok(true) => ItemResult::success(id.as_str()),
                Ok(false) => ItemResult::error(id.as_str(), "student not found"),
                Err(e) => {
                    warn!("promoting student {} failed: {}", id, e);
                    ItemResult::error(id.as_str(), store_detail(&e))
                }
            };
            result.push(item);
        }

        info!("promoted {} of {} students", result.success, ids.len());
        Ok(result)
    }

    /// Overwrites batch membership. Entries equal to the current values succeed without a write.
    pub async fn apply_batch_change(
        &self,
        changes: Vec<BatchChange>,
    ) -> Result<BulkResult, AppError> {
        validate_changes(&changes)?;
        let mut result = BulkResult::default();

        for change in &changes {
            let item = match self.apply_one(change).await {
                Ok(item) => item,
                Err(e) => {
                    warn!("batch change for {} failed: {}", change.student_id, e);
                    ItemResult::error(change.student_id.as_str(), store_detail(&e))
                }
            };
            result.push(item);
        }

        info!(
            "batch change: {} of {} applied",
            result.success,
            changes.len()
        );
        Ok(result)
    }

    async fn apply_one(&self, change: &BatchChange) -> Result<ItemResult, sqlx::Error> {
        let id = change.student_id.as_str();

        let Some(student) = repository::find_student_by_id(&self.db, id).await? else {
            return Ok(ItemResult::error(id, "student not found"));
        };
        if student.current_batch == change.new_batch_id
            && student.current_batch_year == change.new_batch_year
        {
            return Ok(ItemResult::success(id).with_detail(UNCHANGED));
        }
        if repository::find_batch_by_id(&self.db, &change.new_batch_id)
            .await?
            .is_none()
        {
            return Ok(ItemResult::error(id, "batch not found"));
        }

        if repository::update_student_batch(&self.db, id, &change.new_batch_id, change.new_batch_year)
            .await?
        {
            Ok(ItemResult::success(id))
        } else {
            Ok(ItemResult::error(id, "student not found"))
        }
    }
}

fn validate_changes(changes: &[BatchChange]) -> Result<(), AppError> {
    if changes.is_empty() {
        return Err(AppError::Validation("changes must not be empty".to_string()));
    }
    let mut seen = HashSet::new();
    for change in changes {
        if !seen.insert(change.student_id.as_str()) {
            return Err(AppError::Validation(format!(
                "student {} appears more than once",
                change.student_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(student: &str, batch: &str) -> BatchChange {
        BatchChange {
            student_id: student.to_string(),
            new_batch_id: batch.to_string(),
            new_batch_year: 2024,
        }
    }

    #[test]
    fn repeated_student_rejects_the_whole_submission() {
        let err = validate_changes(&[change("s1", "b1"), change("s1", "b2")]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(validate_changes(&[change("s1", "b1"), change("s2", "b1")]).is_ok());
        assert!(validate_changes(&[]).is_err());
    }
}
