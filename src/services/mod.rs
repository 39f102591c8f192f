pub mod allocation;
pub mod lifecycle;
pub mod promotion;

use std::collections::HashSet;

use crate::error::AppError;

pub use allocation::AllocationEngine;
pub use lifecycle::{Applied, RequestLifecycle};
pub use promotion::StudentPromotion;

/// Removes repeats while keeping first-seen order. An empty list is rejected up front.
pub(crate) fn dedup_ids(ids: Vec<String>) -> Result<Vec<String>, AppError> {
    if ids.is_empty() {
        return Err(AppError::Validation("ids must not be empty".to_string()));
    }
    let mut seen = HashSet::new();
    Ok(ids.into_iter().filter(|id| seen.insert(id.clone())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let ids = vec!["b", "a", "b", "c", "a"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(dedup_ids(ids).unwrap(), vec!["b", "a", "c"]);
    }

    #[test]
    fn empty_id_list_is_rejected() {
        assert!(matches!(dedup_ids(Vec::new()), Err(AppError::Validation(_))));
    }
}
