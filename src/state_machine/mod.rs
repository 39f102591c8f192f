//! Transition table for course requests.
//!
//! Every status change goes through [`transition`]; callers never compare
//! status strings themselves.

pub mod actions;
pub mod states;

pub use actions::BulkAction;
pub use states::RequestStatus;

use thiserror::Error;

/// What applying an action to a request should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Compare-and-set the status from `from` to `to`.
    Move { from: RequestStatus, to: RequestStatus },
    /// Remove the row, provided it is still in `from`.
    Remove { from: RequestStatus },
}

impl Transition {
    /// Status the row must still hold when the write lands.
    pub fn expected(&self) -> RequestStatus {
        match self {
            Self::Move { from, .. } | Self::Remove { from } => *from,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} a request that is {from}")]
pub struct InvalidTransition {
    pub from: RequestStatus,
    pub action: BulkAction,
}

pub fn transition(
    current: RequestStatus,
    action: BulkAction,
) -> Result<Transition, InvalidTransition> {
    use BulkAction::*;
    use RequestStatus::*;

    match (current, action) {
        (Pending, Approve) => Ok(Transition::Move { from: Pending, to: Approved }),
        (Pending, Reject) => Ok(Transition::Move { from: Pending, to: Rejected }),
        (Pending, Delete) => Ok(Transition::Remove { from: Pending }),
        (Rejected, Revert) => Ok(Transition::Move { from: Rejected, to: Pending }),
        (from, action) => Err(InvalidTransition { from, action }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [RequestStatus; 3] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Rejected,
    ];
    const ALL_ACTIONS: [BulkAction; 4] = [
        BulkAction::Approve,
        BulkAction::Reject,
        BulkAction::Delete,
        BulkAction::Revert,
    ];

    #[test]
    fn approved_is_never_left() {
        for action in ALL_ACTIONS {
            let err = transition(RequestStatus::Approved, action).unwrap_err();
            assert_eq!(err.from, RequestStatus::Approved);
            assert_eq!(err.action, action);
        }
    }

    #[test]
    fn only_the_documented_edges_exist() {
        let mut moves = Vec::new();
        for status in ALL_STATUSES {
            for action in ALL_ACTIONS {
                if let Ok(Transition::Move { from, to }) = transition(status, action) {
                    moves.push((from, to));
                }
            }
        }
        moves.sort_by_key(|(from, to)| (from.as_str(), to.as_str()));
        assert_eq!(
            moves,
            vec![
                (RequestStatus::Pending, RequestStatus::Approved),
                (RequestStatus::Pending, RequestStatus::Rejected),
                (RequestStatus::Rejected, RequestStatus::Pending),
            ]
        );
    }

    #[test]
    fn delete_requires_pending() {
        assert_eq!(
            transition(RequestStatus::Pending, BulkAction::Delete),
            Ok(Transition::Remove { from: RequestStatus::Pending })
        );
        assert!(transition(RequestStatus::Rejected, BulkAction::Delete).is_err());
    }

    #[test]
    fn revert_only_from_rejected() {
        assert!(transition(RequestStatus::Pending, BulkAction::Revert).is_err());
        let t = transition(RequestStatus::Rejected, BulkAction::Revert).unwrap();
        assert_eq!(t.expected(), RequestStatus::Rejected);
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in ALL_STATUSES {
            assert_eq!(status.as_str().parse::<RequestStatus>(), Ok(status));
        }
        assert!("archived".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn invalid_transition_message() {
        let err = transition(RequestStatus::Approved, BulkAction::Revert).unwrap_err();
        assert_eq!(err.to_string(), "cannot revert a request that is approved");
    }
}
