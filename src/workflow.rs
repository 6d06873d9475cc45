//! Status workflow policy.
//!
//! Tenants may restrict status changes with `StatusWorkflowRule`s. A pair of
//! statuses without a rule is always allowed. The completed state is the status
//! with the highest rank, and newly generated work starts in the lowest.

use serde::Serialize;

use crate::task::{StatusWorkflowRule, TaskStatus};

pub const RESTRICTED_REASON: &str = "transition restricted by workflow rules";

/// Verdict on a requested status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Accept,
    Reject(String),
}

impl Transition {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Transition::Accept)
    }
}

/// Decide whether a task may move from `from` to `to`.
pub fn validate_status_transition(from: u64, to: u64, rules: &[StatusWorkflowRule]) -> Transition {
    match rules.iter().find(|r| r.from_status_id == from && r.to_status_id == to) {
        Some(rule) if !rule.is_allowed => Transition::Reject(RESTRICTED_REASON.to_string()),
        _ => Transition::Accept,
    }
}

/// The completed status: highest rank, first one wins on a tie.
pub fn completed_status(statuses: &[TaskStatus]) -> Option<&TaskStatus> {
    statuses.iter().fold(None, |best: Option<&TaskStatus>, s| match best {
        Some(b) if b.rank >= s.rank => Some(b),
        _ => Some(s),
    })
}

/// The status new work starts in: lowest rank, first one wins on a tie.
pub fn initial_status(statuses: &[TaskStatus]) -> Option<&TaskStatus> {
    statuses.iter().fold(None, |best: Option<&TaskStatus>, s| match best {
        Some(b) if b.rank <= s.rank => Some(b),
        _ => Some(s),
    })
}

/// Result of a single committed status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub task_id: u64,
    pub from_status_id: u64,
    pub to_status_id: u64,
    /// Task generated for the next compliance period, if completion triggered one.
    pub next_task_id: Option<u64>,
    /// Why recurrence could not fire. The status change itself still stands.
    pub recurrence_error: Option<String>,
}

/// Per-task results of a bulk status change. Tasks are handled independently,
/// so a bulk request can partly succeed; nothing is rolled back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkOutcome {
    pub updated: Vec<StatusChange>,
    pub rejected: Vec<(u64, String)>,
    pub failed: Vec<(u64, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(id: u64, rank: i32) -> TaskStatus {
        TaskStatus { id, name: format!("S{id}"), rank }
    }

    #[test]
    fn test_no_rule_means_allowed() {
        assert_eq!(validate_status_transition(1, 2, &[]), Transition::Accept);
    }

    #[test]
    fn test_denying_rule_rejects() {
        let rules = [StatusWorkflowRule { from_status_id: 1, to_status_id: 2, is_allowed: false }];
        assert_eq!(
            validate_status_transition(1, 2, &rules),
            Transition::Reject(RESTRICTED_REASON.to_string())
        );
        // Rules are directional.
        assert!(validate_status_transition(2, 1, &rules).is_accepted());
    }

    #[test]
    fn test_allowing_rule_accepts() {
        let rules = [StatusWorkflowRule { from_status_id: 1, to_status_id: 3, is_allowed: true }];
        assert!(validate_status_transition(1, 3, &rules).is_accepted());
    }

    #[test]
    fn test_completed_is_max_rank_first_found() {
        let statuses = [status(1, 1), status(2, 5), status(3, 2), status(4, 5)];
        assert_eq!(completed_status(&statuses).map(|s| s.id), Some(2));
        assert_eq!(completed_status(&[]), None);
    }

    #[test]
    fn test_completed_does_not_assume_rank_three() {
        let statuses = [status(7, 10), status(8, 20), status(9, 3)];
        assert_eq!(completed_status(&statuses).map(|s| s.id), Some(8));
    }

    #[test]
    fn test_initial_is_min_rank_first_found() {
        let statuses = [status(1, 2), status(2, 0), status(3, 0)];
        assert_eq!(initial_status(&statuses).map(|s| s.id), Some(2));
    }
}
