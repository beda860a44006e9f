use serde::{Deserialize, Serialize};

use crate::approvals::action::ApprovalAction;
use crate::domain::expense::{ExpenseId, ExpenseStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Pending expense moved to the requested terminal status.
    Applied,
    /// The expense already holds the requested status.
    AlreadyInState,
    /// The expense holds the opposite terminal status; the action is refused.
    Conflict,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub from: ExpenseStatus,
    pub to: ExpenseStatus,
    pub action: ApprovalAction,
    pub kind: TransitionKind,
}

impl ApprovalDecision {
    pub fn changed(&self) -> bool {
        self.kind == TransitionKind::Applied
    }

    pub fn message(&self) -> &'static str {
        use ApprovalAction::{Approved, Rejected};
        use TransitionKind::{AlreadyInState, Applied, Conflict};

        match (self.kind, self.action) {
            (Applied, Approved) => "Expense approved successfully.",
            (Applied, Rejected) => "Expense rejected.",
            (AlreadyInState, Approved) => "Expense is already approved.",
            (AlreadyInState, Rejected) => "Expense is already rejected.",
            (Conflict, Approved) => "Cannot approve an already-rejected expense.",
            (Conflict, Rejected) => "Cannot reject an already-approved expense.",
        }
    }
}

/// Decision table for an approve/reject request against the current status.
pub fn decide(current: ExpenseStatus, action: ApprovalAction) -> ApprovalDecision {
    let target = action.target_status();
    let (to, kind) = match current {
        ExpenseStatus::Pending => (target, TransitionKind::Applied),
        status if status == target => (status, TransitionKind::AlreadyInState),
        status => (status, TransitionKind::Conflict),
    };

    ApprovalDecision { from: current, to, action, kind }
}

/// Result of running a transition against the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub expense_id: ExpenseId,
    pub decision: ApprovalDecision,
}

impl ApprovalOutcome {
    pub fn changed(&self) -> bool {
        self.decision.changed()
    }

    pub fn is_conflict(&self) -> bool {
        self.decision.kind == TransitionKind::Conflict
    }

    pub fn message(&self) -> &'static str {
        self.decision.message()
    }

    pub fn status(&self) -> ExpenseStatus {
        self.decision.to
    }
}

#[cfg(test)]
mod tests {
    use super::{decide, TransitionKind};
    use crate::approvals::action::ApprovalAction::{Approved, Rejected};
    use crate::domain::expense::ExpenseStatus;

    #[test]
    fn pending_expense_takes_the_requested_status() {
        let approve = decide(ExpenseStatus::Pending, Approved);
        assert_eq!(approve.to, ExpenseStatus::Approved);
        assert_eq!(approve.kind, TransitionKind::Applied);
        assert!(approve.changed());
        assert_eq!(approve.message(), "Expense approved successfully.");

        let reject = decide(ExpenseStatus::Pending, Rejected);
        assert_eq!(reject.to, ExpenseStatus::Rejected);
        assert!(reject.changed());
        assert_eq!(reject.message(), "Expense rejected.");
    }

    #[test]
    fn repeating_the_terminal_action_is_a_noop() {
        let approved_again = decide(ExpenseStatus::Approved, Approved);
        assert_eq!(approved_again.kind, TransitionKind::AlreadyInState);
        assert_eq!(approved_again.to, ExpenseStatus::Approved);
        assert!(!approved_again.changed());
        assert_eq!(approved_again.message(), "Expense is already approved.");

        let rejected_again = decide(ExpenseStatus::Rejected, Rejected);
        assert_eq!(rejected_again.kind, TransitionKind::AlreadyInState);
        assert_eq!(rejected_again.message(), "Expense is already rejected.");
    }

    #[test]
    fn opposite_terminal_action_is_a_conflict() {
        let reject_approved = decide(ExpenseStatus::Approved, Rejected);
        assert_eq!(reject_approved.kind, TransitionKind::Conflict);
        assert_eq!(reject_approved.to, ExpenseStatus::Approved);
        assert!(!reject_approved.changed());
        assert_eq!(reject_approved.message(), "Cannot reject an already-approved expense.");

        let approve_rejected = decide(ExpenseStatus::Rejected, Approved);
        assert_eq!(approve_rejected.kind, TransitionKind::Conflict);
        assert_eq!(approve_rejected.to, ExpenseStatus::Rejected);
        assert_eq!(approve_rejected.message(), "Cannot approve an already-rejected expense.");
    }

    #[test]
    fn terminal_statuses_never_change() {
        for status in [ExpenseStatus::Approved, ExpenseStatus::Rejected] {
            for action in [Approved, Rejected] {
                let decision = decide(status, action);
                assert_eq!(decision.to, status);
                assert!(!decision.changed());
            }
        }
    }
}
