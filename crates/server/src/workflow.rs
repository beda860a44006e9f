use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use expensey_core::approvals::{decide, ApprovalAction, ApprovalOutcome};
use expensey_core::domain::expense::{Expense, ExpenseDetails, ExpenseId, ExpenseStatus};
use expensey_core::errors::{ApplicationError, ApprovalError};
use expensey_core::events::ApprovalEvent;
use expensey_core::links::ActionLinkBuilder;
use expensey_db::{ExpenseRepository, RepositoryError};

use crate::notifications::ApprovalEventPublisher;

/// Creation and approve/reject transitions for expenses.
#[derive(Clone)]
pub struct ApprovalWorkflow {
    repository: Arc<dyn ExpenseRepository>,
    links: ActionLinkBuilder,
    publisher: ApprovalEventPublisher,
}

impl ApprovalWorkflow {
    pub fn new(
        repository: Arc<dyn ExpenseRepository>,
        links: ActionLinkBuilder,
        publisher: ApprovalEventPublisher,
    ) -> Self {
        Self { repository, links, publisher }
    }

    pub fn links(&self) -> &ActionLinkBuilder {
        &self.links
    }

    pub fn publisher(&self) -> &ApprovalEventPublisher {
        &self.publisher
    }

    /// Stores the expense as `Pending` and queues exactly one approval event.
    /// Whether the notification is ever delivered has no bearing on the result.
    pub async fn create_expense(
        &self,
        details: ExpenseDetails,
        correlation_id: &str,
    ) -> Result<Expense, ApplicationError> {
        details.validate()?;

        let expense = self.repository.create(details).await.map_err(persistence_error)?;
        let event =
            ApprovalEvent::for_created(&expense, self.links.build(expense.id), correlation_id)?;
        let queued = self.publisher.publish(event);

        info!(
            event_name = "expense.created",
            correlation_id = %correlation_id,
            expense_id = %expense.id,
            notification_queued = queued,
            "expense created in pending status"
        );
        Ok(expense)
    }

    pub async fn status(&self, id: ExpenseId) -> Result<ExpenseStatus, ApprovalError> {
        self.load_status(id).await
    }

    /// Applies `raw_action` to the expense.
    ///
    /// The action is validated before the store is touched. The status write is
    /// a compare-and-set from the status that was read; when another caller
    /// wins that race the stored status is read again and the decision is
    /// recomputed, so the loser reports the matching no-op or conflict.
    pub async fn transition(
        &self,
        id: ExpenseId,
        raw_action: &str,
        correlation_id: &str,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        let action = ApprovalAction::from_str(raw_action)
            .map_err(|_| ApprovalError::InvalidAction(raw_action.to_string()))?;

        loop {
            let current = self.load_status(id).await?;
            let decision = decide(current, action);
            let outcome = ApprovalOutcome { expense_id: id, decision };

            if !decision.changed() {
                info!(
                    event_name = "expense.transition.unchanged",
                    correlation_id = %correlation_id,
                    expense_id = %id,
                    action = %action,
                    status = %current,
                    conflict = outcome.is_conflict(),
                    "approval action left status unchanged"
                );
                return Ok(outcome);
            }

            let applied = self
                .repository
                .compare_and_set_status(id, decision.from, decision.to)
                .await
                .map_err(storage_error)?;

            if applied {
                info!(
                    event_name = "expense.transition.applied",
                    correlation_id = %correlation_id,
                    expense_id = %id,
                    action = %action,
                    from = %decision.from,
                    to = %decision.to,
                    "expense status changed"
                );
                return Ok(outcome);
            }

            debug!(
                event_name = "expense.transition.lost_race",
                correlation_id = %correlation_id,
                expense_id = %id,
                action = %action,
                "status changed concurrently, re-reading"
            );
        }
    }

    async fn load_status(&self, id: ExpenseId) -> Result<ExpenseStatus, ApprovalError> {
        match self.repository.find_by_id(id).await.map_err(storage_error)? {
            Some(expense) => Ok(expense.status),
            None => Err(ApprovalError::NotFound(id)),
        }
    }
}

fn storage_error(error: RepositoryError) -> ApprovalError {
    match error {
        RepositoryError::NotFound(id) => ApprovalError::NotFound(id),
        other => ApprovalError::Storage(other.to_string()),
    }
}

/// Maps a repository failure outside the approval path.
pub fn persistence_error(error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::NotFound(id) => ApprovalError::NotFound(id).into(),
        other => ApplicationError::Persistence(other.to_string()),
    }
}
