use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::expense::{Expense, ExpenseDetails, ExpenseSnapshot, ExpenseStatus};
use crate::errors::DomainError;
use crate::links::ActionLinks;
use crate::templates::TemplateVars;

/// Raised once per created expense and consumed once by the notification
/// dispatcher. Never persisted.
///
/// `correlation_id` is the id of the create request, so dispatch logs can be
/// tied back to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    pub approve_link: String,
    pub reject_link: String,
    pub expense: ExpenseSnapshot,
    pub details: ExpenseDetails,
    pub correlation_id: String,
    pub raised_at: DateTime<Utc>,
}

impl ApprovalEvent {
    pub fn for_created(
        expense: &Expense,
        links: ActionLinks,
        correlation_id: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if expense.status != ExpenseStatus::Pending {
            return Err(DomainError::InvariantViolation(format!(
                "approval event raised for expense {} in status {}",
                expense.id, expense.status
            )));
        }

        Ok(Self {
            approve_link: links.approve,
            reject_link: links.reject,
            expense: expense.snapshot(),
            details: expense.details.clone(),
            correlation_id: correlation_id.into(),
            raised_at: Utc::now(),
        })
    }

    pub fn subject(&self) -> String {
        format!(
            "Expense #{} awaiting approval: {} {}",
            self.expense.id, self.details.category, self.details.amount
        )
    }

    pub fn template_vars(&self) -> TemplateVars {
        let mut vars = TemplateVars::new();
        vars.insert("ExpenseId".to_string(), self.expense.id.0.into());
        vars.insert("Status".to_string(), self.expense.status.as_str().into());
        vars.insert("Amount".to_string(), self.details.amount.to_string().into());
        vars.insert("Category".to_string(), self.details.category.clone().into());
        vars.insert("Description".to_string(), self.details.description.clone().into());
        vars.insert("ExpenseDate".to_string(), self.details.expense_date.to_string().into());
        vars.insert("SubmittedBy".to_string(), self.details.submitted_by.clone().into());
        vars.insert("ApproveLink".to_string(), self.approve_link.clone().into());
        vars.insert("RejectLink".to_string(), self.reject_link.clone().into());
        vars
    }
}
