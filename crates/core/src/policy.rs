//! Operation-level access checks performed at the entry of each inbound operation.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::AccessConfig;
use crate::errors::ApplicationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    GetAllExpenses,
    CreateExpenses,
    ApproveRejectExpenses,
    UpdateExpense,
    GetExpenseById,
    GetExpenseStatus,
    GetExpenseByDateRange,
    DeleteAllExpenseById,
    DeleteExpenseById,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::GetAllExpenses,
        Operation::CreateExpenses,
        Operation::ApproveRejectExpenses,
        Operation::UpdateExpense,
        Operation::GetExpenseById,
        Operation::GetExpenseStatus,
        Operation::GetExpenseByDateRange,
        Operation::DeleteAllExpenseById,
        Operation::DeleteExpenseById,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetAllExpenses => "GET_ALL_EXPENSES",
            Self::CreateExpenses => "CREATE_EXPENSES",
            Self::ApproveRejectExpenses => "APPROVE_REJECT_EXPENSES",
            Self::UpdateExpense => "UPDATE_EXPENSE",
            Self::GetExpenseById => "GET_EXPENSE_BY_ID",
            Self::GetExpenseStatus => "GET_EXPENSE_STATUS",
            Self::GetExpenseByDateRange => "GET_EXPENSE_BY_DATE_RANGE",
            Self::DeleteAllExpenseById => "DELETE_ALL_EXPENSE_BY_ID",
            Self::DeleteExpenseById => "DELETE_EXPENSE_BY_ID",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|operation| operation.as_str() == normalized)
            .ok_or_else(|| format!("unknown operation `{value}`"))
    }
}

pub trait AccessPolicy: Send + Sync {
    fn allow(&self, operation: Operation) -> bool;

    fn check(&self, operation: Operation) -> Result<(), ApplicationError> {
        if self.allow(operation) {
            Ok(())
        } else {
            Err(ApplicationError::Forbidden(operation.as_str().to_string()))
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn allow(&self, _operation: Operation) -> bool {
        true
    }
}

/// Deny-list policy driven by the `access` config section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticAccessPolicy {
    denied: BTreeSet<Operation>,
}

impl StaticAccessPolicy {
    pub fn deny(operations: impl IntoIterator<Item = Operation>) -> Self {
        Self { denied: operations.into_iter().collect() }
    }

    /// Entries are validated when the config loads, so unknown names are skipped here.
    pub fn from_config(config: &AccessConfig) -> Self {
        Self::deny(config.denied_operations.iter().filter_map(|raw| raw.parse().ok()))
    }

    pub fn denied(&self) -> impl Iterator<Item = &Operation> {
        self.denied.iter()
    }
}

impl AccessPolicy for StaticAccessPolicy {
    fn allow(&self, operation: Operation) -> bool {
        !self.denied.contains(&operation)
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessPolicy, AllowAll, Operation, StaticAccessPolicy};
    use crate::config::AccessConfig;
    use crate::errors::ApplicationError;

    #[test]
    fn operation_names_round_trip() {
        for operation in Operation::ALL {
            assert_eq!(operation.as_str().parse::<Operation>(), Ok(operation));
        }
        assert_eq!("delete_expense_by_id".parse::<Operation>(), Ok(Operation::DeleteExpenseById));
        assert!("DROP_TABLE".parse::<Operation>().is_err());
    }

    #[test]
    fn allow_all_permits_everything() {
        assert!(Operation::ALL.into_iter().all(|operation| AllowAll.allow(operation)));
    }

    #[test]
    fn static_policy_denies_configured_operations() {
        let policy = StaticAccessPolicy::from_config(&AccessConfig {
            denied_operations: vec![
                "DELETE_ALL_EXPENSE_BY_ID".to_string(),
                "delete_expense_by_id".to_string(),
            ],
        });

        assert!(!policy.allow(Operation::DeleteAllExpenseById));
        assert!(!policy.allow(Operation::DeleteExpenseById));
        assert!(policy.allow(Operation::ApproveRejectExpenses));
        assert_eq!(policy.denied().count(), 2);
    }

    #[test]
    fn check_reports_the_denied_operation() {
        let policy = StaticAccessPolicy::deny([Operation::UpdateExpense]);

        assert!(policy.check(Operation::CreateExpenses).is_ok());
        assert_eq!(
            policy.check(Operation::UpdateExpense),
            Err(ApplicationError::Forbidden("UPDATE_EXPENSE".to_string()))
        );
    }
}
