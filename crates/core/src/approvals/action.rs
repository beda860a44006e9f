use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::expense::ExpenseStatus;
use crate::errors::DomainError;

/// The action encoded in the last segment of an action link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approved,
    Rejected,
}

impl ApprovalAction {
    pub const ALL: [ApprovalAction; 2] = [ApprovalAction::Approved, ApprovalAction::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Status an expense ends in when this action is applied to it while pending.
    pub fn target_status(&self) -> ExpenseStatus {
        match self {
            Self::Approved => ExpenseStatus::Approved,
            Self::Rejected => ExpenseStatus::Rejected,
        }
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Matching is exact: links are generated with lowercase segments only.
impl FromStr for ApprovalAction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::InvalidAction(other.to_string())),
        }
    }
}
