//! Construction of the approve/reject links sent to approvers.
//!
//! Links depend only on the configured deployment address and the expense id,
//! so rebuilding them for the same expense always yields the same URLs.

use serde::{Deserialize, Serialize};

use crate::approvals::ApprovalAction;
use crate::config::LinksConfig;
use crate::domain::expense::ExpenseId;

pub const ACTION_PATH_SEGMENT: &str = "approveOrRejectExpense";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionLinkBuilder {
    scheme: String,
    host: String,
    port: String,
    base_path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLinks {
    pub approve: String,
    pub reject: String,
}

impl ActionLinkBuilder {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port: port.into(),
            base_path: base_path.into(),
        }
    }

    pub fn from_config(config: &LinksConfig) -> Self {
        Self::new(&config.scheme, &config.host, &config.port, &config.base_path)
    }

    pub fn link(&self, expense_id: ExpenseId, action: ApprovalAction) -> String {
        format!(
            "{}://{}:{}{}/{}/{}/{}",
            self.scheme,
            self.host,
            self.port,
            self.base_path,
            ACTION_PATH_SEGMENT,
            expense_id,
            action.as_str()
        )
    }

    pub fn build(&self, expense_id: ExpenseId) -> ActionLinks {
        ActionLinks {
            approve: self.link(expense_id, ApprovalAction::Approved),
            reject: self.link(expense_id, ApprovalAction::Rejected),
        }
    }
}
