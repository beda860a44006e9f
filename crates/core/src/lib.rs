pub mod approvals;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod links;
pub mod notification;
pub mod policy;
pub mod templates;

pub use approvals::{decide, ApprovalAction, ApprovalDecision, ApprovalOutcome, TransitionKind};
pub use domain::expense::{Expense, ExpenseDetails, ExpenseId, ExpenseSnapshot, ExpenseStatus};
pub use errors::{ApplicationError, ApprovalError, DomainError, InterfaceError};
pub use events::ApprovalEvent;
pub use links::{ActionLinkBuilder, ActionLinks};
pub use notification::{
    InMemoryNotifier, NotificationError, NotificationMessage, Notifier, Recipient,
};
pub use policy::{AccessPolicy, AllowAll, Operation, StaticAccessPolicy};
pub use templates::{RenderError, TemplateRenderer, TemplateVars};
