pub mod action;
pub mod decision;

pub use action::ApprovalAction;
pub use decision::{decide, ApprovalDecision, ApprovalOutcome, TransitionKind};
