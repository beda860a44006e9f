use thiserror::Error;

use crate::domain::expense::ExpenseId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown expense status `{0}`")]
    UnknownStatus(String),
    #[error("invalid approval action `{0}` (expected approved|rejected)")]
    InvalidAction(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failures of the approve/reject transition. A conflicting action is not an
/// error; it is one of the decision outcomes.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("expense {0} was not found")]
    NotFound(ExpenseId),
    #[error("invalid approval action `{0}`")]
    InvalidAction(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("operation `{0}` is not permitted")]
    Forbidden(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not allowed to perform this operation.",
            Self::NotFound { .. } => "The requested expense does not exist.",
            Self::Internal { .. } => "An error occurred while processing the request.",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Internal { .. } => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Approval(ApprovalError::InvalidAction(action)) => Self::BadRequest {
                message: format!("Invalid action `{action}`."),
                correlation_id,
            },
            ApplicationError::Approval(ApprovalError::NotFound(id)) => {
                Self::NotFound { message: format!("Expense {id} was not found."), correlation_id }
            }
            ApplicationError::Approval(ApprovalError::Storage(message))
            | ApplicationError::Persistence(message) => Self::Internal { message, correlation_id },
            ApplicationError::Forbidden(operation) => Self::Forbidden {
                message: format!("operation `{operation}` is not permitted"),
                correlation_id,
            },
        }
    }
}
