use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::expense::ExpenseId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub expense_id: ExpenseId,
    pub recipient: Recipient,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub correlation_id: String,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification relay rejected message with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: NotificationMessage) -> Result<(), NotificationError>;
}

/// Keeps every delivered message in memory. Used by tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<NotificationMessage>>>,
}

impl InMemoryNotifier {
    pub fn messages(&self) -> Vec<NotificationMessage> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    fn name(&self) -> &'static str {
        "in_memory"
    }

    async fn send(&self, message: NotificationMessage) -> Result<(), NotificationError> {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
        Ok(())
    }
}
