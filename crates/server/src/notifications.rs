//! Out-of-band delivery of approval requests.
//!
//! Creating an expense only enqueues an [`ApprovalEvent`] on a bounded channel.
//! A single [`NotificationDispatcher`] task drains the channel, renders the
//! approval request and hands it to the configured [`Notifier`]. Nothing here
//! reports back to the caller that created the expense.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use expensey_core::config::NotificationConfig;
use expensey_core::events::ApprovalEvent;
use expensey_core::notification::{
    NotificationError, NotificationMessage, Notifier, Recipient,
};
use expensey_core::templates::{RenderError, TemplateRenderer, APPROVAL_REQUEST_TEMPLATE};

pub fn channel(capacity: usize) -> (ApprovalEventPublisher, mpsc::Receiver<ApprovalEvent>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (ApprovalEventPublisher { sender }, receiver)
}

#[derive(Clone, Debug)]
pub struct ApprovalEventPublisher {
    sender: mpsc::Sender<ApprovalEvent>,
}

impl ApprovalEventPublisher {
    /// Never waits. Returns `false` when the event was dropped.
    pub fn publish(&self, event: ApprovalEvent) -> bool {
        let expense_id = event.expense.id;
        let correlation_id = event.correlation_id.clone();
        match self.sender.try_send(event) {
            Ok(()) => {
                info!(
                    event_name = "notification.event.queued",
                    correlation_id = %correlation_id,
                    expense_id = %expense_id,
                    "approval event queued for dispatch"
                );
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    event_name = "notification.event.dropped",
                    correlation_id = %correlation_id,
                    expense_id = %expense_id,
                    reason = "queue_full",
                    "approval event dropped, notification queue is full"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(
                    event_name = "notification.event.dropped",
                    correlation_id = %correlation_id,
                    expense_id = %expense_id,
                    reason = "queue_closed",
                    "approval event dropped, notification dispatcher has stopped"
                );
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    pub fn available(&self) -> usize {
        self.sender.capacity()
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Send(#[from] NotificationError),
}

pub struct NotificationDispatcher {
    receiver: mpsc::Receiver<ApprovalEvent>,
    renderer: Arc<dyn TemplateRenderer>,
    notifier: Arc<dyn Notifier>,
    recipient: Recipient,
    sender: String,
}

impl NotificationDispatcher {
    pub fn new(
        receiver: mpsc::Receiver<ApprovalEvent>,
        renderer: Arc<dyn TemplateRenderer>,
        notifier: Arc<dyn Notifier>,
        config: &NotificationConfig,
    ) -> Self {
        Self {
            receiver,
            renderer,
            notifier,
            recipient: Recipient {
                address: config.approver_email.clone(),
                display_name: config.approver_name.clone(),
            },
            sender: config.sender.clone(),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until every publisher is dropped and the queue is drained.
    pub async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            let expense_id = event.expense.id;
            match self.dispatch(&event).await {
                Ok(()) => info!(
                    event_name = "notification.dispatch.sent",
                    correlation_id = %event.correlation_id,
                    expense_id = %expense_id,
                    notifier = self.notifier.name(),
                    "approval request sent"
                ),
                Err(error) => warn!(
                    event_name = "notification.dispatch.failed",
                    correlation_id = %event.correlation_id,
                    expense_id = %expense_id,
                    notifier = self.notifier.name(),
                    error = %error,
                    "approval request could not be sent"
                ),
            }
        }

        info!(
            event_name = "notification.dispatcher.stopped",
            correlation_id = "shutdown",
            "notification dispatcher stopped"
        );
    }

    async fn dispatch(&self, event: &ApprovalEvent) -> Result<(), DispatchError> {
        let body = self.renderer.render(APPROVAL_REQUEST_TEMPLATE, &event.template_vars())?;
        let message = NotificationMessage {
            expense_id: event.expense.id,
            recipient: self.recipient.clone(),
            sender: self.sender.clone(),
            subject: event.subject(),
            body,
            correlation_id: event.correlation_id.clone(),
        };
        self.notifier.send(message).await?;
        Ok(())
    }
}

/// Writes the approval request to the log instead of delivering it.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: NotificationMessage) -> Result<(), NotificationError> {
        info!(
            event_name = "notification.log.delivered",
            correlation_id = %message.correlation_id,
            expense_id = %message.expense_id,
            recipient = %message.recipient.address,
            sender = %message.sender,
            subject = %message.subject,
            body_bytes = message.body.len(),
            "approval request (log transport)"
        );
        Ok(())
    }
}

/// Posts the approval request as JSON to a mail relay.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    token: Option<SecretString>,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    expense_id: i64,
    to: &'a str,
    to_name: Option<&'a str>,
    from: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: impl Into<String>, token: Option<SecretString>) -> Self {
        Self { client, url: url.into(), token }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, message: NotificationMessage) -> Result<(), NotificationError> {
        let payload = WebhookPayload {
            expense_id: message.expense_id.0,
            to: &message.recipient.address,
            to_name: message.recipient.display_name.as_deref(),
            from: &message.sender,
            subject: &message.subject,
            html: &message.body,
        };

        let mut request = self
            .client
            .post(&self.url)
            .header("x-correlation-id", message.correlation_id.as_str())
            .json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| NotificationError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected { status, detail });
        }

        Ok(())
    }
}

pub fn notifier_from_config(config: &NotificationConfig) -> Arc<dyn Notifier> {
    match &config.webhook_url {
        Some(url) => {
            Arc::new(WebhookNotifier::new(Client::new(), url.clone(), config.webhook_token.clone()))
        }
        None => Arc::new(LogNotifier),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use expensey_core::config::AppConfig;
    use expensey_core::domain::expense::{Expense, ExpenseDetails, ExpenseId, ExpenseStatus};
    use expensey_core::events::ApprovalEvent;
    use expensey_core::links::ActionLinkBuilder;
    use expensey_core::notification::{
        InMemoryNotifier, NotificationError, NotificationMessage, Notifier,
    };

    use super::{channel, notifier_from_config, NotificationDispatcher};
    use crate::templates::TeraRenderer;

    fn event(id: i64) -> ApprovalEvent {
        let now = Utc::now();
        let expense = Expense {
            id: ExpenseId(id),
            status: ExpenseStatus::Pending,
            details: ExpenseDetails {
                amount: Decimal::new(2_500, 2),
                category: "supplies".to_string(),
                description: "Printer paper".to_string(),
                expense_date: NaiveDate::from_ymd_opt(2026, 2, 9).expect("valid date"),
                submitted_by: "t.ngata".to_string(),
            },
            created_at: now,
            updated_at: now,
        };
        let links = ActionLinkBuilder::new("http", "localhost", "8080", "/expensemanagement")
            .build(expense.id);
        ApprovalEvent::for_created(&expense, links, format!("req-{id}")).expect("pending expense")
    }

    struct RefusingNotifier;

    #[async_trait]
    impl Notifier for RefusingNotifier {
        fn name(&self) -> &'static str {
            "refusing"
        }

        async fn send(&self, _message: NotificationMessage) -> Result<(), NotificationError> {
            Err(NotificationError::Rejected { status: 502, detail: "relay down".to_string() })
        }
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (publisher, _receiver) = channel(1);

        assert!(publisher.publish(event(1)));
        assert!(!publisher.publish(event(2)));
        assert_eq!(publisher.available(), 0);
    }

    #[test]
    fn closed_queue_drops_the_event() {
        let (publisher, receiver) = channel(4);
        drop(receiver);

        assert!(publisher.is_closed());
        assert!(!publisher.publish(event(1)));
    }

    #[tokio::test]
    async fn dispatcher_renders_and_sends_each_event_once() {
        let config = AppConfig::default().notification;
        let (publisher, receiver) = channel(8);
        let notifier = InMemoryNotifier::default();
        let dispatcher = NotificationDispatcher::new(
            receiver,
            Arc::new(TeraRenderer::embedded().expect("renderer")),
            Arc::new(notifier.clone()),
            &config,
        );

        publisher.publish(event(3));
        publisher.publish(event(4));
        drop(publisher);
        dispatcher.run().await;

        let sent = notifier.messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].expense_id, ExpenseId(3));
        assert_eq!(sent[0].recipient.address, config.approver_email);
        assert!(sent[0].subject.starts_with("Expense #3 awaiting approval"));
        assert!(sent[0].body.contains("/approveOrRejectExpense/3/approved"));
        assert!(sent[0].body.contains("/approveOrRejectExpense/3/rejected"));
    }

    #[tokio::test]
    async fn dispatched_messages_keep_the_request_correlation_id() {
        let (publisher, receiver) = channel(8);
        let notifier = InMemoryNotifier::default();
        let dispatcher = NotificationDispatcher::new(
            receiver,
            Arc::new(TeraRenderer::embedded().expect("renderer")),
            Arc::new(notifier.clone()),
            &AppConfig::default().notification,
        );

        publisher.publish(event(7));
        publisher.publish(event(8));
        drop(publisher);
        dispatcher.run().await;

        let ids: Vec<_> =
            notifier.messages().into_iter().map(|message| message.correlation_id).collect();
        assert_eq!(ids, vec!["req-7".to_string(), "req-8".to_string()]);
    }

    #[tokio::test]
    async fn dispatcher_keeps_running_after_a_failed_send() {
        let (publisher, receiver) = channel(8);
        let dispatcher = NotificationDispatcher::new(
            receiver,
            Arc::new(TeraRenderer::embedded().expect("renderer")),
            Arc::new(RefusingNotifier),
            &AppConfig::default().notification,
        );
        let handle = dispatcher.spawn();

        assert!(publisher.publish(event(5)));
        assert!(publisher.publish(event(6)));
        drop(publisher);

        handle.await.expect("dispatcher should finish cleanly");
    }

    #[test]
    fn log_transport_is_the_default() {
        let config = AppConfig::default().notification;

        assert_eq!(notifier_from_config(&config).name(), "log");
    }

    #[test]
    fn webhook_url_selects_the_webhook_transport() {
        let mut config = AppConfig::default().notification;
        config.webhook_url = Some("https://relay.example.org/mail".to_string());

        assert_eq!(notifier_from_config(&config).name(), "webhook");
    }
}
