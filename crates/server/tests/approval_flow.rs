//! End-to-end approval flow against the SQLite store: creation, out-of-band
//! notification and concurrent clicks on the emailed links.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use expensey_core::config::AppConfig;
use expensey_core::domain::expense::{ExpenseDetails, ExpenseStatus};
use expensey_core::links::ActionLinkBuilder;
use expensey_core::notification::{
    InMemoryNotifier, NotificationError, NotificationMessage, Notifier,
};
use expensey_db::{connect_with_settings, migrations, ExpenseRepository, SqlExpenseRepository};
use expensey_server::notifications::{channel, NotificationDispatcher};
use expensey_server::{ApprovalWorkflow, TeraRenderer};

struct UnreachableRelay;

#[async_trait]
impl Notifier for UnreachableRelay {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn send(&self, _message: NotificationMessage) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("connection refused".to_string()))
    }
}

async fn store(path: &std::path::Path) -> Arc<SqlExpenseRepository> {
    let url = format!("sqlite://{}", path.display());
    let pool = connect_with_settings(&url, 4, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    Arc::new(SqlExpenseRepository::new(pool))
}

fn links() -> ActionLinkBuilder {
    ActionLinkBuilder::new("http", "localhost", "8080", "/expensemanagement")
}

fn details() -> ExpenseDetails {
    ExpenseDetails {
        amount: Decimal::new(31_000, 2),
        category: "conference".to_string(),
        description: "Early-bird ticket".to_string(),
        expense_date: NaiveDate::from_ymd_opt(2026, 9, 18).expect("valid date"),
        submitted_by: "s.haddad".to_string(),
    }
}

#[tokio::test]
async fn approver_receives_links_that_drive_the_transition() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let repository = store(&dir.path().join("flow.db")).await;
    let renderer = Arc::new(TeraRenderer::embedded().expect("renderer"));
    let notifier = InMemoryNotifier::default();
    let (publisher, receiver) = channel(8);
    let dispatcher = NotificationDispatcher::new(
        receiver,
        renderer,
        Arc::new(notifier.clone()),
        &AppConfig::default().notification,
    )
    .spawn();
    let workflow = ApprovalWorkflow::new(repository.clone(), links(), publisher);

    let expense = workflow.create_expense(details(), "req-flow-1").await.expect("create");
    drop(workflow);
    dispatcher.await.expect("dispatcher drained");

    let sent = notifier.messages();
    assert_eq!(sent.len(), 1);
    let approve_link = format!(
        "http://localhost:8080/expensemanagement/approveOrRejectExpense/{}/approved",
        expense.id
    );
    assert!(sent[0].body.contains(&approve_link));
    assert_eq!(sent[0].correlation_id, "req-flow-1");

    let action = approve_link.rsplit('/').next().expect("action segment");
    let (publisher, _receiver) = channel(1);
    let workflow = ApprovalWorkflow::new(repository.clone(), links(), publisher);
    let outcome = workflow.transition(expense.id, action, "req-flow-2").await.expect("transition");

    assert!(outcome.changed());
    let stored = repository.find_by_id(expense.id).await.expect("find").expect("stored");
    assert_eq!(stored.status, ExpenseStatus::Approved);
}

#[tokio::test]
async fn failed_delivery_leaves_the_stored_expense_untouched() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let repository = store(&dir.path().join("relay-down.db")).await;
    let (publisher, receiver) = channel(8);
    let dispatcher = NotificationDispatcher::new(
        receiver,
        Arc::new(TeraRenderer::embedded().expect("renderer")),
        Arc::new(UnreachableRelay),
        &AppConfig::default().notification,
    )
    .spawn();
    let workflow = ApprovalWorkflow::new(repository.clone(), links(), publisher);

    let expense =
        workflow.create_expense(details(), "req-relay").await.expect("create succeeds anyway");
    drop(workflow);
    dispatcher.await.expect("dispatcher drained");

    let stored = repository.find_by_id(expense.id).await.expect("find").expect("stored");
    assert_eq!(stored, expense);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clicks_on_a_file_database_settle_once() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let repository = store(&dir.path().join("race.db")).await;
    let (publisher, _receiver) = channel(64);
    let workflow = Arc::new(ApprovalWorkflow::new(repository.clone(), links(), publisher));

    for _ in 0..10 {
        let expense = workflow.create_expense(details(), "req-race").await.expect("create");
        let id = expense.id;

        let handles: Vec<_> = ["approved", "rejected", "approved", "rejected"]
            .into_iter()
            .map(|action| {
                let workflow = Arc::clone(&workflow);
                tokio::spawn(async move { workflow.transition(id, action, "req-race").await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.expect("join").expect("transition"));
        }

        let stored = repository.find_by_id(id).await.expect("find").expect("stored");
        assert_eq!(outcomes.iter().filter(|o| o.changed()).count(), 1);
        assert!(stored.status.is_terminal());
        for outcome in &outcomes {
            assert_eq!(outcome.status(), stored.status);
        }
    }
}
