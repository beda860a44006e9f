use std::sync::Arc;

use expensey_core::config::{AppConfig, ConfigError, LoadOptions};
use expensey_core::links::ActionLinkBuilder;
use expensey_core::policy::StaticAccessPolicy;
use expensey_core::templates::RenderError;
use expensey_db::{connect_from_config, migrations, DbPool, SqlExpenseRepository};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::notifications::{self, notifier_from_config, NotificationDispatcher};
use crate::routes::AppState;
use crate::templates::TeraRenderer;
use crate::workflow::ApprovalWorkflow;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
    pub dispatcher: JoinHandle<()>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("template setup failed: {0}")]
    Templates(#[from] RenderError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let renderer = Arc::new(TeraRenderer::new(config.server.templates_dir.as_deref())?);
    let notifier = notifier_from_config(&config.notification);
    let (publisher, receiver) = notifications::channel(config.notification.queue_capacity);
    let dispatcher = NotificationDispatcher::new(
        receiver,
        renderer.clone(),
        notifier.clone(),
        &config.notification,
    )
    .spawn();
    info!(
        event_name = "system.bootstrap.dispatcher_started",
        correlation_id = "bootstrap",
        notifier = notifier.name(),
        queue_capacity = config.notification.queue_capacity,
        "notification dispatcher started"
    );

    let repository = Arc::new(SqlExpenseRepository::new(db_pool.clone()));
    let links = ActionLinkBuilder::from_config(&config.links);
    let workflow = ApprovalWorkflow::new(repository.clone(), links, publisher);
    let policy = StaticAccessPolicy::from_config(&config.access);
    if policy.denied().next().is_some() {
        info!(
            event_name = "system.bootstrap.access_policy",
            correlation_id = "bootstrap",
            denied = ?policy.denied().map(|op| op.as_str()).collect::<Vec<_>>(),
            "access policy denies configured operations"
        );
    }

    let state = AppState::new(repository, workflow, renderer, Arc::new(policy));

    Ok(Application { config, db_pool, state, dispatcher })
}
