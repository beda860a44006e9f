pub mod bootstrap;
pub mod health;
pub mod notifications;
pub mod routes;
pub mod templates;
pub mod workflow;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
pub use notifications::{
    ApprovalEventPublisher, LogNotifier, NotificationDispatcher, WebhookNotifier,
};
pub use routes::{router, AppState};
pub use templates::TeraRenderer;
pub use workflow::ApprovalWorkflow;
