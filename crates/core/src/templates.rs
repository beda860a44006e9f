use std::collections::BTreeMap;

use thiserror::Error;

pub type TemplateVars = BTreeMap<String, serde_json::Value>;

/// Confirmation page shown after an action link is followed. Takes `Message`.
pub const MESSAGE_TEMPLATE: &str = "message.html";
/// Body of the approval request sent to the approver.
pub const APPROVAL_REQUEST_TEMPLATE: &str = "approval_request.html";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template `{0}` is not registered")]
    UnknownTemplate(String),
    #[error("failed to render template `{name}`: {detail}")]
    Failed { name: String, detail: String },
}

pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, vars: &TemplateVars) -> Result<String, RenderError>;
}

pub fn message_vars(message: &str) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert("Message".to_string(), message.into());
    vars
}
