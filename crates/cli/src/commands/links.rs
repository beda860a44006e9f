use expensey_core::config::{AppConfig, LoadOptions};
use expensey_core::domain::expense::ExpenseId;
use expensey_core::links::ActionLinkBuilder;
use serde_json::json;

use crate::commands::CommandResult;

pub fn run(id: i64) -> CommandResult {
    run_with(LoadOptions::default(), id)
}

/// Builds the links from configuration alone; the expense does not have to exist.
pub fn run_with(options: LoadOptions, id: i64) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "links",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let links = ActionLinkBuilder::from_config(&config.links).build(ExpenseId(id));

    CommandResult::success_with_details(
        "links",
        format!("approval links for expense {id}"),
        Some(json!({
            "expense_id": id,
            "approve": links.approve,
            "reject": links.reject,
        })),
    )
}
