//! Expense endpoints, all nested under `/expensemanagement`.
//!
//! JSON endpoints:
//! - `GET    /getAllExpenses`
//! - `POST   /createExpenses`
//! - `PUT    /updateExpense/{id}`
//! - `GET    /getExpenseById/{id}`
//! - `GET    /getExpenseStatus/{id}`
//! - `GET    /getExpenseByDateRange?startDate=..&endDate=..`
//! - `DELETE /deleteAllExpenseById`            (body: list of ids)
//! - `DELETE /deleteExpenseById/{id}`
//!
//! HTML endpoint (target of the emailed action links):
//! - `GET    /approveOrRejectExpense/{id}/{action}`

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Html,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use expensey_core::approvals::ApprovalOutcome;
use expensey_core::domain::expense::{Expense, ExpenseDetails, ExpenseId, ExpenseStatus};
use expensey_core::errors::{ApplicationError, ApprovalError, DomainError, InterfaceError};
use expensey_core::policy::{AccessPolicy, Operation};
use expensey_core::templates::{message_vars, TemplateRenderer, MESSAGE_TEMPLATE};
use expensey_db::ExpenseRepository;

use crate::workflow::{persistence_error, ApprovalWorkflow};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct AppState {
    repository: Arc<dyn ExpenseRepository>,
    workflow: ApprovalWorkflow,
    renderer: Arc<dyn TemplateRenderer>,
    policy: Arc<dyn AccessPolicy>,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn ExpenseRepository>,
        workflow: ApprovalWorkflow,
        renderer: Arc<dyn TemplateRenderer>,
        policy: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self { repository, workflow, renderer, policy }
    }

    pub fn workflow(&self) -> &ApprovalWorkflow {
        &self.workflow
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateExpenseResponse {
    pub success: bool,
    pub message: String,
    pub id: ExpenseId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpenseStatusResponse {
    pub id: ExpenseId,
    pub status: ExpenseStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub deleted: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    #[serde(rename = "startDate")]
    pub start_date: NaiveDate,
    #[serde(rename = "endDate")]
    pub end_date: NaiveDate,
}

type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    let expenses = Router::new()
        .route("/getAllExpenses", get(get_all_expenses))
        .route("/createExpenses", post(create_expenses))
        .route("/approveOrRejectExpense/{id}/{action}", get(approve_or_reject_expense))
        .route("/updateExpense/{id}", put(update_expense))
        .route("/getExpenseById/{id}", get(get_expense_by_id))
        .route("/getExpenseStatus/{id}", get(get_expense_status))
        .route("/getExpenseByDateRange", get(get_expense_by_date_range))
        .route("/deleteAllExpenseById", delete(delete_all_expense_by_id))
        .route("/deleteExpenseById/{id}", delete(delete_expense_by_id));

    Router::new().nest("/expensemanagement", expenses).with_state(state)
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Server-side failures get the generic text; details only go to the log.
fn client_text(error: &InterfaceError) -> String {
    match error {
        InterfaceError::Internal { .. } => error.user_message().to_string(),
        _ => error.message().to_string(),
    }
}

fn log_failure(operation: Operation, error: &InterfaceError) {
    if error.http_status() >= 500 {
        error!(
            event_name = "expense.request.failed",
            correlation_id = %error.correlation_id(),
            operation = operation.as_str(),
            status = error.http_status(),
            error = %error,
            "expense request failed"
        );
    } else {
        warn!(
            event_name = "expense.request.rejected",
            correlation_id = %error.correlation_id(),
            operation = operation.as_str(),
            status = error.http_status(),
            error = %error,
            "expense request rejected"
        );
    }
}

fn json_error(
    operation: Operation,
    error: ApplicationError,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    let interface = error.into_interface(correlation_id);
    log_failure(operation, &interface);
    let status =
        StatusCode::from_u16(interface.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ApiError {
            error: client_text(&interface),
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}

fn authorize(
    state: &AppState,
    operation: Operation,
    correlation_id: &str,
) -> Result<(), (StatusCode, Json<ApiError>)> {
    state.policy.check(operation).map_err(|error| json_error(operation, error, correlation_id))
}

fn log_request(operation: Operation, correlation_id: &str) {
    info!(
        event_name = "expense.request.received",
        correlation_id = %correlation_id,
        operation = operation.as_str(),
        "expense request received"
    );
}

// ---------------------------------------------------------------------------
// JSON Handlers
// ---------------------------------------------------------------------------

async fn get_all_expenses(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> JsonResult<Vec<Expense>> {
    let operation = Operation::GetAllExpenses;
    let correlation_id = correlation_id(&headers);
    log_request(operation, &correlation_id);
    authorize(&state, operation, &correlation_id)?;

    let expenses = state
        .repository
        .list_all()
        .await
        .map_err(|error| json_error(operation, persistence_error(error), &correlation_id))?;
    Ok(Json(expenses))
}

async fn create_expenses(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(details): Json<ExpenseDetails>,
) -> JsonResult<CreateExpenseResponse> {
    let operation = Operation::CreateExpenses;
    let correlation_id = correlation_id(&headers);
    log_request(operation, &correlation_id);
    authorize(&state, operation, &correlation_id)?;

    let expense = state
        .workflow
        .create_expense(details, &correlation_id)
        .await
        .map_err(|error| json_error(operation, error, &correlation_id))?;

    info!(
        event_name = "expense.create.completed",
        correlation_id = %correlation_id,
        expense_id = %expense.id,
        "expense created and approval request queued"
    );
    Ok(Json(CreateExpenseResponse {
        success: true,
        message: "Expense is created and the approval request has been queued.".to_string(),
        id: expense.id,
    }))
}

async fn update_expense(
    headers: HeaderMap,
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(details): Json<ExpenseDetails>,
) -> JsonResult<Expense> {
    let operation = Operation::UpdateExpense;
    let correlation_id = correlation_id(&headers);
    log_request(operation, &correlation_id);
    authorize(&state, operation, &correlation_id)?;

    details
        .validate()
        .map_err(|error| json_error(operation, error.into(), &correlation_id))?;
    let expense = state
        .repository
        .update_details(ExpenseId(id), details)
        .await
        .map_err(|error| json_error(operation, persistence_error(error), &correlation_id))?;

    info!(
        event_name = "expense.update.completed",
        correlation_id = %correlation_id,
        expense_id = %expense.id,
        "expense details updated"
    );
    Ok(Json(expense))
}

async fn get_expense_by_id(
    headers: HeaderMap,
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> JsonResult<Expense> {
    let operation = Operation::GetExpenseById;
    let correlation_id = correlation_id(&headers);
    log_request(operation, &correlation_id);
    authorize(&state, operation, &correlation_id)?;

    let id = ExpenseId(id);
    match state.repository.find_by_id(id).await {
        Ok(Some(expense)) => Ok(Json(expense)),
        Ok(None) => Err(json_error(operation, ApprovalError::NotFound(id).into(), &correlation_id)),
        Err(error) => Err(json_error(operation, persistence_error(error), &correlation_id)),
    }
}

async fn get_expense_status(
    headers: HeaderMap,
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> JsonResult<ExpenseStatusResponse> {
    let operation = Operation::GetExpenseStatus;
    let correlation_id = correlation_id(&headers);
    log_request(operation, &correlation_id);
    authorize(&state, operation, &correlation_id)?;

    let id = ExpenseId(id);
    let status = state
        .workflow
        .status(id)
        .await
        .map_err(|error| json_error(operation, error.into(), &correlation_id))?;
    Ok(Json(ExpenseStatusResponse { id, status }))
}

async fn get_expense_by_date_range(
    headers: HeaderMap,
    Query(range): Query<DateRangeQuery>,
    State(state): State<AppState>,
) -> JsonResult<Vec<Expense>> {
    let operation = Operation::GetExpenseByDateRange;
    let correlation_id = correlation_id(&headers);
    log_request(operation, &correlation_id);
    authorize(&state, operation, &correlation_id)?;

    if range.start_date > range.end_date {
        let error = DomainError::InvariantViolation(format!(
            "startDate {} is after endDate {}",
            range.start_date, range.end_date
        ));
        return Err(json_error(operation, error.into(), &correlation_id));
    }

    let expenses = state
        .repository
        .find_by_date_range(range.start_date, range.end_date)
        .await
        .map_err(|error| json_error(operation, persistence_error(error), &correlation_id))?;
    Ok(Json(expenses))
}

async fn delete_all_expense_by_id(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(ids): Json<Vec<i64>>,
) -> JsonResult<DeleteResponse> {
    let operation = Operation::DeleteAllExpenseById;
    let correlation_id = correlation_id(&headers);
    log_request(operation, &correlation_id);
    authorize(&state, operation, &correlation_id)?;

    let ids: Vec<ExpenseId> = ids.into_iter().map(ExpenseId).collect();
    let deleted = state
        .repository
        .delete_many(&ids)
        .await
        .map_err(|error| json_error(operation, persistence_error(error), &correlation_id))?;

    info!(
        event_name = "expense.delete_many.completed",
        correlation_id = %correlation_id,
        requested = ids.len(),
        deleted,
        "expenses deleted"
    );
    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Deleted {deleted} of {} expenses.", ids.len()),
        deleted,
    }))
}

async fn delete_expense_by_id(
    headers: HeaderMap,
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> JsonResult<DeleteResponse> {
    let operation = Operation::DeleteExpenseById;
    let correlation_id = correlation_id(&headers);
    log_request(operation, &correlation_id);
    authorize(&state, operation, &correlation_id)?;

    let id = ExpenseId(id);
    state
        .repository
        .delete(id)
        .await
        .map_err(|error| json_error(operation, persistence_error(error), &correlation_id))?;

    info!(
        event_name = "expense.delete.completed",
        correlation_id = %correlation_id,
        expense_id = %id,
        "expense deleted"
    );
    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Expense {id} deleted."),
        deleted: 1,
    }))
}

// ---------------------------------------------------------------------------
// HTML Handler
// ---------------------------------------------------------------------------

fn outcome_status(outcome: &ApprovalOutcome) -> StatusCode {
    if outcome.is_conflict() {
        StatusCode::CONFLICT
    } else {
        StatusCode::OK
    }
}

fn message_page(
    state: &AppState,
    status: StatusCode,
    message: &str,
    correlation_id: &str,
) -> (StatusCode, Html<String>) {
    match state.renderer.render(MESSAGE_TEMPLATE, &message_vars(message)) {
        Ok(html) => (status, Html(html)),
        Err(error) => {
            error!(
                event_name = "expense.message_page.render_failed",
                correlation_id = %correlation_id,
                error = %error,
                "confirmation page could not be rendered"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<p>An error occurred while processing the request.</p>".to_string()),
            )
        }
    }
}

async fn approve_or_reject_expense(
    headers: HeaderMap,
    Path((id, action)): Path<(i64, String)>,
    State(state): State<AppState>,
) -> (StatusCode, Html<String>) {
    let operation = Operation::ApproveRejectExpenses;
    let correlation_id = correlation_id(&headers);
    log_request(operation, &correlation_id);

    let result = match state.policy.check(operation) {
        Ok(()) => state
            .workflow
            .transition(ExpenseId(id), &action, &correlation_id)
            .await
            .map_err(ApplicationError::from),
        Err(error) => Err(error),
    };

    match result {
        Ok(outcome) => {
            info!(
                event_name = "expense.action.completed",
                correlation_id = %correlation_id,
                expense_id = %outcome.expense_id,
                action = %action,
                changed = outcome.changed(),
                conflict = outcome.is_conflict(),
                status = %outcome.status(),
                "approval action processed"
            );
            message_page(&state, outcome_status(&outcome), outcome.message(), &correlation_id)
        }
        Err(error) => {
            let interface = error.into_interface(correlation_id.as_str());
            log_failure(operation, &interface);
            let status = StatusCode::from_u16(interface.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            message_page(&state, status, &client_text(&interface), &correlation_id)
        }
    }
}
