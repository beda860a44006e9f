use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use expensey_db::DbPool;
use serde::Serialize;

use crate::notifications::ApprovalEventPublisher;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    publisher: ApprovalEventPublisher,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub notifications: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, publisher: ApprovalEventPublisher) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, publisher })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let notifications = notification_check(&state.publisher);
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "expensey-server runtime initialized".to_string(),
        },
        database,
        notifications,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

// Notification delivery is best effort, so a stopped dispatcher is reported
// but does not fail readiness.
fn notification_check(publisher: &ApprovalEventPublisher) -> HealthCheck {
    if publisher.is_closed() {
        return HealthCheck {
            status: "degraded",
            detail: "notification dispatcher is not running".to_string(),
        };
    }

    let capacity = publisher.capacity();
    let queued = capacity - publisher.available();
    HealthCheck { status: "ready", detail: format!("{queued}/{capacity} approval events queued") }
}
