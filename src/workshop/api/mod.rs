mod fabric;
mod logs;
mod orders;
mod plans;
mod styles;
mod tasks;
mod workers;

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        OriginalUri,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::Serialize;

use super::db::DbHandle;
use super::models::WorkerRole;
use crate::errors::{ErrorKind, WorkshopError};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
}

pub type SharedState = Arc<AppState>;

// ── Response envelope ─────────────────────────────────────────────────

/// Body of every `/api` response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub(crate) fn ok<T: Serialize>(message: &str, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: message.to_string(),
        data: Some(data),
        error: None,
    })
}

pub(crate) fn created<T: Serialize>(message: &str, data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(message, data))
}

pub(crate) fn done(message: &str) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        success: true,
        message: message.to_string(),
        data: None,
        error: None,
    })
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Forbidden(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, detail) = match self {
            ApiError::BadRequest(d) => (StatusCode::BAD_REQUEST, "Invalid request", d),
            ApiError::NotFound(d) => (StatusCode::NOT_FOUND, "Resource not found", d),
            ApiError::Forbidden(d) => (StatusCode::FORBIDDEN, "Permission denied", d),
            ApiError::Conflict(d) => (StatusCode::CONFLICT, "Request conflicts with stored data", d),
            ApiError::Internal(d) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", d),
        };
        let body = ApiResponse::<()> {
            success: false,
            message: message.to_string(),
            data: None,
            error: Some(detail),
        };
        (status, Json(body)).into_response()
    }
}

impl From<WorkshopError> for ApiError {
    fn from(err: WorkshopError) -> Self {
        match err.kind() {
            ErrorKind::Validation => {
                tracing::debug!(error = %err, "request rejected");
                ApiError::BadRequest(err.to_string())
            }
            ErrorKind::NotFound => ApiError::NotFound(err.to_string()),
            ErrorKind::Forbidden => {
                tracing::warn!(error = %err, "forbidden request");
                ApiError::Forbidden(err.to_string())
            }
            ErrorKind::Conflict => {
                tracing::warn!(error = %err, "conflicting request");
                ApiError::Conflict(err.to_string())
            }
            ErrorKind::Persistence => {
                tracing::error!(error = ?err, "database operation failed");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ── Helpers ───────────────────────────────────────────────────────────

/// Parse a numeric path segment, answering 400 instead of axum's plain-text
/// rejection.
pub(crate) fn parse_id(raw: &str, what: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("{} must be a number, got '{}'", what, raw)))
}

/// Role of the caller, taken from the `X-Role` header.
pub(crate) fn acting_role(headers: &HeaderMap) -> Option<WorkerRole> {
    headers
        .get("x-role")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| WorkerRole::from_str(v.trim()).ok())
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    let api = Router::new()
        .route("/styles", get(styles::list_styles).post(styles::create_style))
        .route("/styles/{id}", get(styles::get_style))
        .route(
            "/production-orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route("/production-orders/unplanned", get(orders::list_unplanned_orders))
        .route(
            "/production-orders/{id}",
            get(orders::get_order).delete(orders::delete_order),
        )
        .route(
            "/production-plans",
            get(plans::list_plans).post(plans::create_plan),
        )
        .route(
            "/production-plans/{id}",
            get(plans::get_plan)
                .put(plans::update_plan)
                .delete(plans::delete_plan),
        )
        .route(
            "/production-plans/by-order/{order_id}",
            get(plans::get_plan_by_order),
        )
        .route("/tasks", get(tasks::list_tasks))
        .route("/tasks/progress", get(tasks::task_progress))
        .route("/tasks/{id}", get(tasks::get_task))
        .route(
            "/fabric-rolls",
            get(fabric::list_rolls).post(fabric::create_roll),
        )
        .route("/fabric-rolls/{id}", get(fabric::get_roll))
        .route("/fabric-rolls/{id}/status", put(fabric::update_roll_status))
        .route(
            "/production-logs",
            get(logs::list_logs).post(logs::create_log),
        )
        .route(
            "/production-logs/unprocessed-spreads",
            get(logs::unprocessed_spreads),
        )
        .route("/production-logs/{id}", get(logs::get_log))
        .route(
            "/workers",
            get(workers::list_workers).post(workers::create_worker),
        )
        .route(
            "/workers/{id}",
            get(workers::get_worker)
                .put(workers::update_worker)
                .delete(workers::delete_worker),
        )
        .route("/workers/{id}/tasks", get(workers::worker_task_groups))
        .route("/workers/{id}/logs", get(workers::worker_logs))
        .route("/workers/{id}/password", put(workers::update_password))
        .fallback(api_not_found);

    Router::new()
        .nest("/api", api)
        .route("/health", get(health_check))
}

async fn api_not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}

async fn health_check() -> &'static str {
    "ok"
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::workshop::db::WorkshopDb;

    pub fn test_app() -> Router {
        let db = WorkshopDb::new_in_memory().unwrap();
        let state = Arc::new(AppState {
            db: DbHandle::new(db),
        });
        api_router().with_state(state)
    }

    pub async fn body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Send one request; returns status and the parsed JSON envelope.
    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        send_with_headers(app, method, uri, body, &[]).await
    }

    pub async fn send_with_headers(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, body_json(response.into_body()).await)
    }
}
