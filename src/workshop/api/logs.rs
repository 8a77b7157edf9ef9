use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::IntoResponse,
};

use super::{ApiResult, SharedState, created, ok, parse_id};
use crate::workshop::models::{CreateProductionLogRequest, ProductionLogFilter};

pub(super) async fn create_log(
    State(state): State<SharedState>,
    payload: Result<Json<CreateProductionLogRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let log = state
        .db
        .call(move |db| db.create_production_log(&req))
        .await?;
    Ok(created("Production log recorded", log))
}

pub(super) async fn list_logs(
    State(state): State<SharedState>,
    query: Result<Query<ProductionLogFilter>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(filter) = query?;
    let logs = state.db.call(move |db| db.get_production_logs(&filter)).await?;
    Ok(ok("Production logs retrieved", logs))
}

pub(super) async fn unprocessed_spreads(
    State(state): State<SharedState>,
) -> ApiResult<impl IntoResponse> {
    let logs = state
        .db
        .call(|db| db.get_unprocessed_spreading_logs())
        .await?;
    Ok(ok("Unprocessed spreading logs retrieved", logs))
}

pub(super) async fn get_log(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "log id")?;
    let log = state.db.call(move |db| db.get_production_log(id)).await?;
    Ok(ok("Production log retrieved", log))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::test_support::*;

    #[tokio::test]
    async fn test_spread_then_cut_flow() {
        let app = test_app();
        let (_, worker) = send(
            &app,
            "POST",
            "/api/workers",
            Some(json!({"name": "Ana", "role": "worker"})),
        )
        .await;
        let worker_id = worker["data"]["worker_id"].as_i64().unwrap();

        let (status, spread) = send(
            &app,
            "POST",
            "/api/production-logs",
            Some(json!({"worker_id": worker_id, "task_id": 1, "process_name": "spread", "layers_completed": 20})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let spread_id = spread["data"]["log_id"].as_i64().unwrap();

        let (_, body) = send(&app, "GET", "/api/production-logs/unprocessed-spreads", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        send(
            &app,
            "POST",
            "/api/production-logs",
            Some(json!({"worker_id": worker_id, "task_id": 1, "process_name": "cut", "parent_log_id": spread_id})),
        )
        .await;
        let (_, body) = send(&app, "GET", "/api/production-logs/unprocessed-spreads", None).await;
        assert!(body["data"].as_array().unwrap().is_empty());

        let (_, body) = send(&app, "GET", "/api/production-logs?process_name=cut", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/production-logs?parent_log_id={spread_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let children = body["data"].as_array().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0]["process_name"], "cut");

        let (status, body) = send(&app, "GET", &format!("/api/production-logs/{spread_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["process_name"], "spread");
    }

    #[tokio::test]
    async fn test_bad_process_and_dangling_worker() {
        let app = test_app();
        let (status, _) = send(
            &app,
            "POST",
            "/api/production-logs",
            Some(json!({"worker_id": 1, "process_name": "sew"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/api/production-logs",
            Some(json!({"worker_id": 1, "process_name": "cut"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
