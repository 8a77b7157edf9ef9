use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::HeaderMap,
    response::IntoResponse,
};

use super::{ApiResult, SharedState, acting_role, created, done, ok, parse_id};
use crate::workshop::models::{UpdatePasswordRequest, WorkerRequest};
use crate::workshop::workers::{WorkerAdmin, WorkerDirectory};

// ── Directory ─────────────────────────────────────────────────────────

pub(super) async fn list_workers(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    let workers = state.db.call(|db| db.workers()).await?;
    Ok(ok("Workers retrieved", workers))
}

pub(super) async fn get_worker(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "worker id")?;
    let worker = state.db.call(move |db| db.worker(id)).await?;
    Ok(ok("Worker retrieved", worker))
}

pub(super) async fn worker_task_groups(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "worker id")?;
    let groups = state.db.call(move |db| db.worker_task_groups(id)).await?;
    Ok(ok("Worker task groups retrieved", groups))
}

pub(super) async fn worker_logs(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "worker id")?;
    let logs = state.db.call(move |db| db.worker_logs(id)).await?;
    Ok(ok("Worker logs retrieved", logs))
}

// ── Administration ────────────────────────────────────────────────────

pub(super) async fn create_worker(
    State(state): State<SharedState>,
    payload: Result<Json<WorkerRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let worker = state.db.call(move |db| db.register_worker(&req)).await?;
    Ok(created("Worker created", worker))
}

pub(super) async fn update_worker(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    payload: Result<Json<WorkerRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "worker id")?;
    let Json(req) = payload?;
    let worker = state
        .db
        .call(move |db| db.update_worker_profile(id, &req))
        .await?;
    Ok(ok("Worker updated", worker))
}

pub(super) async fn delete_worker(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "worker id")?;
    state.db.call(move |db| db.remove_worker(id)).await?;
    Ok(done("Worker deleted"))
}

pub(super) async fn update_password(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "worker id")?;
    let Json(req) = payload?;
    let actor = acting_role(&headers);
    state
        .db
        .call(move |db| db.change_password(actor, id, &req.password))
        .await?;
    Ok(done("Password updated"))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::test_support::*;

    async fn create(app: &axum::Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        send(app, "POST", "/api/workers", Some(body)).await
    }

    #[tokio::test]
    async fn test_worker_crud() {
        let app = test_app();
        let (status, body) = create(&app, json!({"name": "Ana", "role": "worker", "worker_group": "cutting"})).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["data"].get("password_hash").is_none());
        let id = body["data"]["worker_id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/workers/{id}"),
            Some(json!({"name": "Ana Lima", "role": "pattern_maker", "is_active": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["role"], "pattern_maker");
        assert_eq!(body["data"]["is_active"], false);

        let (_, body) = send(&app, "GET", "/api/workers", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "GET", &format!("/api/workers/{id}/tasks"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", &format!("/api/workers/{id}/logs"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "DELETE", &format!("/api/workers/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", &format!("/api/workers/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_rules() {
        let app = test_app();
        let (status, _) = create(&app, json!({"name": "Boss", "role": "admin"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = create(&app, json!({"name": "Boss", "role": "admin", "password": "pw"})).await;
        assert_eq!(status, StatusCode::CREATED);
        let admin_id = body["data"]["worker_id"].as_i64().unwrap();

        let (status, body) = create(&app, json!({"name": "Boss2", "role": "admin", "password": "pw"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("admin"));

        let (status, _) = send(&app, "DELETE", &format!("/api/workers/{admin_id}"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_password_change_permissions() {
        let app = test_app();
        let (_, admin) = create(&app, json!({"name": "Boss", "role": "admin", "password": "pw"})).await;
        let admin_id = admin["data"]["worker_id"].as_i64().unwrap();
        let (_, worker) = create(&app, json!({"name": "Ana", "role": "worker"})).await;
        let worker_id = worker["data"]["worker_id"].as_i64().unwrap();
        let body = Some(json!({"password": "n3w"}));

        let (status, _) = send_with_headers(
            &app,
            "PUT",
            &format!("/api/workers/{worker_id}/password"),
            body.clone(),
            &[("x-role", "manager")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send_with_headers(
            &app,
            "PUT",
            &format!("/api/workers/{admin_id}/password"),
            body.clone(),
            &[("x-role", "manager")],
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, "PUT", &format!("/api/workers/{worker_id}/password"), body.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send_with_headers(
            &app,
            "PUT",
            &format!("/api/workers/{admin_id}/password"),
            body,
            &[("x-role", "admin")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_worker_with_logs_delete_conflicts() {
        let app = test_app();
        let (_, worker) = create(&app, json!({"name": "Ana", "role": "worker"})).await;
        let worker_id = worker["data"]["worker_id"].as_i64().unwrap();
        send(
            &app,
            "POST",
            "/api/production-logs",
            Some(json!({"worker_id": worker_id, "process_name": "issue"})),
        )
        .await;
        let (status, _) = send(&app, "DELETE", &format!("/api/workers/{worker_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
