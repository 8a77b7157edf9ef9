use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    response::IntoResponse,
};
use serde::Deserialize;

use super::{ApiResult, SharedState, ok, parse_id};

#[derive(Debug, Default, Deserialize)]
pub(super) struct TaskFilter {
    pub style_id: Option<i64>,
}

pub(super) async fn list_tasks(
    State(state): State<SharedState>,
    query: Result<Query<TaskFilter>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(filter) = query?;
    let tasks = state.db.call(move |db| db.get_tasks(filter.style_id)).await?;
    Ok(ok("Tasks retrieved", tasks))
}

pub(super) async fn task_progress(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    let progress = state.db.call(|db| db.get_task_progress()).await?;
    Ok(ok("Task progress retrieved", progress))
}

pub(super) async fn get_task(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "task id")?;
    let task = state.db.call(move |db| db.get_task(id)).await?;
    Ok(ok("Task retrieved", task))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::test_support::*;

    #[tokio::test]
    async fn test_progress_and_task_reads() {
        let app = test_app();
        let (_, style) = send(&app, "POST", "/api/styles", Some(json!({"style_number": "ST1"}))).await;
        let style_id = style["data"]["style_id"].as_i64().unwrap();
        send(
            &app,
            "POST",
            "/api/production-plans",
            Some(json!({
                "plan_name": "P",
                "style_id": style_id,
                "layouts": [{
                    "layout_name": "A",
                    "ratios": [{"size": "S", "ratio": 1}],
                    "tasks": [{"color": "Red", "planned_layers": 12}, {"color": "Blue", "planned_layers": 6}]
                }]
            })),
        )
        .await;

        let (status, body) = send(&app, "GET", "/api/tasks/progress", None).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["progress"] == 0.0));

        let (_, body) = send(&app, "GET", &format!("/api/tasks?style_id={style_id}"), None).await;
        let task_id = body["data"][0]["task_id"].as_i64().unwrap();
        let (status, body) = send(&app, "GET", &format!("/api/tasks/{task_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["color"], "Red");

        let (status, _) = send(&app, "GET", "/api/tasks?style_id=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "GET", "/api/tasks/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
