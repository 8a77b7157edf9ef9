use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::IntoResponse,
};
use serde::Deserialize;

use super::{ApiResult, SharedState, created, done, ok, parse_id};
use crate::workshop::models::PlanDefinition;

#[derive(Debug, Default, Deserialize)]
pub(super) struct PlanSearch {
    pub search: Option<String>,
}

pub(super) async fn create_plan(
    State(state): State<SharedState>,
    payload: Result<Json<PlanDefinition>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(def) = payload?;
    let plan = state.db.call(move |db| db.create_plan(&def)).await?;
    Ok(created("Production plan created", plan))
}

pub(super) async fn list_plans(
    State(state): State<SharedState>,
    query: Result<Query<PlanSearch>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(params) = query?;
    let plans = state
        .db
        .call(move |db| db.get_plans(params.search.as_deref()))
        .await?;
    Ok(ok("Production plans retrieved", plans))
}

pub(super) async fn get_plan(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "plan id")?;
    let plan = state.db.call(move |db| db.get_plan(id)).await?;
    Ok(ok("Production plan retrieved", plan))
}

pub(super) async fn update_plan(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    payload: Result<Json<PlanDefinition>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "plan id")?;
    let Json(def) = payload?;
    let plan = state.db.call(move |db| db.update_plan(id, &def)).await?;
    Ok(ok("Production plan updated", plan))
}

pub(super) async fn delete_plan(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "plan id")?;
    state.db.call(move |db| db.delete_plan(id)).await?;
    Ok(done("Production plan deleted"))
}

pub(super) async fn get_plan_by_order(
    State(state): State<SharedState>,
    Path(order_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let order_id = parse_id(&order_id, "order id")?;
    let plan = state
        .db
        .call(move |db| db.get_plan_by_order(order_id))
        .await?;
    Ok(ok("Production plan retrieved", plan))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use super::super::test_support::*;

    async fn seed_order(app: &axum::Router) -> (i64, i64) {
        let (_, body) = send(
            app,
            "POST",
            "/api/production-orders",
            Some(json!({
                "style_number": "ST1",
                "items": [{"color": "Red", "size": "M", "quantity": 30}]
            })),
        )
        .await;
        (
            body["data"]["order_id"].as_i64().unwrap(),
            body["data"]["style_id"].as_i64().unwrap(),
        )
    }

    fn plan_body(style_id: i64, order_id: Option<i64>) -> Value {
        json!({
            "plan_name": "Red run",
            "style_id": style_id,
            "linked_order_id": order_id,
            "layouts": [
                {
                    "layout_name": "A",
                    "description": "two-size marker",
                    "ratios": [{"size": "M", "ratio": 2}, {"size": "L", "ratio": 1}],
                    "tasks": [{"color": "Red", "planned_layers": 30}]
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_plan_lifecycle() {
        let app = test_app();
        let (order_id, style_id) = seed_order(&app).await;

        let (status, body) = send(&app, "POST", "/api/production-plans", Some(plan_body(style_id, Some(order_id)))).await;
        assert_eq!(status, StatusCode::CREATED);
        let plan_id = body["data"]["plan_id"].as_i64().unwrap();
        let layout = &body["data"]["layouts"][0];
        assert_eq!(layout["ratios"].as_array().unwrap().len(), 2);
        assert_eq!(layout["tasks"][0]["layout_name"], "A");
        assert_eq!(layout["tasks"][0]["completed_layers"], 0);

        let (status, body) = send(&app, "GET", &format!("/api/production-plans/by-order/{order_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["plan_id"], plan_id);
        assert!(body["data"]["linked_order_number"].is_string());

        let mut updated = plan_body(style_id, Some(order_id));
        updated["layouts"][0]["layout_name"] = json!("A2");
        let (status, body) = send(&app, "PUT", &format!("/api/production-plans/{plan_id}"), Some(updated)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["layouts"][0]["tasks"][0]["layout_name"], "A2");

        let (status, _) = send(&app, "DELETE", &format!("/api/production-orders/{order_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, "DELETE", &format!("/api/production-plans/{plan_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", &format!("/api/production-plans/{plan_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "DELETE", &format!("/api/production-orders/{order_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_plan_validation_and_search() {
        let app = test_app();
        let (order_id, style_id) = seed_order(&app).await;

        let mut no_tasks = plan_body(style_id, None);
        no_tasks["layouts"][0]["tasks"] = json!([]);
        let (status, _) = send(&app, "POST", "/api/production-plans", Some(no_tasks)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "POST", "/api/production-plans", Some(plan_body(999, None))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        send(&app, "POST", "/api/production-plans", Some(plan_body(style_id, Some(order_id)))).await;
        let (_, body) = send(&app, "GET", "/api/production-plans?search=red", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        let (_, body) = send(&app, "GET", "/api/production-plans?search=nothing-like-this", None).await;
        assert!(body["data"].as_array().unwrap().is_empty());

        let (status, _) = send(&app, "PUT", "/api/production-plans/77", Some(plan_body(style_id, None))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
