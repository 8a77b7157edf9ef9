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
use crate::workshop::models::CreateOrderRequest;

#[derive(Debug, Default, Deserialize)]
pub(super) struct OrderSearch {
    pub style_number: Option<String>,
}

pub(super) async fn create_order(
    State(state): State<SharedState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let order = state.db.call(move |db| db.create_order(&req)).await?;
    Ok(created("Production order created", order))
}

pub(super) async fn list_orders(
    State(state): State<SharedState>,
    query: Result<Query<OrderSearch>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(search) = query?;
    let orders = state
        .db
        .call(move |db| db.get_orders(search.style_number.as_deref()))
        .await?;
    Ok(ok("Production orders retrieved", orders))
}

pub(super) async fn list_unplanned_orders(
    State(state): State<SharedState>,
) -> ApiResult<impl IntoResponse> {
    let orders = state.db.call(|db| db.get_unplanned_orders()).await?;
    Ok(ok("Unplanned production orders retrieved", orders))
}

pub(super) async fn get_order(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "order id")?;
    let order = state.db.call(move |db| db.get_order(id)).await?;
    Ok(ok("Production order retrieved", order))
}

pub(super) async fn delete_order(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "order id")?;
    state.db.call(move |db| db.delete_order(id)).await?;
    Ok(done("Production order deleted"))
}
