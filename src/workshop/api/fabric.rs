use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::IntoResponse,
};

use super::{ApiResult, SharedState, created, ok};
use crate::workshop::models::{CreateFabricRollRequest, FabricRollFilter, UpdateRollStatusRequest};

pub(super) async fn create_roll(
    State(state): State<SharedState>,
    payload: Result<Json<CreateFabricRollRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let roll = state
        .db
        .call(move |db| db.create_fabric_roll(req.style_id, &req.color))
        .await?;
    Ok(created("Fabric roll registered", roll))
}

pub(super) async fn list_rolls(
    State(state): State<SharedState>,
    query: Result<Query<FabricRollFilter>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(filter) = query?;
    let rolls = state.db.call(move |db| db.get_fabric_rolls(&filter)).await?;
    Ok(ok("Fabric rolls retrieved", rolls))
}

pub(super) async fn get_roll(
    State(state): State<SharedState>,
    Path(roll_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let roll = state.db.call(move |db| db.get_fabric_roll(&roll_id)).await?;
    Ok(ok("Fabric roll retrieved", roll))
}

pub(super) async fn update_roll_status(
    State(state): State<SharedState>,
    Path(roll_id): Path<String>,
    payload: Result<Json<UpdateRollStatusRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let roll = state
        .db
        .call(move |db| db.update_roll_status(&roll_id, req.status))
        .await?;
    Ok(ok("Fabric roll status updated", roll))
}
