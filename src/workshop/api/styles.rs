use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};

use super::{ApiResult, SharedState, created, ok, parse_id};
use crate::workshop::models::CreateStyleRequest;

pub(super) async fn create_style(
    State(state): State<SharedState>,
    payload: Result<Json<CreateStyleRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let style = state
        .db
        .call(move |db| db.create_style(&req.style_number))
        .await?;
    Ok(created("Style created", style))
}

pub(super) async fn list_styles(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    let styles = state.db.call(|db| db.get_styles()).await?;
    Ok(ok("Styles retrieved", styles))
}

pub(super) async fn get_style(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "style id")?;
    let style = state.db.call(move |db| db.get_style(id)).await?;
    Ok(ok("Style retrieved", style))
}
