use crate::{
    modules::{auth::middleware::AdminAuth, delivery},
    types::Context,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Deserialize)]
struct AssignPayload {
    delivery_partner_id: String,
}

async fn assign_order(
    State(ctx): State<Arc<Context>>,
    _: AdminAuth,
    Path(id): Path<String>,
    Json(payload): Json<AssignPayload>,
) -> Response {
    match delivery::service::assign(ctx, &id, &payload.delivery_partner_id).await {
        Ok(order) => (StatusCode::OK, Json(json!(order))).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new().route("/:id/assign", post(assign_order))
}
