use crate::{
    modules::{
        auth::middleware::Auth,
        order::{
            repository::OrderStatus,
            service::{self, Transition},
        },
    },
    types::Context,
    utils::validation,
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
use validator::Validate;

#[derive(Deserialize, Validate)]
struct CancelPayload {
    #[validate(length(min = 1, max = 500))]
    reason: String,
}

async fn cancel_order(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
    Json(payload): Json<CancelPayload>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    match service::transition(
        ctx,
        &auth.user,
        &id,
        Transition {
            status: OrderStatus::Cancelled,
            verification_code: None,
            note: Some(payload.reason),
        },
    )
    .await
    {
        Ok(order) => (StatusCode::OK, Json(json!(order))).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new().route("/:id/cancel", post(cancel_order))
}
