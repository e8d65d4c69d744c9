use crate::{
    modules::{auth::middleware::Auth, order::service, user::repository::Role},
    types::Context,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

async fn reissue_verification_code(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
) -> Response {
    if let Err(res) = auth.require(&[Role::Customer]) {
        return res;
    }

    match service::reissue_verification_code(ctx, &auth.user, &id).await {
        Ok((order, code)) => (
            StatusCode::OK,
            Json(json!({
                "order_id": order.id,
                "verification_code": code,
                "generated_at": order.verification_code_generated_at,
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new().route("/:id/verification-code", post(reissue_verification_code))
}
