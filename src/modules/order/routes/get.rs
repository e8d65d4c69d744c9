use crate::{
    modules::{
        auth::middleware::Auth,
        order::{service, status},
        user::repository::Role,
    },
    types::Context,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

async fn get_order(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
) -> Response {
    let order = match service::find_for_party(&ctx, &auth.user, &id).await {
        Ok(order) => order,
        Err(err) => return err.into_response(),
    };

    // The customer hands the code to the rider, so only they get to see it.
    let verification_code = match auth.user.role {
        Role::Customer => order.verification_code.clone(),
        _ => None,
    };

    (
        StatusCode::OK,
        Json(json!({
            "order": order,
            "progress": status::get_order_progress(order.status),
            "cancellable": status::is_order_cancellable(order.status),
            "next_statuses": status::next_valid_statuses(order.status),
            "verification_code": verification_code,
        })),
    )
        .into_response()
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new().route("/:id", get(get_order))
}
