use crate::{
    modules::{
        auth::middleware::Auth,
        order::{repository, service},
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

async fn get_history(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
) -> Response {
    if let Err(err) = service::find_for_party(&ctx, &auth.user, &id).await {
        return err.into_response();
    }

    match repository::find_history(&ctx.db_conn.pool, &id).await {
        Ok(history) => (StatusCode::OK, Json(json!(history))).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch order history" })),
        )
            .into_response(),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new().route("/:id/history", get(get_history))
}
