use crate::{
    modules::auth::{middleware::Auth, repository},
    types::Context,
};
use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use serde_json::json;
use std::sync::Arc;

async fn handler(State(ctx): State<Arc<Context>>, auth: Auth) -> impl IntoResponse {
    match repository::delete_by_id(&ctx.db_conn.pool, &auth.session_id).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "message": "Signed out" }))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to sign out" })),
        ),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new().route("/", post(handler))
}
