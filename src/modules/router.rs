use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use super::{
    address, auth, dashboard, delivery, location, menu, notification, order, payment, realtime,
    restaurant, review, user,
};
use crate::types::Context;
use std::sync::Arc;

async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "message": "Welcome to Nightbite API" })),
    )
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(health_check))
        .nest("/auth", auth::get_router())
        .nest("/users", user::get_router())
        .nest("/locations", location::get_router())
        .nest("/addresses", address::get_router())
        .nest("/restaurants", restaurant::get_router())
        .nest("/menu-items", menu::get_router())
        .nest("/orders", order::get_router())
        .nest("/payments", payment::get_router())
        .nest("/delivery", delivery::get_router())
        .nest("/reviews", review::get_router())
        .nest("/notifications", notification::get_router())
        .nest("/realtime", realtime::get_router())
        .nest("/dashboard", dashboard::get_router())
}
