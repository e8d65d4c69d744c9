use super::repository;
use crate::{
    modules::{auth::middleware::AdminAuth, order::repository::OrderStatus},
    types::Context,
    utils::time,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn failed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Failed to fetch dashboard stats" })),
    )
        .into_response()
}

async fn get_stats(State(ctx): State<Arc<Context>>, _: AdminAuth) -> Response {
    let since = time::start_of_local_day(Utc::now(), ctx.order.utc_offset);

    let Some(since) = since else {
        return failed();
    };

    let totals = match repository::get_totals(&ctx.db_conn.pool, since).await {
        Ok(totals) => totals,
        Err(_) => return failed(),
    };

    let counts = match repository::count_orders_by_status(&ctx.db_conn.pool).await {
        Ok(counts) => counts,
        Err(_) => return failed(),
    };

    // Every status shows up, even with no orders in it.
    let mut orders_by_status = OrderStatus::ALL
        .iter()
        .map(|status| (status.as_str(), 0))
        .collect::<BTreeMap<_, _>>();
    for count in counts {
        orders_by_status.insert(count.status.as_str(), count.count);
    }

    (
        StatusCode::OK,
        Json(json!({
            "totals": totals,
            "orders_by_status": orders_by_status,
            "realtime_sessions": ctx.realtime.session_count(),
        })),
    )
        .into_response()
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new().route("/stats", get(get_stats))
}
