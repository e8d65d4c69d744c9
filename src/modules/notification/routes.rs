use std::str::FromStr;
use std::sync::Arc;

use super::repository::{history, push_subscription, scheduled};
use super::service;
use crate::{
    modules::{
        auth::middleware::{AdminAuth, Auth},
        user::{self, repository::Role},
    },
    types::Context,
    utils::{pagination::Pagination, validation},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

#[derive(Deserialize)]
struct HistoryFilters {
    #[serde(default)]
    unread_only: bool,
}

async fn get_notifications(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    pagination: Pagination,
    Query(filters): Query<HistoryFilters>,
) -> impl IntoResponse {
    match history::find_many_by_user_id(
        &ctx.db_conn.pool,
        &auth.user.id,
        pagination,
        filters.unread_only,
    )
    .await
    {
        Ok(notifications) => (StatusCode::OK, Json(json!(notifications))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch notifications" })),
        ),
    }
}

async fn mark_notification_read(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match history::mark_read(&ctx.db_conn.pool, &id, &auth.user.id).await {
        Ok(Some(notification)) => (StatusCode::OK, Json(json!(notification))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Notification not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to update notification" })),
        ),
    }
}

async fn mark_all_notifications_read(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
) -> impl IntoResponse {
    match history::mark_all_read(&ctx.db_conn.pool, &auth.user.id).await {
        Ok(updated) => (StatusCode::OK, Json(json!({ "updated": updated }))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to update notifications" })),
        ),
    }
}

#[derive(Deserialize, Validate)]
struct PushSubscriptionPayload {
    #[validate(length(min = 1, max = 4096))]
    token: String,
}

async fn create_push_subscription(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Json(payload): Json<PushSubscriptionPayload>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    match push_subscription::upsert(&ctx.db_conn.pool, &auth.user.id, &payload.token).await {
        Ok(_) => (
            StatusCode::CREATED,
            Json(json!({ "message": "Push token registered" })),
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Push token registration failed" })),
        )
            .into_response(),
    }
}

async fn delete_push_subscription(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Json(payload): Json<PushSubscriptionPayload>,
) -> impl IntoResponse {
    match push_subscription::delete_by_token(&ctx.db_conn.pool, &auth.user.id, &payload.token).await
    {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({ "message": "Push token removed" })),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Push token not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to remove push token" })),
        ),
    }
}

#[derive(Deserialize)]
struct ScheduledFilters {
    status: Option<scheduled::ScheduledNotificationStatus>,
}

async fn get_scheduled_notifications(
    State(ctx): State<Arc<Context>>,
    _: AdminAuth,
    pagination: Pagination,
    Query(filters): Query<ScheduledFilters>,
) -> impl IntoResponse {
    match scheduled::find_many(&ctx.db_conn.pool, pagination, filters.status).await {
        Ok(notifications) => (StatusCode::OK, Json(json!(notifications))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch scheduled notifications" })),
        ),
    }
}

#[derive(Deserialize, Validate)]
struct CreateScheduledPayload {
    #[validate(length(min = 1, max = 100))]
    title: String,
    #[validate(length(min = 1, max = 500))]
    body: String,
    audience: scheduled::Audience,
    audience_value: Option<String>,
    scheduled_for: DateTime<Utc>,
}

async fn validate_audience(
    ctx: &Context,
    audience: scheduled::Audience,
    value: &Option<String>,
) -> Result<(), Response> {
    let bad_request = |message: &str| {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
    };

    match (audience, value.as_deref()) {
        (scheduled::Audience::All, None) => Ok(()),
        (scheduled::Audience::All, Some(_)) => {
            Err(bad_request("audience_value must be empty for ALL"))
        }
        (scheduled::Audience::Role, Some(value)) => Role::from_str(value)
            .map(|_| ())
            .map_err(|_| bad_request("audience_value must be a valid role")),
        (scheduled::Audience::User, Some(value)) => {
            match user::repository::find_by_id(&ctx.db_conn.pool, value).await {
                Ok(Some(_)) => Ok(()),
                Ok(None) => Err(bad_request("audience_value must be an existing user id")),
                Err(_) => Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to fetch user" })),
                )
                    .into_response()),
            }
        }
        (_, None) => Err(bad_request("audience_value is required for this audience")),
    }
}

async fn create_scheduled_notification(
    State(ctx): State<Arc<Context>>,
    auth: AdminAuth,
    Json(payload): Json<CreateScheduledPayload>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    if let Err(res) = validate_audience(&ctx, payload.audience, &payload.audience_value).await {
        return res;
    }

    match scheduled::create(
        &ctx.db_conn.pool,
        scheduled::CreateScheduledPayload {
            title: payload.title,
            body: payload.body,
            audience: payload.audience,
            audience_value: payload.audience_value,
            scheduled_for: payload.scheduled_for,
            created_by: auth.user.id,
        },
    )
    .await
    {
        Ok(notification) => (StatusCode::CREATED, Json(json!(notification))).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to schedule notification" })),
        )
            .into_response(),
    }
}

async fn cancel_scheduled_notification(
    State(ctx): State<Arc<Context>>,
    _: AdminAuth,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match scheduled::cancel_by_id(&ctx.db_conn.pool, &id).await {
        Ok(Some(notification)) => (StatusCode::OK, Json(json!(notification))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No pending scheduled notification with this id" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to cancel scheduled notification" })),
        ),
    }
}

async fn dispatch_scheduled_notifications(
    State(ctx): State<Arc<Context>>,
    _: AdminAuth,
) -> impl IntoResponse {
    match service::scheduled::dispatch_due(ctx).await {
        Ok(dispatched) => (StatusCode::OK, Json(json!({ "dispatched": dispatched }))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to dispatch scheduled notifications" })),
        ),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(get_notifications))
        .route("/read-all", post(mark_all_notifications_read))
        .route("/:id/read", patch(mark_notification_read))
        .route(
            "/push-subscriptions",
            post(create_push_subscription).delete(delete_push_subscription),
        )
        .route(
            "/scheduled",
            get(get_scheduled_notifications).post(create_scheduled_notification),
        )
        .route("/scheduled/dispatch", post(dispatch_scheduled_notifications))
        .route("/scheduled/:id", delete(cancel_scheduled_notification))
}
