use super::repository::{self, Role};
use crate::{
    modules::auth::middleware::{AdminAuth, Auth},
    types::Context,
    utils::{pagination::Pagination, validation},
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

async fn get_profile(auth: Auth) -> impl IntoResponse {
    (StatusCode::OK, Json(json!(auth.user)))
}

#[derive(Deserialize, Validate)]
struct UpdateProfilePayload {
    #[validate(length(min = 1, max = 100))]
    first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    last_name: Option<String>,
    #[validate(length(min = 7, max = 20))]
    phone_number: Option<String>,
}

async fn update_profile(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Json(payload): Json<UpdateProfilePayload>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    match repository::update_profile_by_id(
        &ctx.db_conn.pool,
        &auth.user.id,
        repository::UpdateProfilePayload {
            first_name: payload.first_name,
            last_name: payload.last_name,
            phone_number: payload.phone_number,
        },
    )
    .await
    {
        Ok(Some(user)) => (StatusCode::OK, Json(json!(user))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "User not found" })),
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to update user profile" })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct UserFilters {
    role: Option<Role>,
}

async fn get_users(
    State(ctx): State<Arc<Context>>,
    _: AdminAuth,
    pagination: Pagination,
    Query(filters): Query<UserFilters>,
) -> impl IntoResponse {
    match repository::find_many(&ctx.db_conn.pool, pagination, filters.role).await {
        Ok(users) => (StatusCode::OK, Json(json!(users))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch users" })),
        ),
    }
}

#[derive(Deserialize)]
struct UpdateRolePayload {
    role: Role,
}

async fn update_user_role(
    State(ctx): State<Arc<Context>>,
    auth: AdminAuth,
    Path(id): Path<String>,
    Json(payload): Json<UpdateRolePayload>,
) -> impl IntoResponse {
    if auth.user.id == id {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Admins cannot change their own role" })),
        );
    }

    match repository::update_role_by_id(&ctx.db_conn.pool, &id, payload.role).await {
        Ok(Some(user)) => {
            tracing::info!("User {} role changed to {} by {}", user.id, user.role, auth.user.id);
            (StatusCode::OK, Json(json!(user)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "User not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to update user role" })),
        ),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(get_users))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/:id/role", patch(update_user_role))
}
