use super::repository;
use crate::{modules::auth::middleware::AdminAuth, types::Context, utils::validation};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Router,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::{Validate, ValidationError};

fn validate_fee(fee: &BigDecimal) -> Result<(), ValidationError> {
    match fee < &BigDecimal::from(0) {
        true => Err(ValidationError::new("NEGATIVE_DELIVERY_FEE")),
        false => Ok(()),
    }
}

async fn get_locations(State(ctx): State<Arc<Context>>) -> impl IntoResponse {
    match repository::find_active(&ctx.db_conn.pool).await {
        Ok(locations) => (StatusCode::OK, Json(json!(locations))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch locations" })),
        ),
    }
}

#[derive(Deserialize, Validate)]
struct CreateLocationPayload {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(length(min = 1, max = 100))]
    city: String,
    #[validate(custom(function = "validate_fee"))]
    delivery_fee: BigDecimal,
}

async fn create_location(
    State(ctx): State<Arc<Context>>,
    _: AdminAuth,
    Json(payload): Json<CreateLocationPayload>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    match repository::create(
        &ctx.db_conn.pool,
        repository::CreateLocationPayload {
            name: payload.name,
            city: payload.city,
            delivery_fee: payload.delivery_fee,
        },
    )
    .await
    {
        Ok(location) => (StatusCode::CREATED, Json(json!(location))).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to create location" })),
        )
            .into_response(),
    }
}

#[derive(Deserialize, Validate)]
struct UpdateLocationPayload {
    #[validate(length(min = 1, max = 100))]
    name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    city: Option<String>,
    #[validate(custom(function = "validate_fee"))]
    delivery_fee: Option<BigDecimal>,
    is_active: Option<bool>,
}

async fn update_location(
    State(ctx): State<Arc<Context>>,
    _: AdminAuth,
    Path(id): Path<String>,
    Json(payload): Json<UpdateLocationPayload>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    match repository::update_by_id(
        &ctx.db_conn.pool,
        &id,
        repository::UpdateLocationPayload {
            name: payload.name,
            city: payload.city,
            delivery_fee: payload.delivery_fee,
            is_active: payload.is_active,
        },
    )
    .await
    {
        Ok(Some(location)) => (StatusCode::OK, Json(json!(location))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Location not found" })),
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to update location" })),
        )
            .into_response(),
    }
}

async fn delete_location(
    State(ctx): State<Arc<Context>>,
    _: AdminAuth,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match repository::deactivate_by_id(&ctx.db_conn.pool, &id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({ "message": "Location deactivated" })),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Location not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to delete location" })),
        ),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(get_locations).post(create_location))
        .route("/:id", put(update_location).delete(delete_location))
}
