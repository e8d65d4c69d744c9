use super::repository;
use crate::{
    modules::{auth::middleware::Auth, restaurant},
    types::Context,
    utils::validation,
};
use axum::{
    extract::{Json, Path, Query, State},
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

fn validate_price(price: &BigDecimal) -> Result<(), ValidationError> {
    match price <= &BigDecimal::from(0) {
        true => Err(ValidationError::new("INVALID_PRICE")),
        false => Ok(()),
    }
}

fn menu_item_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Menu item not found" })),
    )
        .into_response()
}

#[derive(Deserialize)]
struct MenuFilters {
    #[serde(default)]
    include_unavailable: bool,
}

async fn get_menu(
    State(ctx): State<Arc<Context>>,
    Path(restaurant_id): Path<String>,
    Query(filters): Query<MenuFilters>,
) -> impl IntoResponse {
    match repository::find_many_by_restaurant_id(
        &ctx.db_conn.pool,
        &restaurant_id,
        filters.include_unavailable,
    )
    .await
    {
        Ok(items) => (StatusCode::OK, Json(json!(items))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch menu" })),
        ),
    }
}

#[derive(Deserialize, Validate)]
struct CreateMenuItemPayload {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    description: String,
    #[validate(custom(function = "validate_price"))]
    price: BigDecimal,
    #[validate(length(min = 1, max = 50))]
    category: String,
    #[serde(default)]
    is_veg: bool,
    #[validate(url)]
    image_url: Option<String>,
}

async fn create_menu_item(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(restaurant_id): Path<String>,
    Json(payload): Json<CreateMenuItemPayload>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    if let Err(err) = restaurant::service::find_managed(&ctx, &auth, &restaurant_id).await {
        return err.into_response();
    }

    match repository::create(
        &ctx.db_conn.pool,
        repository::CreateMenuItemPayload {
            restaurant_id,
            name: payload.name,
            description: payload.description,
            price: payload.price,
            category: payload.category,
            is_veg: payload.is_veg,
            image_url: payload.image_url,
        },
    )
    .await
    {
        Ok(item) => (StatusCode::CREATED, Json(json!(item))).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to create menu item" })),
        )
            .into_response(),
    }
}

async fn find_managed_item(
    ctx: &Context,
    auth: &Auth,
    id: &str,
) -> Result<repository::MenuItem, Response> {
    let item = repository::find_by_id(&ctx.db_conn.pool, id)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch menu item" })),
            )
                .into_response()
        })?
        .ok_or_else(menu_item_not_found)?;

    restaurant::service::find_managed(ctx, auth, &item.restaurant_id)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(item)
}

#[derive(Deserialize, Validate)]
struct UpdateMenuItemPayload {
    #[validate(length(min = 1, max = 100))]
    name: Option<String>,
    #[validate(length(max = 500))]
    description: Option<String>,
    #[validate(custom(function = "validate_price"))]
    price: Option<BigDecimal>,
    #[validate(length(min = 1, max = 50))]
    category: Option<String>,
    is_veg: Option<bool>,
    is_available: Option<bool>,
    #[validate(url)]
    image_url: Option<String>,
}

async fn update_menu_item(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
    Json(payload): Json<UpdateMenuItemPayload>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    if let Err(res) = find_managed_item(&ctx, &auth, &id).await {
        return res;
    }

    match repository::update_by_id(
        &ctx.db_conn.pool,
        &id,
        repository::UpdateMenuItemPayload {
            name: payload.name,
            description: payload.description,
            price: payload.price,
            category: payload.category,
            is_veg: payload.is_veg,
            is_available: payload.is_available,
            image_url: payload.image_url,
        },
    )
    .await
    {
        Ok(Some(item)) => (StatusCode::OK, Json(json!(item))).into_response(),
        Ok(None) => menu_item_not_found(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to update menu item" })),
        )
            .into_response(),
    }
}

async fn delete_menu_item(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
) -> Response {
    if let Err(res) = find_managed_item(&ctx, &auth, &id).await {
        return res;
    }

    match repository::delete_by_id(&ctx.db_conn.pool, &id).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "message": "Menu item deleted" })),
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to delete menu item" })),
        )
            .into_response(),
    }
}

pub fn get_restaurant_menu_router() -> Router<Arc<Context>> {
    Router::new().route("/:id/menu", get(get_menu).post(create_menu_item))
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new().route("/:id", put(update_menu_item).delete(delete_menu_item))
}
