use super::{hours, repository, service};
use crate::{
    modules::{auth::middleware::Auth, location, menu, user::repository::Role},
    types::Context,
    utils::{
        pagination::Pagination,
        validation::{self, validate_time_of_day},
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Router,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::{Validate, ValidationError};

fn validate_amount(amount: &BigDecimal) -> Result<(), ValidationError> {
    match amount < &BigDecimal::from(0) {
        true => Err(ValidationError::new("NEGATIVE_AMOUNT")),
        false => Ok(()),
    }
}

fn restaurant_response(ctx: &Context, restaurant: repository::Restaurant) -> serde_json::Value {
    let now = Utc::now().with_timezone(&ctx.order.utc_offset);
    let is_accepting_orders = restaurant.is_active
        && restaurant.is_open
        && hours::is_open_at(&restaurant.opening_time, &restaurant.closing_time, &now);

    json!({
        "restaurant": restaurant,
        "is_accepting_orders": is_accepting_orders,
    })
}

async fn location_is_usable(ctx: &Context, location_id: &Option<String>) -> Result<bool, Response> {
    let Some(location_id) = location_id else {
        return Ok(true);
    };

    location::repository::find_by_id(&ctx.db_conn.pool, location_id)
        .await
        .map(|location| location.map(|l| l.is_active).unwrap_or(false))
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch location" })),
            )
                .into_response()
        })
}

fn invalid_location() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Delivery location not found or inactive" })),
    )
        .into_response()
}

#[derive(Deserialize)]
struct Filters {
    location_id: Option<String>,
    cuisine: Option<String>,
    #[serde(default)]
    open_now: bool,
}

async fn get_restaurants(
    State(ctx): State<Arc<Context>>,
    pagination: Pagination,
    Query(filters): Query<Filters>,
) -> impl IntoResponse {
    let open_at = filters.open_now.then(|| {
        hours::format_time_of_day(Utc::now().with_timezone(&ctx.order.utc_offset).time())
    });

    match repository::find_many(
        &ctx.db_conn.pool,
        pagination,
        repository::Filters {
            location_id: filters.location_id,
            cuisine: filters.cuisine,
            open_at,
        },
    )
    .await
    {
        Ok(restaurants) => (StatusCode::OK, Json(json!(restaurants))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch restaurants" })),
        ),
    }
}

async fn get_my_restaurant(State(ctx): State<Arc<Context>>, auth: Auth) -> Response {
    if let Err(res) = auth.require(&[Role::RestaurantOwner]) {
        return res;
    }

    match repository::find_by_owner_id(&ctx.db_conn.pool, &auth.user.id).await {
        Ok(Some(restaurant)) => {
            (StatusCode::OK, Json(restaurant_response(&ctx, restaurant))).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "You have not created a restaurant yet" })),
        )
            .into_response(),
        Err(_) => service::AccessError::UnexpectedError.into_response(),
    }
}

#[derive(Deserialize, Validate)]
struct CreateRestaurantPayload {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    description: String,
    #[validate(length(min = 1, max = 300))]
    address: String,
    #[validate(length(min = 7, max = 20))]
    phone_number: String,
    #[validate(length(min = 1, max = 50))]
    cuisine: String,
    #[validate(custom(function = "validate_time_of_day"))]
    opening_time: String,
    #[validate(custom(function = "validate_time_of_day"))]
    closing_time: String,
    #[validate(range(min = -90.0, max = 90.0))]
    lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    lng: f64,
    location_id: Option<String>,
    #[validate(custom(function = "validate_amount"))]
    min_order_amount: Option<BigDecimal>,
}

async fn create_restaurant(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Json(payload): Json<CreateRestaurantPayload>,
) -> Response {
    if let Err(res) = auth.require(&[Role::RestaurantOwner]) {
        return res;
    }

    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    match repository::find_by_owner_id(&ctx.db_conn.pool, &auth.user.id).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": "You already own a restaurant" })),
            )
                .into_response()
        }
        Ok(None) => (),
        Err(_) => return service::AccessError::UnexpectedError.into_response(),
    };

    match location_is_usable(&ctx, &payload.location_id).await {
        Ok(true) => (),
        Ok(false) => return invalid_location(),
        Err(res) => return res,
    };

    match repository::create(
        &ctx.db_conn.pool,
        repository::CreateRestaurantPayload {
            owner_id: auth.user.id.clone(),
            name: payload.name,
            description: payload.description,
            address: payload.address,
            phone_number: payload.phone_number,
            cuisine: payload.cuisine,
            opening_time: payload.opening_time,
            closing_time: payload.closing_time,
            lat: payload.lat,
            lng: payload.lng,
            location_id: payload.location_id,
            min_order_amount: payload.min_order_amount.unwrap_or_else(|| BigDecimal::from(0)),
        },
    )
    .await
    {
        Ok(restaurant) => {
            tracing::info!("Restaurant {} created by {}", restaurant.id, auth.user.id);
            (StatusCode::CREATED, Json(restaurant_response(&ctx, restaurant))).into_response()
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to create restaurant" })),
        )
            .into_response(),
    }
}

async fn get_restaurant(State(ctx): State<Arc<Context>>, Path(id): Path<String>) -> Response {
    match repository::find_by_id(&ctx.db_conn.pool, &id).await {
        Ok(Some(restaurant)) if restaurant.is_active => {
            (StatusCode::OK, Json(restaurant_response(&ctx, restaurant))).into_response()
        }
        Ok(_) => service::AccessError::NotFound.into_response(),
        Err(_) => service::AccessError::UnexpectedError.into_response(),
    }
}

#[derive(Deserialize, Validate)]
struct UpdateRestaurantPayload {
    #[validate(length(min = 1, max = 100))]
    name: Option<String>,
    #[validate(length(max = 1000))]
    description: Option<String>,
    #[validate(length(min = 1, max = 300))]
    address: Option<String>,
    #[validate(length(min = 7, max = 20))]
    phone_number: Option<String>,
    #[validate(length(min = 1, max = 50))]
    cuisine: Option<String>,
    #[validate(custom(function = "validate_time_of_day"))]
    opening_time: Option<String>,
    #[validate(custom(function = "validate_time_of_day"))]
    closing_time: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    lng: Option<f64>,
    location_id: Option<String>,
    #[validate(custom(function = "validate_amount"))]
    min_order_amount: Option<BigDecimal>,
    is_active: Option<bool>,
}

async fn update_restaurant(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
    Json(payload): Json<UpdateRestaurantPayload>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    if let Err(err) = service::find_managed(&ctx, &auth, &id).await {
        return err.into_response();
    }

    // Only admins can suspend or reinstate a restaurant
    if payload.is_active.is_some() && auth.user.role != Role::Admin {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Only admins can change restaurant activation" })),
        )
            .into_response();
    }

    match location_is_usable(&ctx, &payload.location_id).await {
        Ok(true) => (),
        Ok(false) => return invalid_location(),
        Err(res) => return res,
    };

    match repository::update_by_id(
        &ctx.db_conn.pool,
        &id,
        repository::UpdateRestaurantPayload {
            name: payload.name,
            description: payload.description,
            address: payload.address,
            phone_number: payload.phone_number,
            cuisine: payload.cuisine,
            opening_time: payload.opening_time,
            closing_time: payload.closing_time,
            lat: payload.lat,
            lng: payload.lng,
            location_id: payload.location_id,
            min_order_amount: payload.min_order_amount,
            is_open: None,
            is_active: payload.is_active,
        },
    )
    .await
    {
        Ok(Some(restaurant)) => {
            (StatusCode::OK, Json(restaurant_response(&ctx, restaurant))).into_response()
        }
        Ok(None) => service::AccessError::NotFound.into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to update restaurant" })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct AvailabilityPayload {
    is_open: bool,
}

async fn update_availability(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
    Json(payload): Json<AvailabilityPayload>,
) -> Response {
    if let Err(err) = service::find_managed(&ctx, &auth, &id).await {
        return err.into_response();
    }

    match repository::update_by_id(
        &ctx.db_conn.pool,
        &id,
        repository::UpdateRestaurantPayload {
            is_open: Some(payload.is_open),
            ..Default::default()
        },
    )
    .await
    {
        Ok(Some(restaurant)) => {
            tracing::info!(
                "Restaurant {} is now {}",
                restaurant.id,
                if restaurant.is_open { "open" } else { "closed" }
            );
            (StatusCode::OK, Json(restaurant_response(&ctx, restaurant))).into_response()
        }
        Ok(None) => service::AccessError::NotFound.into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to update availability" })),
        )
            .into_response(),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(get_restaurants).post(create_restaurant))
        .route("/mine", get(get_my_restaurant))
        .route("/:id", get(get_restaurant).put(update_restaurant))
        .route("/:id/availability", patch(update_availability))
        .merge(menu::get_restaurant_menu_router())
}
