use super::dispatch::{self, Point};
use super::repository::{self, DeliveryPartner, DeliveryPartnerStatus};
use super::service;
use crate::{
    modules::{
        auth::middleware::Auth,
        order::repository::{self as order_repository, OrderStatus},
        realtime::{hub::events, room, Event},
        user::repository::Role,
    },
    types::Context,
    utils::{pagination::Pagination, time, validation},
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cmp::Ordering;
use std::sync::Arc;
use validator::Validate;

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn find_partner(ctx: &Context, auth: &Auth) -> Result<DeliveryPartner, Response> {
    auth.require(&[Role::DeliveryPartner])?;

    repository::find_by_user_id(&ctx.db_conn.pool, &auth.user.id)
        .await
        .map_err(|_| {
            error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch delivery partner profile",
            )
        })?
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Delivery partner profile not found"))
}

async fn get_profile(State(ctx): State<Arc<Context>>, auth: Auth) -> Response {
    match find_partner(&ctx, &auth).await {
        Ok(partner) => (StatusCode::OK, Json(json!(partner))).into_response(),
        Err(res) => res,
    }
}

#[derive(Deserialize)]
struct UpdateStatusPayload {
    status: DeliveryPartnerStatus,
}

async fn update_status(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Json(payload): Json<UpdateStatusPayload>,
) -> Response {
    let partner = match find_partner(&ctx, &auth).await {
        Ok(partner) => partner,
        Err(res) => return res,
    };

    if payload.status == DeliveryPartnerStatus::Busy {
        return error(
            StatusCode::BAD_REQUEST,
            "Status can only be set to AVAILABLE or OFFLINE",
        );
    }

    match repository::set_availability(&ctx.db_conn.pool, &partner.id, payload.status).await {
        Ok(Some(partner)) => {
            tracing::info!("Delivery partner {} is now {:?}", partner.id, partner.status);
            (StatusCode::OK, Json(json!(partner))).into_response()
        }
        Ok(None) => error(
            StatusCode::CONFLICT,
            "Status cannot change while a delivery is in progress",
        ),
        Err(_) => error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update delivery partner status",
        ),
    }
}

#[derive(Deserialize, Validate)]
struct UpdateLocationPayload {
    #[validate(range(min = -90.0, max = 90.0))]
    lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    lng: f64,
}

async fn update_location(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Json(payload): Json<UpdateLocationPayload>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    let partner = match find_partner(&ctx, &auth).await {
        Ok(partner) => partner,
        Err(res) => return res,
    };

    let partner =
        match repository::update_location(&ctx.db_conn.pool, &partner.id, payload.lat, payload.lng)
            .await
        {
            Ok(partner) => partner,
            Err(_) => {
                return error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to update location",
                )
            }
        };

    // Best effort: a failed lookup only skips the broadcast.
    if let Ok(order_ids) =
        order_repository::find_active_ids_by_delivery_partner_id(&ctx.db_conn.pool, &partner.id)
            .await
    {
        for order_id in order_ids {
            ctx.realtime.publish(
                &room::order(&order_id),
                Event::new(
                    events::DELIVERY_LOCATION_UPDATED,
                    json!({
                        "order_id": order_id,
                        "delivery_partner_id": partner.id,
                        "lat": payload.lat,
                        "lng": payload.lng,
                    }),
                ),
            );
        }
    }

    (StatusCode::OK, Json(json!(partner))).into_response()
}

#[derive(Serialize)]
struct AvailableOrder {
    #[serde(flatten)]
    order: order_repository::OpenOrder,
    distance_km: Option<f64>,
}

async fn get_available_orders(State(ctx): State<Arc<Context>>, auth: Auth) -> Response {
    let partner = match find_partner(&ctx, &auth).await {
        Ok(partner) => partner,
        Err(res) => return res,
    };

    let open = match order_repository::find_open(&ctx.db_conn.pool, 100).await {
        Ok(open) => open,
        Err(_) => {
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch available orders",
            )
        }
    };

    let position = partner
        .current_lat
        .zip(partner.current_lng)
        .map(|(lat, lng)| Point::new(lat, lng));

    let mut orders = open
        .into_iter()
        .map(|order| AvailableOrder {
            distance_km: position.map(|position| {
                dispatch::haversine_km(
                    position,
                    Point::new(order.restaurant_lat, order.restaurant_lng),
                )
            }),
            order,
        })
        .collect::<Vec<_>>();

    orders.sort_by(|a, b| match (a.distance_km, b.distance_km) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    });

    (StatusCode::OK, Json(json!({ "items": orders }))).into_response()
}

async fn accept_order(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(order_id): Path<String>,
) -> Response {
    let partner = match find_partner(&ctx, &auth).await {
        Ok(partner) => partner,
        Err(res) => return res,
    };

    match service::accept(ctx, &partner, &order_id).await {
        Ok(order) => (StatusCode::OK, Json(json!(order))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Deserialize)]
struct OrderFilters {
    status: Option<OrderStatus>,
}

async fn get_orders(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    pagination: Pagination,
    Query(filters): Query<OrderFilters>,
) -> Response {
    let partner = match find_partner(&ctx, &auth).await {
        Ok(partner) => partner,
        Err(res) => return res,
    };

    match order_repository::find_many(
        &ctx.db_conn.pool,
        pagination,
        order_repository::Filters {
            delivery_partner_id: Some(partner.id),
            status: filters.status,
            ..Default::default()
        },
    )
    .await
    {
        Ok(orders) => (StatusCode::OK, Json(json!(orders))).into_response(),
        Err(_) => error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch orders"),
    }
}

async fn get_earnings(State(ctx): State<Arc<Context>>, auth: Auth) -> Response {
    let partner = match find_partner(&ctx, &auth).await {
        Ok(partner) => partner,
        Err(res) => return res,
    };

    let local_midnight = time::start_of_local_day(Utc::now(), ctx.order.utc_offset);

    let Some(since) = local_midnight else {
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to compute earnings",
        );
    };

    match repository::find_earnings(&ctx.db_conn.pool, &partner.id, since).await {
        Ok(earnings) => (StatusCode::OK, Json(json!(earnings))).into_response(),
        Err(_) => error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to compute earnings",
        ),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/status", patch(update_status))
        .route("/location", patch(update_location))
        .route("/orders", get(get_orders))
        .route("/orders/available", get(get_available_orders))
        .route("/orders/:id/accept", post(accept_order))
        .route("/earnings", get(get_earnings))
}
