use super::dispatch::{PartnerPool, Point};
use super::repository::{self as delivery_repository, DeliveryPartner};
use crate::{
    modules::{
        notification::service::{self as notification, Notification, ALL_BACKENDS},
        order::{repository::{self as order_repository, Order, OrderStatus}, service as order_service},
        realtime::hub::events,
        restaurant,
    },
    types::Context,
};
use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug)]
pub enum AssignError {
    OrderNotFound,
    PartnerNotFound,
    OrderUnavailable,
    PartnerUnavailable,
    UnexpectedError,
}

impl IntoResponse for AssignError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            Self::OrderNotFound => (StatusCode::NOT_FOUND, "Order not found"),
            Self::PartnerNotFound => (StatusCode::NOT_FOUND, "Delivery partner not found"),
            Self::OrderUnavailable => (
                StatusCode::CONFLICT,
                "Order is not ready or already has a delivery partner",
            ),
            Self::PartnerUnavailable => (
                StatusCode::CONFLICT,
                "Delivery partner is not available",
            ),
            Self::UnexpectedError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to assign delivery partner",
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Atomically reserves `partner` and attaches them to the order. Either both
/// writes land or neither does.
async fn claim(
    ctx: &Context,
    order_id: &str,
    partner: &DeliveryPartner,
) -> Result<Order, AssignError> {
    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to start dispatch transaction: {}", err);
        AssignError::UnexpectedError
    })?;

    delivery_repository::reserve(&mut *tx, &partner.id)
        .await
        .map_err(|_| AssignError::UnexpectedError)?
        .ok_or(AssignError::PartnerUnavailable)?;

    let order = order_repository::claim(&mut *tx, order_id, &partner.id)
        .await
        .map_err(|_| AssignError::UnexpectedError)?
        .ok_or(AssignError::OrderUnavailable)?;

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit dispatch of order {}: {}", order_id, err);
        AssignError::UnexpectedError
    })?;

    Ok(order)
}

fn announce(ctx: Arc<Context>, order: &Order, partner: &DeliveryPartner) {
    order_service::broadcast(
        &ctx,
        events::ORDER_ASSIGNED,
        order,
        Some(&partner.user_id),
    );

    notification::dispatch(
        ctx,
        Notification::order_assigned(order.clone(), partner.user_id.clone()),
        &ALL_BACKENDS,
    );
}

async fn assign_nearest(
    ctx: Arc<Context>,
    order_id: &str,
    origin: Point,
    pool: &mut PartnerPool,
) -> Result<Option<DeliveryPartner>, AssignError> {
    for candidate in pool.rank(origin, ctx.order.dispatch_radius_km) {
        match claim(&ctx, order_id, &candidate.partner).await {
            Ok(order) => {
                tracing::info!(
                    "Order {} dispatched to partner {} ({:.2} km away)",
                    order_id,
                    candidate.partner.id,
                    candidate.distance_km
                );
                pool.remove(&candidate.partner.id);
                announce(ctx.clone(), &order, &candidate.partner);
                return Ok(Some(candidate.partner));
            }
            Err(AssignError::PartnerUnavailable) => pool.remove(&candidate.partner.id),
            Err(AssignError::OrderUnavailable) => return Ok(None),
            Err(err) => return Err(err),
        }
    }

    tracing::info!("No delivery partner available for order {}, leaving it open", order_id);
    Ok(None)
}

async fn load_pool(ctx: &Context) -> Result<PartnerPool, AssignError> {
    delivery_repository::find_available(&ctx.db_conn.pool)
        .await
        .map(PartnerPool::new)
        .map_err(|_| AssignError::UnexpectedError)
}

/// Hands a READY order to the nearest available partner. An order nobody can
/// take stays in the open pool for the retry job or a manual accept.
pub async fn auto_assign(
    ctx: Arc<Context>,
    order_id: String,
) -> Result<Option<DeliveryPartner>, AssignError> {
    let order = order_repository::find_by_id(&ctx.db_conn.pool, &order_id)
        .await
        .map_err(|_| AssignError::UnexpectedError)?
        .ok_or(AssignError::OrderNotFound)?;

    if order.status != OrderStatus::Ready || order.delivery_partner_id.is_some() {
        return Ok(None);
    }

    let restaurant = restaurant::repository::find_by_id(&ctx.db_conn.pool, &order.restaurant_id)
        .await
        .map_err(|_| AssignError::UnexpectedError)?
        .ok_or(AssignError::OrderNotFound)?;

    let mut pool = load_pool(&ctx).await?;
    assign_nearest(ctx, &order_id, Point::new(restaurant.lat, restaurant.lng), &mut pool).await
}

const DISPATCH_PAGE_SIZE: i64 = 50;

/// Retries dispatch for every open order, least recently tried first. Each
/// order is tried at most once per run. Returns how many got a partner.
pub async fn dispatch_open_orders(ctx: Arc<Context>) -> Result<usize, AssignError> {
    let started_at = Utc::now();
    let mut pool = load_pool(&ctx).await?;
    let mut assigned = 0;

    while !pool.is_empty() {
        let page = order_repository::find_dispatchable(&ctx.db_conn.pool, started_at, DISPATCH_PAGE_SIZE)
            .await
            .map_err(|_| AssignError::UnexpectedError)?;

        if page.is_empty() {
            break;
        }

        let ids = page
            .iter()
            .map(|open_order| open_order.order.id.clone())
            .collect::<Vec<_>>();
        order_repository::mark_dispatch_attempted(&ctx.db_conn.pool, &ids, started_at)
            .await
            .map_err(|_| AssignError::UnexpectedError)?;

        for open_order in page {
            if pool.is_empty() {
                break;
            }

            let origin = Point::new(open_order.restaurant_lat, open_order.restaurant_lng);
            if assign_nearest(ctx.clone(), &open_order.order.id, origin, &mut pool)
                .await?
                .is_some()
            {
                assigned += 1;
            }
        }
    }

    Ok(assigned)
}

/// A partner picks an open order themselves.
pub async fn accept(
    ctx: Arc<Context>,
    partner: &DeliveryPartner,
    order_id: &str,
) -> Result<Order, AssignError> {
    let order = claim(&ctx, order_id, partner).await?;
    tracing::info!("Order {} accepted by partner {}", order_id, partner.id);
    announce(ctx, &order, partner);
    Ok(order)
}

/// Admin override onto a specific partner.
pub async fn assign(
    ctx: Arc<Context>,
    order_id: &str,
    partner_id: &str,
) -> Result<Order, AssignError> {
    order_repository::find_by_id(&ctx.db_conn.pool, order_id)
        .await
        .map_err(|_| AssignError::UnexpectedError)?
        .ok_or(AssignError::OrderNotFound)?;

    let partner = delivery_repository::find_by_id(&ctx.db_conn.pool, partner_id)
        .await
        .map_err(|_| AssignError::UnexpectedError)?
        .ok_or(AssignError::PartnerNotFound)?;

    let order = claim(&ctx, order_id, &partner).await?;
    tracing::info!("Order {} assigned to partner {} by an admin", order_id, partner.id);
    announce(ctx, &order, &partner);
    Ok(order)
}
