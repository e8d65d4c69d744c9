use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use std::fmt;
use ulid::Ulid;

use crate::utils::pagination::{Paginated, Pagination};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    PickedUp,
    OutForDelivery,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::PickedUp,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Online,
    CashOnDelivery,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub menu_item_id: String,
    pub name: String,
    pub price: BigDecimal,
    pub quantity: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DeliveryAddress {
    pub address_id: String,
    pub label: String,
    pub line1: String,
    pub line2: Option<String>,
    pub landmark: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub location_id: Option<String>,
}

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub restaurant_id: String,
    pub delivery_partner_id: Option<String>,
    pub delivery_address: Json<DeliveryAddress>,
    pub items: Json<Vec<OrderItem>>,
    pub sub_total: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub total: BigDecimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    #[serde(skip_serializing)]
    pub gateway_payment_id: Option<String>,
    #[serde(skip_serializing)]
    pub gateway_refund_id: Option<String>,
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    pub verification_code_generated_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub cancellation_reason: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub dispatch_attempted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct OrderStatusHistory {
    pub id: String,
    pub order_id: String,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub changed_by: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A READY order nobody has claimed yet, with the pickup point.
#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct OpenOrder {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub restaurant_name: String,
    pub restaurant_lat: f64,
    pub restaurant_lng: f64,
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

type Result<T> = std::result::Result<T, Error>;

pub struct CreateOrderPayload {
    pub customer_id: String,
    pub restaurant_id: String,
    pub delivery_address: DeliveryAddress,
    pub items: Vec<OrderItem>,
    pub sub_total: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub total: BigDecimal,
    pub payment_method: PaymentMethod,
    pub notes: String,
}

pub async fn create<'e, E: PgExecutor<'e>>(e: E, payload: CreateOrderPayload) -> Result<Order> {
    sqlx::query_as::<_, Order>(
        "
        INSERT INTO orders (
            id,
            customer_id,
            restaurant_id,
            delivery_address,
            items,
            sub_total,
            delivery_fee,
            total,
            payment_method,
            notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.customer_id)
    .bind(payload.restaurant_id)
    .bind(Json(payload.delivery_address))
    .bind(Json(payload.items))
    .bind(payload.sub_total)
    .bind(payload.delivery_fee)
    .bind(payload.total)
    .bind(payload.payment_method)
    .bind(payload.notes)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while creating an order: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: &str) -> Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching order {}: {}", id, err);
            Error::UnexpectedError
        })
}

#[derive(Default)]
pub struct Filters {
    pub customer_id: Option<String>,
    pub restaurant_id: Option<String>,
    pub delivery_partner_id: Option<String>,
    pub status: Option<OrderStatus>,
}

const FILTERS: &str = "
    ($1::VARCHAR IS NULL OR customer_id = $1)
    AND ($2::VARCHAR IS NULL OR restaurant_id = $2)
    AND ($3::VARCHAR IS NULL OR delivery_partner_id = $3)
    AND ($4::order_status IS NULL OR status = $4)
";

pub async fn find_many(db: &PgPool, pagination: Pagination, filters: Filters) -> Result<Paginated<Order>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "
        SELECT * FROM orders
        WHERE {FILTERS}
        ORDER BY created_at DESC
        LIMIT $5 OFFSET $6
        "
    ))
    .bind(&filters.customer_id)
    .bind(&filters.restaurant_id)
    .bind(&filters.delivery_partner_id)
    .bind(filters.status)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(db)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching orders: {}", err);
        Error::UnexpectedError
    })?;

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM orders WHERE {FILTERS}"))
        .bind(&filters.customer_id)
        .bind(&filters.restaurant_id)
        .bind(&filters.delivery_partner_id)
        .bind(filters.status)
        .fetch_one(db)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while counting orders: {}", err);
            Error::UnexpectedError
        })?;

    Ok(pagination.paginate(orders, total))
}

#[derive(Default, Debug, PartialEq)]
pub struct StatusUpdate {
    pub payment_status: Option<PaymentStatus>,
    pub verification_code: Option<String>,
    pub verification_code_generated_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Compare-and-set on the status column. Returns `None` when the order is
/// no longer in `expected`.
pub async fn update_status_if<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    expected: OrderStatus,
    status: OrderStatus,
    update: StatusUpdate,
) -> Result<Option<Order>> {
    sqlx::query_as::<_, Order>(
        "
        UPDATE orders SET
            status = $3,
            payment_status = COALESCE($4, payment_status),
            verification_code = COALESCE($5, verification_code),
            verification_code_generated_at = COALESCE($6, verification_code_generated_at),
            cancellation_reason = COALESCE($7, cancellation_reason),
            delivered_at = COALESCE($8, delivered_at),
            updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING *
        ",
    )
    .bind(id)
    .bind(expected)
    .bind(status)
    .bind(update.payment_status)
    .bind(update.verification_code)
    .bind(update.verification_code_generated_at)
    .bind(update.cancellation_reason)
    .bind(update.delivered_at)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while updating status of order {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn set_verification_code<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    code: &str,
    generated_at: DateTime<Utc>,
) -> Result<Option<Order>> {
    sqlx::query_as::<_, Order>(
        "
        UPDATE orders SET
            verification_code = $2,
            verification_code_generated_at = $3,
            updated_at = NOW()
        WHERE id = $1 AND status IN ('PICKED_UP', 'OUT_FOR_DELIVERY')
        RETURNING *
        ",
    )
    .bind(id)
    .bind(code)
    .bind(generated_at)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while reissuing code for order {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn set_gateway_order_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    gateway_order_id: &str,
) -> Result<Option<Order>> {
    sqlx::query_as::<_, Order>(
        "
        UPDATE orders SET gateway_order_id = $2, updated_at = NOW()
        WHERE id = $1 AND payment_status = 'PENDING'
        RETURNING *
        ",
    )
    .bind(id)
    .bind(gateway_order_id)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while storing gateway order of {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn set_gateway_refund_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    gateway_refund_id: &str,
) -> Result<Option<Order>> {
    sqlx::query_as::<_, Order>(
        "
        UPDATE orders SET gateway_refund_id = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(gateway_refund_id)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while storing gateway refund of {}: {}", id, err);
        Error::UnexpectedError
    })
}

/// Only a PENDING payment can be settled, so a replayed verification is a no-op.
/// The order status is left alone: a payment captured after cancellation is
/// still recorded so it can be refunded.
pub async fn mark_paid<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    gateway_payment_id: &str,
) -> Result<Option<Order>> {
    sqlx::query_as::<_, Order>(
        "
        UPDATE orders SET
            payment_status = 'PAID',
            gateway_payment_id = $2,
            updated_at = NOW()
        WHERE id = $1 AND payment_status = 'PENDING'
        RETURNING *
        ",
    )
    .bind(id)
    .bind(gateway_payment_id)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while marking order {} as paid: {}", id, err);
        Error::UnexpectedError
    })
}

/// Claims an open READY order for a partner. Returns `None` if someone else
/// got there first.
pub async fn claim<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    delivery_partner_id: &str,
) -> Result<Option<Order>> {
    sqlx::query_as::<_, Order>(
        "
        UPDATE orders SET delivery_partner_id = $2, updated_at = NOW()
        WHERE id = $1 AND delivery_partner_id IS NULL AND status = 'READY'
        RETURNING *
        ",
    )
    .bind(id)
    .bind(delivery_partner_id)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while claiming order {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn find_open<'e, E: PgExecutor<'e>>(e: E, limit: i64) -> Result<Vec<OpenOrder>> {
    sqlx::query_as::<_, OpenOrder>(
        "
        SELECT
            orders.*,
            restaurants.name AS restaurant_name,
            restaurants.lat AS restaurant_lat,
            restaurants.lng AS restaurant_lng
        FROM orders
        INNER JOIN restaurants ON restaurants.id = orders.restaurant_id
        WHERE orders.status = 'READY' AND orders.delivery_partner_id IS NULL
        ORDER BY orders.updated_at ASC NULLS FIRST
        LIMIT $1
        ",
    )
    .bind(limit)
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching open orders: {}", err);
        Error::UnexpectedError
    })
}

/// Open orders the dispatch run has not tried since `attempted_before`,
/// least recently tried first.
pub async fn find_dispatchable<'e, E: PgExecutor<'e>>(
    e: E,
    attempted_before: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<OpenOrder>> {
    sqlx::query_as::<_, OpenOrder>(
        "
        SELECT
            orders.*,
            restaurants.name AS restaurant_name,
            restaurants.lat AS restaurant_lat,
            restaurants.lng AS restaurant_lng
        FROM orders
        INNER JOIN restaurants ON restaurants.id = orders.restaurant_id
        WHERE orders.status = 'READY'
            AND orders.delivery_partner_id IS NULL
            AND (orders.dispatch_attempted_at IS NULL OR orders.dispatch_attempted_at < $1)
        ORDER BY orders.dispatch_attempted_at ASC NULLS FIRST, orders.created_at ASC, orders.id ASC
        LIMIT $2
        ",
    )
    .bind(attempted_before)
    .bind(limit)
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching dispatchable orders: {}", err);
        Error::UnexpectedError
    })
}

pub async fn mark_dispatch_attempted<'e, E: PgExecutor<'e>>(
    e: E,
    ids: &[String],
    attempted_at: DateTime<Utc>,
) -> Result<u64> {
    sqlx::query("UPDATE orders SET dispatch_attempted_at = $2 WHERE id = ANY($1)")
        .bind(ids)
        .bind(attempted_at)
        .execute(e)
        .await
        .map(|res| res.rows_affected())
        .map_err(|err| {
            tracing::error!("Error occurred while marking dispatch attempts: {}", err);
            Error::UnexpectedError
        })
}

pub async fn find_active_ids_by_delivery_partner_id<'e, E: PgExecutor<'e>>(
    e: E,
    delivery_partner_id: &str,
) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        "
        SELECT id FROM orders
        WHERE delivery_partner_id = $1 AND status IN ('READY', 'PICKED_UP', 'OUT_FOR_DELIVERY')
        ",
    )
    .bind(delivery_partner_id)
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while fetching active orders of partner {}: {}",
            delivery_partner_id,
            err
        );
        Error::UnexpectedError
    })
}

pub struct CreateHistoryPayload {
    pub order_id: String,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub changed_by: String,
    pub note: Option<String>,
}

pub async fn create_history<'e, E: PgExecutor<'e>>(
    e: E,
    payload: CreateHistoryPayload,
) -> Result<OrderStatusHistory> {
    sqlx::query_as::<_, OrderStatusHistory>(
        "
        INSERT INTO order_status_history (id, order_id, from_status, to_status, changed_by, note)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(&payload.order_id)
    .bind(payload.from_status)
    .bind(payload.to_status)
    .bind(payload.changed_by)
    .bind(payload.note)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while recording history of order {}: {}",
            payload.order_id,
            err
        );
        Error::UnexpectedError
    })
}

pub async fn find_history<'e, E: PgExecutor<'e>>(
    e: E,
    order_id: &str,
) -> Result<Vec<OrderStatusHistory>> {
    sqlx::query_as::<_, OrderStatusHistory>(
        "SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(order_id)
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching history of order {}: {}", order_id, err);
        Error::UnexpectedError
    })
}
