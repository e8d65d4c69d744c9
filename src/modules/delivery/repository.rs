use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use ulid::Ulid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "delivery_partner_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryPartnerStatus {
    Available,
    Busy,
    Offline,
}

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct DeliveryPartner {
    pub id: String,
    pub user_id: String,
    pub vehicle_type: String,
    pub status: DeliveryPartnerStatus,
    pub earnings: BigDecimal,
    pub total_deliveries: i32,
    pub current_lat: Option<f64>,
    pub current_lng: Option<f64>,
    pub location_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct Earnings {
    pub earnings: BigDecimal,
    pub total_deliveries: i32,
    pub today: BigDecimal,
    pub deliveries_today: i64,
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

type Result<T> = std::result::Result<T, Error>;

pub async fn create<'e, E: PgExecutor<'e>>(e: E, user_id: &str) -> Result<DeliveryPartner> {
    sqlx::query_as::<_, DeliveryPartner>(
        "INSERT INTO delivery_partners (id, user_id) VALUES ($1, $2) RETURNING *",
    )
    .bind(Ulid::new().to_string())
    .bind(user_id)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while creating delivery partner for {}: {}", user_id, err);
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: &str) -> Result<Option<DeliveryPartner>> {
    sqlx::query_as::<_, DeliveryPartner>("SELECT * FROM delivery_partners WHERE id = $1")
        .bind(id)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching delivery partner {}: {}", id, err);
            Error::UnexpectedError
        })
}

pub async fn find_by_user_id<'e, E: PgExecutor<'e>>(
    e: E,
    user_id: &str,
) -> Result<Option<DeliveryPartner>> {
    sqlx::query_as::<_, DeliveryPartner>("SELECT * FROM delivery_partners WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching delivery partner of {}: {}", user_id, err);
            Error::UnexpectedError
        })
}

pub async fn find_available<'e, E: PgExecutor<'e>>(e: E) -> Result<Vec<DeliveryPartner>> {
    sqlx::query_as::<_, DeliveryPartner>(
        "
        SELECT * FROM delivery_partners
        WHERE status = 'AVAILABLE' AND current_lat IS NOT NULL AND current_lng IS NOT NULL
        ",
    )
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching available delivery partners: {}", err);
        Error::UnexpectedError
    })
}

/// Flips an AVAILABLE partner to BUSY. Returns `None` if they were not available.
pub async fn reserve<'e, E: PgExecutor<'e>>(e: E, id: &str) -> Result<Option<DeliveryPartner>> {
    sqlx::query_as::<_, DeliveryPartner>(
        "
        UPDATE delivery_partners SET status = 'BUSY', updated_at = NOW()
        WHERE id = $1 AND status = 'AVAILABLE'
        RETURNING *
        ",
    )
    .bind(id)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while reserving delivery partner {}: {}", id, err);
        Error::UnexpectedError
    })
}

/// Switches between AVAILABLE and OFFLINE. A BUSY partner is left untouched.
pub async fn set_availability<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    status: DeliveryPartnerStatus,
) -> Result<Option<DeliveryPartner>> {
    sqlx::query_as::<_, DeliveryPartner>(
        "
        UPDATE delivery_partners SET status = $2, updated_at = NOW()
        WHERE id = $1 AND status <> 'BUSY'
        RETURNING *
        ",
    )
    .bind(id)
    .bind(status)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while updating status of partner {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn update_location<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    lat: f64,
    lng: f64,
) -> Result<DeliveryPartner> {
    sqlx::query_as::<_, DeliveryPartner>(
        "
        UPDATE delivery_partners SET
            current_lat = $2,
            current_lng = $3,
            location_updated_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(lat)
    .bind(lng)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while updating location of partner {}: {}", id, err);
        Error::UnexpectedError
    })
}

/// Credits a finished delivery and frees the partner.
pub async fn complete_delivery<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    fee: &BigDecimal,
) -> Result<()> {
    sqlx::query(
        "
        UPDATE delivery_partners SET
            earnings = earnings + $2,
            total_deliveries = total_deliveries + 1,
            status = 'AVAILABLE',
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(fee)
    .execute(e)
    .await
    .map(|_| ())
    .map_err(|err| {
        tracing::error!("Error occurred while crediting delivery partner {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn find_earnings<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    since: DateTime<Utc>,
) -> Result<Earnings> {
    sqlx::query_as::<_, Earnings>(
        "
        SELECT
            delivery_partners.earnings,
            delivery_partners.total_deliveries,
            COALESCE(SUM(orders.delivery_fee), 0) AS today,
            COUNT(orders.id) AS deliveries_today
        FROM delivery_partners
        LEFT JOIN orders
            ON orders.delivery_partner_id = delivery_partners.id
            AND orders.status = 'DELIVERED'
            AND orders.delivered_at >= $2
        WHERE delivery_partners.id = $1
        GROUP BY delivery_partners.id
        ",
    )
    .bind(id)
    .bind(since)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while computing earnings of partner {}: {}", id, err);
        Error::UnexpectedError
    })
}
