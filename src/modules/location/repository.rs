use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use ulid::Ulid;

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub city: String,
    pub delivery_fee: BigDecimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

pub struct CreateLocationPayload {
    pub name: String,
    pub city: String,
    pub delivery_fee: BigDecimal,
}

pub async fn create<'e, E: PgExecutor<'e>>(
    e: E,
    payload: CreateLocationPayload,
) -> Result<Location, Error> {
    sqlx::query_as::<_, Location>(
        "
        INSERT INTO locations (id, name, city, delivery_fee)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.name)
    .bind(payload.city)
    .bind(payload.delivery_fee)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while creating a location: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: &str) -> Result<Option<Location>, Error> {
    sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = $1")
        .bind(id)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching location {}: {}", id, err);
            Error::UnexpectedError
        })
}

pub async fn find_active<'e, E: PgExecutor<'e>>(e: E) -> Result<Vec<Location>, Error> {
    sqlx::query_as::<_, Location>(
        "SELECT * FROM locations WHERE is_active = TRUE ORDER BY city ASC, name ASC",
    )
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching active locations: {}", err);
        Error::UnexpectedError
    })
}

pub struct UpdateLocationPayload {
    pub name: Option<String>,
    pub city: Option<String>,
    pub delivery_fee: Option<BigDecimal>,
    pub is_active: Option<bool>,
}

pub async fn update_by_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    payload: UpdateLocationPayload,
) -> Result<Option<Location>, Error> {
    sqlx::query_as::<_, Location>(
        "
        UPDATE locations SET
            name = COALESCE($2, name),
            city = COALESCE($3, city),
            delivery_fee = COALESCE($4, delivery_fee),
            is_active = COALESCE($5, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(payload.name)
    .bind(payload.city)
    .bind(payload.delivery_fee)
    .bind(payload.is_active)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while updating location {}: {}", id, err);
        Error::UnexpectedError
    })
}

/// Zones are soft-deleted so that historical addresses keep their reference.
pub async fn deactivate_by_id<'e, E: PgExecutor<'e>>(e: E, id: &str) -> Result<bool, Error> {
    sqlx::query("UPDATE locations SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(e)
        .await
        .map(|result| result.rows_affected() > 0)
        .map_err(|err| {
            tracing::error!("Error occurred while deactivating location {}: {}", id, err);
            Error::UnexpectedError
        })
}
