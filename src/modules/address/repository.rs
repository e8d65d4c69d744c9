use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use ulid::Ulid;

#[derive(Serialize, Deserialize, Clone, Debug, sqlx::FromRow)]
pub struct Address {
    pub id: String,
    pub owner_id: String,
    pub label: String,
    pub line1: String,
    pub line2: Option<String>,
    pub landmark: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub location_id: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

pub struct CreateAddressPayload {
    pub owner_id: String,
    pub label: String,
    pub line1: String,
    pub line2: Option<String>,
    pub landmark: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub location_id: Option<String>,
    pub is_default: bool,
}

pub async fn create<'e, E: PgExecutor<'e>>(
    e: E,
    payload: CreateAddressPayload,
) -> Result<Address, Error> {
    sqlx::query_as::<_, Address>(
        "
        INSERT INTO addresses (
            id,
            owner_id,
            label,
            line1,
            line2,
            landmark,
            lat,
            lng,
            location_id,
            is_default
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.owner_id)
    .bind(payload.label)
    .bind(payload.line1)
    .bind(payload.line2)
    .bind(payload.landmark)
    .bind(payload.lat)
    .bind(payload.lng)
    .bind(payload.location_id)
    .bind(payload.is_default)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while creating an address: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: &str) -> Result<Option<Address>, Error> {
    sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE id = $1")
        .bind(id)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching address {}: {}", id, err);
            Error::UnexpectedError
        })
}

pub async fn find_many_by_owner_id<'e, E: PgExecutor<'e>>(
    e: E,
    owner_id: &str,
) -> Result<Vec<Address>, Error> {
    sqlx::query_as::<_, Address>(
        "SELECT * FROM addresses WHERE owner_id = $1 ORDER BY is_default DESC, created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching addresses of {}: {}", owner_id, err);
        Error::UnexpectedError
    })
}

pub async fn count_by_owner_id<'e, E: PgExecutor<'e>>(e: E, owner_id: &str) -> Result<i64, Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM addresses WHERE owner_id = $1")
        .bind(owner_id)
        .fetch_one(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while counting addresses of {}: {}", owner_id, err);
            Error::UnexpectedError
        })
}

pub async fn clear_default<'e, E: PgExecutor<'e>>(e: E, owner_id: &str) -> Result<(), Error> {
    sqlx::query("UPDATE addresses SET is_default = FALSE WHERE owner_id = $1 AND is_default")
        .bind(owner_id)
        .execute(e)
        .await
        .map(|_| ())
        .map_err(|err| {
            tracing::error!("Error occurred while clearing default address of {}: {}", owner_id, err);
            Error::UnexpectedError
        })
}

pub struct UpdateAddressPayload {
    pub label: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub landmark: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub location_id: Option<String>,
    pub is_default: Option<bool>,
}

pub async fn update_by_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    owner_id: &str,
    payload: UpdateAddressPayload,
) -> Result<Option<Address>, Error> {
    sqlx::query_as::<_, Address>(
        "
        UPDATE addresses SET
            label = COALESCE($3, label),
            line1 = COALESCE($4, line1),
            line2 = COALESCE($5, line2),
            landmark = COALESCE($6, landmark),
            lat = COALESCE($7, lat),
            lng = COALESCE($8, lng),
            location_id = COALESCE($9, location_id),
            is_default = COALESCE($10, is_default),
            updated_at = NOW()
        WHERE id = $1 AND owner_id = $2
        RETURNING *
        ",
    )
    .bind(id)
    .bind(owner_id)
    .bind(payload.label)
    .bind(payload.line1)
    .bind(payload.line2)
    .bind(payload.landmark)
    .bind(payload.lat)
    .bind(payload.lng)
    .bind(payload.location_id)
    .bind(payload.is_default)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while updating address {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn delete_by_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    owner_id: &str,
) -> Result<bool, Error> {
    sqlx::query("DELETE FROM addresses WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(e)
        .await
        .map(|result| result.rows_affected() > 0)
        .map_err(|err| {
            tracing::error!("Error occurred while deleting address {}: {}", id, err);
            Error::UnexpectedError
        })
}
