use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use ulid::Ulid;

use crate::utils::pagination::{Paginated, Pagination};

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct Restaurant {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub address: String,
    pub phone_number: String,
    pub cuisine: String,
    pub opening_time: String,
    pub closing_time: String,
    pub lat: f64,
    pub lng: f64,
    pub location_id: Option<String>,
    pub min_order_amount: BigDecimal,
    pub is_open: bool,
    pub is_active: bool,
    pub rating: BigDecimal,
    pub reviews_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

type Result<T> = std::result::Result<T, Error>;

pub struct CreateRestaurantPayload {
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub address: String,
    pub phone_number: String,
    pub cuisine: String,
    pub opening_time: String,
    pub closing_time: String,
    pub lat: f64,
    pub lng: f64,
    pub location_id: Option<String>,
    pub min_order_amount: BigDecimal,
}

pub async fn create<'e, E: PgExecutor<'e>>(
    e: E,
    payload: CreateRestaurantPayload,
) -> Result<Restaurant> {
    sqlx::query_as::<_, Restaurant>(
        "
        INSERT INTO restaurants (
            id,
            owner_id,
            name,
            description,
            address,
            phone_number,
            cuisine,
            opening_time,
            closing_time,
            lat,
            lng,
            location_id,
            min_order_amount
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.owner_id)
    .bind(payload.name)
    .bind(payload.description)
    .bind(payload.address)
    .bind(payload.phone_number)
    .bind(payload.cuisine)
    .bind(payload.opening_time)
    .bind(payload.closing_time)
    .bind(payload.lat)
    .bind(payload.lng)
    .bind(payload.location_id)
    .bind(payload.min_order_amount)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while creating a restaurant: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: &str) -> Result<Option<Restaurant>> {
    sqlx::query_as::<_, Restaurant>("SELECT * FROM restaurants WHERE id = $1")
        .bind(id)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching restaurant {}: {}", id, err);
            Error::UnexpectedError
        })
}

pub async fn find_by_owner_id<'e, E: PgExecutor<'e>>(
    e: E,
    owner_id: &str,
) -> Result<Option<Restaurant>> {
    sqlx::query_as::<_, Restaurant>("SELECT * FROM restaurants WHERE owner_id = $1")
        .bind(owner_id)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while fetching restaurant of owner {}: {}",
                owner_id,
                err
            );
            Error::UnexpectedError
        })
}

pub struct Filters {
    pub location_id: Option<String>,
    pub cuisine: Option<String>,
    /// Local time of day (`HH:MM`) to evaluate operating hours against.
    pub open_at: Option<String>,
}

// Times are zero padded HH:MM so byte-wise comparison orders them correctly.
const FILTERS: &str = "
    is_active = TRUE
    AND ($1::TEXT IS NULL OR location_id = $1)
    AND ($2::TEXT IS NULL OR LOWER(cuisine) = LOWER($2))
    AND (
        $3::TEXT IS NULL
        OR (
            is_open = TRUE
            AND (
                opening_time = closing_time
                OR (
                    opening_time < closing_time
                    AND $3 COLLATE \"C\" >= opening_time
                    AND $3 COLLATE \"C\" < closing_time
                )
                OR (
                    opening_time > closing_time
                    AND ($3 COLLATE \"C\" >= opening_time OR $3 COLLATE \"C\" < closing_time)
                )
            )
        )
    )
";

pub async fn find_many(
    db: &PgPool,
    pagination: Pagination,
    filters: Filters,
) -> Result<Paginated<Restaurant>> {
    let restaurants = sqlx::query_as::<_, Restaurant>(&format!(
        "
        SELECT * FROM restaurants
        WHERE {FILTERS}
        ORDER BY rating DESC, created_at DESC
        LIMIT $4 OFFSET $5
        "
    ))
    .bind(&filters.location_id)
    .bind(&filters.cuisine)
    .bind(&filters.open_at)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(db)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching restaurants: {}", err);
        Error::UnexpectedError
    })?;

    let total = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT COUNT(*) FROM restaurants WHERE {FILTERS}"
    ))
    .bind(&filters.location_id)
    .bind(&filters.cuisine)
    .bind(&filters.open_at)
    .fetch_one(db)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while counting restaurants: {}", err);
        Error::UnexpectedError
    })?;

    Ok(pagination.paginate(restaurants, total))
}

#[derive(Default)]
pub struct UpdateRestaurantPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub cuisine: Option<String>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub location_id: Option<String>,
    pub min_order_amount: Option<BigDecimal>,
    pub is_open: Option<bool>,
    pub is_active: Option<bool>,
}

pub async fn update_by_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    payload: UpdateRestaurantPayload,
) -> Result<Option<Restaurant>> {
    sqlx::query_as::<_, Restaurant>(
        "
        UPDATE restaurants SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            address = COALESCE($4, address),
            phone_number = COALESCE($5, phone_number),
            cuisine = COALESCE($6, cuisine),
            opening_time = COALESCE($7, opening_time),
            closing_time = COALESCE($8, closing_time),
            lat = COALESCE($9, lat),
            lng = COALESCE($10, lng),
            location_id = COALESCE($11, location_id),
            min_order_amount = COALESCE($12, min_order_amount),
            is_open = COALESCE($13, is_open),
            is_active = COALESCE($14, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(payload.name)
    .bind(payload.description)
    .bind(payload.address)
    .bind(payload.phone_number)
    .bind(payload.cuisine)
    .bind(payload.opening_time)
    .bind(payload.closing_time)
    .bind(payload.lat)
    .bind(payload.lng)
    .bind(payload.location_id)
    .bind(payload.min_order_amount)
    .bind(payload.is_open)
    .bind(payload.is_active)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while updating restaurant {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn refresh_rating<'e, E: PgExecutor<'e>>(e: E, id: &str) -> Result<()> {
    sqlx::query(
        "
        UPDATE restaurants SET
            rating = COALESCE((SELECT ROUND(AVG(rating), 2) FROM reviews WHERE restaurant_id = $1), 0),
            reviews_count = (SELECT COUNT(*) FROM reviews WHERE restaurant_id = $1),
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .execute(e)
    .await
    .map(|_| ())
    .map_err(|err| {
        tracing::error!("Error occurred while refreshing rating of restaurant {}: {}", id, err);
        Error::UnexpectedError
    })
}
