use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use ulid::Ulid;

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct MenuItem {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub description: String,
    pub price: BigDecimal,
    pub category: String,
    pub is_veg: bool,
    pub is_available: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

type Result<T> = std::result::Result<T, Error>;

pub struct CreateMenuItemPayload {
    pub restaurant_id: String,
    pub name: String,
    pub description: String,
    pub price: BigDecimal,
    pub category: String,
    pub is_veg: bool,
    pub image_url: Option<String>,
}

pub async fn create<'e, E: PgExecutor<'e>>(e: E, payload: CreateMenuItemPayload) -> Result<MenuItem> {
    sqlx::query_as::<_, MenuItem>(
        "
        INSERT INTO menu_items (id, restaurant_id, name, description, price, category, is_veg, image_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.restaurant_id)
    .bind(payload.name)
    .bind(payload.description)
    .bind(payload.price)
    .bind(payload.category)
    .bind(payload.is_veg)
    .bind(payload.image_url)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while creating a menu item: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: &str) -> Result<Option<MenuItem>> {
    sqlx::query_as::<_, MenuItem>("SELECT * FROM menu_items WHERE id = $1")
        .bind(id)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching menu item {}: {}", id, err);
            Error::UnexpectedError
        })
}

pub async fn find_many_by_restaurant_id<'e, E: PgExecutor<'e>>(
    e: E,
    restaurant_id: &str,
    include_unavailable: bool,
) -> Result<Vec<MenuItem>> {
    sqlx::query_as::<_, MenuItem>(
        "
        SELECT * FROM menu_items
        WHERE restaurant_id = $1 AND ($2 OR is_available = TRUE)
        ORDER BY category ASC, name ASC
        ",
    )
    .bind(restaurant_id)
    .bind(include_unavailable)
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching menu of {}: {}", restaurant_id, err);
        Error::UnexpectedError
    })
}

pub async fn find_many_by_ids<'e, E: PgExecutor<'e>>(
    e: E,
    restaurant_id: &str,
    ids: &[String],
) -> Result<Vec<MenuItem>> {
    sqlx::query_as::<_, MenuItem>(
        "SELECT * FROM menu_items WHERE restaurant_id = $1 AND id = ANY($2)",
    )
    .bind(restaurant_id)
    .bind(ids)
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching ordered menu items: {}", err);
        Error::UnexpectedError
    })
}

pub struct UpdateMenuItemPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<BigDecimal>,
    pub category: Option<String>,
    pub is_veg: Option<bool>,
    pub is_available: Option<bool>,
    pub image_url: Option<String>,
}

pub async fn update_by_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    payload: UpdateMenuItemPayload,
) -> Result<Option<MenuItem>> {
    sqlx::query_as::<_, MenuItem>(
        "
        UPDATE menu_items SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            price = COALESCE($4, price),
            category = COALESCE($5, category),
            is_veg = COALESCE($6, is_veg),
            is_available = COALESCE($7, is_available),
            image_url = COALESCE($8, image_url),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(payload.name)
    .bind(payload.description)
    .bind(payload.price)
    .bind(payload.category)
    .bind(payload.is_veg)
    .bind(payload.is_available)
    .bind(payload.image_url)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while updating menu item {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn delete_by_id<'e, E: PgExecutor<'e>>(e: E, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM menu_items WHERE id = $1")
        .bind(id)
        .execute(e)
        .await
        .map(|_| ())
        .map_err(|err| {
            tracing::error!("Error occurred while deleting menu item {}: {}", id, err);
            Error::UnexpectedError
        })
}
