use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use ulid::Ulid;

use crate::utils::pagination::{Paginated, Pagination};

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct Review {
    pub id: String,
    pub order_id: String,
    pub restaurant_id: String,
    pub customer_id: String,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct ReviewWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    pub customer_first_name: String,
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

type Result<T> = std::result::Result<T, Error>;

pub struct CreateReviewPayload {
    pub order_id: String,
    pub restaurant_id: String,
    pub customer_id: String,
    pub rating: i16,
    pub comment: String,
}

/// Returns `None` when the order already has a review.
pub async fn create<'e, E: PgExecutor<'e>>(e: E, payload: CreateReviewPayload) -> Result<Option<Review>> {
    sqlx::query_as::<_, Review>(
        "
        INSERT INTO reviews (id, order_id, restaurant_id, customer_id, rating, comment)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (order_id) DO NOTHING
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(&payload.order_id)
    .bind(payload.restaurant_id)
    .bind(payload.customer_id)
    .bind(payload.rating)
    .bind(payload.comment)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while reviewing order {}: {}", payload.order_id, err);
        Error::UnexpectedError
    })
}

pub async fn find_many_by_restaurant_id(
    db: &PgPool,
    restaurant_id: &str,
    pagination: Pagination,
) -> Result<Paginated<ReviewWithAuthor>> {
    let reviews = sqlx::query_as::<_, ReviewWithAuthor>(
        "
        SELECT reviews.*, users.first_name AS customer_first_name
        FROM reviews
        INNER JOIN users ON users.id = reviews.customer_id
        WHERE reviews.restaurant_id = $1
        ORDER BY reviews.created_at DESC
        LIMIT $2 OFFSET $3
        ",
    )
    .bind(restaurant_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(db)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching reviews of {}: {}", restaurant_id, err);
        Error::UnexpectedError
    })?;

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE restaurant_id = $1")
        .bind(restaurant_id)
        .fetch_one(db)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while counting reviews of {}: {}", restaurant_id, err);
            Error::UnexpectedError
        })?;

    Ok(pagination.paginate(reviews, total))
}
