use crate::modules::order::repository::OrderStatus;
use bigdecimal::BigDecimal;
use serde::Serialize;
use sqlx::PgExecutor;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

#[derive(Serialize, sqlx::FromRow)]
pub struct Totals {
    pub users: i64,
    pub restaurants: i64,
    pub open_restaurants: i64,
    pub orders: i64,
    pub orders_today: i64,
    pub revenue: BigDecimal,
    pub revenue_today: BigDecimal,
    pub available_partners: i64,
    pub busy_partners: i64,
    pub offline_partners: i64,
}

#[derive(Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Revenue counts delivered orders only.
pub async fn get_totals<'e, E: PgExecutor<'e>>(
    e: E,
    since: chrono::DateTime<chrono::Utc>,
) -> Result<Totals, Error> {
    sqlx::query_as::<_, Totals>(
        "
        SELECT
            (SELECT COUNT(*) FROM users) AS users,
            (SELECT COUNT(*) FROM restaurants WHERE is_active) AS restaurants,
            (SELECT COUNT(*) FROM restaurants WHERE is_active AND is_open) AS open_restaurants,
            (SELECT COUNT(*) FROM orders) AS orders,
            (SELECT COUNT(*) FROM orders WHERE created_at >= $1) AS orders_today,
            (SELECT COALESCE(SUM(total), 0) FROM orders WHERE status = 'DELIVERED') AS revenue,
            (
                SELECT COALESCE(SUM(total), 0) FROM orders
                WHERE status = 'DELIVERED' AND delivered_at >= $1
            ) AS revenue_today,
            (SELECT COUNT(*) FROM delivery_partners WHERE status = 'AVAILABLE') AS available_partners,
            (SELECT COUNT(*) FROM delivery_partners WHERE status = 'BUSY') AS busy_partners,
            (SELECT COUNT(*) FROM delivery_partners WHERE status = 'OFFLINE') AS offline_partners
        ",
    )
    .bind(since)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while computing dashboard totals: {}", err);
        Error::UnexpectedError
    })
}

pub async fn count_orders_by_status<'e, E: PgExecutor<'e>>(e: E) -> Result<Vec<StatusCount>, Error> {
    sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status",
    )
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while counting orders by status: {}", err);
        Error::UnexpectedError
    })
}
