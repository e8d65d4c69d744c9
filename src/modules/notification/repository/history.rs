use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use ulid::Ulid;

use crate::utils::pagination::{Paginated, Pagination};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "notification_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Sent,
    Failed,
}

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct NotificationHistory {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: Json<serde_json::Value>,
    pub channel: String,
    pub status: NotificationStatus,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

pub struct CreateHistoryPayload {
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub channel: String,
    pub status: NotificationStatus,
}

pub async fn create<'e, E: PgExecutor<'e>>(
    e: E,
    payload: CreateHistoryPayload,
) -> Result<NotificationHistory, Error> {
    sqlx::query_as::<_, NotificationHistory>(
        "
        INSERT INTO notification_history (id, user_id, kind, title, body, data, channel, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.user_id)
    .bind(payload.kind)
    .bind(payload.title)
    .bind(payload.body)
    .bind(Json(payload.data))
    .bind(payload.channel)
    .bind(payload.status)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while recording a notification: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_many_by_user_id(
    db: &PgPool,
    user_id: &str,
    pagination: Pagination,
    unread_only: bool,
) -> Result<Paginated<NotificationHistory>, Error> {
    let items = sqlx::query_as::<_, NotificationHistory>(
        "
        SELECT * FROM notification_history
        WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        ",
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(db)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching notifications of {}: {}", user_id, err);
        Error::UnexpectedError
    })?;

    let total = sqlx::query_scalar::<_, i64>(
        "
        SELECT COUNT(*) FROM notification_history
        WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
        ",
    )
    .bind(user_id)
    .bind(unread_only)
    .fetch_one(db)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while counting notifications of {}: {}", user_id, err);
        Error::UnexpectedError
    })?;

    Ok(pagination.paginate(items, total))
}

pub async fn mark_read<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    user_id: &str,
) -> Result<Option<NotificationHistory>, Error> {
    sqlx::query_as::<_, NotificationHistory>(
        "
        UPDATE notification_history SET read_at = COALESCE(read_at, NOW())
        WHERE id = $1 AND user_id = $2
        RETURNING *
        ",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while marking notification {} as read: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn mark_all_read<'e, E: PgExecutor<'e>>(e: E, user_id: &str) -> Result<u64, Error> {
    sqlx::query(
        "UPDATE notification_history SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL",
    )
    .bind(user_id)
    .execute(e)
    .await
    .map(|result| result.rows_affected())
    .map_err(|err| {
        tracing::error!("Error occurred while marking notifications of {} as read: {}", user_id, err);
        Error::UnexpectedError
    })
}
