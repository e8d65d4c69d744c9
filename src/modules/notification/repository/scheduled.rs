use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use ulid::Ulid;

use crate::utils::pagination::{Paginated, Pagination};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "scheduled_notification_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduledNotificationStatus {
    Pending,
    Sent,
    Cancelled,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "notification_audience", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Audience {
    All,
    Role,
    User,
}

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct ScheduledNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub audience: Audience,
    pub audience_value: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub status: ScheduledNotificationStatus,
    pub recipients_count: i32,
    pub created_by: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

type Result<T> = std::result::Result<T, Error>;

pub struct CreateScheduledPayload {
    pub title: String,
    pub body: String,
    pub audience: Audience,
    pub audience_value: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub created_by: String,
}

pub async fn create<'e, E: PgExecutor<'e>>(
    e: E,
    payload: CreateScheduledPayload,
) -> Result<ScheduledNotification> {
    sqlx::query_as::<_, ScheduledNotification>(
        "
        INSERT INTO scheduled_notifications (
            id,
            title,
            body,
            audience,
            audience_value,
            scheduled_for,
            created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.title)
    .bind(payload.body)
    .bind(payload.audience)
    .bind(payload.audience_value)
    .bind(payload.scheduled_for)
    .bind(payload.created_by)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while scheduling a notification: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_many(
    db: &PgPool,
    pagination: Pagination,
    status: Option<ScheduledNotificationStatus>,
) -> Result<Paginated<ScheduledNotification>> {
    let items = sqlx::query_as::<_, ScheduledNotification>(
        "
        SELECT * FROM scheduled_notifications
        WHERE $1::scheduled_notification_status IS NULL OR status = $1
        ORDER BY scheduled_for DESC
        LIMIT $2 OFFSET $3
        ",
    )
    .bind(status)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(db)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching scheduled notifications: {}", err);
        Error::UnexpectedError
    })?;

    let total = sqlx::query_scalar::<_, i64>(
        "
        SELECT COUNT(*) FROM scheduled_notifications
        WHERE $1::scheduled_notification_status IS NULL OR status = $1
        ",
    )
    .bind(status)
    .fetch_one(db)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while counting scheduled notifications: {}", err);
        Error::UnexpectedError
    })?;

    Ok(pagination.paginate(items, total))
}

pub async fn cancel_by_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
) -> Result<Option<ScheduledNotification>> {
    sqlx::query_as::<_, ScheduledNotification>(
        "
        UPDATE scheduled_notifications SET status = 'CANCELLED', updated_at = NOW()
        WHERE id = $1 AND status = 'PENDING'
        RETURNING *
        ",
    )
    .bind(id)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while cancelling scheduled notification {}: {}", id, err);
        Error::UnexpectedError
    })
}

/// Locks due rows so concurrent dispatchers never pick the same one.
/// Must run inside a transaction.
pub async fn lock_due<'e, E: PgExecutor<'e>>(
    e: E,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<ScheduledNotification>> {
    sqlx::query_as::<_, ScheduledNotification>(
        "
        SELECT * FROM scheduled_notifications
        WHERE status = 'PENDING' AND scheduled_for <= $1
        ORDER BY scheduled_for ASC
        LIMIT $2
        FOR UPDATE SKIP LOCKED
        ",
    )
    .bind(now)
    .bind(limit)
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while locking due notifications: {}", err);
        Error::UnexpectedError
    })
}

pub async fn mark_sent<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    recipients_count: i32,
) -> Result<()> {
    sqlx::query(
        "
        UPDATE scheduled_notifications SET
            status = 'SENT',
            recipients_count = $2,
            sent_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(recipients_count)
    .execute(e)
    .await
    .map(|_| ())
    .map_err(|err| {
        tracing::error!("Error occurred while marking notification {} as sent: {}", id, err);
        Error::UnexpectedError
    })
}
