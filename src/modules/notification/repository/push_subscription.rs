use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use ulid::Ulid;

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct PushSubscription {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

/// A device token belongs to whoever registered it last.
pub async fn upsert<'e, E: PgExecutor<'e>>(
    e: E,
    user_id: &str,
    token: &str,
) -> Result<PushSubscription, Error> {
    sqlx::query_as::<_, PushSubscription>(
        "
        INSERT INTO push_subscriptions (id, user_id, token)
        VALUES ($1, $2, $3)
        ON CONFLICT (token) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(user_id)
    .bind(token)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while registering a push token: {}", err);
        Error::UnexpectedError
    })
}

pub async fn delete_by_token<'e, E: PgExecutor<'e>>(
    e: E,
    user_id: &str,
    token: &str,
) -> Result<bool, Error> {
    sqlx::query("DELETE FROM push_subscriptions WHERE user_id = $1 AND token = $2")
        .bind(user_id)
        .bind(token)
        .execute(e)
        .await
        .map(|result| result.rows_affected() > 0)
        .map_err(|err| {
            tracing::error!("Error occurred while removing a push token: {}", err);
            Error::UnexpectedError
        })
}

pub async fn find_tokens_by_user_id<'e, E: PgExecutor<'e>>(
    e: E,
    user_id: &str,
) -> Result<Vec<String>, Error> {
    sqlx::query_scalar::<_, String>("SELECT token FROM push_subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching push tokens of {}: {}", user_id, err);
            Error::UnexpectedError
        })
}
