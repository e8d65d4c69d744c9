use super::{Notification, ALL_BACKENDS};
use crate::{
    modules::{
        notification::repository::scheduled::{self, Audience, ScheduledNotification},
        user::{self, repository::Role},
    },
    types::Context,
};
use chrono::Utc;
use futures::future::join_all;
use sqlx::PgConnection;
use std::str::FromStr;
use std::sync::Arc;

const BATCH_SIZE: i64 = 20;
const FAN_OUT_CONCURRENCY: usize = 16;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

async fn resolve_recipients(
    conn: &mut PgConnection,
    notification: &ScheduledNotification,
) -> Result<Vec<String>, Error> {
    let value = notification.audience_value.as_deref().unwrap_or_default();

    match notification.audience {
        Audience::All => user::repository::find_ids(&mut *conn, None)
            .await
            .map_err(|_| Error::UnexpectedError),
        Audience::Role => match Role::from_str(value) {
            Ok(role) => user::repository::find_ids(&mut *conn, Some(role))
                .await
                .map_err(|_| Error::UnexpectedError),
            Err(err) => {
                tracing::warn!("Scheduled notification {} skipped: {}", notification.id, err);
                Ok(vec![])
            }
        },
        Audience::User => user::repository::find_by_id(&mut *conn, value)
            .await
            .map(|user| user.map(|user| vec![user.id]).unwrap_or_default())
            .map_err(|_| Error::UnexpectedError),
    }
}

/// Claims every due PENDING notification, marks it SENT and fans it out.
/// Returns how many scheduled notifications were dispatched.
pub async fn dispatch_due(ctx: Arc<Context>) -> Result<usize, Error> {
    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to start database transaction: {}", err);
        Error::UnexpectedError
    })?;

    let due = scheduled::lock_due(&mut *tx, Utc::now(), BATCH_SIZE)
        .await
        .map_err(|_| Error::UnexpectedError)?;

    let mut batches = Vec::with_capacity(due.len());
    for notification in due {
        let recipients = resolve_recipients(&mut tx, &notification).await?;
        scheduled::mark_sent(&mut *tx, &notification.id, recipients.len() as i32)
            .await
            .map_err(|_| Error::UnexpectedError)?;
        batches.push((notification, recipients));
    }

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit database transaction: {}", err);
        Error::UnexpectedError
    })?;

    let dispatched = batches.len();
    for (notification, recipients) in batches {
        tracing::info!(
            "Dispatching scheduled notification {} to {} recipients",
            notification.id,
            recipients.len()
        );

        for chunk in recipients.chunks(FAN_OUT_CONCURRENCY) {
            join_all(chunk.iter().map(|recipient_id| {
                super::send(
                    ctx.clone(),
                    Notification::announcement(
                        notification.title.clone(),
                        notification.body.clone(),
                        recipient_id.clone(),
                        notification.id.clone(),
                    ),
                    &ALL_BACKENDS,
                )
            }))
            .await;
        }
    }

    Ok(dispatched)
}
